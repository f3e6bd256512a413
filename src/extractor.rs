use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::domain;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::journal::JsonlWriter;
use crate::parser::{self, pdf};
use crate::progress;
use crate::records::{Candidate, MenuItem};

#[derive(Debug, Default, PartialEq)]
pub struct ExtractStats {
    pub checked: usize,
    pub third_party: usize,
    pub fetched: usize,
    pub items: usize,
}

/// Fetch each candidate and write its menu items to `out`, in candidate order.
pub async fn extract_items<F: Fetch + 'static>(
    fetcher: Arc<F>,
    candidates: Vec<Candidate>,
    out: &Path,
    concurrency: usize,
) -> Result<ExtractStats> {
    let mut writer = JsonlWriter::create(out)?;
    let mut stats = ExtractStats {
        checked: candidates.len(),
        ..Default::default()
    };

    let urls: Vec<String> = candidates
        .into_iter()
        .map(|c| c.menu_url)
        .filter(|url| {
            let skip = domain::is_third_party(url);
            if skip {
                debug!(url = %url, "Skipping third-party ordering platform");
            }
            !skip
        })
        .collect();
    stats.third_party = stats.checked - urls.len();

    let pb = progress::bar(urls.len() as u64);
    let mut reported = 0;
    let mut results = stream::iter(urls)
        .map(|url| {
            let fetcher = Arc::clone(&fetcher);
            async move { items_for_url(fetcher.as_ref(), &url).await }
        })
        .buffered(concurrency);

    while let Some(found) = results.next().await {
        pb.inc(1);
        let Some(items) = found else { continue };
        stats.fetched += 1;
        for item in &items {
            writer.write(item)?;
        }
        if writer.written() / 50 > reported {
            reported = writer.written() / 50;
            pb.println(format!("wrote {} items…", writer.written()));
        }
    }

    pb.finish_and_clear();
    stats.items = writer.finish()?;
    info!(
        checked = stats.checked,
        third_party = stats.third_party,
        fetched = stats.fetched,
        items = stats.items,
        "Item extraction finished"
    );
    Ok(stats)
}

/// `None` when the page could not be retrieved; otherwise its items (maybe none).
pub async fn items_for_url<F: Fetch + ?Sized>(fetcher: &F, url: &str) -> Option<Vec<MenuItem>> {
    let page = match fetcher.get(url).await {
        Ok(page) if page.is_success() && !page.body.is_empty() => page,
        Ok(page) => {
            debug!(url = %url, status = page.status, "No usable response");
            return None;
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Fetch failed");
            return None;
        }
    };

    if page.is_html() {
        return Some(parser::items_from_html(&page.text(), url));
    }

    let text = pdf::extract_text_blocking(page.body).await.unwrap_or_default();
    Some(parser::items_from_pdf_text(&text, url))
}
