use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::domain;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::journal::JsonlWriter;
use crate::parser::prices::{self, PriceRange};
use crate::parser::{blocks, pdf};
use crate::progress;
use crate::records::{Candidate, PriceObservation};

#[derive(Debug, Default, PartialEq)]
pub struct AggregateStats {
    pub checked: usize,
    pub third_party: usize,
    pub foreign: usize,
    pub derived: usize,
}

/// Why a candidate is not fetched for pricing.
#[derive(Debug, PartialEq)]
enum Skip {
    ThirdParty,
    Foreign,
}

fn skip_reason(c: &Candidate) -> Option<Skip> {
    if domain::is_third_party(&c.menu_url) {
        return Some(Skip::ThirdParty);
    }
    // A known root must share its registrable domain with the menu URL.
    if domain::host_of(&c.root).is_some() && !domain::same_organization(&c.root, &c.menu_url) {
        return Some(Skip::Foreign);
    }
    None
}

/// Derive one median price per surviving candidate and write it to `out`.
pub async fn aggregate_prices<F: Fetch + 'static>(
    fetcher: Arc<F>,
    candidates: Vec<Candidate>,
    range: PriceRange,
    out: &Path,
    concurrency: usize,
) -> Result<AggregateStats> {
    let mut writer = JsonlWriter::create(out)?;
    let mut stats = AggregateStats {
        checked: candidates.len(),
        ..Default::default()
    };

    let mut urls = Vec::new();
    for c in candidates {
        match skip_reason(&c) {
            Some(Skip::ThirdParty) => stats.third_party += 1,
            Some(Skip::Foreign) => {
                debug!(root = %c.root, url = %c.menu_url, "Skipping off-domain candidate");
                stats.foreign += 1;
            }
            None => urls.push(c.menu_url),
        }
    }

    let pb = progress::bar(urls.len() as u64);
    let mut results = stream::iter(urls)
        .map(|url| {
            let fetcher = Arc::clone(&fetcher);
            async move {
                let text = page_text(fetcher.as_ref(), &url).await?;
                prices::observe(&url, &text, range)
            }
        })
        .buffered(concurrency);

    while let Some(obs) = results.next().await {
        pb.inc(1);
        if let Some(obs) = obs {
            writer.write(&obs)?;
            if writer.written() % 25 == 0 {
                pb.println(format!("derived {} …", writer.written()));
            }
        }
    }

    pb.finish_and_clear();
    stats.derived = writer.finish()?;
    info!(
        checked = stats.checked,
        third_party = stats.third_party,
        foreign = stats.foreign,
        derived = stats.derived,
        "Price aggregation finished"
    );
    Ok(stats)
}

/// Body text of an HTML page, or the text layer of a PDF.
async fn page_text<F: Fetch + ?Sized>(fetcher: &F, url: &str) -> Option<String> {
    let page = match fetcher.get(url).await {
        Ok(page) if page.is_success() => page,
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
        Some(blocks::body_text(&page.text()))
    } else if page.is_pdf() || url.to_ascii_lowercase().ends_with(".pdf") {
        pdf::extract_text_blocking(page.body).await
    } else {
        None
    }
}

/// First `n` observations of a written prices file.
pub fn sample(path: &Path, n: usize) -> Result<Vec<PriceObservation>> {
    let mut all: Vec<PriceObservation> = crate::journal::read_jsonl(path)?;
    all.truncate(n);
    Ok(all)
}
