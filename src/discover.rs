use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::Url;

use crate::error::Result;
use crate::fetch::{Fetch, Page};
use crate::journal::JsonlWriter;
use crate::progress;
use crate::records::Candidate;

/// Paths probed under every site root.
pub const PROBE_PATHS: &[&str] = &[
    "/menu",
    "/menus",
    "/our-menu",
    "/food",
    "/dine",
    "/dining",
    "/lunch",
    "/dinner",
    "/breakfast",
    "/brunch",
    "/happy-hour",
    "/catering",
    "/order",
    "/order-online",
    "/takeout",
    "/to-go",
    "/pdfs/menu.pdf",
];

pub struct DiscoverStats {
    pub sites: usize,
    pub probed: usize,
    pub hits: usize,
}

/// A probe survives when it answered below 400 with an HTML or PDF content type.
pub fn accepts(page: &Page) -> bool {
    let ct = page.content_type();
    page.status < 400 && (ct.contains("text/html") || ct.contains("pdf"))
}

/// Probe every `(root, path)` pair and stream surviving candidates to `out`.
pub async fn discover<F: Fetch + 'static>(
    fetcher: Arc<F>,
    roots: Vec<String>,
    out: &Path,
    concurrency: usize,
) -> Result<DiscoverStats> {
    let mut writer = JsonlWriter::create(out)?;
    let targets: Vec<(String, String)> = roots
        .iter()
        .flat_map(|root| {
            PROBE_PATHS
                .iter()
                .filter_map(move |path| probe_url(root, path).map(|u| (root.clone(), u)))
        })
        .collect();
    let probed = targets.len();

    let pb = progress::bar(probed as u64);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Option<Candidate>>(concurrency * 2);

    for (root, menu_url) in targets {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let hit = match fetcher.probe(&menu_url).await {
                Ok(page) if accepts(&page) => Some(Candidate {
                    root,
                    content_type: page.content_type().to_string(),
                    menu_url,
                }),
                Ok(_) => None,
                Err(e) => {
                    debug!(url = %menu_url, error = %e, "Probe failed");
                    None
                }
            };
            let _ = tx.send(hit).await;
        });
    }

    // rx closes once every spawned probe has reported
    drop(tx);

    while let Some(hit) = rx.recv().await {
        if let Some(candidate) = hit {
            writer.write(&candidate)?;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let hits = writer.finish()?;
    info!(sites = roots.len(), probed, hits, "Discovery finished");

    Ok(DiscoverStats {
        sites: roots.len(),
        probed,
        hits,
    })
}

fn probe_url(root: &str, path: &str) -> Option<String> {
    Url::parse(root).ok()?.join(path).ok().map(String::from)
}
