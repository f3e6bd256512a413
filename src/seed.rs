use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain;
use crate::error::{PipelineError, Result};
use crate::journal;
use crate::registry::Registry;

/// Sorted, distinct, trimmed `website` values of every registry row that has one.
pub async fn distinct_websites<R: Registry + ?Sized>(registry: &R) -> Result<Vec<String>> {
    let rows = registry.restaurants_with_website().await?;
    let sites: BTreeSet<String> = rows
        .into_iter()
        .filter_map(|r| r.website)
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();
    Ok(sites.into_iter().collect())
}

pub async fn write_seed<R: Registry + ?Sized>(registry: &R, path: &Path) -> Result<usize> {
    let sites = distinct_websites(registry).await?;
    let n = journal::write_lines(path, &sites)?;
    info!(path = %path.display(), sites = n, "Wrote seed list");
    Ok(n)
}

/// Site origins to probe, read from the seed list.
///
/// Each line is reduced to `scheme://host[:port]`; unparseable lines are
/// dropped and duplicates collapse, keeping first-seen order.
pub fn read_roots(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let mut seen = BTreeSet::new();
    Ok(text
        .lines()
        .filter_map(domain::normalize_site)
        .filter(|root| seen.insert(root.clone()))
        .collect())
}
