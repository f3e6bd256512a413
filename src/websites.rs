//! CSV round-trip for restaurants that have no website yet: export the rows,
//! fill the `website` column by hand, import it back.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain;
use crate::error::{PipelineError, Result};
use crate::registry::{MissingWebsiteRow, Registry, WebsiteUpdate};

const HEADER: [&str; 7] = ["id", "name", "addr", "city", "state", "postcode", "website"];

#[derive(Debug, Deserialize)]
struct WebsiteCell {
    id: String,
    #[serde(default)]
    website: String,
}

pub async fn export_missing<R: Registry + ?Sized>(registry: &R, path: &Path) -> Result<usize> {
    let rows = registry.restaurants_missing_website().await?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let mut out = csv::Writer::from_path(path)?;
    out.write_record(HEADER)?;
    for row in &rows {
        out.write_record(record(row))?;
    }
    out.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Exported restaurants missing a website");
    Ok(rows.len())
}

fn record(row: &MissingWebsiteRow) -> [String; 7] {
    [
        row.id.to_string(),
        cell(&row.name),
        cell(&row.addr),
        cell(&row.city),
        cell(&row.state),
        cell(&row.postcode),
        String::new(),
    ]
}

/// Plain text for strings, empty for null, JSON for anything else.
fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cleaned `{id, website}` pairs from a filled-in export.
pub fn read_updates(path: &Path) -> Result<Vec<WebsiteUpdate>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut updates = Vec::new();
    for row in reader.deserialize::<WebsiteCell>() {
        let row = row?;
        let id = row.id.trim();
        if id.is_empty() || row.website.trim().is_empty() {
            continue;
        }
        match domain::clean_website(&row.website) {
            Some(website) => updates.push(WebsiteUpdate {
                id: id.to_string(),
                website,
            }),
            None => debug!(id = %id, website = %row.website, "Unusable website"),
        }
    }
    Ok(updates)
}

pub async fn import_websites<R: Registry + ?Sized>(registry: &R, path: &Path) -> Result<usize> {
    let updates = read_updates(path)?;
    if updates.is_empty() {
        println!("No websites to update.");
        return Ok(0);
    }
    registry.upsert_websites(&updates).await?;
    info!(rows = updates.len(), "Upserted websites");
    Ok(updates.len())
}
