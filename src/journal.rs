//! Line-delimited JSON artifacts passed between stages.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::records::Candidate;

/// Truncating JSONL writer; parent directories are created on open.
pub struct JsonlWriter {
    out: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush()?;
        Ok(self.written)
    }
}

/// Read every well-formed record; malformed lines are logged and skipped.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(rec) => records.push(rec),
            Err(e) => warn!(path = %path.display(), line = lineno + 1, error = %e, "Skipping malformed line"),
        }
    }
    Ok(records)
}

/// Merge candidate files in order, keeping the first record per exact `menu_url`.
///
/// Missing files are skipped, but at least one must exist.
pub fn read_candidates(paths: &[PathBuf]) -> Result<Vec<Candidate>> {
    let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();
    if existing.is_empty() {
        let first = paths.first().cloned().unwrap_or_default();
        return Err(PipelineError::MissingInput(first));
    }

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for path in existing {
        let before = merged.len();
        for mut c in read_jsonl::<Candidate>(path)? {
            c.menu_url = c.menu_url.trim().to_string();
            c.root = c.root.trim().to_string();
            if c.menu_url.is_empty() || !seen.insert(c.menu_url.clone()) {
                continue;
            }
            merged.push(c);
        }
        debug!(path = %path.display(), added = merged.len() - before, "Merged candidates");
    }
    Ok(merged)
}

/// One value per line, for the plain-text seed list.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for line in lines {
        writeln!(out, "{}", line.as_ref())?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

/// Line count, or `None` when the file does not exist.
pub fn count_lines(path: &Path) -> Result<Option<usize>> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(Some(reader.lines().count()))
}

/// First `n` raw lines of a file (empty when missing).
pub fn head(path: &Path, n: usize) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    reader.lines().take(n).map(|l| l.map_err(PipelineError::from)).collect()
}
