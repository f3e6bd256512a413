use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the pipeline stages.
///
/// Per-URL fetch and parse problems are swallowed inside the stages; only
/// configuration, input and registry failures travel through this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered a write or read with a non-2xx status.
    #[error("registry rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
