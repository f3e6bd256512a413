use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::parser::prices::PriceRange;

pub const SEED_FILE: &str = "menu_seed.txt";
pub const CRAWLED_CANDIDATES_FILE: &str = "menu_candidates.jsonl";
pub const GUESSED_CANDIDATES_FILE: &str = "menu_candidates_guessed.jsonl";
pub const ITEMS_FILE: &str = "menu_items.jsonl";
pub const PRICES_FILE: &str = "menu_prices.jsonl";
pub const MISSING_WEBSITES_FILE: &str = "missing_websites.csv";

const DEFAULT_USER_AGENT: &str = "FareWare/0.1 (+menu enrichment crawler)";

/// Process-wide settings, read once in `main` and handed to each stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub user_agent: String,
    pub concurrency: usize,
    pub min_price: f64,
    pub max_price: f64,
    pub batch_size: usize,
    pub probe_delay_ms: u64,
    pub extract_delay_ms: u64,
    pub price_delay_ms: u64,
    pub probe_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub registry_timeout_secs: u64,
    #[serde(skip)]
    pub registry: RegistryCredentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: 8,
            min_price: 1.0,
            max_price: 200.0,
            batch_size: 500,
            probe_delay_ms: 100,
            extract_delay_ms: 50,
            price_delay_ms: 100,
            probe_timeout_secs: 10,
            fetch_timeout_secs: 25,
            registry_timeout_secs: 120,
            registry: RegistryCredentials::default(),
        }
    }
}

/// `SUPABASE_URL` / `SUPABASE_SERVICE_ROLE_KEY`, both optional until a stage
/// needs the registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryCredentials {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
}

/// Validated registry endpoint handed to [`crate::registry::RestRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub key: String,
    pub timeout: Duration,
}

impl Settings {
    /// Load `.env`, then `SUPABASE_*` credentials and `MENU_*` tuning knobs.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }

        let mut settings: Settings = Config::builder()
            .add_source(Environment::with_prefix("MENU").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.registry = Config::builder()
            .add_source(Environment::with_prefix("SUPABASE"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config("MENU_CONCURRENCY must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("MENU_BATCH_SIZE must be at least 1".into()));
        }
        if !(self.min_price <= self.max_price) {
            return Err(PipelineError::Config(format!(
                "price range is empty: min {} > max {}",
                self.min_price, self.max_price
            )));
        }
        Ok(())
    }

    /// Registry endpoint; fails when either credential is absent.
    pub fn registry(&self) -> Result<RegistryConfig> {
        let url = non_blank(self.registry.url.as_deref())
            .ok_or_else(|| PipelineError::Config("SUPABASE_URL is not set".into()))?;
        let key = non_blank(self.registry.service_role_key.as_deref()).ok_or_else(|| {
            PipelineError::Config("SUPABASE_SERVICE_ROLE_KEY is not set".into())
        })?;
        Ok(RegistryConfig {
            base_url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            timeout: Duration::from_secs(self.registry_timeout_secs),
        })
    }

    pub fn price_range(&self) -> PriceRange {
        PriceRange {
            min: self.min_price,
            max: self.max_price,
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Candidate files in merge order: external crawler output first.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        vec![
            self.path(CRAWLED_CANDIDATES_FILE),
            self.path(GUESSED_CANDIDATES_FILE),
        ]
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
