//! CLI configuration file.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tally_fetch::FetchCacheConfig;
use tally_storage::StoreConfig;

/// Default `tracing` filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str =
    "warn,tally_cli=info,tally_storage=info,tally_cache=info,tally_fetch=info";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Backend settings
    pub store: StoreConfig,
    /// Fetch cache settings
    pub fetch: FetchCacheConfig,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            fetch: FetchCacheConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TallyConfig {
    /// Load from a JSON file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        config.fetch.validate()?;
        Ok(config)
    }
}
