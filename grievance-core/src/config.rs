//! Engine configuration.
//!
//! Defaults are compiled in; a TOML file may override any subset of fields
//! and a few environment variables override the file:
//!
//! | Variable                        | Field                   |
//! |---------------------------------|-------------------------|
//! | `GRIEVANCE_RETRY_MAX_ATTEMPTS`  | `retry.max_attempts`    |
//! | `GRIEVANCE_RETRY_BASE_DELAY_MS` | `retry.base_delay_ms`   |
//! | `GRIEVANCE_PAGE_SIZE`           | `page_size`             |
//!
//! ```toml
//! page_size = 20
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 500
//!
//! [[campuses]]
//! id = 1011
//! code = "DSEU-1"
//! name = "G.B Pant DSEU Okhala-1"
//! is_main = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::CampusCatalogue;
use crate::resilience::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Rows per list page.
    pub page_size: usize,
    /// Maximum description length in characters.
    pub description_max_len: usize,
    /// Maximum subject length in characters.
    pub subject_max_len: usize,
    pub campuses: CampusCatalogue,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            page_size: 10,
            description_max_len: 4000,
            subject_max_len: 200,
            campuses: CampusCatalogue::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        info!(
            path = %path.display(),
            campuses = config.campuses.len(),
            page_size = config.page_size,
            "Loaded engine config"
        );
        Ok(config)
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("GRIEVANCE_RETRY_MAX_ATTEMPTS").and_then(|s| s.parse().ok()) {
            debug!(max_attempts = n, "Retry attempts overridden from env");
            self.retry.max_attempts = n;
        }
        if let Some(ms) = lookup("GRIEVANCE_RETRY_BASE_DELAY_MS").and_then(|s| s.parse().ok()) {
            debug!(base_delay_ms = ms, "Retry delay overridden from env");
            self.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(n) = lookup("GRIEVANCE_PAGE_SIZE").and_then(|s| s.parse().ok()) {
            debug!(page_size = n, "Page size overridden from env");
            self.page_size = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.subject_max_len == 0 || self.description_max_len == 0 {
            return Err(ConfigError::Invalid(
                "subject and description limits must be positive".into(),
            ));
        }
        if self.campuses.is_empty() {
            return Err(ConfigError::Invalid("campus catalogue is empty".into()));
        }
        // Deserialization skips the catalogue constructor's duplicate check.
        CampusCatalogue::new(self.campuses.iter().cloned().collect())
            .map_err(ConfigError::Invalid)?;
        Ok(())
    }
}
