//! Desk configuration: where the portal API lives and how to reach it.

use std::path::PathBuf;
use std::time::Duration;

use grievance_core::{ConfigError, EngineConfig};

pub const DEFAULT_API_URL: &str = "https://grievanceportal.vercel.app/api/v1";

#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Base URL of the portal REST API, without trailing slash.
    pub api_url: String,
    /// Bearer token; requests fail with an auth error when absent.
    pub token: Option<String>,
    /// Per-request timeout covering headers and body.
    pub timeout: Duration,
    /// Optional TOML engine config.
    pub engine_config: Option<PathBuf>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("GRIEVANCE_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GRIEVANCE_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("GRIEVANCE_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
            engine_config: std::env::var("GRIEVANCE_ENGINE_CONFIG").ok().map(PathBuf::from),
        }
    }
}

impl DeskConfig {
    /// Engine config from the configured file, or defaults plus env.
    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        match &self.engine_config {
            Some(path) => EngineConfig::load(path),
            None => EngineConfig::from_env(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}
