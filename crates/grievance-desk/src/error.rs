use std::path::PathBuf;

use grievance_core::{ConfigError, ErrorReport, GrievanceError, ReasonCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Engine(#[from] GrievanceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid admin profile {path}: {source}")]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl DeskError {
    /// Failure payload written to stderr by the binary.
    pub fn report(&self) -> ErrorReport {
        match self {
            Self::Engine(err) => err.report(),
            Self::Config(_) | Self::Io { .. } | Self::Profile { .. } => ErrorReport::new(
                ReasonCode::Validation,
                self.to_string(),
                "Fix the configuration and retry",
            ),
            Self::Usage(_) => ErrorReport::new(
                ReasonCode::Validation,
                self.to_string(),
                "Check the command line arguments",
            ),
        }
    }
}
