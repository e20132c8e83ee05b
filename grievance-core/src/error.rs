//! Error taxonomy with reason codes and retry classification.
//!
//! Every failure the engine can produce is represented here. Callers query
//! [`GrievanceError::reason_code`] and [`GrievanceError::is_retryable`]
//! instead of matching on message strings.
//!
//! | Kind                 | Retried | Surfaced as                      |
//! |----------------------|---------|----------------------------------|
//! | Auth                 | no      | forced re-authentication         |
//! | Authorization        | no      | access-denied state              |
//! | Transition           | no      | inline rejection on the action   |
//! | TransientNetwork     | yes     | retry progress, then manual retry|
//! | Validation           | no      | inline, before any network call  |
//! | ServerRejected       | no      | inline, authoritative            |
//! | ActionInFlight       | no      | action controls disabled         |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::access::DenyReason;
use crate::escalation::RouteError;
use crate::lifecycle::TransitionError;

/// Result alias used across the engine.
pub type GrievanceResult<T> = Result<T, GrievanceError>;

/// Closed set of machine-readable reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    NotAuthenticated,
    RoleMismatch,
    ScopeMismatch,
    InvalidTransition,
    TerminalState,
    RedirectTargetInvalid,
    CategoryMismatch,
    InvalidTarget,
    NoOpRedirect,
    InsufficientSeniority,
    TransientNetwork,
    Validation,
    ServerRejected,
    ActionInFlight,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::RoleMismatch => "ROLE_MISMATCH",
            Self::ScopeMismatch => "SCOPE_MISMATCH",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::TerminalState => "TERMINAL_STATE",
            Self::RedirectTargetInvalid => "REDIRECT_TARGET_INVALID",
            Self::CategoryMismatch => "CATEGORY_MISMATCH",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::NoOpRedirect => "NO_OP_REDIRECT",
            Self::InsufficientSeniority => "INSUFFICIENT_SENIORITY",
            Self::TransientNetwork => "TRANSIENT_NETWORK",
            Self::Validation => "VALIDATION",
            Self::ServerRejected => "SERVER_REJECTED",
            Self::ActionInFlight => "ACTION_IN_FLIGHT",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the grievance engine and its transports.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrievanceError {
    /// Missing, invalid or expired bearer token.
    #[error("Authentication required: {message}")]
    Auth { message: String },

    /// The principal may not perform the requested capability.
    #[error("Access denied: {0}")]
    Authorization(DenyReason),

    /// A lifecycle action was rejected locally.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Connection failure, timeout or 5xx from the remote service.
    #[error("Network error: {message}")]
    TransientNetwork { message: String },

    /// Malformed input caught before any network call.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The remote service refused the request. Authoritative even when the
    /// local pre-check passed.
    #[error("Server rejected request{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ServerRejected { status: Option<u16>, message: String },

    /// Another action on the same grievance has not settled yet.
    #[error("An action on {issue_id} is already in flight")]
    ActionInFlight { issue_id: String },
}

impl GrievanceError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientNetwork {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn server_rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServerRejected {
            status,
            message: message.into(),
        }
    }

    /// Specific reason code for this error.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::Auth { .. } => ReasonCode::NotAuthenticated,
            Self::Authorization(reason) => reason.code(),
            Self::Transition(err) => err.reason_code(),
            Self::TransientNetwork { .. } => ReasonCode::TransientNetwork,
            Self::Validation { .. } => ReasonCode::Validation,
            Self::ServerRejected { .. } => ReasonCode::ServerRejected,
            Self::ActionInFlight { .. } => ReasonCode::ActionInFlight,
        }
    }

    /// Only transient network failures are retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }

    /// Whether the current view must hand control back to the login flow.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. }
                | Self::Authorization(DenyReason::NotAuthenticated)
                | Self::Transition(TransitionError::Unauthorized {
                    reason: DenyReason::NotAuthenticated,
                    ..
                })
        )
    }

    /// Instruction shown next to the failure.
    pub fn recovery_action(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "Sign in again to obtain a fresh token",
            Self::Authorization(DenyReason::NotAuthenticated) => "Sign in to continue",
            Self::Authorization(_) => "Ask a super-admin for a role covering this view",
            Self::Transition(TransitionError::Unauthorized { .. }) => {
                "Only the current owner or a senior role may act on this grievance"
            }
            Self::Transition(TransitionError::TerminalState { .. }) => {
                "The grievance is closed; no further action is possible"
            }
            Self::Transition(TransitionError::RedirectTargetInvalid(
                RouteError::NoOpRedirect { .. },
            )) => "Choose a different role or campus",
            Self::Transition(_) => "Refresh the grievance and pick a permitted action",
            Self::TransientNetwork { .. } => "Try again",
            Self::Validation { .. } => "Correct the highlighted input",
            Self::ServerRejected { .. } => "Refresh the grievance; it may have changed",
            Self::ActionInFlight { .. } => "Wait for the pending action to settle",
        }
    }

    /// Structured payload for the failure surface of a CLI or service.
    pub fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(
            self.reason_code(),
            self.to_string(),
            self.recovery_action(),
        );
        let report = if self.is_retryable() {
            report.retryable()
        } else {
            report
        };
        match self {
            Self::ServerRejected {
                status: Some(status),
                ..
            } => report.with_context("status", *status),
            Self::ActionInFlight { issue_id } => report.with_context("issue_id", issue_id.clone()),
            Self::Transition(err) => report.with_context("kind", err.kind()),
            _ => report,
        }
    }
}

impl From<RouteError> for GrievanceError {
    fn from(err: RouteError) -> Self {
        Self::Transition(TransitionError::RedirectTargetInvalid(err))
    }
}

/// Serializable error payload.
///
/// ```json
/// {
///   "code": "TERMINAL_STATE",
///   "message": "Grievance is already RESOLVED",
///   "recovery_action": "The grievance is closed; no further action is possible",
///   "context": { "kind": "transition" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ReasonCode,
    pub message: String,
    pub recovery_action: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorReport {
    pub fn new(
        code: ReasonCode,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
