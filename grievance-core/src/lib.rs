//! Grievance Core Library
//!
//! Deterministic core of the grievance portal's admin hierarchy:
//! - Access gate: role × scope × department × campus authorization
//! - Lifecycle: status state machine with timeline and admin responses
//! - Escalation: redirect and escalate routing across the ownership ladder
//! - Resilient fetch: bounded linear-backoff retry with stale data retention
//! - Listing: per-role grievance pages with filtering and pagination
//! - Submission: student draft validation and category classification
//! - Wire: JSON envelope and DTOs of the portal REST API
//! - Config: TOML engine settings with environment overrides
//!
//! # Flow
//!
//! ```text
//! Principal ──▶ AccessGate ──▶ GrievanceStateMachine ──▶ TransitionRecord
//!                                   │
//!                                   └─ redirect ─▶ EscalationRouter
//!
//! Transport thunk ──▶ ResilientFetch ──▶ GrievanceListController ──▶ Page
//! ```
//!
//! Nothing here performs network I/O; transports live in the desk crate and
//! are handed to [`ResilientFetch::fetch`] as async thunks.

#![allow(clippy::uninlined_format_args)]

pub mod access;
pub mod config;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod listing;
pub mod model;
pub mod resilience;
pub mod submission;
pub mod wire;

pub use access::{AccessDecision, AccessGate, AccessTarget, Capability, DenyReason};
pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorReport, GrievanceError, GrievanceResult, ReasonCode};
pub use escalation::{EscalationRouter, RedirectRequest, RedirectTarget, ResolvedRoute, RouteError};
pub use lifecycle::{
    Action, ActionKind, ActionPermit, ActionRequest, GrievanceStateMachine, InFlightActions,
    PlannedTransition, TransitionError, TransitionRecord,
};
pub use listing::{GrievanceListController, ListFilter, ListSource, Page, PageType};
pub use model::{
    AdminInfo, Campus, CampusCatalogue, CampusCode, Category, Department, Grievance, Owner,
    Principal, Role, Scope, Status, TimelineAction, TimelineEntry,
};
pub use resilience::{FetchOutcome, FetchPhase, FetchSnapshot, ResilientFetch, RetryPolicy};
pub use submission::{
    classify_subject, PreparedSubmission, SubmissionBody, SubmissionCategory, SubmissionDraft,
};
