//! Grievance Desk
//!
//! Networked shell around `grievance_core`: a reqwest transport for the
//! portal REST API, a per-principal session that gates and pre-checks every
//! action before it leaves the process, and the `grievance-desk` CLI.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod session;

pub use api::{GrievanceApi, HttpGrievanceApi, SubmissionReceipt};
pub use config::DeskConfig;
pub use error::DeskError;
pub use session::Desk;
