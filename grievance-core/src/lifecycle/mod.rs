//! Grievance lifecycle: the status state machine and per-grievance action
//! serialization.
//!
//! ```text
//!            acknowledge            resolve / reject
//!   NEW ─────────────────▶ PENDING ─────────────────▶ RESOLVED | REJECTED
//!    │  ◀───────────────────  │                             (terminal)
//!    │        return          │
//!    └── resolve / reject ────┼───────────────────────▶
//!
//!   redirect: NEW or PENDING, status unchanged, owner moves
//! ```

pub mod inflight;
pub mod machine;

pub use inflight::{ActionPermit, InFlightActions};
pub use machine::{
    Action, ActionKind, ActionRequest, GrievanceStateMachine, PlannedTransition, TransitionError,
    TransitionRecord,
};
