//! Escalation Router: deterministic owner resolution for redirects
//!
//! Given a grievance's current owner and category plus a requested redirect,
//! computes and validates the next owner. No network calls.
//!
//! # Escalation Ladder
//!
//! ```text
//! campus-{dept} @ campus
//!     │
//!     ├─ lateral, same campus → campus-admin / campus-{dept}
//!     ├─ lateral, other campus → only by university or superadmin actors
//!     │
//!     ▼
//! university-{dept}
//!     │
//!     ▼
//! superadmin (may recategorize explicitly)
//! ```
//!
//! Department-specific targets must serve the grievance's current category;
//! the generic `admin` department and `superadmin` accept any category.

pub mod router;

pub use router::{EscalationRouter, RedirectRequest, RedirectTarget, ResolvedRoute, RouteError};
