//! Per-grievance action serialization.
//!
//! At most one action per grievance may be in flight. The permit is an RAII
//! guard: dropping it (success, failure or cancellation) frees the id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{GrievanceError, GrievanceResult};

#[derive(Debug, Clone, Default)]
pub struct InFlightActions {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlightActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `issue_id`, failing with `ACTION_IN_FLIGHT` if already held.
    pub fn try_acquire(&self, issue_id: &str) -> GrievanceResult<ActionPermit> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(issue_id.to_string()) {
            debug!(issue_id, "Action already in flight");
            return Err(GrievanceError::ActionInFlight {
                issue_id: issue_id.to_string(),
            });
        }
        Ok(ActionPermit {
            issue_id: issue_id.to_string(),
            ids: Arc::clone(&self.ids),
        })
    }

    /// Whether action controls for `issue_id` should be disabled.
    pub fn is_in_flight(&self, issue_id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(issue_id)
    }
}

/// Held for the duration of one action submission.
#[derive(Debug)]
pub struct ActionPermit {
    issue_id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl ActionPermit {
    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }
}

impl Drop for ActionPermit {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.issue_id);
    }
}
