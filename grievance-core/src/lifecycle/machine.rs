//! Grievance State Machine: explicit statuses and legal transition guards.
//!
//! Every accepted action appends exactly one timeline entry and updates the
//! status in the same step. Validation happens on a shared borrow before
//! anything is written, so a rejected action leaves the grievance untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{AccessDecision, AccessGate, AccessTarget, Capability, DenyReason};
use crate::error::ReasonCode;
use crate::escalation::{EscalationRouter, RedirectRequest, ResolvedRoute, RouteError};
use crate::model::{
    ActorKind, AdminResponse, Grievance, Owner, Principal, Role, Status, TimelineAction,
    TimelineEntry,
};

/// Discriminant of an [`Action`], used for logging, capabilities and
/// endpoint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Acknowledge,
    Resolve,
    Reject,
    Return,
    Redirect,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acknowledge => "acknowledge",
            Self::Resolve => "resolve",
            Self::Reject => "reject",
            Self::Return => "return",
            Self::Redirect => "redirect",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            Self::Acknowledge => Capability::Acknowledge,
            Self::Resolve => Capability::Resolve,
            Self::Reject => Capability::Reject,
            Self::Return => Capability::Return,
            Self::Redirect => Capability::Redirect,
        }
    }

    fn timeline_action(self) -> TimelineAction {
        match self {
            Self::Acknowledge => TimelineAction::UnderReview,
            Self::Resolve => TimelineAction::Resolved,
            Self::Reject => TimelineAction::Rejected,
            Self::Return => TimelineAction::Returned,
            Self::Redirect => TimelineAction::Redirected,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal transitions per action.
///
/// ```text
/// Acknowledge  NEW            → PENDING
/// Resolve      NEW | PENDING  → RESOLVED
/// Reject       NEW | PENDING  → REJECTED
/// Return       PENDING        → NEW
/// Redirect     NEW | PENDING  → (unchanged)
/// ```
fn next_status(action: ActionKind, from: Status) -> Option<Status> {
    use Status::*;

    match (action, from) {
        (ActionKind::Acknowledge, New) => Some(Pending),
        (ActionKind::Resolve, New | Pending) => Some(Resolved),
        (ActionKind::Reject, New | Pending) => Some(Rejected),
        (ActionKind::Return, Pending) => Some(New),
        (ActionKind::Redirect, New | Pending) => Some(from),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Acknowledge,
    Resolve,
    Reject,
    Return,
    Redirect(RedirectRequest),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Acknowledge => ActionKind::Acknowledge,
            Self::Resolve => ActionKind::Resolve,
            Self::Reject => ActionKind::Reject,
            Self::Return => ActionKind::Return,
            Self::Redirect(_) => ActionKind::Redirect,
        }
    }
}

/// An action plus the reviewer's note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    #[serde(default)]
    pub note: Option<String>,
}

impl ActionRequest {
    pub fn new(action: Action) -> Self {
        Self { action, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// The note, if it carries any text.
    pub fn note_text(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Grievance is already {status}; no further transition is accepted")]
    TerminalState { status: Status },

    #[error("Cannot {action} a grievance in {status}")]
    InvalidTransition { action: ActionKind, status: Status },

    #[error("Not authorized to {action} this grievance: {reason}")]
    Unauthorized { action: ActionKind, reason: DenyReason },

    #[error("Redirect target invalid: {0}")]
    RedirectTargetInvalid(RouteError),
}

impl TransitionError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::TerminalState { .. } => ReasonCode::TerminalState,
            Self::InvalidTransition { .. } => ReasonCode::InvalidTransition,
            Self::Unauthorized { reason, .. } => reason.code(),
            Self::RedirectTargetInvalid(err) => err.code(),
        }
    }

    /// Coarse failure family, reported alongside the specific code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TerminalState { .. } => ReasonCode::TerminalState.as_str(),
            Self::InvalidTransition { .. } => ReasonCode::InvalidTransition.as_str(),
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::RedirectTargetInvalid(_) => ReasonCode::RedirectTargetInvalid.as_str(),
        }
    }
}

impl From<RouteError> for TransitionError {
    fn from(err: RouteError) -> Self {
        Self::RedirectTargetInvalid(err)
    }
}

/// Audit record of one accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub issue_id: String,
    pub action: ActionKind,
    pub from: Status,
    pub to: Status,
    pub actor_id: String,
    /// Role through which the actor was authorized.
    pub via: Role,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<ResolvedRoute>,
}

/// A validated transition that has not been written yet.
#[derive(Debug, Clone)]
pub struct PlannedTransition {
    to: Status,
    entry: TimelineEntry,
    response: Option<AdminResponse>,
    record: TransitionRecord,
}

impl PlannedTransition {
    pub fn record(&self) -> &TransitionRecord {
        &self.record
    }
}

#[derive(Debug, Clone)]
pub struct GrievanceStateMachine {
    gate: AccessGate,
    router: EscalationRouter,
}

impl GrievanceStateMachine {
    pub fn new(router: EscalationRouter) -> Self {
        Self {
            gate: AccessGate::new(),
            router,
        }
    }

    pub fn router(&self) -> &EscalationRouter {
        &self.router
    }

    /// Validate `request` against the current state without writing.
    ///
    /// Order: terminal status, then authorization against the current
    /// owner, then the allowed-from set, then redirect routing.
    pub fn plan(
        &self,
        grievance: &Grievance,
        actor: &Principal,
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<PlannedTransition, TransitionError> {
        let action = request.action.kind();
        let from = grievance.status();
        if from.is_terminal() {
            return Err(TransitionError::TerminalState { status: from });
        }

        let target = AccessTarget::for_owner(&grievance.owner());
        let via = match self.gate.check(Some(actor), action.capability(), &target) {
            AccessDecision::Allow(role) => role,
            AccessDecision::Deny(reason) => {
                return Err(TransitionError::Unauthorized { action, reason });
            }
        };

        let to = next_status(action, from).ok_or(TransitionError::InvalidTransition {
            action,
            status: from,
        })?;

        let route = match &request.action {
            Action::Redirect(redirect) => Some(self.router.route(grievance, actor, redirect)?),
            _ => None,
        };

        let note = request
            .note_text()
            .map(str::to_string)
            .unwrap_or_else(|| default_note(action, route.as_ref().map(|r| &r.owner)));
        let mut entry = TimelineEntry::new(
            action.timeline_action(),
            actor.id.clone(),
            ActorKind::Admin,
            note,
        );
        entry.timestamp = grievance.next_timestamp(now);
        if let Some(route) = &route {
            entry.redirect_to = Some(route.owner.clone());
            entry.recategorized = route.recategorized;
        }

        let response = request.note_text().map(|text| AdminResponse {
            admin_id: actor.id.clone(),
            action: entry.action,
            text: text.to_string(),
            at: entry.timestamp,
        });

        let record = TransitionRecord {
            issue_id: grievance.id.clone(),
            action,
            from,
            to,
            actor_id: actor.id.clone(),
            via,
            at: entry.timestamp,
            route,
        };

        Ok(PlannedTransition {
            to,
            entry,
            response,
            record,
        })
    }

    /// Validate and commit in one step.
    pub fn apply(
        &self,
        grievance: &mut Grievance,
        actor: &Principal,
        request: &ActionRequest,
    ) -> Result<TransitionRecord, TransitionError> {
        let planned = self.plan(grievance, actor, request, Utc::now())?;
        Ok(Self::commit(grievance, planned))
    }

    /// Write a planned transition. The plan must come from [`Self::plan`]
    /// against this same grievance state.
    pub fn commit(grievance: &mut Grievance, planned: PlannedTransition) -> TransitionRecord {
        let PlannedTransition {
            to,
            entry,
            response,
            mut record,
        } = planned;
        grievance.commit(to, entry, response);
        if let Some(last) = grievance.timeline().last() {
            record.at = last.timestamp;
        }

        tracing::debug!(
            issue_id = %record.issue_id,
            action = %record.action,
            from = %record.from,
            to = %record.to,
            actor = %record.actor_id,
            "State transition"
        );
        record
    }
}

fn default_note(action: ActionKind, owner: Option<&Owner>) -> String {
    match (action, owner) {
        (ActionKind::Redirect, Some(owner)) => format!("Redirected to {owner}"),
        (ActionKind::Acknowledge, _) => "Review started".to_string(),
        (ActionKind::Resolve, _) => "Grievance resolved".to_string(),
        (ActionKind::Reject, _) => "Grievance rejected".to_string(),
        (ActionKind::Return, _) => "Returned for resubmission".to_string(),
        (ActionKind::Redirect, None) => "Redirected".to_string(),
    }
}
