//! Access Gate: pure allow/deny decisions for (principal, capability, target).
//!
//! A role matches when its department covers the target department (the
//! generic `admin` department covers all) and its scope is equal to or
//! senior to the target scope. Campus-scoped roles additionally need the
//! principal's campus to equal the target campus when one is given.
//! `superadmin` satisfies everything.
//!
//! Denial is a normal outcome, not an error: the gate never fails for a
//! well-formed input. It runs before any network call so unauthorized
//! requests are never issued.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::error::{GrievanceError, GrievanceResult, ReasonCode};
use crate::model::{CampusCode, Department, Owner, Principal, Role, Scope};

/// What the principal wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewList,
    ViewDetail,
    Acknowledge,
    Resolve,
    Reject,
    Return,
    Redirect,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ViewList => "view-list",
            Self::ViewDetail => "view-detail",
            Self::Acknowledge => "act-acknowledge",
            Self::Resolve => "act-resolve",
            Self::Reject => "act-reject",
            Self::Return => "act-return",
            Self::Redirect => "act-redirect",
        };
        f.write_str(s)
    }
}

/// The department/scope (and optionally campus) a capability is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessTarget {
    pub department: Department,
    pub scope: Scope,
    #[serde(default)]
    pub campus: Option<CampusCode>,
}

impl AccessTarget {
    pub fn new(department: Department, scope: Scope) -> Self {
        Self {
            department,
            scope,
            campus: None,
        }
    }

    pub fn at_campus(mut self, campus: CampusCode) -> Self {
        self.campus = Some(campus);
        self
    }

    /// Target for per-grievance capabilities: the current owner.
    pub fn for_owner(owner: &Owner) -> Self {
        Self {
            department: owner.department(),
            scope: owner.scope(),
            campus: owner.campus.clone(),
        }
    }
}

impl fmt::Display for AccessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.scope, self.department)?;
        if let Some(campus) = &self.campus {
            write!(f, " @ {campus}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("no held role covers the requested department")]
    RoleMismatch,
    #[error("held roles do not reach the requested scope or campus")]
    ScopeMismatch,
}

impl DenyReason {
    pub fn code(self) -> ReasonCode {
        match self {
            Self::NotAuthenticated => ReasonCode::NotAuthenticated,
            Self::RoleMismatch => ReasonCode::RoleMismatch,
            Self::ScopeMismatch => ReasonCode::ScopeMismatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Granted through the given role.
    Allow(Role),
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn into_result(self) -> GrievanceResult<Role> {
        match self {
            Self::Allow(role) => Ok(role),
            Self::Deny(reason) => Err(GrievanceError::Authorization(reason)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn new() -> Self {
        Self
    }

    pub fn check(
        &self,
        principal: Option<&Principal>,
        capability: Capability,
        target: &AccessTarget,
    ) -> AccessDecision {
        let decision = Self::decide(principal, target);
        match decision {
            AccessDecision::Allow(role) => debug!(
                principal = principal.map(|p| p.id.as_str()).unwrap_or("-"),
                %capability,
                %target,
                via = %role,
                "Access granted"
            ),
            AccessDecision::Deny(reason) => debug!(
                principal = principal.map(|p| p.id.as_str()).unwrap_or("-"),
                %capability,
                %target,
                reason = %reason.code(),
                "Access denied"
            ),
        }
        decision
    }

    /// Shorthand returning `Err(Authorization)` on deny.
    pub fn require(
        &self,
        principal: Option<&Principal>,
        capability: Capability,
        target: &AccessTarget,
    ) -> GrievanceResult<Role> {
        self.check(principal, capability, target).into_result()
    }

    fn decide(principal: Option<&Principal>, target: &AccessTarget) -> AccessDecision {
        let Some(principal) = principal else {
            return AccessDecision::Deny(DenyReason::NotAuthenticated);
        };
        if !principal.has_roles() {
            return AccessDecision::Deny(DenyReason::RoleMismatch);
        }

        let mut department_matched = false;
        for role in principal.roles() {
            if role.is_superadmin() {
                return AccessDecision::Allow(role);
            }
            if !role.department().covers(target.department) {
                continue;
            }
            department_matched = true;
            if !role.scope().covers(target.scope) {
                continue;
            }
            if role.scope() == Scope::Campus {
                if let Some(campus) = &target.campus {
                    if principal.campus() != Some(campus) {
                        continue;
                    }
                }
            }
            return AccessDecision::Allow(role);
        }

        if department_matched {
            AccessDecision::Deny(DenyReason::ScopeMismatch)
        } else {
            AccessDecision::Deny(DenyReason::RoleMismatch)
        }
    }
}
