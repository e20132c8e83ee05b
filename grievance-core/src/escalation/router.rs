//! Redirect target resolution and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ReasonCode;
use crate::model::{
    CampusCatalogue, CampusCode, Category, Department, Grievance, Owner, Principal, Role, Scope,
};

/// Where a redirect should send the grievance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedirectTarget {
    /// A specific role, and for campus-scoped roles a campus. A missing
    /// campus keeps the grievance at its current campus.
    Explicit {
        role: Role,
        #[serde(default)]
        campus: Option<CampusCode>,
    },
    /// One step up the ladder from the current owner.
    Escalate,
}

impl RedirectTarget {
    /// Parse wire tags; an unknown role is an invalid target.
    pub fn from_tags(role: &str, campus: Option<&str>) -> Result<Self, RouteError> {
        let parsed = Role::parse(role).ok_or_else(|| RouteError::InvalidTarget {
            message: format!("'{role}' is not a recognized role"),
        })?;
        Ok(Self::Explicit {
            role: parsed,
            campus: campus.map(CampusCode::new),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRequest {
    pub target: RedirectTarget,
    /// Explicit recategorization; honoured for superadmin actors only.
    #[serde(default)]
    pub recategorize: Option<Category>,
}

impl RedirectRequest {
    pub fn to(role: Role, campus: Option<CampusCode>) -> Self {
        Self {
            target: RedirectTarget::Explicit { role, campus },
            recategorize: None,
        }
    }

    pub fn escalate() -> Self {
        Self {
            target: RedirectTarget::Escalate,
            recategorize: None,
        }
    }

    pub fn recategorize(mut self, category: Category) -> Self {
        self.recategorize = Some(category);
        self
    }
}

/// A validated redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoute {
    pub from: Owner,
    pub owner: Owner,
    /// Set only when the category actually changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recategorized: Option<Category>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("{target} cannot take a {category} grievance")]
    CategoryMismatch { category: Category, target: Role },

    #[error("Invalid redirect target: {message}")]
    InvalidTarget { message: String },

    #[error("Grievance is already owned by {owner}")]
    NoOpRedirect { owner: Owner },

    #[error("Moving from {from} to {to} requires a university or superadmin role")]
    InsufficientSeniority { from: CampusCode, to: CampusCode },
}

impl RouteError {
    pub fn code(&self) -> ReasonCode {
        match self {
            Self::CategoryMismatch { .. } => ReasonCode::CategoryMismatch,
            Self::InvalidTarget { .. } => ReasonCode::InvalidTarget,
            Self::NoOpRedirect { .. } => ReasonCode::NoOpRedirect,
            Self::InsufficientSeniority { .. } => ReasonCode::InsufficientSeniority,
        }
    }
}

/// Resolves redirects against the campus catalogue.
#[derive(Debug, Clone)]
pub struct EscalationRouter {
    catalogue: CampusCatalogue,
}

impl EscalationRouter {
    pub fn new(catalogue: CampusCatalogue) -> Self {
        Self { catalogue }
    }

    pub fn catalogue(&self) -> &CampusCatalogue {
        &self.catalogue
    }

    /// Compute the next owner for `grievance`.
    ///
    /// Checks, in order: the target exists, the category allows it, the
    /// owner actually changes, and the actor is senior enough for a
    /// cross-campus move.
    pub fn route(
        &self,
        grievance: &Grievance,
        actor: &Principal,
        request: &RedirectRequest,
    ) -> Result<ResolvedRoute, RouteError> {
        let current = grievance.owner();
        let home = current.campus.clone().unwrap_or_else(|| grievance.campus.clone());
        let owner = self.resolve_target(&current, &home, &request.target)?;

        let current_category = grievance.current_category();
        let recategorized = request.recategorize.filter(|c| *c != current_category);
        if let Some(category) = recategorized {
            if !actor.is_superadmin() {
                return Err(RouteError::CategoryMismatch {
                    category,
                    target: owner.role,
                });
            }
        }
        let category = recategorized.unwrap_or(current_category);
        if !Self::accepts(owner.role, category) {
            return Err(RouteError::CategoryMismatch {
                category,
                target: owner.role,
            });
        }

        if owner == current && recategorized.is_none() {
            return Err(RouteError::NoOpRedirect { owner });
        }

        if let Some(to) = &owner.campus {
            if *to != home && !Self::senior_across_campuses(actor, category) {
                return Err(RouteError::InsufficientSeniority {
                    from: home,
                    to: to.clone(),
                });
            }
        }

        debug!(
            issue_id = %grievance.id,
            from = %current,
            to = %owner,
            recategorized = ?recategorized,
            "Redirect routed"
        );
        Ok(ResolvedRoute {
            from: current,
            owner,
            recategorized,
        })
    }

    fn resolve_target(
        &self,
        current: &Owner,
        home: &CampusCode,
        target: &RedirectTarget,
    ) -> Result<Owner, RouteError> {
        match target {
            RedirectTarget::Explicit { role, campus } => {
                if let Some(campus) = campus {
                    self.require_campus(campus)?;
                }
                let campus = match role.scope() {
                    Scope::Campus => {
                        let campus = campus.clone().unwrap_or_else(|| home.clone());
                        self.require_campus(&campus)?;
                        Some(campus)
                    }
                    Scope::University | Scope::SuperAdmin => None,
                };
                Ok(Owner::new(*role, campus))
            }
            RedirectTarget::Escalate => match current.role {
                Role::Campus(Department::Admin) | Role::University(_) => {
                    Ok(Owner::new(Role::SuperAdmin, None))
                }
                Role::Campus(department) => Ok(Owner::new(Role::University(department), None)),
                Role::SuperAdmin => Err(RouteError::InvalidTarget {
                    message: "already owned by superadmin; nothing to escalate to".to_string(),
                }),
            },
        }
    }

    fn require_campus(&self, campus: &CampusCode) -> Result<(), RouteError> {
        if self.catalogue.contains(campus) {
            Ok(())
        } else {
            Err(RouteError::InvalidTarget {
                message: format!("campus {campus} is not in the catalogue"),
            })
        }
    }

    /// A lateral move between campuses needs one held role above both: the
    /// superadmin, or a university role whose department covers the category.
    fn senior_across_campuses(actor: &Principal, category: Category) -> bool {
        actor.roles().any(|role| {
            role.is_superadmin()
                || (role.scope() == Scope::University
                    && role.department().covers(category.department()))
        })
    }

    /// Department-specific roles only take their own category.
    fn accepts(role: Role, category: Category) -> bool {
        let department = role.department();
        department == Department::Admin || department == category.department()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActorKind, TimelineAction, TimelineEntry};
    use chrono::Utc;

    fn grievance(category: Category) -> Grievance {
        Grievance::submitted(
            "ISSUE-1-aaaaaa",
            "41522063",
            CampusCode::new("DSEU-1"),
            "subject",
            "description",
            category,
            Utc::now(),
        )
    }

    fn actor(role: Role, campus: Option<&str>) -> Principal {
        Principal::new("9", "Actor", [role], campus.map(CampusCode::new)).unwrap()
    }

    fn router() -> EscalationRouter {
        EscalationRouter::new(CampusCatalogue::default())
    }

    #[test]
    fn test_escalate_campus_department_to_university() {
        let g = grievance(Category::Examination);
        let route = router()
            .route(
                &g,
                &actor(Role::Campus(Department::Examination), Some("DSEU-1")),
                &RedirectRequest::escalate(),
            )
            .unwrap();
        assert_eq!(route.owner, Owner::new(Role::University(Department::Examination), None));
        assert_eq!(route.from.campus, Some(CampusCode::new("DSEU-1")));
    }

    #[test]
    fn test_escalate_from_superadmin_is_invalid() {
        let mut g = grievance(Category::Academic);
        let mut entry = TimelineEntry::new(TimelineAction::Redirected, "9", ActorKind::Admin, "");
        entry.redirect_to = Some(Owner::new(Role::SuperAdmin, None));
        g.commit(g.status(), entry, None);

        let err = router()
            .route(&g, &actor(Role::SuperAdmin, None), &RedirectRequest::escalate())
            .unwrap_err();
        assert_eq!(err.code(), ReasonCode::InvalidTarget);
    }

    #[test]
    fn test_examination_to_non_academic_is_category_mismatch() {
        let g = grievance(Category::Examination);
        for role in [
            Role::Campus(Department::NonAcademic),
            Role::University(Department::NonAcademic),
        ] {
            let err = router()
                .route(
                    &g,
                    &actor(Role::University(Department::Admin), None),
                    &RedirectRequest::to(role, None),
                )
                .unwrap_err();
            assert_eq!(err.code(), ReasonCode::CategoryMismatch);
        }
    }

    #[test]
    fn test_superadmin_can_recategorize_explicitly() {
        let g = grievance(Category::Examination);
        let sa = actor(Role::SuperAdmin, None);
        let target = RedirectRequest::to(Role::Campus(Department::NonAcademic), None);

        let err = router().route(&g, &sa, &target).unwrap_err();
        assert_eq!(err.code(), ReasonCode::CategoryMismatch);

        let route = router()
            .route(&g, &sa, &target.recategorize(Category::NonAcademic))
            .unwrap();
        assert_eq!(route.recategorized, Some(Category::NonAcademic));
        assert_eq!(route.owner.campus, Some(CampusCode::new("DSEU-1")));
    }

    #[test]
    fn test_non_superadmin_recategorize_rejected() {
        let g = grievance(Category::Academic);
        let err = router()
            .route(
                &g,
                &actor(Role::University(Department::Admin), None),
                &RedirectRequest::to(Role::SuperAdmin, None).recategorize(Category::Examination),
            )
            .unwrap_err();
        assert_eq!(err.code(), ReasonCode::CategoryMismatch);
    }

    #[test]
    fn test_redirect_to_current_owner_is_no_op() {
        let g = grievance(Category::Academic);
        let err = router()
            .route(
                &g,
                &actor(Role::Campus(Department::Academic), Some("DSEU-1")),
                &RedirectRequest::to(Role::Campus(Department::Academic), Some(CampusCode::new("DSEU-1"))),
            )
            .unwrap_err();
        assert!(matches!(err, RouteError::NoOpRedirect { .. }));
    }

    #[test]
    fn test_unknown_campus_is_invalid_target() {
        let g = grievance(Category::Academic);
        let err = router()
            .route(
                &g,
                &actor(Role::SuperAdmin, None),
                &RedirectRequest::to(Role::Campus(Department::Academic), Some(CampusCode::new("MARS-1"))),
            )
            .unwrap_err();
        assert_eq!(err.code(), ReasonCode::InvalidTarget);
    }

    #[test]
    fn test_unknown_role_tag_is_invalid_target() {
        let err = RedirectTarget::from_tags("campus registrar", Some("DSEU-2")).unwrap_err();
        assert_eq!(err.code(), ReasonCode::InvalidTarget);
        assert!(RedirectTarget::from_tags("Campus Academic", Some("dseu-2")).is_ok());
    }

    #[test]
    fn test_cross_campus_needs_seniority() {
        let g = grievance(Category::Academic);
        let request =
            RedirectRequest::to(Role::Campus(Department::Academic), Some(CampusCode::new("DSEU-2")));

        let err = router()
            .route(&g, &actor(Role::Campus(Department::Academic), Some("DSEU-1")), &request)
            .unwrap_err();
        assert_eq!(err.code(), ReasonCode::InsufficientSeniority);

        let route = router()
            .route(&g, &actor(Role::University(Department::Academic), None), &request)
            .unwrap();
        assert_eq!(
            route.owner,
            Owner::new(Role::Campus(Department::Academic), Some(CampusCode::new("DSEU-2")))
        );
    }

    #[test]
    fn test_cross_campus_seniority_is_per_role() {
        let g = grievance(Category::Academic);
        let request =
            RedirectRequest::to(Role::Campus(Department::Academic), Some(CampusCode::new("DSEU-2")));
        let mixed = Principal::new(
            "9",
            "Actor",
            [Role::Campus(Department::Academic), Role::University(Department::Examination)],
            Some(CampusCode::new("DSEU-1")),
        )
        .unwrap();

        let err = router().route(&g, &mixed, &request).unwrap_err();
        assert_eq!(err.code(), ReasonCode::InsufficientSeniority);

        let university_admin = actor(Role::University(Department::Admin), None);
        assert!(router().route(&g, &university_admin, &request).is_ok());
        let superadmin = actor(Role::SuperAdmin, None);
        assert!(router().route(&g, &superadmin, &request).is_ok());
    }

    #[test]
    fn test_same_campus_lateral_to_admin_allowed() {
        let g = grievance(Category::NonAcademic);
        let route = router()
            .route(
                &g,
                &actor(Role::Campus(Department::NonAcademic), Some("DSEU-1")),
                &RedirectRequest::to(Role::Campus(Department::Admin), None),
            )
            .unwrap();
        assert_eq!(route.owner.campus, Some(CampusCode::new("DSEU-1")));
        assert_eq!(route.owner.role, Role::Campus(Department::Admin));
    }
}
