//! Admin principal: the actor behind every gate check and transition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use super::campus::{CampusCatalogue, CampusCode};
use super::role::{Role, Scope};
use crate::error::{GrievanceError, GrievanceResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PrincipalRecord")]
pub struct Principal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    roles: BTreeSet<Role>,
    /// Required when any role is campus-scoped.
    #[serde(default)]
    campus: Option<CampusCode>,
}

impl Principal {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        campus: Option<CampusCode>,
    ) -> GrievanceResult<Self> {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        if roles.iter().any(|r| r.scope() == Scope::Campus) && campus.is_none() {
            return Err(GrievanceError::validation(
                "campus-scoped role requires a campus affiliation",
            ));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone: None,
            roles,
            campus,
        })
    }

    /// Build a principal from the admin profile returned by the API.
    ///
    /// Unrecognized role tags are dropped; they never widen access.
    pub fn from_admin_info(info: &AdminInfo, catalogue: &CampusCatalogue) -> GrievanceResult<Self> {
        if info.role.is_empty() {
            return Err(GrievanceError::validation("admin profile carries no roles"));
        }
        let mut roles = Vec::with_capacity(info.role.len());
        for raw in &info.role {
            match Role::parse(raw) {
                Some(role) => roles.push(role),
                None => warn!(admin_id = info.admin_id, role = %raw, "Ignoring unrecognized role tag"),
            }
        }
        let campus = info
            .campus_id
            .map(|id| {
                catalogue
                    .by_id(id)
                    .map(|c| c.code.clone())
                    .ok_or_else(|| GrievanceError::validation(format!("unknown campus id {id}")))
            })
            .transpose()?;
        let mut principal = Self::new(info.admin_id.to_string(), info.name.clone(), roles, campus)?;
        principal.email = Some(info.email.clone()).filter(|e| !e.is_empty());
        principal.phone = Some(info.phone.clone()).filter(|p| !p.is_empty());
        Ok(principal)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    pub fn campus(&self) -> Option<&CampusCode> {
        self.campus.as_ref()
    }

    pub fn is_superadmin(&self) -> bool {
        self.roles.contains(&Role::SuperAdmin)
    }

    /// Most senior scope across all held roles.
    pub fn max_scope(&self) -> Option<Scope> {
        self.roles.iter().map(|r| r.scope()).max()
    }

    /// Role used to address the API: the most senior held role.
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.iter().copied().max_by_key(|r| r.scope())
    }

    /// Held roles, most senior scope first.
    pub fn roles_by_seniority(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles().collect();
        roles.sort_by(|a, b| b.scope().cmp(&a.scope()));
        roles
    }
}

#[derive(Deserialize)]
struct PrincipalRecord {
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    roles: Vec<Role>,
    #[serde(default)]
    campus: Option<CampusCode>,
}

impl TryFrom<PrincipalRecord> for Principal {
    type Error = GrievanceError;

    fn try_from(r: PrincipalRecord) -> GrievanceResult<Self> {
        let mut principal = Self::new(r.id, r.name, r.roles, r.campus)?;
        principal.email = r.email;
        principal.phone = r.phone;
        Ok(principal)
    }
}

/// Admin profile as served by `GET /super-admin/admins`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminInfo {
    #[serde(rename = "AdminId")]
    pub admin_id: u64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub isverified: bool,
    #[serde(rename = "IsActive", default)]
    pub is_active: bool,
    #[serde(default)]
    pub role: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "campusId", default)]
    pub campus_id: Option<u32>,
}
