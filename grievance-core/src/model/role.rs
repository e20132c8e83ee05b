//! Role vocabulary: scope × department, parsed once at the boundary.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Organizational level of a role.
///
/// Declaration order is seniority order: `Campus < University < SuperAdmin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Campus,
    University,
    #[serde(rename = "superadmin")]
    SuperAdmin,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campus => "campus",
            Self::University => "university",
            Self::SuperAdmin => "superadmin",
        }
    }

    /// Whether `self` is equal to or senior to `other`.
    pub fn covers(self, other: Scope) -> bool {
        self >= other
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional area of a role. `Admin` is the generic department that
/// matches any other department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    Academic,
    Examination,
    NonAcademic,
    Admin,
}

impl Department {
    pub const ALL: [Department; 4] = [
        Department::Academic,
        Department::Examination,
        Department::NonAcademic,
        Department::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Examination => "examination",
            Self::NonAcademic => "non-academic",
            Self::Admin => "admin",
        }
    }

    /// Whether a role in `self` may act on work belonging to `requested`.
    pub fn covers(self, requested: Department) -> bool {
        self == Department::Admin || self == requested
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "academic" => Some(Self::Academic),
            "examination" => Some(Self::Examination),
            "non-academic" => Some(Self::NonAcademic),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role tag from the fixed vocabulary.
///
/// Superadmin carries no department: it is global and generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Campus(Department),
    University(Department),
    SuperAdmin,
}

impl Role {
    /// Every role in the vocabulary.
    pub fn all() -> Vec<Role> {
        let mut roles = Vec::with_capacity(9);
        roles.extend(Department::ALL.iter().map(|d| Role::Campus(*d)));
        roles.extend(Department::ALL.iter().map(|d| Role::University(*d)));
        roles.push(Role::SuperAdmin);
        roles
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::Campus(_) => Scope::Campus,
            Self::University(_) => Scope::University,
            Self::SuperAdmin => Scope::SuperAdmin,
        }
    }

    pub fn department(self) -> Department {
        match self {
            Self::Campus(d) | Self::University(d) => d,
            Self::SuperAdmin => Department::Admin,
        }
    }

    pub fn with_scope(scope: Scope, department: Department) -> Role {
        match scope {
            Scope::Campus => Role::Campus(department),
            Scope::University => Role::University(department),
            Scope::SuperAdmin => Role::SuperAdmin,
        }
    }

    pub fn is_superadmin(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }

    /// Parse a role tag as it appears on the wire.
    ///
    /// Case-insensitive; ` `, `-` and `_` are accepted as separators between
    /// scope and department. Unknown tags yield `None` and never match.
    pub fn parse(raw: &str) -> Option<Role> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        if matches!(normalized.as_str(), "superadmin" | "super-admin") {
            return Some(Role::SuperAdmin);
        }
        let (scope, department) = normalized.split_once('-')?;
        let department = Department::parse(department)?;
        match scope {
            "campus" => Some(Role::Campus(department)),
            "university" => Some(Role::University(department)),
            _ => None,
        }
    }

    /// Canonical tag, e.g. `campus academic`, `superadmin`.
    pub fn tag(self) -> String {
        match self {
            Self::SuperAdmin => "superadmin".to_string(),
            other => format!("{} {}", other.scope(), other.department()),
        }
    }

    /// URL prefix of this role's API surface, e.g. `campus-non-academic`.
    pub fn api_segment(self) -> String {
        match self {
            Self::SuperAdmin => "super-admin".to_string(),
            other => format!("{}-{}", other.scope(), other.department()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unrecognized role '{s}'"))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Role::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unrecognized role '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_seniority() {
        assert!(Scope::Campus < Scope::University);
        assert!(Scope::University < Scope::SuperAdmin);
        assert!(Scope::SuperAdmin.covers(Scope::Campus));
        assert!(!Scope::Campus.covers(Scope::University));
    }

    #[test]
    fn test_parse_observed_tags() {
        assert_eq!(Role::parse("campus academic"), Some(Role::Campus(Department::Academic)));
        assert_eq!(
            Role::parse("university examination"),
            Some(Role::University(Department::Examination))
        );
        assert_eq!(
            Role::parse("campus non-academic"),
            Some(Role::Campus(Department::NonAcademic))
        );
        assert_eq!(Role::parse("campus admin"), Some(Role::Campus(Department::Admin)));
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("SuperAdmin"), Some(Role::SuperAdmin));
    }

    #[test]
    fn test_parse_is_case_and_separator_insensitive() {
        assert_eq!(
            Role::parse("  Campus_Non_Academic "),
            Some(Role::Campus(Department::NonAcademic))
        );
        assert_eq!(
            Role::parse("UNIVERSITY-ACADEMIC"),
            Some(Role::University(Department::Academic))
        );
    }

    #[test]
    fn test_parse_fails_closed() {
        for raw in ["", "admin", "campus", "campus exam", "academic_admin", "dean", "campus *"] {
            assert_eq!(Role::parse(raw), None, "{raw:?} must not parse");
        }
    }

    #[test]
    fn test_tag_round_trips_for_vocabulary() {
        for role in Role::all() {
            assert_eq!(Role::parse(&role.tag()), Some(role));
        }
        assert_eq!(Role::all().len(), 9);
    }

    #[test]
    fn test_api_segment() {
        assert_eq!(Role::Campus(Department::NonAcademic).api_segment(), "campus-non-academic");
        assert_eq!(Role::University(Department::Admin).api_segment(), "university-admin");
        assert_eq!(Role::SuperAdmin.api_segment(), "super-admin");
    }

    #[test]
    fn test_department_covers() {
        assert!(Department::Admin.covers(Department::Examination));
        assert!(Department::Academic.covers(Department::Academic));
        assert!(!Department::Examination.covers(Department::Academic));
        assert_eq!(Role::SuperAdmin.department(), Department::Admin);
    }

    #[test]
    fn test_serde_uses_tag() {
        let json = serde_json::to_string(&Role::University(Department::NonAcademic)).unwrap();
        assert_eq!(json, "\"university non-academic\"");
        let parsed: Role = serde_json::from_str("\"campus examination\"").unwrap();
        assert_eq!(parsed, Role::Campus(Department::Examination));
        assert!(serde_json::from_str::<Role>("\"campus registrar\"").is_err());
    }
}
