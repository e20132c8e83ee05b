//! Campus catalogue: immutable reference data loaded once per process.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Short campus code, normalized to upper case (e.g. `DSEU-1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CampusCode(String);

impl CampusCode {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CampusCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for CampusCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CampusCode> for String {
    fn from(code: CampusCode) -> Self {
        code.0
    }
}

impl fmt::Display for CampusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campus {
    pub id: u32,
    pub code: CampusCode,
    pub name: String,
    #[serde(default)]
    pub is_main: bool,
}

impl Campus {
    pub fn new(id: u32, code: &str, name: &str, is_main: bool) -> Self {
        Self {
            id,
            code: CampusCode::new(code),
            name: name.to_string(),
            is_main,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampusCatalogue {
    campuses: Vec<Campus>,
}

impl CampusCatalogue {
    /// Build a catalogue, rejecting duplicate ids or codes.
    pub fn new(campuses: Vec<Campus>) -> Result<Self, String> {
        let mut ids = HashSet::new();
        let mut codes = HashSet::new();
        for campus in &campuses {
            if !ids.insert(campus.id) {
                return Err(format!("duplicate campus id {}", campus.id));
            }
            if !codes.insert(campus.code.clone()) {
                return Err(format!("duplicate campus code {}", campus.code));
            }
        }
        Ok(Self { campuses })
    }

    pub fn is_empty(&self) -> bool {
        self.campuses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.campuses.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Campus> {
        self.campuses.iter()
    }

    pub fn by_id(&self, id: u32) -> Option<&Campus> {
        self.campuses.iter().find(|c| c.id == id)
    }

    pub fn by_code(&self, code: &CampusCode) -> Option<&Campus> {
        self.campuses.iter().find(|c| &c.code == code)
    }

    pub fn contains(&self, code: &CampusCode) -> bool {
        self.by_code(code).is_some()
    }

    /// Resolve a free-form campus tag by code, display name or numeric id.
    pub fn resolve(&self, tag: &str) -> Option<&Campus> {
        let tag = tag.trim();
        if let Ok(id) = tag.parse::<u32>() {
            if let Some(campus) = self.by_id(id) {
                return Some(campus);
            }
        }
        let code = CampusCode::new(tag);
        self.by_code(&code).or_else(|| {
            self.campuses
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(tag))
        })
    }

    /// Canonical code for a tag; unknown tags keep their normalized form.
    pub fn code_for(&self, tag: &str) -> CampusCode {
        self.resolve(tag)
            .map(|c| c.code.clone())
            .unwrap_or_else(|| CampusCode::new(tag))
    }
}

impl Default for CampusCatalogue {
    fn default() -> Self {
        Self {
            campuses: vec![
                Campus::new(1011, "DSEU-1", "G.B Pant DSEU Okhala-1", true),
                Campus::new(1012, "DSEU-2", "DSEU Okhla-II Campus", false),
                Campus::new(1013, "DSEU-3", "DSEU Okhla-III Campus", false),
                Campus::new(1014, "DSEU-4", "DSEU Pusa Campus", false),
                Campus::new(1015, "DSEU-5", "DSEU Dwarka Campus", false),
                Campus::new(1016, "DSEU-6", "DSEU Rajokri Campus", false),
                Campus::new(1017, "DSEU-7", "DSEU Wazirpur-I Campus", false),
                Campus::new(1018, "DSEU-8", "DSEU Ashok Vihar Campus", false),
            ],
        }
    }
}
