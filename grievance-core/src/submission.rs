//! Student submission: validation, category resolution and id generation.
//!
//! An explicit Academic, Non-Academic or Examination choice is used as-is.
//! `Optional` is resolved from the subject line by whole-word keyword
//! matching, examination keywords first, then academic, else non-academic.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{GrievanceError, GrievanceResult};
use crate::model::{Campus, CampusCatalogue, Category, Grievance};

const EXAMINATION_KEYWORDS: &[&str] = &[
    "exam",
    "examination",
    "revaluation",
    "result",
    "paper",
    "course",
    "admit card",
    "supplementary",
    "backlog",
    "retotaling",
    "rechecking",
    "marksheet",
    "hall ticket",
];

const ACADEMIC_KEYWORDS: &[&str] = &[
    "attendance",
    "syllabus",
    "marks",
    "assignment",
    "scholarship",
    "certificate",
    "fee",
    "class",
    "lecture",
    "professor",
    "teacher",
    "coursework",
    "grade",
    "result",
    "project",
    "lab",
    "internal",
    "midterm",
    "semester",
];

fn keyword_pattern(keywords: &[&str]) -> String {
    let alternatives: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
    format!(r"(?i)\b(?:{})\b", alternatives.join("|"))
}

static EXAMINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&keyword_pattern(EXAMINATION_KEYWORDS))
        .expect("EXAMINATION_RE regex should compile")
});
static ACADEMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&keyword_pattern(ACADEMIC_KEYWORDS)).expect("ACADEMIC_RE regex should compile")
});

/// Category as offered on the student form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionCategory {
    Academic,
    #[serde(rename = "Non-Academic")]
    NonAcademic,
    Examination,
    Optional,
}

impl SubmissionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "Academic",
            Self::NonAcademic => "Non-Academic",
            Self::Examination => "Examination",
            Self::Optional => "Optional",
        }
    }

    pub fn parse(raw: &str) -> Option<SubmissionCategory> {
        match raw.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "academic" => Some(Self::Academic),
            "non-academic" | "nonacademic" => Some(Self::NonAcademic),
            "examination" | "exam" => Some(Self::Examination),
            "optional" => Some(Self::Optional),
            _ => None,
        }
    }

    /// Routing category for a submission with this choice and subject.
    pub fn resolve(self, subject: &str) -> Category {
        match self {
            Self::Academic => Category::Academic,
            Self::NonAcademic => Category::NonAcademic,
            Self::Examination => Category::Examination,
            Self::Optional => classify_subject(subject),
        }
    }
}

impl fmt::Display for SubmissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword classification of a free-text subject.
pub fn classify_subject(subject: &str) -> Category {
    if EXAMINATION_RE.is_match(subject) {
        Category::Examination
    } else if ACADEMIC_RE.is_match(subject) {
        Category::Academic
    } else {
        Category::NonAcademic
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDraft {
    pub rollno: String,
    /// Campus code, display name or numeric id.
    pub campus: String,
    pub subject: String,
    pub description: String,
    pub category: SubmissionCategory,
    #[serde(default)]
    pub attachment: bool,
}

/// A draft that passed validation, with its category resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedSubmission {
    pub rollno: String,
    pub campus: Campus,
    pub subject: String,
    pub description: String,
    pub chosen: SubmissionCategory,
    pub category: Category,
    pub attachment: bool,
}

/// Body of `POST /grievances`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionBody {
    pub campus: String,
    pub subject: String,
    pub description: String,
    pub issue_type: String,
    pub attachment: bool,
}

impl SubmissionDraft {
    /// Validate before any network call.
    pub fn prepare(
        &self,
        catalogue: &CampusCatalogue,
        config: &EngineConfig,
    ) -> GrievanceResult<PreparedSubmission> {
        let rollno = self.rollno.trim();
        let subject = self.subject.trim();
        let description = self.description.trim();
        if rollno.is_empty() {
            return Err(GrievanceError::validation("roll number is required"));
        }
        if subject.is_empty() {
            return Err(GrievanceError::validation("subject is required"));
        }
        if description.is_empty() {
            return Err(GrievanceError::validation("description is required"));
        }
        if subject.chars().count() > config.subject_max_len {
            return Err(GrievanceError::validation(format!(
                "subject exceeds {} characters",
                config.subject_max_len
            )));
        }
        if description.chars().count() > config.description_max_len {
            return Err(GrievanceError::validation(format!(
                "description exceeds {} characters",
                config.description_max_len
            )));
        }
        let campus = catalogue.resolve(&self.campus).cloned().ok_or_else(|| {
            GrievanceError::validation(format!("unknown campus '{}'", self.campus))
        })?;

        let category = self.category.resolve(subject);
        debug!(
            chosen = %self.category,
            resolved = %category,
            "Submission category resolved"
        );
        Ok(PreparedSubmission {
            rollno: rollno.to_string(),
            campus,
            subject: subject.to_string(),
            description: description.to_string(),
            chosen: self.category,
            category,
            attachment: self.attachment,
        })
    }
}

impl PreparedSubmission {
    /// The server identifies campuses by display name on submission.
    pub fn body(&self) -> SubmissionBody {
        SubmissionBody {
            campus: self.campus.name.clone(),
            subject: self.subject.clone(),
            description: self.description.clone(),
            issue_type: self.category.as_str().to_string(),
            attachment: self.attachment,
        }
    }

    /// Local record of the submission with a freshly generated id.
    pub fn into_grievance(self, at: DateTime<Utc>) -> Grievance {
        Grievance::submitted(
            generate_issue_id(at),
            self.rollno,
            self.campus.code,
            self.subject,
            self.description,
            self.category,
            at,
        )
    }
}

/// `ISSUE-<unix-millis>-<6 base36 chars>`.
pub fn generate_issue_id(at: DateTime<Utc>) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut entropy = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(6);
    for _ in 0..6 {
        suffix.push(ALPHABET[(entropy % 36) as usize] as char);
        entropy /= 36;
    }
    format!("ISSUE-{}-{}", at.timestamp_millis(), suffix)
}

/// Subjects offered for one form category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectGroup {
    pub issue_type: SubmissionCategory,
    pub subjects: Vec<&'static str>,
}

/// Subject choices per form category, each list sorted alphabetically.
/// `Optional` takes a free-text subject.
pub fn subject_catalogue() -> Vec<SubjectGroup> {
    let groups = [
        (
            SubmissionCategory::Academic,
            vec![
                "Attendance of students",
                "Revaluation practices",
                "Admit card related issue",
                "Course selection issue",
                "Back Paper result issue",
                "Change of Course/Program (incorrect name)",
                "Labs related issues",
                "Delay in conduct of examination or declaration of results",
                "Request for Bonafide Certificate for Opening Bank Account,etc",
                "Permission for Registration with Pending Dues",
                "Request to provide provisional Degree Certificate within 30 days (After Completion of the Course)",
                "Request for Transcripts, Grade Card and Degree",
                "Discrepancy in Certificates/Correction in Certificates",
                "Withdrawal of admission (NEP)",
                "Personal details issue",
                "Library related issues",
                "Delay in PhD thesis evaluation",
                "PhD Scholarship/Fellowship Issues",
                "NOC application",
            ],
        ),
        (
            SubmissionCategory::NonAcademic,
            vec![
                "Bus Pass",
                "Id Card Reissue",
                "Issue with information in University Brochure",
                "Issue with information in University Website",
                "Refund of Security Fee of Academic/Hostel",
                "Hostel Req.",
                "Scholarship",
                "Fee/Late payment issues/Fine",
                "Reservation Policy in Admission",
                "Non-payment or delay in payment of scholarship to any student",
                "Harassment and victimization of students including sexual harassment",
                "Ragging",
                "Issues related to Hygiene/Maintenance/cleanliness",
                "Student welfare and sports & cultural events related",
            ],
        ),
        (SubmissionCategory::Optional, Vec::new()),
    ];
    groups
        .into_iter()
        .map(|(issue_type, mut subjects)| {
            subjects.sort_by_key(|s| s.to_lowercase());
            SubjectGroup {
                issue_type,
                subjects,
            }
        })
        .collect()
}
