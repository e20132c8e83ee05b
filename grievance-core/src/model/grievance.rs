//! Grievance entity, timeline entries and the derived owner.
//!
//! Status and timeline are private: they change only through
//! [`crate::lifecycle::GrievanceStateMachine`], which appends exactly one
//! entry per accepted action. The owner is never stored; it is derived from
//! the latest redirect entry so it cannot drift from the timeline.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::campus::CampusCode;
use super::role::{Department, Role, Scope};

/// Lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    New,
    Pending,
    Resolved,
    Rejected,
}

impl Status {
    /// RESOLVED and REJECTED accept no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing category; fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "ACADEMIC")]
    Academic,
    #[serde(rename = "NON-ACADEMIC")]
    NonAcademic,
    #[serde(rename = "EXAMINATION")]
    Examination,
}

impl Category {
    pub fn department(self) -> Department {
        match self {
            Self::Academic => Department::Academic,
            Self::NonAcademic => Department::NonAcademic,
            Self::Examination => Department::Examination,
        }
    }

    /// The category a department serves; the generic admin serves all.
    pub fn for_department(department: Department) -> Option<Category> {
        match department {
            Department::Academic => Some(Self::Academic),
            Department::NonAcademic => Some(Self::NonAcademic),
            Department::Examination => Some(Self::Examination),
            Department::Admin => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Academic => "ACADEMIC",
            Self::NonAcademic => "NON-ACADEMIC",
            Self::Examination => "EXAMINATION",
        }
    }

    pub fn parse(raw: &str) -> Option<Category> {
        match raw.trim().to_ascii_uppercase().replace(['_', ' '], "-").as_str() {
            "ACADEMIC" => Some(Self::Academic),
            "NON-ACADEMIC" | "NONACADEMIC" => Some(Self::NonAcademic),
            "EXAMINATION" => Some(Self::Examination),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineAction {
    Submitted,
    Acknowledged,
    UnderReview,
    InProgress,
    Update,
    Resolved,
    Rejected,
    Redirected,
    Returned,
}

impl TimelineAction {
    /// Lenient parse for history entries coming off the wire.
    pub fn parse(raw: &str) -> Option<TimelineAction> {
        match raw.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "SUBMITTED" => Some(Self::Submitted),
            "ACKNOWLEDGED" => Some(Self::Acknowledged),
            "UNDER_REVIEW" => Some(Self::UnderReview),
            "IN_PROGRESS" => Some(Self::InProgress),
            "UPDATE" => Some(Self::Update),
            "RESOLVED" => Some(Self::Resolved),
            "REJECTED" => Some(Self::Rejected),
            "REDIRECTED" => Some(Self::Redirected),
            "RETURNED" => Some(Self::Returned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Student,
    Admin,
    System,
}

/// The role/campus pair currently responsible for a grievance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub role: Role,
    /// Present only for campus-scoped roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus: Option<CampusCode>,
}

impl Owner {
    /// Campus is dropped for university and superadmin roles.
    pub fn new(role: Role, campus: Option<CampusCode>) -> Self {
        let campus = match role.scope() {
            Scope::Campus => campus,
            Scope::University | Scope::SuperAdmin => None,
        };
        Self { role, campus }
    }

    /// First responsible party: the category's department at the
    /// originating campus.
    pub fn initial(category: Category, origin: &CampusCode) -> Self {
        Self::new(Role::Campus(category.department()), Some(origin.clone()))
    }

    pub fn scope(&self) -> Scope {
        self.role.scope()
    }

    pub fn department(&self) -> Department {
        self.role.department()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.campus {
            Some(campus) => write!(f, "{} @ {}", self.role, campus),
            None => write!(f, "{}", self.role),
        }
    }
}

/// One immutable lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub action: TimelineAction,
    pub actor_id: String,
    pub actor_kind: ActorKind,
    pub note: String,
    /// New owner, set on `REDIRECTED` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<Owner>,
    /// Explicit superadmin recategorization carried by a redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recategorized: Option<Category>,
}

impl TimelineEntry {
    pub fn new(
        action: TimelineAction,
        actor_id: impl Into<String>,
        actor_kind: ActorKind,
        note: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            actor_id: actor_id.into(),
            actor_kind,
            note: note.into(),
            redirect_to: None,
            recategorized: None,
        }
    }
}

/// Reference to an uploaded file; the upload itself happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: u64,
    pub filename: String,
    pub path: String,
    pub uploaded_by: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub admin_id: String,
    pub action: TimelineAction,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GrievanceRecord")]
pub struct Grievance {
    /// Issue id, e.g. `ISSUE-1719323584454-4k2x9a`.
    pub id: String,
    /// Numeric record id assigned by the remote service, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<u64>,
    pub rollno: String,
    pub campus: CampusCode,
    pub subject: String,
    pub description: String,
    category: Category,
    status: Status,
    pub submitted_at: DateTime<Utc>,
    attachments: Vec<AttachmentRef>,
    timeline: Vec<TimelineEntry>,
    responses: Vec<AdminResponse>,
}

impl Grievance {
    /// A freshly filed grievance with its `SUBMITTED` entry.
    pub fn submitted(
        id: impl Into<String>,
        rollno: impl Into<String>,
        campus: CampusCode,
        subject: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        at: DateTime<Utc>,
    ) -> Self {
        let rollno = rollno.into();
        let mut entry = TimelineEntry::new(
            TimelineAction::Submitted,
            rollno.clone(),
            ActorKind::Student,
            "Grievance submitted",
        );
        entry.timestamp = at;
        Self {
            id: id.into(),
            record_id: None,
            rollno,
            campus,
            subject: subject.into(),
            description: description.into(),
            category,
            status: Status::New,
            submitted_at: at,
            attachments: Vec::new(),
            timeline: vec![entry],
            responses: Vec::new(),
        }
    }

    /// Rebuild a grievance from a remote snapshot.
    ///
    /// Timeline entries are sorted by timestamp so the append-only ordering
    /// invariant holds for whatever the server returned. A campus-scoped
    /// redirect that arrived without a campus stays at the campus that owned
    /// the grievance before it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: String,
        record_id: Option<u64>,
        rollno: String,
        campus: CampusCode,
        subject: String,
        description: String,
        category: Category,
        status: Status,
        submitted_at: DateTime<Utc>,
        attachments: Vec<AttachmentRef>,
        mut timeline: Vec<TimelineEntry>,
        responses: Vec<AdminResponse>,
    ) -> Self {
        timeline.sort_by_key(|e| e.timestamp);
        settle_redirect_campuses(&campus, &mut timeline);
        Self {
            id,
            record_id,
            rollno,
            campus,
            subject,
            description,
            category,
            status,
            submitted_at,
            attachments,
            timeline,
            responses,
        }
    }

    /// Category assigned at creation.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Category after any superadmin recategorization on the timeline.
    pub fn current_category(&self) -> Category {
        self.timeline
            .iter()
            .rev()
            .find_map(|e| e.recategorized)
            .unwrap_or(self.category)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn responses(&self) -> &[AdminResponse] {
        &self.responses
    }

    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    /// Current responsible party, derived from the latest redirect.
    pub fn owner(&self) -> Owner {
        self.timeline
            .iter()
            .rev()
            .find_map(|e| e.redirect_to.clone())
            .unwrap_or_else(|| Owner::initial(self.category, &self.campus))
    }

    /// Append an attachment reference. Attachments are never removed.
    pub fn attach(&mut self, attachment: AttachmentRef) {
        self.attachments.push(attachment);
    }

    /// Timestamp for the next entry: strictly after the last one.
    pub(crate) fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.timeline.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::milliseconds(1),
            _ => now,
        }
    }

    /// Commit a status change together with its entry.
    pub(crate) fn commit(
        &mut self,
        status: Status,
        mut entry: TimelineEntry,
        response: Option<AdminResponse>,
    ) {
        entry.timestamp = self.next_timestamp(entry.timestamp);
        if let Some(mut response) = response {
            response.at = entry.timestamp;
            self.responses.push(response);
        }
        self.timeline.push(entry);
        self.status = status;
    }
}

/// Fill the campus of campus-scoped redirect owners that lack one.
///
/// The fallback is the campus of the owner before the redirect, or the
/// originating campus once a university or superadmin role held it.
fn settle_redirect_campuses(origin: &CampusCode, timeline: &mut [TimelineEntry]) {
    let mut current: Option<CampusCode> = Some(origin.clone());
    for owner in timeline.iter_mut().filter_map(|e| e.redirect_to.as_mut()) {
        if owner.scope() == Scope::Campus && owner.campus.is_none() {
            owner.campus = Some(current.clone().unwrap_or_else(|| origin.clone()));
        }
        current = owner.campus.clone();
    }
}

/// Serialized shape of [`Grievance`]; deserializing goes through
/// [`Grievance::restore`].
#[derive(Deserialize)]
struct GrievanceRecord {
    id: String,
    #[serde(default)]
    record_id: Option<u64>,
    rollno: String,
    campus: CampusCode,
    subject: String,
    description: String,
    category: Category,
    status: Status,
    submitted_at: DateTime<Utc>,
    #[serde(default)]
    attachments: Vec<AttachmentRef>,
    timeline: Vec<TimelineEntry>,
    #[serde(default)]
    responses: Vec<AdminResponse>,
}

impl From<GrievanceRecord> for Grievance {
    fn from(r: GrievanceRecord) -> Self {
        Grievance::restore(
            r.id,
            r.record_id,
            r.rollno,
            r.campus,
            r.subject,
            r.description,
            r.category,
            r.status,
            r.submitted_at,
            r.attachments,
            r.timeline,
            r.responses,
        )
    }
}
