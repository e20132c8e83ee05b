//! Wire DTOs for the grievance HTTP API.
//!
//! Field names follow the server exactly, including the `issuse_*`
//! spellings. Conversion into the domain model happens here and nowhere
//! else, so the rest of the crate never sees wire strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GrievanceError, GrievanceResult};
use crate::escalation::ResolvedRoute;
use crate::lifecycle::{Action, ActionRequest};
use crate::model::{
    ActorKind, AdminResponse, AttachmentRef, CampusCatalogue, CampusCode, Category, Grievance,
    Owner, Role, Status, TimelineAction, TimelineEntry,
};

/// `{ success, data, total?, message }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default)]
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            total: None,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            total: None,
            message: message.into(),
        }
    }

    /// `success: false` is an authoritative server rejection.
    pub fn into_data(self) -> GrievanceResult<T> {
        if !self.success {
            return Err(GrievanceError::server_rejected(None, self.message));
        }
        self.data.ok_or_else(|| {
            GrievanceError::server_rejected(None, "response envelope carried no data")
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrievanceDto {
    #[serde(default)]
    pub id: Option<u64>,
    pub issuse_id: String,
    pub rollno: String,
    pub campus: String,
    pub subject: String,
    pub description: String,
    pub issuse_type: String,
    pub status: String,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub responses: Vec<ResponseDto>,
    #[serde(default)]
    pub history: Vec<HistoryEntryDto>,
    #[serde(default)]
    pub attachments: Vec<AttachmentDto>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntryDto {
    pub timestamp: String,
    pub action: String,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub actor_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_campus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseDto {
    #[serde(default, alias = "adminId", alias = "admin")]
    pub admin_id: Option<serde_json::Value>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, alias = "response_text", alias = "review_text")]
    pub text: String,
    #[serde(default, alias = "created_at", alias = "createdat")]
    pub at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentDto {
    pub id: u64,
    pub filename: String,
    pub filepath: String,
    #[serde(default)]
    pub uploadedby: String,
    #[serde(default)]
    pub uploadedat: Option<String>,
    #[serde(default)]
    pub originalfilename: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub filesize: u64,
}

/// Body of every action endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBody {
    pub issue_id: String,
    pub review_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

impl ActionBody {
    /// Redirects carry the resolved owner; other actions only the note.
    pub fn new(issue_id: &str, request: &ActionRequest, route: Option<&ResolvedRoute>) -> Self {
        let mut body = Self {
            issue_id: issue_id.to_string(),
            review_text: request.note_text().unwrap_or_default().to_string(),
            role: None,
            campus: None,
            issue_type: None,
        };
        if let (Action::Redirect(_), Some(route)) = (&request.action, route) {
            body.role = Some(route.owner.role.tag());
            body.campus = route.owner.campus.as_ref().map(|c| c.to_string());
            body.issue_type = route.recategorized.map(|c| c.as_str().to_string());
        }
        body
    }
}

/// Parse the timestamp formats the server has been seen to emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn parse_status(raw: &str) -> Option<Status> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "NEW" => Some(Status::New),
        "PENDING" => Some(Status::Pending),
        "RESOLVED" => Some(Status::Resolved),
        "REJECTED" => Some(Status::Rejected),
        _ => None,
    }
}

fn parse_actor_kind(raw: Option<&str>) -> ActorKind {
    match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        Some("student") => ActorKind::Student,
        Some("system") => ActorKind::System,
        _ => ActorKind::Admin,
    }
}

impl GrievanceDto {
    /// Convert into the domain model, resolving the campus tag through the
    /// catalogue.
    pub fn into_domain(self, catalogue: &CampusCatalogue) -> GrievanceResult<Grievance> {
        let category = Category::parse(&self.issuse_type).ok_or_else(|| {
            GrievanceError::validation(format!(
                "{}: unknown issue type '{}'",
                self.issuse_id, self.issuse_type
            ))
        })?;
        let status = parse_status(&self.status).ok_or_else(|| {
            GrievanceError::validation(format!(
                "{}: unknown status '{}'",
                self.issuse_id, self.status
            ))
        })?;
        let campus = catalogue.code_for(&self.campus);
        let history_start = self
            .history
            .iter()
            .filter_map(|h| parse_timestamp(&h.timestamp))
            .min();
        let submitted_at = self
            .date
            .as_deref()
            .and_then(parse_timestamp)
            .or(history_start)
            .ok_or_else(|| {
                GrievanceError::validation(format!("{}: missing submission date", self.issuse_id))
            })?;

        let mut timeline: Vec<TimelineEntry> = self
            .history
            .iter()
            .filter_map(|h| h.to_entry(&self.issuse_id, catalogue))
            .collect();
        if timeline.is_empty() {
            let mut entry = TimelineEntry::new(
                TimelineAction::Submitted,
                self.rollno.clone(),
                ActorKind::Student,
                "Grievance submitted",
            );
            entry.timestamp = submitted_at;
            timeline.push(entry);
        }

        let responses = self
            .responses
            .iter()
            .map(|r| r.to_response(submitted_at))
            .collect();
        let attachments = self.attachments.iter().map(AttachmentDto::to_ref).collect();

        Ok(Grievance::restore(
            self.issuse_id,
            self.id,
            self.rollno,
            campus,
            self.subject,
            self.description,
            category,
            status,
            submitted_at,
            attachments,
            timeline,
            responses,
        ))
    }
}

impl From<&Grievance> for GrievanceDto {
    fn from(g: &Grievance) -> Self {
        Self {
            id: g.record_id,
            issuse_id: g.id.clone(),
            rollno: g.rollno.clone(),
            campus: g.campus.to_string(),
            subject: g.subject.clone(),
            description: g.description.clone(),
            issuse_type: g.category().as_str().to_string(),
            status: g.status().as_str().to_string(),
            attachment: None,
            date: Some(g.submitted_at.to_rfc3339()),
            responses: g
                .responses()
                .iter()
                .map(|r| ResponseDto {
                    admin_id: Some(serde_json::Value::String(r.admin_id.clone())),
                    action: serde_json::to_value(r.action)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string)),
                    text: r.text.clone(),
                    at: Some(r.at.to_rfc3339()),
                })
                .collect(),
            history: g.timeline().iter().map(HistoryEntryDto::from).collect(),
            attachments: g
                .attachments()
                .iter()
                .map(|a| AttachmentDto {
                    id: a.id,
                    filename: a.filename.clone(),
                    filepath: a.path.clone(),
                    uploadedby: a.uploaded_by.clone(),
                    uploadedat: a.uploaded_at.map(|t| t.to_rfc3339()),
                    originalfilename: a.original_filename.clone(),
                    mimetype: a.mime_type.clone(),
                    filesize: a.size_bytes,
                })
                .collect(),
        }
    }
}

impl HistoryEntryDto {
    fn to_entry(&self, issue_id: &str, catalogue: &CampusCatalogue) -> Option<TimelineEntry> {
        let Some(timestamp) = parse_timestamp(&self.timestamp) else {
            warn!(issue_id, timestamp = %self.timestamp, "Dropping history entry with unreadable timestamp");
            return None;
        };
        let action = TimelineAction::parse(&self.action).unwrap_or_else(|| {
            warn!(issue_id, action = %self.action, "Unknown history action; recording as UPDATE");
            TimelineAction::Update
        });
        let note = self
            .notes
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.description.clone());
        let mut entry = TimelineEntry::new(
            action,
            self.actor.clone(),
            parse_actor_kind(self.actor_type.as_deref()),
            note,
        );
        entry.timestamp = timestamp;
        if action == TimelineAction::Redirected {
            entry.redirect_to = self.redirect_role.as_deref().and_then(Role::parse).map(|role| {
                let campus = self.redirect_campus.as_deref().map(|c| catalogue.code_for(c));
                Owner::new(role, campus)
            });
            entry.recategorized = self.issue_type.as_deref().and_then(Category::parse);
        }
        Some(entry)
    }
}

impl From<&TimelineEntry> for HistoryEntryDto {
    fn from(e: &TimelineEntry) -> Self {
        let action = serde_json::to_value(e.action)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let actor_type = match e.actor_kind {
            ActorKind::Student => "student",
            ActorKind::Admin => "admin",
            ActorKind::System => "system",
        };
        Self {
            timestamp: e.timestamp.to_rfc3339(),
            action,
            actor: e.actor_id.clone(),
            actor_type: Some(actor_type.to_string()),
            description: e.note.clone(),
            status: None,
            notes: Some(e.note.clone()),
            redirect_role: e.redirect_to.as_ref().map(|o| o.role.tag()),
            redirect_campus: e
                .redirect_to
                .as_ref()
                .and_then(|o| o.campus.as_ref().map(CampusCode::to_string)),
            issue_type: e.recategorized.map(|c| c.as_str().to_string()),
        }
    }
}

impl ResponseDto {
    fn to_response(&self, fallback: DateTime<Utc>) -> AdminResponse {
        let admin_id = match &self.admin_id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        AdminResponse {
            admin_id,
            action: self
                .action
                .as_deref()
                .and_then(TimelineAction::parse)
                .unwrap_or(TimelineAction::Update),
            text: self.text.clone(),
            at: self.at.as_deref().and_then(parse_timestamp).unwrap_or(fallback),
        }
    }
}

impl AttachmentDto {
    fn to_ref(&self) -> AttachmentRef {
        AttachmentRef {
            id: self.id,
            filename: self.filename.clone(),
            path: self.filepath.clone(),
            uploaded_by: self.uploadedby.clone(),
            uploaded_at: self.uploadedat.as_deref().and_then(parse_timestamp),
            original_filename: self.originalfilename.clone(),
            mime_type: self.mimetype.clone(),
            size_bytes: self.filesize,
        }
    }
}
