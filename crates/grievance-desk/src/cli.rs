//! Command-line surface. Every command prints one JSON document on stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;

use grievance_core::lifecycle::{Action, ActionRequest};
use grievance_core::model::AdminInfo;
use grievance_core::submission::subject_catalogue;
use grievance_core::{
    classify_subject, CampusCatalogue, CampusCode, Category, ListFilter, ListSource, PageType,
    Principal, RedirectRequest, Role, SubmissionCategory, SubmissionDraft,
};

use crate::api::GrievanceApi;
use crate::error::DeskError;
use crate::session::Desk;

/// Admin desk for the grievance portal
#[derive(Parser, Debug)]
#[command(name = "grievance-desk", author, version, about, long_about = None)]
pub struct Cli {
    /// Role held by the acting admin, e.g. "campus academic" (repeatable)
    #[arg(long = "role", global = true)]
    pub roles: Vec<Role>,

    /// Campus of the acting admin (code, name or id)
    #[arg(long, global = true)]
    pub campus: Option<String>,

    /// Admin id recorded on timeline entries
    #[arg(long, global = true, default_value = "cli")]
    pub admin_id: String,

    /// Admin profile JSON as returned at login; replaces --role/--campus
    #[arg(long, global = true)]
    pub admin_info: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List one grievance queue
    List {
        /// new, pending, review, redirect, resolved or rejected
        #[arg(value_parser = parse_page)]
        queue: PageType,

        /// Role whose queue to read (defaults to the most senior held role)
        #[arg(long = "as")]
        as_role: Option<Role>,

        /// Case-insensitive search over id, roll number, subject, description
        #[arg(long)]
        search: Option<String>,

        /// ACADEMIC, NON-ACADEMIC or EXAMINATION
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,

        /// Only grievances filed at this campus
        #[arg(long = "from-campus")]
        from_campus: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Show one grievance with its timeline
    Show {
        issue_id: String,

        /// Role to fetch through (defaults to the role that listed it)
        #[arg(long = "as")]
        as_role: Option<Role>,
    },

    /// Begin review (NEW → PENDING)
    Acknowledge {
        issue_id: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Resolve (terminal)
    Resolve {
        issue_id: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Reject (terminal)
    Reject {
        issue_id: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Send back for resubmission (PENDING → NEW)
    Return {
        issue_id: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Move to another owner without changing status
    Redirect {
        issue_id: String,

        /// Target role, e.g. "university examination"
        #[arg(long, conflicts_with = "escalate")]
        to: Option<Role>,

        /// Target campus for campus-scoped roles
        #[arg(long)]
        to_campus: Option<String>,

        /// One step up the ownership ladder
        #[arg(long)]
        escalate: bool,

        /// New category (superadmin only)
        #[arg(long, value_parser = parse_category)]
        recategorize: Option<Category>,

        #[arg(long)]
        note: Option<String>,
    },

    /// File a grievance as a student
    Submit {
        #[arg(long)]
        rollno: String,
        #[arg(long = "at")]
        at_campus: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        description: String,
        /// Academic, Non-Academic, Examination or Optional
        #[arg(long, value_parser = parse_submission_category, default_value = "Optional")]
        category: SubmissionCategory,
        #[arg(long)]
        attachment: bool,
    },

    /// Track a grievance by id as a student
    Track { issue_id: String },

    /// Show how a free-text subject would be routed
    Classify { subject: String },

    /// Subject choices per category
    Subjects,

    /// Show the acting principal and its visible queues
    Whoami,
}

fn parse_page(raw: &str) -> Result<PageType, String> {
    PageType::parse(raw).ok_or_else(|| format!("unknown queue '{raw}'"))
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::parse(raw).ok_or_else(|| format!("unknown category '{raw}'"))
}

fn parse_submission_category(raw: &str) -> Result<SubmissionCategory, String> {
    SubmissionCategory::parse(raw).ok_or_else(|| format!("unknown category '{raw}'"))
}

impl Cli {
    /// Build the acting principal, if any admin identity was given.
    pub fn principal(&self, catalogue: &CampusCatalogue) -> Result<Option<Principal>, DeskError> {
        if let Some(path) = &self.admin_info {
            let raw = std::fs::read_to_string(path).map_err(|source| DeskError::Io {
                path: path.clone(),
                source,
            })?;
            let info: AdminInfo =
                serde_json::from_str(&raw).map_err(|source| DeskError::Profile {
                    path: path.clone(),
                    source,
                })?;
            return Ok(Some(Principal::from_admin_info(&info, catalogue)?));
        }
        if self.roles.is_empty() {
            return Ok(None);
        }
        let campus = self.campus.as_deref().map(|c| catalogue.code_for(c));
        let principal = Principal::new(
            self.admin_id.clone(),
            self.admin_id.clone(),
            self.roles.iter().copied(),
            campus,
        )?;
        Ok(Some(principal))
    }
}

fn action_request(action: Action, note: &Option<String>) -> ActionRequest {
    let request = ActionRequest::new(action);
    match note {
        Some(note) => request.with_note(note.clone()),
        None => request,
    }
}

fn redirect_request(
    to: Option<Role>,
    to_campus: Option<String>,
    escalate: bool,
    recategorize: Option<Category>,
    catalogue: &CampusCatalogue,
) -> Result<RedirectRequest, DeskError> {
    if escalate && to_campus.is_some() {
        debug!("--to-campus ignored for escalation");
    }
    let mut request = match (to, escalate) {
        (_, true) => RedirectRequest::escalate(),
        (Some(role), false) => {
            let campus = to_campus.map(|c| {
                catalogue
                    .resolve(&c)
                    .map(|campus| campus.code.clone())
                    .unwrap_or_else(|| CampusCode::new(&c))
            });
            RedirectRequest::to(role, campus)
        }
        (None, false) => {
            return Err(DeskError::Usage(
                "redirect needs --to <role> or --escalate".into(),
            ))
        }
    };
    if let Some(category) = recategorize {
        request = request.recategorize(category);
    }
    Ok(request)
}

/// Execute one command against `desk`.
pub async fn run<A: GrievanceApi>(command: Command, desk: &Desk<A>) -> Result<Value, DeskError> {
    let catalogue = &desk.config().campuses;
    let value = match command {
        Command::List {
            queue,
            as_role,
            search,
            category,
            from_campus,
            page,
        } => {
            let role = as_role
                .or_else(|| desk.principal().and_then(Principal::primary_role))
                .ok_or_else(|| DeskError::Usage("list needs --role or --as".into()))?;
            let source = ListSource::new(role, queue)?;
            let filter = ListFilter {
                search,
                category,
                campus: from_campus.map(|c| catalogue.code_for(&c)),
            };
            serde_json::to_value(desk.list(source, filter, page).await?)
        }
        Command::Show { issue_id, as_role } => {
            serde_json::to_value(desk.detail(&issue_id, as_role).await?)
        }
        Command::Acknowledge { issue_id, note } => {
            let request = action_request(Action::Acknowledge, &note);
            serde_json::to_value(desk.act(&issue_id, &request).await?)
        }
        Command::Resolve { issue_id, note } => {
            let request = action_request(Action::Resolve, &note);
            serde_json::to_value(desk.act(&issue_id, &request).await?)
        }
        Command::Reject { issue_id, note } => {
            let request = action_request(Action::Reject, &note);
            serde_json::to_value(desk.act(&issue_id, &request).await?)
        }
        Command::Return { issue_id, note } => {
            let request = action_request(Action::Return, &note);
            serde_json::to_value(desk.act(&issue_id, &request).await?)
        }
        Command::Redirect {
            issue_id,
            to,
            to_campus,
            escalate,
            recategorize,
            note,
        } => {
            let redirect = redirect_request(to, to_campus, escalate, recategorize, catalogue)?;
            let request = action_request(Action::Redirect(redirect), &note);
            serde_json::to_value(desk.act(&issue_id, &request).await?)
        }
        Command::Submit {
            rollno,
            at_campus,
            subject,
            description,
            category,
            attachment,
        } => {
            let draft = SubmissionDraft {
                rollno,
                campus: at_campus,
                subject,
                description,
                category,
                attachment,
            };
            serde_json::to_value(desk.submit(&draft).await?)
        }
        Command::Track { issue_id } => serde_json::to_value(desk.track(&issue_id).await?),
        Command::Classify { subject } => Ok(json!({
            "subject": subject,
            "category": classify_subject(&subject),
        })),
        Command::Subjects => serde_json::to_value(subject_catalogue()),
        Command::Whoami => Ok(match desk.principal() {
            Some(principal) => json!({
                "principal": principal,
                "queues": ListSource::visible_to(principal)
                    .iter()
                    .map(ListSource::path)
                    .collect::<Vec<_>>(),
            }),
            None => json!({ "principal": null, "queues": [] }),
        }),
    };
    value.map_err(|e| DeskError::Usage(format!("failed to encode output: {e}")))
}
