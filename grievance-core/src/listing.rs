//! Grievance list controller: one parameterized list view.
//!
//! A [`ListSource`] names the endpoint (role × page type). The controller
//! gates access before any fetch, keeps the fetched rows in a
//! [`ResilientFetch`], and applies search, category and campus filters plus
//! pagination locally.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::access::{AccessGate, AccessTarget, Capability};
use crate::error::{GrievanceError, GrievanceResult};
use crate::model::{CampusCode, Category, Department, Grievance, Principal, Role, Status};
use crate::resilience::{FetchOutcome, FetchPhase, ResilientFetch, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    New,
    Pending,
    Review,
    Redirect,
    Resolved,
    Rejected,
}

impl PageType {
    pub const ALL: [PageType; 6] = [
        PageType::New,
        PageType::Pending,
        PageType::Review,
        PageType::Redirect,
        PageType::Resolved,
        PageType::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Review => "review",
            Self::Redirect => "redirect",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<PageType> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Status every row on this page must have, where the page implies one.
    pub fn status(self) -> Option<Status> {
        match self {
            Self::New => Some(Status::New),
            Self::Pending | Self::Review => Some(Status::Pending),
            Self::Resolved => Some(Status::Resolved),
            Self::Rejected => Some(Status::Rejected),
            Self::Redirect => None,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One list endpoint: `GET /{role-segment}/{page}-grievances`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListSource {
    pub role: Role,
    pub page: PageType,
}

impl ListSource {
    /// Review and redirect queues exist only for department-specific roles.
    pub fn new(role: Role, page: PageType) -> GrievanceResult<Self> {
        let department_queue = matches!(page, PageType::Review | PageType::Redirect);
        if department_queue && role.department() == Department::Admin {
            return Err(GrievanceError::validation(format!(
                "{role} has no {page} queue"
            )));
        }
        Ok(Self { role, page })
    }

    pub fn path(&self) -> String {
        format!("/{}/{}-grievances", self.role.api_segment(), self.page)
    }

    pub fn access_target(&self) -> AccessTarget {
        AccessTarget::new(self.role.department(), self.role.scope())
    }

    /// Every queue visible to `principal`, one per held role.
    pub fn visible_to(principal: &Principal) -> Vec<ListSource> {
        principal
            .roles()
            .flat_map(|role| {
                PageType::ALL
                    .into_iter()
                    .filter_map(move |page| ListSource::new(role, page).ok())
            })
            .collect()
    }
}

impl fmt::Display for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Client-side filters; never sent to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Case-insensitive substring over id, roll number, subject and description.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub campus: Option<CampusCode>,
}

impl ListFilter {
    pub fn matches(&self, grievance: &Grievance) -> bool {
        if let Some(category) = self.category {
            if grievance.current_category() != category {
                return false;
            }
        }
        if let Some(campus) = &self.campus {
            if &grievance.campus != campus {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [
                    grievance.id.as_str(),
                    grievance.rollno.as_str(),
                    grievance.subject.as_str(),
                    grievance.description.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

/// One page of filtered rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped to `1..=total_pages`.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T: Clone> Page<T> {
    pub fn slice(rows: &[T], page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_items = rows.len();
        let total_pages = total_items.div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * page_size;
        let items = rows.iter().skip(start).take(page_size).cloned().collect();
        Self {
            items,
            page,
            page_size,
            total_pages,
            total_items,
        }
    }
}

pub struct GrievanceListController {
    source: ListSource,
    filter: ListFilter,
    page: usize,
    page_size: usize,
    gate: AccessGate,
    fetch: ResilientFetch<Vec<Grievance>>,
}

impl GrievanceListController {
    pub fn new(source: ListSource, page_size: usize, policy: RetryPolicy) -> Self {
        Self {
            source,
            filter: ListFilter::default(),
            page: 1,
            page_size,
            gate: AccessGate::new(),
            fetch: ResilientFetch::new(policy),
        }
    }

    pub fn source(&self) -> ListSource {
        self.source
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn phase(&self) -> FetchPhase {
        self.fetch.phase()
    }

    /// Gate, then fetch with retry. A denied principal causes no call.
    pub async fn load<F, Fut>(
        &self,
        principal: Option<&Principal>,
        thunk: F,
    ) -> GrievanceResult<FetchOutcome<Vec<Grievance>>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GrievanceResult<Vec<Grievance>>>,
    {
        self.gate
            .require(principal, Capability::ViewList, &self.source.access_target())?;
        Ok(self.fetch.fetch(thunk).await)
    }

    /// Replacing the filter resets to the first page.
    pub fn set_filter(&mut self, filter: ListFilter) {
        if filter != self.filter {
            self.filter = filter;
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Rows of the fetched list that pass the page status and the filter,
    /// newest first.
    pub fn rows(&self) -> Vec<Grievance> {
        let status = self.source.page.status();
        let mut rows: Vec<Grievance> = self
            .fetch
            .data()
            .unwrap_or_default()
            .into_iter()
            .filter(|g| status.map_or(true, |s| g.status() == s))
            .filter(|g| self.filter.matches(g))
            .collect();
        rows.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        rows
    }

    pub fn current_page(&self) -> Page<Grievance> {
        Page::slice(&self.rows(), self.page, self.page_size)
    }

    /// Cancel pending retry timers when the view goes away.
    pub fn shutdown(&self) {
        self.fetch.shutdown();
    }
}
