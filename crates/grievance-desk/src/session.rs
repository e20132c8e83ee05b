//! Desk session: one principal working against the portal.
//!
//! Every operation gates locally before touching the network. Actions are
//! serialized per grievance and pre-checked against the cached copy; the
//! server stays authoritative, so a rejection is surfaced as-is and the
//! cached copy is dropped.
//!
//! ```text
//! act(issue, action)
//!   ├─ permit      InFlightActions::try_acquire       (ACTION_IN_FLIGHT)
//!   ├─ pre-check   GrievanceStateMachine::plan        (no network on failure)
//!   ├─ submit      GrievanceApi::submit_action        (server may reject)
//!   └─ commit      re-plan against latest cached copy, then store
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use grievance_core::lifecycle::ActionRequest;
use grievance_core::wire::{ActionBody, GrievanceDto};
use grievance_core::{
    AccessGate, AccessTarget, Capability, DenyReason, EngineConfig, EscalationRouter, FetchOutcome,
    Grievance, GrievanceError, GrievanceListController, GrievanceResult, GrievanceStateMachine,
    InFlightActions, ListFilter, ListSource, Page, Principal, ResilientFetch, Role,
    SubmissionDraft, TransitionRecord,
};

use crate::api::{GrievanceApi, SubmissionReceipt};

fn settle<T>(outcome: FetchOutcome<T>) -> GrievanceResult<T> {
    outcome
        .into_result()
        .unwrap_or_else(|| Err(GrievanceError::transient("fetch was cancelled")))
}

pub struct Desk<A> {
    api: A,
    principal: Option<Principal>,
    config: EngineConfig,
    gate: AccessGate,
    machine: GrievanceStateMachine,
    inflight: InFlightActions,
    cache: Mutex<HashMap<String, Grievance>>,
    /// Role each grievance was last fetched through.
    fetched_via: Mutex<HashMap<String, Role>>,
}

impl<A: GrievanceApi> Desk<A> {
    pub fn new(api: A, principal: Option<Principal>, config: EngineConfig) -> Self {
        let machine = GrievanceStateMachine::new(EscalationRouter::new(config.campuses.clone()));
        Self {
            api,
            principal,
            config,
            gate: AccessGate::new(),
            machine,
            inflight: InFlightActions::new(),
            cache: Mutex::new(HashMap::new()),
            fetched_via: Mutex::new(HashMap::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn inflight(&self) -> &InFlightActions {
        &self.inflight
    }

    /// Cached copy of a grievance, if one was fetched.
    pub fn cached(&self, issue_id: &str) -> Option<Grievance> {
        self.lock().get(issue_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Grievance>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, grievance: Grievance) {
        self.lock().insert(grievance.id.clone(), grievance);
    }

    fn evict(&self, issue_id: &str) {
        self.lock().remove(issue_id);
    }

    fn remember(&self, issue_id: &str, role: Role) {
        self.fetched_via
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(issue_id.to_string(), role);
    }

    /// Roles to try for a detail fetch, in order.
    fn detail_roles(&self, principal: &Principal, issue_id: &str) -> Vec<Role> {
        let mut roles = principal.roles_by_seniority();
        let known = self
            .fetched_via
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(issue_id)
            .copied();
        if let Some(known) = known.filter(|r| roles.contains(r)) {
            roles.retain(|r| *r != known);
            roles.insert(0, known);
        }
        roles
    }

    fn decode(&self, dto: GrievanceDto) -> GrievanceResult<Grievance> {
        dto.into_domain(&self.config.campuses)
    }

    /// One page of a queue, filtered locally.
    pub async fn list(
        &self,
        source: ListSource,
        filter: ListFilter,
        page: usize,
    ) -> GrievanceResult<Page<Grievance>> {
        let mut controller =
            GrievanceListController::new(source, self.config.page_size, self.config.retry);
        let outcome = controller
            .load(self.principal(), || async move {
                self.api
                    .list(source)
                    .await?
                    .into_iter()
                    .map(|dto| self.decode(dto))
                    .collect::<GrievanceResult<Vec<_>>>()
            })
            .await?;
        let rows = settle(outcome)?;
        info!(%source, rows = rows.len(), "Queue loaded");
        for grievance in rows {
            self.remember(&grievance.id, source.role);
            self.store(grievance);
        }

        controller.set_filter(filter);
        controller.set_page(page);
        Ok(controller.current_page())
    }

    /// Fetch one grievance and check the principal may see it.
    ///
    /// The endpoint is addressed through `via` when given. Otherwise the
    /// role whose queue listed the grievance goes first, then every other
    /// held role from the most senior down; a refusal moves on to the next.
    pub async fn detail(&self, issue_id: &str, via: Option<Role>) -> GrievanceResult<Grievance> {
        let principal = self
            .principal()
            .ok_or(GrievanceError::Authorization(DenyReason::NotAuthenticated))?;
        let roles = match via {
            Some(role) if principal.roles().any(|r| r == role) => vec![role],
            Some(_) => return Err(GrievanceError::Authorization(DenyReason::RoleMismatch)),
            None => self.detail_roles(principal, issue_id),
        };

        let mut refusal = None;
        for role in roles {
            let fetch = ResilientFetch::new(self.config.retry);
            let dto = match settle(fetch.fetch(|| self.api.detail(role, issue_id)).await) {
                Ok(dto) => dto,
                Err(err @ (GrievanceError::Auth { .. } | GrievanceError::ServerRejected { .. })) => {
                    debug!(issue_id, %role, code = %err.reason_code(), "Detail refused for role");
                    refusal = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let grievance = self.decode(dto)?;

            self.gate.require(
                Some(principal),
                Capability::ViewDetail,
                &AccessTarget::for_owner(&grievance.owner()),
            )?;
            self.remember(issue_id, role);
            self.store(grievance.clone());
            return Ok(grievance);
        }
        Err(refusal.unwrap_or(GrievanceError::Authorization(DenyReason::RoleMismatch)))
    }

    /// Perform a lifecycle action.
    pub async fn act(
        &self,
        issue_id: &str,
        request: &ActionRequest,
    ) -> GrievanceResult<TransitionRecord> {
        let principal = self
            .principal()
            .ok_or(GrievanceError::Authorization(DenyReason::NotAuthenticated))?;
        let _permit = self.inflight.try_acquire(issue_id)?;

        let snapshot = match self.cached(issue_id) {
            Some(grievance) => grievance,
            None => self.detail(issue_id, None).await?,
        };
        let planned = self
            .machine
            .plan(&snapshot, principal, request, Utc::now())?;
        let record = planned.record().clone();
        let body = ActionBody::new(issue_id, request, record.route.as_ref());

        if let Err(err) = self
            .api
            .submit_action(record.via, record.action, &body)
            .await
        {
            warn!(
                issue_id,
                action = %record.action,
                code = %err.reason_code(),
                "Action rejected"
            );
            if matches!(err, GrievanceError::ServerRejected { .. }) {
                self.evict(issue_id);
            }
            return Err(err);
        }

        // The cached copy may have moved while the request was in flight.
        let mut latest = self.cached(issue_id).unwrap_or(snapshot);
        match self.machine.plan(&latest, principal, request, Utc::now()) {
            Ok(replanned) => {
                let record = GrievanceStateMachine::commit(&mut latest, replanned);
                info!(
                    issue_id,
                    action = %record.action,
                    from = %record.from,
                    to = %record.to,
                    "Action applied"
                );
                self.store(latest);
                Ok(record)
            }
            Err(err) => {
                warn!(
                    issue_id,
                    error = %err,
                    "Accepted action no longer applies locally; dropping cached copy"
                );
                self.evict(issue_id);
                Ok(record)
            }
        }
    }

    /// Validate and file a student grievance.
    pub async fn submit(&self, draft: &SubmissionDraft) -> GrievanceResult<SubmissionReceipt> {
        let prepared = draft.prepare(&self.config.campuses, &self.config)?;
        let receipt = self.api.submit(&prepared.body()).await?;
        info!(
            issue_id = %receipt.issue_id,
            category = %prepared.category,
            "Grievance submitted"
        );
        Ok(receipt)
    }

    /// Student-facing status lookup; needs no admin role.
    pub async fn track(&self, issue_id: &str) -> GrievanceResult<Grievance> {
        let fetch = ResilientFetch::new(self.config.retry);
        let dto = settle(fetch.fetch(|| self.api.track(issue_id)).await)?;
        self.decode(dto)
    }
}
