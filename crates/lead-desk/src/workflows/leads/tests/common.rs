use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::LeadWorkflowConfig;
use crate::workflows::leads::{
    lead_router, AgentId, BatchSummary, CandidateQuery, Clock, Conditional, ContactDetails,
    DispositionChange, DispositionRequest, ImportBatchId, InMemoryLeadStore, Lead,
    LeadDispositionHistory, LeadId, LeadImportBatch, LeadSource, LeadStatus, LeadStore,
    LeadToSaleLink, LeadWorkflowService, LeaseClaim, LeaseRelease, ManualClock, NewLead,
    PlanDetails, RawLeadRow, StoreError,
};

pub(super) const AGENT_A: &str = "agent-a";
pub(super) const AGENT_B: &str = "agent-b";
pub(super) const ADMIN: &str = "admin-1";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn agent(name: &str) -> AgentId {
    AgentId::new(name)
}

pub(super) fn workflow_config() -> LeadWorkflowConfig {
    LeadWorkflowConfig {
        lease_ttl: Duration::minutes(15),
        candidate_window: 5,
        import_max_rows: 50,
        import_chunk_size: 3,
    }
}

pub(super) fn contact(n: u32) -> ContactDetails {
    ContactDetails {
        first_name: format!("Pat{n}"),
        last_name: "Rivera".to_string(),
        phone: format!("512555{n:04}"),
        email: format!("pat{n}@example.com"),
        ..ContactDetails::default()
    }
}

pub(super) fn plan() -> PlanDetails {
    PlanDetails {
        plan_name: Some("Gold Vehicle Service".to_string()),
        total_plan_cost_cents: 249_900,
        monthly_payment_cents: Some(12_900),
        term_months: Some(24),
    }
}

pub(super) fn new_lead(n: u32, assigned: Option<&str>, created_at: DateTime<Utc>) -> NewLead {
    NewLead {
        contact: contact(n),
        plan: plan(),
        source: LeadSource::Manual,
        assigned_agent_id: assigned.map(agent),
        import_batch_id: None,
        created_at,
    }
}

pub(super) fn dispose_to(status: LeadStatus) -> DispositionRequest {
    DispositionRequest {
        status,
        notes: None,
        callback_at: None,
    }
}

pub(super) fn callback_in(clock: &ManualClock, by: Duration) -> DispositionRequest {
    DispositionRequest {
        status: LeadStatus::Callback,
        notes: Some("asked to call back after lunch".to_string()),
        callback_at: Some(clock.now() + by),
    }
}

pub(super) struct Harness<S: LeadStore + 'static = InMemoryLeadStore> {
    pub store: Arc<S>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<LeadWorkflowService<S>>,
}

pub(super) fn harness() -> Harness {
    harness_with(InMemoryLeadStore::new(), workflow_config())
}

pub(super) fn harness_with<S: LeadStore + 'static>(
    store: S,
    config: LeadWorkflowConfig,
) -> Harness<S> {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(start()));
    let service = Arc::new(LeadWorkflowService::with_clock(
        store.clone(),
        clock.clone(),
        config,
    ));
    Harness {
        store,
        clock,
        service,
    }
}

impl<S: LeadStore + 'static> Harness<S> {
    /// Insert a lead created `minutes_ago` before the harness clock.
    pub(super) fn seed(&self, n: u32, assigned: Option<&str>, minutes_ago: i64) -> Lead {
        let created_at = self.clock.now() - Duration::minutes(minutes_ago);
        self.store
            .insert_lead(new_lead(n, assigned, created_at))
            .expect("seed lead")
    }

    /// Check out and dispose a lead to CALLBACK due `due_in` from now.
    pub(super) fn schedule_callback(&self, lead_id: LeadId, owner: &str, due_in: Duration) -> Lead {
        let agent = agent(owner);
        self.service
            .checkout_lead(lead_id, &agent)
            .expect("checkout for callback");
        self.service
            .dispose_lead(lead_id, &agent, callback_in(&self.clock, due_in))
            .expect("schedule callback")
    }
}

pub(super) fn csv_rows(rows: &[[&str; 5]]) -> Vec<RawLeadRow> {
    rows.iter()
        .map(|[first, last, phone, email, cost]| {
            RawLeadRow::new([
                ("First Name", *first),
                ("Last Name", *last),
                ("Phone", *phone),
                ("Email", *email),
                ("Total Plan Cost", *cost),
            ])
        })
        .collect()
}

/// Ten well-formed rows with distinct customers.
pub(super) fn ten_rows() -> Vec<RawLeadRow> {
    (1..=10)
        .map(|n| {
            RawLeadRow::new([
                ("First Name", format!("Sam{n}")),
                ("Last Name", "Okafor".to_string()),
                ("Phone", format!("(512) 555-{:04}", 2000 + n)),
                ("Email", format!("sam{n}@example.com")),
                ("Total Plan Cost", "$1,899.00".to_string()),
            ])
        })
        .collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 body")
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    lead_router(harness.service.clone())
}

/// Wraps the in-memory store and fails chosen operations on demand.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub inner: InMemoryLeadStore,
    /// Number of `insert_leads` calls to let through before failing; `None` never fails.
    pub fail_inserts_after: Option<usize>,
    pub inserts: AtomicUsize,
    pub unavailable: bool,
}

impl FlakyStore {
    pub(super) fn failing_inserts_after(calls: usize) -> Self {
        Self {
            fail_inserts_after: Some(calls),
            ..Self::default()
        }
    }

    pub(super) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("database offline".to_string()));
        }
        Ok(())
    }
}

impl LeadStore for FlakyStore {
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        self.check()?;
        self.inner.insert_lead(lead)
    }

    fn insert_leads(&self, leads: Vec<NewLead>) -> Result<Vec<LeadId>, StoreError> {
        self.check()?;
        let call = self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts_after.is_some_and(|limit| call >= limit) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert_leads(leads)
    }

    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        self.check()?;
        self.inner.fetch_lead(id)
    }

    fn acquire_lease(&self, id: LeadId, claim: &LeaseClaim) -> Result<Conditional, StoreError> {
        self.check()?;
        self.inner.acquire_lease(id, claim)
    }

    fn release_lease(&self, id: LeadId, release: &LeaseRelease) -> Result<Conditional, StoreError> {
        self.check()?;
        self.inner.release_lease(id, release)
    }

    fn commit_disposition(
        &self,
        id: LeadId,
        change: &DispositionChange,
    ) -> Result<Conditional, StoreError> {
        self.check()?;
        self.inner.commit_disposition(id, change)
    }

    fn assign_lead(&self, id: LeadId, agent: &AgentId) -> Result<Conditional, StoreError> {
        self.check()?;
        self.inner.assign_lead(id, agent)
    }

    fn select_candidates(
        &self,
        query: &CandidateQuery,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.check()?;
        self.inner.select_candidates(query, limit)
    }

    fn leads_assigned_to(&self, agent: &AgentId) -> Result<Vec<Lead>, StoreError> {
        self.check()?;
        self.inner.leads_assigned_to(agent)
    }

    fn history(&self, id: LeadId) -> Result<Vec<LeadDispositionHistory>, StoreError> {
        self.check()?;
        self.inner.history(id)
    }

    fn create_batch(
        &self,
        filename: &str,
        imported_by: &AgentId,
        started_at: DateTime<Utc>,
    ) -> Result<LeadImportBatch, StoreError> {
        self.check()?;
        self.inner.create_batch(filename, imported_by, started_at)
    }

    fn finalize_batch(
        &self,
        id: ImportBatchId,
        summary: BatchSummary,
    ) -> Result<LeadImportBatch, StoreError> {
        self.check()?;
        self.inner.finalize_batch(id, summary)
    }

    fn fetch_batch(&self, id: ImportBatchId) -> Result<Option<LeadImportBatch>, StoreError> {
        self.check()?;
        self.inner.fetch_batch(id)
    }

    fn insert_sale_link(&self, link: LeadToSaleLink) -> Result<LeadToSaleLink, StoreError> {
        self.check()?;
        self.inner.insert_sale_link(link)
    }

    fn sale_link(&self, id: LeadId) -> Result<Option<LeadToSaleLink>, StoreError> {
        self.check()?;
        self.inner.sale_link(id)
    }
}

/// Store whose first `lose` lease attempts behave as if another request won
/// the row a moment earlier.
pub(super) struct ContestedStore {
    pub inner: InMemoryLeadStore,
    pub lose: usize,
    pub attempts: AtomicUsize,
}

impl ContestedStore {
    pub(super) fn losing(lose: usize) -> Self {
        Self {
            inner: InMemoryLeadStore::new(),
            lose,
            attempts: AtomicUsize::new(0),
        }
    }
}

impl LeadStore for ContestedStore {
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        self.inner.insert_lead(lead)
    }

    fn insert_leads(&self, leads: Vec<NewLead>) -> Result<Vec<LeadId>, StoreError> {
        self.inner.insert_leads(leads)
    }

    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        self.inner.fetch_lead(id)
    }

    fn acquire_lease(&self, id: LeadId, claim: &LeaseClaim) -> Result<Conditional, StoreError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.lose {
            return match self.inner.fetch_lead(id)? {
                Some(lead) => Ok(Conditional::Rejected(lead)),
                None => Ok(Conditional::Missing),
            };
        }
        self.inner.acquire_lease(id, claim)
    }

    fn release_lease(&self, id: LeadId, release: &LeaseRelease) -> Result<Conditional, StoreError> {
        self.inner.release_lease(id, release)
    }

    fn commit_disposition(
        &self,
        id: LeadId,
        change: &DispositionChange,
    ) -> Result<Conditional, StoreError> {
        self.inner.commit_disposition(id, change)
    }

    fn assign_lead(&self, id: LeadId, agent: &AgentId) -> Result<Conditional, StoreError> {
        self.inner.assign_lead(id, agent)
    }

    fn select_candidates(
        &self,
        query: &CandidateQuery,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        self.inner.select_candidates(query, limit)
    }

    fn leads_assigned_to(&self, agent: &AgentId) -> Result<Vec<Lead>, StoreError> {
        self.inner.leads_assigned_to(agent)
    }

    fn history(&self, id: LeadId) -> Result<Vec<LeadDispositionHistory>, StoreError> {
        self.inner.history(id)
    }

    fn create_batch(
        &self,
        filename: &str,
        imported_by: &AgentId,
        started_at: DateTime<Utc>,
    ) -> Result<LeadImportBatch, StoreError> {
        self.inner.create_batch(filename, imported_by, started_at)
    }

    fn finalize_batch(
        &self,
        id: ImportBatchId,
        summary: BatchSummary,
    ) -> Result<LeadImportBatch, StoreError> {
        self.inner.finalize_batch(id, summary)
    }

    fn fetch_batch(&self, id: ImportBatchId) -> Result<Option<LeadImportBatch>, StoreError> {
        self.inner.fetch_batch(id)
    }

    fn insert_sale_link(&self, link: LeadToSaleLink) -> Result<LeadToSaleLink, StoreError> {
        self.inner.insert_sale_link(link)
    }

    fn sale_link(&self, id: LeadId) -> Result<Option<LeadToSaleLink>, StoreError> {
        self.inner.sale_link(id)
    }
}
