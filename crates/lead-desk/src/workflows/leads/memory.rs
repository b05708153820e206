use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::disposition::DispositionChange;
use super::domain::{
    AgentId, BatchSummary, ImportBatchId, Lead, LeadDispositionHistory, LeadId, LeadImportBatch,
    LeadToSaleLink, Lease, NewLead, SaleId,
};
use super::lease::{LeaseClaim, LeaseRelease};
use super::queue::CandidateQuery;
use super::store::{Conditional, LeadStore, StoreError};

/// Process-local store. A single mutex serializes every write, which makes
/// each conditional update trivially atomic; a relational store gets the same
/// effect from `UPDATE ... WHERE <predicate>` inside a transaction.
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_lead_id: u64,
    next_batch_id: u64,
    leads: BTreeMap<LeadId, Lead>,
    history: HashMap<LeadId, Vec<LeadDispositionHistory>>,
    batches: BTreeMap<ImportBatchId, LeadImportBatch>,
    links: HashMap<LeadId, LeadToSaleLink>,
    linked_sales: HashMap<SaleId, LeadId>,
}

impl MemoryState {
    fn allocate_lead_id(&mut self) -> LeadId {
        self.next_lead_id += 1;
        LeadId(self.next_lead_id)
    }

    fn conditional<P, W>(&mut self, id: LeadId, predicate: P, write: W) -> Conditional
    where
        P: FnOnce(&Lead) -> bool,
        W: FnOnce(&mut Lead, &mut HashMap<LeadId, Vec<LeadDispositionHistory>>),
    {
        let Some(lead) = self.leads.get_mut(&id) else {
            return Conditional::Missing;
        };

        if !predicate(lead) {
            return Conditional::Rejected(lead.clone());
        }

        write(lead, &mut self.history);
        Conditional::Applied(lead.clone())
    }
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("lead store mutex poisoned".to_string()))
    }

    /// Every lead row, id order.
    pub fn snapshot(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(self.state()?.leads.values().cloned().collect())
    }
}

impl LeadStore for InMemoryLeadStore {
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut state = self.state()?;
        let id = state.allocate_lead_id();
        let lead = lead.into_lead(id);
        state.leads.insert(id, lead.clone());
        Ok(lead)
    }

    fn insert_leads(&self, leads: Vec<NewLead>) -> Result<Vec<LeadId>, StoreError> {
        let mut state = self.state()?;
        let mut ids = Vec::with_capacity(leads.len());
        for lead in leads {
            let id = state.allocate_lead_id();
            state.leads.insert(id, lead.into_lead(id));
            ids.push(id);
        }
        Ok(ids)
    }

    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.state()?.leads.get(&id).cloned())
    }

    fn acquire_lease(&self, id: LeadId, claim: &LeaseClaim) -> Result<Conditional, StoreError> {
        let mut state = self.state()?;
        Ok(state.conditional(
            id,
            |lead| claim.permits(lead),
            |lead, _| {
                lead.lease = Some(Lease {
                    checked_out_by: claim.agent.clone(),
                    checked_out_at: claim.at,
                });
            },
        ))
    }

    fn release_lease(&self, id: LeadId, release: &LeaseRelease) -> Result<Conditional, StoreError> {
        let mut state = self.state()?;
        Ok(state.conditional(
            id,
            |lead| release.permits(lead),
            |lead, _| lead.lease = None,
        ))
    }

    fn commit_disposition(
        &self,
        id: LeadId,
        change: &DispositionChange,
    ) -> Result<Conditional, StoreError> {
        let mut state = self.state()?;
        Ok(state.conditional(
            id,
            |lead| change.permits(lead),
            |lead, history| {
                let entry = change.apply_to(lead);
                history.entry(lead.id).or_default().push(entry);
            },
        ))
    }

    fn assign_lead(&self, id: LeadId, agent: &AgentId) -> Result<Conditional, StoreError> {
        let mut state = self.state()?;
        Ok(state.conditional(
            id,
            |lead| !lead.current_status.is_terminal(),
            |lead, _| lead.assigned_agent_id = Some(agent.clone()),
        ))
    }

    fn select_candidates(
        &self,
        query: &CandidateQuery,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError> {
        let state = self.state()?;
        let mut candidates: Vec<Lead> = state
            .leads
            .values()
            .filter(|lead| query.admits(lead))
            .cloned()
            .collect();
        candidates.sort_by(|left, right| query.order(left, right));
        candidates.truncate(limit);
        Ok(candidates)
    }

    fn leads_assigned_to(&self, agent: &AgentId) -> Result<Vec<Lead>, StoreError> {
        let state = self.state()?;
        Ok(state
            .leads
            .values()
            .filter(|lead| lead.is_assigned_to(agent))
            .cloned()
            .collect())
    }

    fn history(&self, id: LeadId) -> Result<Vec<LeadDispositionHistory>, StoreError> {
        let state = self.state()?;
        Ok(state.history.get(&id).cloned().unwrap_or_default())
    }

    fn create_batch(
        &self,
        filename: &str,
        imported_by: &AgentId,
        started_at: DateTime<Utc>,
    ) -> Result<LeadImportBatch, StoreError> {
        let mut state = self.state()?;
        state.next_batch_id += 1;
        let batch = LeadImportBatch {
            id: ImportBatchId(state.next_batch_id),
            filename: filename.to_string(),
            imported_by: imported_by.clone(),
            started_at,
            completed_at: None,
            total_rows: 0,
            successful_rows: 0,
            failed_rows: 0,
            errors: Vec::new(),
            error_report_location: None,
        };
        state.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    fn finalize_batch(
        &self,
        id: ImportBatchId,
        summary: BatchSummary,
    ) -> Result<LeadImportBatch, StoreError> {
        let mut state = self.state()?;
        let batch = state.batches.get_mut(&id).ok_or(StoreError::NotFound)?;
        if batch.is_finalized() {
            return Err(StoreError::Conflict(format!("{id} is already finalized")));
        }

        batch.completed_at = Some(summary.completed_at);
        batch.total_rows = summary.total_rows;
        batch.successful_rows = summary.successful_rows;
        batch.failed_rows = summary.failed_rows;
        batch.errors = summary.errors;
        batch.error_report_location = summary.error_report_location;
        Ok(batch.clone())
    }

    fn fetch_batch(&self, id: ImportBatchId) -> Result<Option<LeadImportBatch>, StoreError> {
        Ok(self.state()?.batches.get(&id).cloned())
    }

    fn insert_sale_link(&self, link: LeadToSaleLink) -> Result<LeadToSaleLink, StoreError> {
        let mut state = self.state()?;
        if !state.leads.contains_key(&link.lead_id) {
            return Err(StoreError::NotFound);
        }
        if state.links.contains_key(&link.lead_id) {
            return Err(StoreError::Conflict(format!(
                "{} already converted",
                link.lead_id
            )));
        }
        if let Some(existing) = state.linked_sales.get(&link.sale_id) {
            return Err(StoreError::Conflict(format!(
                "sale {} already linked to {existing}",
                link.sale_id.0
            )));
        }

        state
            .linked_sales
            .insert(link.sale_id.clone(), link.lead_id);
        state.links.insert(link.lead_id, link.clone());
        Ok(link)
    }

    fn sale_link(&self, id: LeadId) -> Result<Option<LeadToSaleLink>, StoreError> {
        Ok(self.state()?.links.get(&id).cloned())
    }
}
