use chrono::{DateTime, Utc};

use super::disposition::DispositionChange;
use super::domain::{
    AgentId, BatchSummary, ImportBatchId, Lead, LeadDispositionHistory, LeadId, LeadImportBatch,
    LeadToSaleLink, NewLead,
};
use super::lease::{LeaseClaim, LeaseRelease};
use super::queue::CandidateQuery;

/// Persistence contract for lead rows, history, batches, and sale links.
///
/// Lease, disposition and assignment writes are conditional updates
/// ("update where id = ? and <predicate>"). Implementations must evaluate the
/// predicate and apply the write as one atomic step per lead, and on rejection
/// hand back the row exactly as the predicate saw it so callers can classify
/// the failure without a second read.
pub trait LeadStore: Send + Sync {
    fn insert_lead(&self, lead: NewLead) -> Result<Lead, StoreError>;

    /// Batch insert used by the import pipeline; returns ids in input order.
    fn insert_leads(&self, leads: Vec<NewLead>) -> Result<Vec<LeadId>, StoreError>;

    fn fetch_lead(&self, id: LeadId) -> Result<Option<Lead>, StoreError>;

    /// Set both lease fields when `claim.permits(lead)` holds.
    fn acquire_lease(&self, id: LeadId, claim: &LeaseClaim) -> Result<Conditional, StoreError>;

    /// Clear both lease fields, guarded by `release.permits(lead)`.
    fn release_lease(&self, id: LeadId, release: &LeaseRelease) -> Result<Conditional, StoreError>;

    /// Apply a disposition, append its history row, and drop the lease in
    /// one transaction, guarded by `change.permits(lead)`.
    fn commit_disposition(
        &self,
        id: LeadId,
        change: &DispositionChange,
    ) -> Result<Conditional, StoreError>;

    /// Point a non-terminal lead at `agent`. Lease fields are left alone.
    fn assign_lead(&self, id: LeadId, agent: &AgentId) -> Result<Conditional, StoreError>;

    /// Leads admitted by `query`, in the query's order, at most `limit`.
    fn select_candidates(
        &self,
        query: &CandidateQuery,
        limit: usize,
    ) -> Result<Vec<Lead>, StoreError>;

    fn leads_assigned_to(&self, agent: &AgentId) -> Result<Vec<Lead>, StoreError>;

    /// History rows for one lead, oldest first.
    fn history(&self, id: LeadId) -> Result<Vec<LeadDispositionHistory>, StoreError>;

    fn create_batch(
        &self,
        filename: &str,
        imported_by: &AgentId,
        started_at: DateTime<Utc>,
    ) -> Result<LeadImportBatch, StoreError>;

    /// Write final counts once; a second finalize is a `Conflict`.
    fn finalize_batch(
        &self,
        id: ImportBatchId,
        summary: BatchSummary,
    ) -> Result<LeadImportBatch, StoreError>;

    fn fetch_batch(&self, id: ImportBatchId) -> Result<Option<LeadImportBatch>, StoreError>;

    /// Insert a conversion link; `Conflict` if the lead or the sale is already linked.
    fn insert_sale_link(&self, link: LeadToSaleLink) -> Result<LeadToSaleLink, StoreError>;

    fn sale_link(&self, id: LeadId) -> Result<Option<LeadToSaleLink>, StoreError>;
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    /// Predicate held; carries the row after the write.
    Applied(Lead),
    /// Predicate failed; carries the untouched row.
    Rejected(Lead),
    Missing,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
