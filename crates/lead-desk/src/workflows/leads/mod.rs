//! Lead workflow engine: exclusive checkout of leads by agents, the
//! disposition state machine, next-lead queue selection, and batch import.
//!
//! Every state-changing operation is a single conditional write against the
//! [`LeadStore`]; races between agents are settled by the store's predicate
//! evaluation, never by read-then-write in this crate.

pub mod clock;
pub mod conversion;
pub mod disposition;
pub mod domain;
pub mod error;
pub mod import;
pub mod lease;
pub mod memory;
pub mod queue;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conversion::{ConversionError, ConversionRecorder};
pub use disposition::{DispositionChange, DispositionMachine, DispositionRequest};
pub use domain::{
    AgentId, BatchSummary, ContactDetails, ImportBatchId, Lead, LeadDispositionHistory, LeadId,
    LeadImportBatch, LeadSource, LeadStatus, LeadToSaleLink, Lease, NewLead, PlanDetails,
    RowFailure, SaleId,
};
pub use error::LeadWorkflowError;
pub use import::{
    parse_rows, render_error_report, ImportError, ImportOutcome, ImportRequest, LeadImporter,
    RawLeadRow,
};
pub use lease::{LeaseClaim, LeaseManager, LeaseRelease};
pub use memory::InMemoryLeadStore;
pub use queue::{CandidateQuery, LeadStats, NextLead, QueueOptions, QueuePolicy};
pub use router::lead_router;
pub use service::{AssignmentReport, LeadWorkflowService, ManualLeadRequest, SkippedAssignment};
pub use store::{Conditional, LeadStore, StoreError};
