use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::{Clock, SystemClock};
use super::conversion::{ConversionError, ConversionRecorder};
use super::disposition::{DispositionMachine, DispositionRequest};
use super::domain::{
    AgentId, ContactDetails, ImportBatchId, Lead, LeadDispositionHistory, LeadId, LeadImportBatch,
    LeadSource, LeadToSaleLink, NewLead, PlanDetails, SaleId,
};
use super::error::LeadWorkflowError;
use super::import::{
    parse_rows, render_error_report, validation, ImportError, ImportOutcome, ImportRequest,
    LeadImporter, RawLeadRow,
};
use super::lease::LeaseManager;
use super::queue::{LeadStats, NextLead, QueueOptions, QueuePolicy};
use super::store::{Conditional, LeadStore, StoreError};
use crate::config::LeadWorkflowConfig;

/// Manual lead entry from the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualLeadRequest {
    pub contact: ContactDetails,
    pub plan: PlanDetails,
    #[serde(default)]
    pub assigned_agent_id: Option<AgentId>,
}

/// Per-lead outcome of a bulk assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentReport {
    pub assigned: Vec<LeadId>,
    pub skipped: Vec<SkippedAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAssignment {
    pub lead_id: LeadId,
    pub reason: String,
}

/// Facade composing lease, disposition, queue, import, and conversion
/// components over one shared store.
pub struct LeadWorkflowService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: LeadWorkflowConfig,
    leases: Arc<LeaseManager<S>>,
    dispositions: DispositionMachine<S>,
    queue: QueuePolicy<S>,
    importer: LeadImporter<S>,
    conversions: ConversionRecorder<S>,
}

impl<S> LeadWorkflowService<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>, config: LeadWorkflowConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>, config: LeadWorkflowConfig) -> Self {
        let leases = Arc::new(LeaseManager::new(
            store.clone(),
            clock.clone(),
            config.lease_ttl,
        ));
        let dispositions = DispositionMachine::new(store.clone(), clock.clone(), config.lease_ttl);
        let queue = QueuePolicy::new(
            store.clone(),
            clock.clone(),
            leases.clone(),
            config.candidate_window,
        );
        let importer = LeadImporter::new(store.clone(), clock.clone(), config.import_chunk_size);
        let conversions = ConversionRecorder::new(store.clone(), clock.clone());

        Self {
            store,
            clock,
            config,
            leases,
            dispositions,
            queue,
            importer,
            conversions,
        }
    }

    pub fn checkout_lead(&self, lead_id: LeadId, agent: &AgentId) -> Result<Lead, LeadWorkflowError> {
        self.leases.checkout(lead_id, agent)
    }

    /// `Ok(true)` when the caller's lease was cleared, `Ok(false)` when the
    /// lead was not leased at all. A lease held by someone else is an error.
    pub fn release_lead(&self, lead_id: LeadId, agent: &AgentId) -> Result<bool, LeadWorkflowError> {
        match self.leases.release(lead_id, agent) {
            Ok(_) => Ok(true),
            Err(LeadWorkflowError::NotLeased { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    pub fn next_lead(
        &self,
        agent: &AgentId,
        options: QueueOptions,
    ) -> Result<NextLead, LeadWorkflowError> {
        self.queue.next_lead(agent, options)
    }

    pub fn dispose_lead(
        &self,
        lead_id: LeadId,
        agent: &AgentId,
        request: DispositionRequest,
    ) -> Result<Lead, LeadWorkflowError> {
        self.dispositions.dispose(lead_id, agent, request)
    }

    pub fn lead_stats(&self, agent: &AgentId) -> Result<LeadStats, LeadWorkflowError> {
        self.queue.stats(agent)
    }

    /// Import already-parsed rows, enforcing the configured row ceiling first.
    pub fn import_leads(
        &self,
        rows: Vec<RawLeadRow>,
        request: &ImportRequest,
    ) -> Result<ImportOutcome, ImportError> {
        let limit = self.config.import_max_rows;
        if rows.len() > limit {
            return Err(ImportError::TooManyRows {
                limit,
                found: rows.len(),
            });
        }

        self.importer.import(rows, request)
    }

    pub fn import_csv<R: Read>(
        &self,
        reader: R,
        request: &ImportRequest,
    ) -> Result<ImportOutcome, ImportError> {
        let rows = parse_rows(reader, self.config.import_max_rows)?;
        self.importer.import(rows, request)
    }

    pub fn import_batch(&self, batch_id: ImportBatchId) -> Result<Option<LeadImportBatch>, StoreError> {
        self.store.fetch_batch(batch_id)
    }

    /// `row,reason` CSV for a batch, `None` when the batch does not exist.
    pub fn import_error_report(
        &self,
        batch_id: ImportBatchId,
    ) -> Result<Option<String>, ImportError> {
        let batch = self
            .store
            .fetch_batch(batch_id)
            .map_err(|source| ImportError::Aborted {
                batch_id: Some(batch_id),
                committed: 0,
                source,
            })?;

        batch.as_ref().map(render_error_report).transpose()
    }

    pub fn create_lead(&self, request: ManualLeadRequest) -> Result<Lead, LeadWorkflowError> {
        let (contact, plan) = validation::validate_manual(request.contact, request.plan)
            .map_err(LeadWorkflowError::ValidationFailed)?;

        let lead = self.store.insert_lead(NewLead {
            contact,
            plan,
            source: LeadSource::Manual,
            assigned_agent_id: request.assigned_agent_id,
            import_batch_id: None,
            created_at: self.clock.now(),
        })?;

        info!(lead_id = %lead.id, "lead created");
        Ok(lead)
    }

    /// Assign leads to an agent. Missing and terminal leads are skipped, not fatal.
    pub fn assign_leads(
        &self,
        lead_ids: &[LeadId],
        agent: &AgentId,
    ) -> Result<AssignmentReport, LeadWorkflowError> {
        let mut report = AssignmentReport::default();

        for &lead_id in lead_ids {
            match self.store.assign_lead(lead_id, agent)? {
                Conditional::Applied(_) => report.assigned.push(lead_id),
                Conditional::Rejected(lead) => report.skipped.push(SkippedAssignment {
                    lead_id,
                    reason: format!("lead is {}", lead.current_status),
                }),
                Conditional::Missing => report.skipped.push(SkippedAssignment {
                    lead_id,
                    reason: "lead not found".to_string(),
                }),
            }
        }

        info!(
            agent_id = %agent,
            assigned = report.assigned.len(),
            skipped = report.skipped.len(),
            "leads assigned"
        );
        Ok(report)
    }

    pub fn get_lead(&self, lead_id: LeadId) -> Result<Lead, LeadWorkflowError> {
        self.store
            .fetch_lead(lead_id)?
            .ok_or(LeadWorkflowError::NotFound(lead_id))
    }

    pub fn lead_history(
        &self,
        lead_id: LeadId,
    ) -> Result<Vec<LeadDispositionHistory>, LeadWorkflowError> {
        if self.store.fetch_lead(lead_id)?.is_none() {
            return Err(LeadWorkflowError::NotFound(lead_id));
        }
        Ok(self.store.history(lead_id)?)
    }

    pub fn record_conversion(
        &self,
        lead_id: LeadId,
        sale_id: SaleId,
        converted_by: &AgentId,
    ) -> Result<LeadToSaleLink, ConversionError> {
        self.conversions.record(lead_id, sale_id, converted_by)
    }

    pub fn conversion_for(&self, lead_id: LeadId) -> Result<Option<LeadToSaleLink>, ConversionError> {
        self.conversions.link_for(lead_id)
    }
}
