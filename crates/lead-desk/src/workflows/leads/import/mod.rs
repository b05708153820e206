//! Bulk lead ingestion with per-row failure isolation.
//!
//! Rows are validated one at a time and buffered into chunked batch inserts,
//! so a bad row never aborts its neighbours and memory stays bounded by the
//! chunk size. Only store failures end the whole import.

mod mapping;
mod normalizer;
mod parser;
pub(crate) mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::domain::{
    AgentId, BatchSummary, ImportBatchId, LeadImportBatch, LeadSource, NewLead, RowFailure,
};
use super::store::{LeadStore, StoreError};

pub use parser::{parse_rows, RawLeadRow};

/// Who is importing what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub filename: String,
    pub imported_by: AgentId,
    /// Optional agent every imported lead is assigned to.
    #[serde(default)]
    pub assign_to: Option<AgentId>,
}

/// Result handed back to the caller once the batch is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub batch_id: ImportBatchId,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_report_location: Option<String>,
    pub failures: Vec<RowFailure>,
}

impl From<LeadImportBatch> for ImportOutcome {
    fn from(batch: LeadImportBatch) -> Self {
        Self {
            batch_id: batch.id,
            total_rows: batch.total_rows,
            successful_rows: batch.successful_rows,
            failed_rows: batch.failed_rows,
            error_report_location: batch.error_report_location,
            failures: batch.errors,
        }
    }
}

/// Whole-import failures. Row-level validation problems never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import has more than {limit} rows (read {found})")]
    TooManyRows { limit: usize, found: usize },
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("import aborted after committing {committed} rows: {source}")]
    Aborted {
        batch_id: Option<ImportBatchId>,
        committed: usize,
        #[source]
        source: StoreError,
    },
}

impl ImportError {
    pub const fn code(&self) -> &'static str {
        match self {
            ImportError::TooManyRows { .. } => "too_many_rows",
            ImportError::Csv(_) => "invalid_csv",
            ImportError::Aborted { .. } => "import_aborted",
        }
    }
}

/// Where the failure report for a batch is served.
pub fn error_report_location(batch_id: ImportBatchId) -> String {
    format!("/api/v1/leads/imports/{}/errors", batch_id.0)
}

/// Render a batch's failures as `row,reason` CSV.
pub fn render_error_report(batch: &LeadImportBatch) -> Result<String, ImportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["row", "reason"])?;
    for failure in &batch.errors {
        writer.write_record([failure.row.to_string(), failure.reason.clone()])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ImportError::Csv(csv::Error::from(err.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Validates rows and commits the good ones under a new import batch.
pub struct LeadImporter<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl<S> LeadImporter<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, chunk_size: usize) -> Self {
        Self {
            store,
            clock,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Import `rows` in order. Failures carry the parsed file record number,
    /// or the 1-based position in `rows` for rows built in memory.
    pub fn import<I>(&self, rows: I, request: &ImportRequest) -> Result<ImportOutcome, ImportError>
    where
        I: IntoIterator<Item = RawLeadRow>,
    {
        let started_at = self.clock.now();
        let batch = self
            .store
            .create_batch(&request.filename, &request.imported_by, started_at)
            .map_err(|source| ImportError::Aborted {
                batch_id: None,
                committed: 0,
                source,
            })?;

        let mut run = BatchRun::new(batch.id, started_at, request.assign_to.clone());
        for (index, raw) in rows.into_iter().enumerate() {
            run.accept(raw.record.unwrap_or(index + 1), &raw);
            if run.pending.len() >= self.chunk_size {
                self.flush(&mut run)?;
            }
        }
        self.flush(&mut run)?;

        let summary = BatchSummary {
            completed_at: self.clock.now(),
            total_rows: run.total,
            successful_rows: run.committed,
            failed_rows: run.failures.len(),
            error_report_location: (!run.failures.is_empty())
                .then(|| error_report_location(batch.id)),
            errors: run.failures,
        };
        let finalized = self
            .store
            .finalize_batch(batch.id, summary)
            .map_err(|source| {
                warn!(batch_id = %batch.id, error = %source, "failed to finalize import batch");
                ImportError::Aborted {
                    batch_id: Some(batch.id),
                    committed: run.committed,
                    source,
                }
            })?;

        info!(
            batch_id = %finalized.id,
            filename = %finalized.filename,
            imported_by = %finalized.imported_by,
            total = finalized.total_rows,
            successful = finalized.successful_rows,
            failed = finalized.failed_rows,
            "lead import finalized"
        );
        Ok(finalized.into())
    }

    fn flush(&self, run: &mut BatchRun) -> Result<(), ImportError> {
        if run.pending.is_empty() {
            return Ok(());
        }

        let chunk = std::mem::take(&mut run.pending);
        let size = chunk.len();
        self.store.insert_leads(chunk).map_err(|source| {
            warn!(batch_id = %run.batch_id, committed = run.committed, error = %source, "lead import aborted");
            ImportError::Aborted {
                batch_id: Some(run.batch_id),
                committed: run.committed,
                source,
            }
        })?;
        run.committed += size;
        Ok(())
    }
}

/// Running state of one import.
struct BatchRun {
    batch_id: ImportBatchId,
    created_at: DateTime<Utc>,
    assign_to: Option<AgentId>,
    total: usize,
    committed: usize,
    seen: HashMap<(String, String), usize>,
    pending: Vec<NewLead>,
    failures: Vec<RowFailure>,
}

impl BatchRun {
    fn new(batch_id: ImportBatchId, created_at: DateTime<Utc>, assign_to: Option<AgentId>) -> Self {
        Self {
            batch_id,
            created_at,
            assign_to,
            total: 0,
            committed: 0,
            seen: HashMap::new(),
            pending: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn accept(&mut self, row: usize, raw: &RawLeadRow) {
        self.total += 1;

        let lead = match validation::validate_row(raw) {
            Ok(lead) => lead,
            Err(reason) => return self.reject(row, reason),
        };

        if let Some(first) = self.seen.get(&lead.dedupe_key()) {
            let reason = format!("duplicate phone/email combination (first seen on row {first})");
            return self.reject(row, reason);
        }
        self.seen.insert(lead.dedupe_key(), row);

        self.pending.push(NewLead {
            contact: lead.contact,
            plan: lead.plan,
            source: LeadSource::Import,
            assigned_agent_id: self.assign_to.clone(),
            import_batch_id: Some(self.batch_id),
            created_at: self.created_at,
        });
    }

    fn reject(&mut self, row: usize, reason: String) {
        debug!(batch_id = %self.batch_id, row, %reason, "import row rejected");
        self.failures.push(RowFailure { row, reason });
    }
}
