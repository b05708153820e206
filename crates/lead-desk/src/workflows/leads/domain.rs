use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned lead identity. Ascending ids double as the queue tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub u64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lead-{:06}", self.0)
    }
}

/// Authenticated agent or admin identity supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportBatchId(pub u64);

impl fmt::Display for ImportBatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{:06}", self.0)
    }
}

/// Identity of a sale materialized outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub String);

/// Disposition states a lead moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    CalledNoAnswer,
    Callback,
    SaleMade,
    Cancelled,
    DoNotCall,
    ConversionFailed,
}

impl LeadStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::New,
            Self::CalledNoAnswer,
            Self::Callback,
            Self::SaleMade,
            Self::Cancelled,
            Self::DoNotCall,
            Self::ConversionFailed,
        ]
    }

    /// Terminal statuses accept no further transitions and never reach the queue.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SaleMade | Self::Cancelled | Self::DoNotCall | Self::ConversionFailed
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::CalledNoAnswer => "CALLED_NO_ANSWER",
            Self::Callback => "CALLBACK",
            Self::SaleMade => "SALE_MADE",
            Self::Cancelled => "CANCELLED",
            Self::DoNotCall => "DO_NOT_CALL",
            Self::ConversionFailed => "CONVERSION_FAILED",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a lead row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Manual,
    Import,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    /// Ten digit NANP number, punctuation stripped.
    pub phone: String,
    /// Lower-cased address.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl ContactDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Plan and pricing snapshot quoted to the customer. Amounts are in cents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    pub total_plan_cost_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_months: Option<u32>,
}

/// Exclusive, time-bounded claim on a lead. Both fields exist together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub checked_out_by: AgentId,
    pub checked_out_at: DateTime<Utc>,
}

impl Lease {
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.checked_out_at + ttl
    }

    /// Expiry is evaluated lazily: a lease at or past its TTL no longer excludes anyone.
    pub fn is_active(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now < self.expires_at(ttl)
    }
}

/// Lead row as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub contact: ContactDetails,
    pub plan: PlanDetails,
    pub source: LeadSource,
    pub current_status: LeadStatus,
    pub do_not_call: bool,
    pub callback_at: Option<DateTime<Utc>>,
    pub times_contacted: u32,
    pub last_contact_attempt_at: Option<DateTime<Utc>>,
    pub last_disposition_at: Option<DateTime<Utc>>,
    pub last_disposition_by: Option<AgentId>,
    pub assigned_agent_id: Option<AgentId>,
    pub lease: Option<Lease>,
    pub import_batch_id: Option<ImportBatchId>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Holder of a lease that is still inside its TTL.
    pub fn active_holder(&self, now: DateTime<Utc>, ttl: Duration) -> Option<&AgentId> {
        self.lease
            .as_ref()
            .filter(|lease| lease.is_active(now, ttl))
            .map(|lease| &lease.checked_out_by)
    }

    pub fn is_assigned_to(&self, agent: &AgentId) -> bool {
        self.assigned_agent_id.as_ref() == Some(agent)
    }

    /// Callback due at or before `now`.
    pub fn callback_due(&self, now: DateTime<Utc>) -> bool {
        self.callback_at.is_some_and(|at| at <= now)
    }
}

/// Insert payload for a lead row; the store assigns id and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub contact: ContactDetails,
    pub plan: PlanDetails,
    pub source: LeadSource,
    pub assigned_agent_id: Option<AgentId>,
    pub import_batch_id: Option<ImportBatchId>,
    pub created_at: DateTime<Utc>,
}

impl NewLead {
    pub fn into_lead(self, id: LeadId) -> Lead {
        Lead {
            id,
            contact: self.contact,
            plan: self.plan,
            source: self.source,
            current_status: LeadStatus::New,
            do_not_call: false,
            callback_at: None,
            times_contacted: 0,
            last_contact_attempt_at: None,
            last_disposition_at: None,
            last_disposition_by: None,
            assigned_agent_id: self.assigned_agent_id,
            lease: None,
            import_batch_id: self.import_batch_id,
            created_at: self.created_at,
        }
    }
}

/// Append-only audit row written with every applied disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDispositionHistory {
    pub lead_id: LeadId,
    pub agent_id: AgentId,
    pub previous_status: LeadStatus,
    pub status: LeadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

/// One rejected import row. `row` is 1-based over data rows (header excluded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub reason: String,
}

/// Summary of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadImportBatch {
    pub id: ImportBatchId,
    pub filename: String,
    pub imported_by: AgentId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<RowFailure>,
    pub error_report_location: Option<String>,
}

impl LeadImportBatch {
    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Counts written once when a batch completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed_at: DateTime<Utc>,
    pub total_rows: usize,
    pub successful_rows: usize,
    pub failed_rows: usize,
    pub errors: Vec<RowFailure>,
    pub error_report_location: Option<String>,
}

/// One-to-one conversion record between a lead and the sale it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadToSaleLink {
    pub lead_id: LeadId,
    pub sale_id: SaleId,
    pub converted_by: AgentId,
    pub converted_at: DateTime<Utc>,
}
