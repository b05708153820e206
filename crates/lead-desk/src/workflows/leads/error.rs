use chrono::{DateTime, Utc};

use super::domain::{AgentId, LeadId, LeadStatus};
use super::store::StoreError;

/// Failures surfaced by checkout, release, disposition, and selection.
///
/// Lease and state-machine violations are expected contention; callers get
/// them as typed values and decide whether to poll.
#[derive(Debug, thiserror::Error)]
pub enum LeadWorkflowError {
    #[error("lead {0} not found")]
    NotFound(LeadId),
    #[error("lead {lead} is not assigned to agent {agent}")]
    NotAssigned { lead: LeadId, agent: AgentId },
    #[error("lead {lead} is not checked out by agent {agent}")]
    NotLeased { lead: LeadId, agent: AgentId },
    #[error("lead {lead} is checked out by {holder}, not {agent}")]
    WrongHolder {
        lead: LeadId,
        agent: AgentId,
        holder: AgentId,
    },
    #[error("lead {lead} is already checked out by {holder} until {expires_at}")]
    AlreadyLeased {
        lead: LeadId,
        holder: AgentId,
        expires_at: DateTime<Utc>,
    },
    #[error("lead {lead} cannot move from {from} to {to}")]
    InvalidTransition {
        lead: LeadId,
        from: LeadStatus,
        to: LeadStatus,
    },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeadWorkflowError {
    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotAssigned { .. } => "not_assigned",
            Self::NotLeased { .. } => "not_leased",
            Self::WrongHolder { .. } => "wrong_holder",
            Self::AlreadyLeased { .. } => "already_leased",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Store(_) => "store_unavailable",
        }
    }

    /// True for lease and state-machine contention rather than faults.
    pub const fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::AlreadyLeased { .. } | Self::InvalidTransition { .. }
        )
    }
}
