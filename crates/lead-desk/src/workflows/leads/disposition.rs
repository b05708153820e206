use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clock::Clock;
use super::domain::{AgentId, Lead, LeadDispositionHistory, LeadId, LeadStatus};
use super::error::LeadWorkflowError;
use super::store::{Conditional, LeadStore};

const MAX_NOTES_LEN: usize = 4000;

/// Agent-supplied outcome of working a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionRequest {
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub callback_at: Option<DateTime<Utc>>,
}

/// Validated disposition, ready to be applied under the store's row lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionChange {
    pub agent: AgentId,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub callback_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
    pub stale_before: DateTime<Utc>,
}

impl DispositionChange {
    /// Guard: the agent holds a live lease and the lead is not terminal.
    pub fn permits(&self, lead: &Lead) -> bool {
        self.holds_lease(lead) && !lead.current_status.is_terminal()
    }

    fn holds_lease(&self, lead: &Lead) -> bool {
        lead.lease.as_ref().is_some_and(|lease| {
            lease.checked_out_by == self.agent && lease.checked_out_at > self.stale_before
        })
    }

    /// Mutate the row and produce its history entry. Store implementations call
    /// this only after `permits` returned true, inside the same atomic unit.
    pub fn apply_to(&self, lead: &mut Lead) -> LeadDispositionHistory {
        let previous_status = lead.current_status;

        lead.current_status = self.status;
        lead.last_disposition_at = Some(self.at);
        lead.last_disposition_by = Some(self.agent.clone());
        lead.times_contacted = lead.times_contacted.saturating_add(1);
        lead.last_contact_attempt_at = Some(self.at);
        // A callback time only means something while the lead sits in CALLBACK.
        lead.callback_at = self.callback_at;
        if self.status == LeadStatus::DoNotCall {
            lead.do_not_call = true;
        }
        lead.lease = None;

        LeadDispositionHistory {
            lead_id: lead.id,
            agent_id: self.agent.clone(),
            previous_status,
            status: self.status,
            notes: self.notes.clone(),
            callback_at: self.callback_at,
            recorded_at: self.at,
        }
    }
}

/// Validates and applies status transitions.
pub struct DispositionMachine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    lease_ttl: Duration,
}

impl<S> DispositionMachine<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, lease_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            lease_ttl,
        }
    }

    /// Record the agent's outcome. Status update, history row and lease
    /// release land together or not at all.
    pub fn dispose(
        &self,
        lead_id: LeadId,
        agent: &AgentId,
        request: DispositionRequest,
    ) -> Result<Lead, LeadWorkflowError> {
        let now = self.clock.now();
        let change = self.prepare(agent, request, now)?;

        match self.store.commit_disposition(lead_id, &change)? {
            Conditional::Applied(lead) => {
                info!(
                    %lead_id,
                    agent_id = %agent,
                    to = %change.status,
                    times_contacted = lead.times_contacted,
                    "disposition applied"
                );
                Ok(lead)
            }
            Conditional::Rejected(lead) => Err(classify_rejection(&change, &lead)),
            Conditional::Missing => Err(LeadWorkflowError::NotFound(lead_id)),
        }
    }

    fn prepare(
        &self,
        agent: &AgentId,
        request: DispositionRequest,
        now: DateTime<Utc>,
    ) -> Result<DispositionChange, LeadWorkflowError> {
        let DispositionRequest {
            status,
            notes,
            callback_at,
        } = request;

        if status == LeadStatus::New {
            return Err(LeadWorkflowError::ValidationFailed(
                "NEW is the initial status and cannot be a disposition".to_string(),
            ));
        }

        let callback_at = match (status, callback_at) {
            (LeadStatus::Callback, Some(at)) if at > now => Some(at),
            (LeadStatus::Callback, Some(at)) => {
                return Err(LeadWorkflowError::ValidationFailed(format!(
                    "callback_at {at} is not in the future"
                )))
            }
            (LeadStatus::Callback, None) => {
                return Err(LeadWorkflowError::ValidationFailed(
                    "CALLBACK requires a callback_at timestamp".to_string(),
                ))
            }
            (_, Some(_)) => {
                return Err(LeadWorkflowError::ValidationFailed(format!(
                    "callback_at is only accepted with CALLBACK, not {status}"
                )))
            }
            (_, None) => None,
        };

        let notes = notes
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if notes
            .as_ref()
            .is_some_and(|text| text.chars().count() > MAX_NOTES_LEN)
        {
            return Err(LeadWorkflowError::ValidationFailed(format!(
                "notes exceed {MAX_NOTES_LEN} characters"
            )));
        }

        Ok(DispositionChange {
            agent: agent.clone(),
            status,
            notes,
            callback_at,
            at: now,
            stale_before: now - self.lease_ttl,
        })
    }
}

fn classify_rejection(change: &DispositionChange, lead: &Lead) -> LeadWorkflowError {
    if !change.holds_lease(lead) {
        return LeadWorkflowError::NotLeased {
            lead: lead.id,
            agent: change.agent.clone(),
        };
    }

    LeadWorkflowError::InvalidTransition {
        lead: lead.id,
        from: lead.current_status,
        to: change.status,
    }
}
