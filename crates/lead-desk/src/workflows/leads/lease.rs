use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::clock::Clock;
use super::domain::{AgentId, Lead, LeadId};
use super::error::LeadWorkflowError;
use super::queue::CandidateQuery;
use super::store::{Conditional, LeadStore, StoreError};

/// Predicate for the compare-and-set lease write:
/// `assigned_agent_id = agent AND (checked_out_by IS NULL OR checked_out_at <= stale_before)`,
/// optionally narrowed by the queue's eligibility rules.
#[derive(Debug, Clone)]
pub struct LeaseClaim {
    pub agent: AgentId,
    pub at: DateTime<Utc>,
    pub stale_before: DateTime<Utc>,
    pub eligibility: Option<CandidateQuery>,
}

impl LeaseClaim {
    pub fn new(agent: AgentId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            agent,
            at: now,
            stale_before: now - ttl,
            eligibility: None,
        }
    }

    /// Claim issued on behalf of the queue; the lead must still be a candidate.
    pub fn for_candidate(query: &CandidateQuery) -> Self {
        Self {
            agent: query.agent.clone(),
            at: query.now,
            stale_before: query.stale_before,
            eligibility: Some(query.clone()),
        }
    }

    pub fn permits(&self, lead: &Lead) -> bool {
        if !lead.is_assigned_to(&self.agent) {
            return false;
        }

        let free = match &lead.lease {
            None => true,
            Some(lease) => lease.checked_out_at <= self.stale_before,
        };

        free && self
            .eligibility
            .as_ref()
            .map_or(true, |query| query.admits(lead))
    }
}

/// Predicate for the release write: the caller holds a lease that has not
/// yet expired. An expired lease reads as no lease at all.
#[derive(Debug, Clone)]
pub struct LeaseRelease {
    pub agent: AgentId,
    pub stale_before: DateTime<Utc>,
}

impl LeaseRelease {
    pub fn new(agent: AgentId, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            agent,
            stale_before: now - ttl,
        }
    }

    pub fn permits(&self, lead: &Lead) -> bool {
        lead.lease.as_ref().is_some_and(|lease| {
            lease.checked_out_by == self.agent && lease.checked_out_at > self.stale_before
        })
    }
}

/// Exclusive, time-bounded checkout of leads by agents.
pub struct LeaseManager<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl<S> LeaseManager<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Lease `lead_id` to `agent`. Re-checkout by the current holder returns
    /// the existing lease untouched; a stale lease is silently reclaimed.
    pub fn checkout(&self, lead_id: LeadId, agent: &AgentId) -> Result<Lead, LeadWorkflowError> {
        let now = self.clock.now();
        let claim = LeaseClaim::new(agent.clone(), now, self.ttl);

        match self.store.acquire_lease(lead_id, &claim)? {
            Conditional::Applied(lead) => {
                info!(%lead_id, agent_id = %agent, "lead checked out");
                Ok(lead)
            }
            Conditional::Rejected(lead) => self.classify_rejection(lead, agent, now),
            Conditional::Missing => Err(LeadWorkflowError::NotFound(lead_id)),
        }
    }

    /// Try to lease a queue candidate. `Ok(None)` means another request got
    /// there first or the lead stopped being eligible.
    pub(crate) fn claim_candidate(
        &self,
        lead_id: LeadId,
        query: &CandidateQuery,
    ) -> Result<Option<Lead>, StoreError> {
        let claim = LeaseClaim::for_candidate(query);
        match self.store.acquire_lease(lead_id, &claim)? {
            Conditional::Applied(lead) => {
                info!(%lead_id, agent_id = %query.agent, "queue lead checked out");
                Ok(Some(lead))
            }
            Conditional::Rejected(_) | Conditional::Missing => {
                debug!(%lead_id, agent_id = %query.agent, "queue candidate lost to a concurrent claim");
                Ok(None)
            }
        }
    }

    /// Clear the lease; only the holder of a live lease may release. A lease
    /// past its TTL counts as absent and yields `NotLeased`.
    pub fn release(&self, lead_id: LeadId, agent: &AgentId) -> Result<Lead, LeadWorkflowError> {
        let guard = LeaseRelease::new(agent.clone(), self.clock.now(), self.ttl);

        match self.store.release_lease(lead_id, &guard)? {
            Conditional::Applied(lead) => {
                info!(%lead_id, agent_id = %agent, "lead released");
                Ok(lead)
            }
            Conditional::Rejected(lead) => {
                let live = lead
                    .lease
                    .filter(|lease| lease.checked_out_at > guard.stale_before);
                match live {
                    Some(lease) if &lease.checked_out_by != agent => {
                        Err(LeadWorkflowError::WrongHolder {
                            lead: lead_id,
                            agent: agent.clone(),
                            holder: lease.checked_out_by,
                        })
                    }
                    Some(_) => Err(StoreError::Conflict(format!(
                        "release of {lead_id} rejected while the caller held the lease"
                    ))
                    .into()),
                    None => Err(LeadWorkflowError::NotLeased {
                        lead: lead_id,
                        agent: agent.clone(),
                    }),
                }
            }
            Conditional::Missing => Err(LeadWorkflowError::NotFound(lead_id)),
        }
    }

    fn classify_rejection(
        &self,
        lead: Lead,
        agent: &AgentId,
        now: DateTime<Utc>,
    ) -> Result<Lead, LeadWorkflowError> {
        if !lead.is_assigned_to(agent) {
            return Err(LeadWorkflowError::NotAssigned {
                lead: lead.id,
                agent: agent.clone(),
            });
        }

        let Some(lease) = lead.lease.as_ref().filter(|lease| lease.is_active(now, self.ttl)) else {
            return Err(StoreError::Conflict(format!(
                "lease write for {} rejected while the lead looked available",
                lead.id
            ))
            .into());
        };

        if &lease.checked_out_by == agent {
            debug!(lead_id = %lead.id, agent_id = %agent, "lead already checked out by caller");
            return Ok(lead);
        }

        info!(
            lead_id = %lead.id,
            agent_id = %agent,
            holder = %lease.checked_out_by,
            "lead checkout collided with an active lease"
        );
        Err(LeadWorkflowError::AlreadyLeased {
            lead: lead.id,
            holder: lease.checked_out_by.clone(),
            expires_at: lease.expires_at(self.ttl),
        })
    }
}
