use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::Clock;
use super::domain::{AgentId, Lead, LeadId, LeadStatus};
use super::error::LeadWorkflowError;
use super::lease::LeaseManager;
use super::store::LeadStore;

/// Caller knobs for `next_lead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// When false, leads whose callback is still in the future are skipped.
    #[serde(default = "default_true")]
    pub include_callbacks: bool,
    /// When true, due callbacks jump ahead of everything else.
    #[serde(default = "default_true")]
    pub prioritize_callbacks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            include_callbacks: true,
            prioritize_callbacks: true,
        }
    }
}

/// Selection predicate and ordering for one `next_lead` call. Store
/// implementations evaluate `admits` and sort with `order`, or translate both
/// into their query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub agent: AgentId,
    pub now: DateTime<Utc>,
    pub stale_before: DateTime<Utc>,
    pub options: QueueOptions,
    pub exclude: HashSet<LeadId>,
}

impl CandidateQuery {
    pub fn new(agent: AgentId, now: DateTime<Utc>, ttl: Duration, options: QueueOptions) -> Self {
        Self {
            agent,
            now,
            stale_before: now - ttl,
            options,
            exclude: HashSet::new(),
        }
    }

    pub fn admits(&self, lead: &Lead) -> bool {
        if self.exclude.contains(&lead.id)
            || !lead.is_assigned_to(&self.agent)
            || lead.do_not_call
            || lead.current_status.is_terminal()
        {
            return false;
        }

        if lead
            .lease
            .as_ref()
            .is_some_and(|lease| lease.checked_out_at > self.stale_before)
        {
            return false;
        }

        self.options.include_callbacks || !lead.callback_at.is_some_and(|at| at > self.now)
    }

    /// Due callbacks first by due time (when prioritized), then everything
    /// else oldest first; lead id breaks ties.
    pub fn order(&self, left: &Lead, right: &Lead) -> Ordering {
        self.sort_key(left).cmp(&self.sort_key(right))
    }

    fn sort_key(&self, lead: &Lead) -> (u8, DateTime<Utc>, LeadId) {
        match lead.callback_at {
            Some(due) if self.options.prioritize_callbacks && due <= self.now => (0, due, lead.id),
            _ => (1, lead.created_at, lead.id),
        }
    }
}

/// Outcome of `next_lead`. An empty queue is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "lead", rename_all = "snake_case")]
pub enum NextLead {
    Leased(Lead),
    NoLeadsAvailable,
}

/// Read-only per-agent aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub agent_id: AgentId,
    pub total: usize,
    pub counts_by_status: BTreeMap<LeadStatus, usize>,
    /// CALLBACK leads (not flagged do-not-call) with a scheduled time.
    pub pending_callbacks: usize,
    /// Subset of pending callbacks already due.
    pub due_callbacks: usize,
    pub checked_out: usize,
    pub available: usize,
}

/// Picks the next lead for an agent and leases it in the same step.
pub struct QueuePolicy<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    leases: Arc<LeaseManager<S>>,
    candidate_window: usize,
}

impl<S> QueuePolicy<S>
where
    S: LeadStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        leases: Arc<LeaseManager<S>>,
        candidate_window: usize,
    ) -> Self {
        Self {
            store,
            clock,
            leases,
            candidate_window: candidate_window.max(1),
        }
    }

    /// Each candidate gets one lease attempt and is skipped if another request
    /// wins it. If a whole window is lost that way the selection runs once more
    /// with the lost leads excluded; after that the queue reports empty.
    pub fn next_lead(
        &self,
        agent: &AgentId,
        options: QueueOptions,
    ) -> Result<NextLead, LeadWorkflowError> {
        let now = self.clock.now();
        let mut query = CandidateQuery::new(agent.clone(), now, self.leases.ttl(), options);

        for pass in 0..2 {
            let candidates = self
                .store
                .select_candidates(&query, self.candidate_window)?;
            if candidates.is_empty() {
                break;
            }

            for candidate in candidates {
                if let Some(lead) = self.leases.claim_candidate(candidate.id, &query)? {
                    return Ok(NextLead::Leased(lead));
                }
                query.exclude.insert(candidate.id);
            }

            debug!(agent_id = %agent, pass, "every queue candidate was claimed concurrently");
        }

        debug!(agent_id = %agent, "no leads available");
        Ok(NextLead::NoLeadsAvailable)
    }

    pub fn stats(&self, agent: &AgentId) -> Result<LeadStats, LeadWorkflowError> {
        let now = self.clock.now();
        let ttl = self.leases.ttl();
        let leads = self.store.leads_assigned_to(agent)?;
        let query = CandidateQuery::new(agent.clone(), now, ttl, QueueOptions::default());

        let mut counts_by_status: BTreeMap<LeadStatus, usize> = LeadStatus::ordered()
            .into_iter()
            .map(|status| (status, 0))
            .collect();
        let mut stats = LeadStats {
            agent_id: agent.clone(),
            total: leads.len(),
            counts_by_status: BTreeMap::new(),
            pending_callbacks: 0,
            due_callbacks: 0,
            checked_out: 0,
            available: 0,
        };

        for lead in &leads {
            *counts_by_status.entry(lead.current_status).or_default() += 1;

            if lead.current_status == LeadStatus::Callback
                && !lead.do_not_call
                && lead.callback_at.is_some()
            {
                stats.pending_callbacks += 1;
                if lead.callback_due(now) {
                    stats.due_callbacks += 1;
                }
            }

            if lead.active_holder(now, ttl) == Some(agent) {
                stats.checked_out += 1;
            }

            if query.admits(lead) {
                stats.available += 1;
            }
        }

        stats.counts_by_status = counts_by_status;
        Ok(stats)
    }
}
