use chrono::{DateTime, NaiveDateTime, Utc};
use lead_desk::config::LeadWorkflowConfig;
use lead_desk::workflows::leads::{Clock, InMemoryLeadStore, LeadWorkflowService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LeadService = LeadWorkflowService<InMemoryLeadStore>;

/// Service over a fresh in-memory store.
pub(crate) fn in_memory_service(config: LeadWorkflowConfig) -> Arc<LeadService> {
    Arc::new(LeadWorkflowService::new(
        Arc::new(InMemoryLeadStore::new()),
        config,
    ))
}

pub(crate) fn in_memory_service_with_clock(
    config: LeadWorkflowConfig,
    clock: Arc<dyn Clock>,
) -> Arc<LeadService> {
    Arc::new(LeadWorkflowService::with_clock(
        Arc::new(InMemoryLeadStore::new()),
        clock,
        config,
    ))
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DDTHH:MM` read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("failed to parse '{raw}' as a timestamp ({err})"))
}
