use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::conversion::ConversionError;
use super::disposition::DispositionRequest;
use super::domain::{AgentId, ImportBatchId, LeadId, LeadStatus, SaleId};
use super::error::LeadWorkflowError;
use super::import::{ImportError, ImportRequest};
use super::queue::QueueOptions;
use super::service::{LeadWorkflowService, ManualLeadRequest};
use super::store::{LeadStore, StoreError};

#[derive(Debug, Deserialize)]
pub(crate) struct AgentPayload {
    pub agent_id: AgentId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DispositionPayload {
    pub agent_id: AgentId,
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub callback_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentPayload {
    pub agent_id: AgentId,
    pub lead_ids: Vec<LeadId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversionPayload {
    pub sale_id: SaleId,
    pub converted_by: AgentId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportPayload {
    pub filename: String,
    pub imported_by: AgentId,
    #[serde(default)]
    pub assign_to: Option<AgentId>,
    pub csv: String,
}

/// Router exposing checkout, disposition, queue, import and conversion endpoints.
pub fn lead_router<S>(service: Arc<LeadWorkflowService<S>>) -> Router
where
    S: LeadStore + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(create_handler::<S>))
        .route("/api/v1/leads/assignments", post(assign_handler::<S>))
        .route("/api/v1/leads/imports", post(import_handler::<S>))
        .route("/api/v1/leads/imports/:batch_id", get(batch_handler::<S>))
        .route(
            "/api/v1/leads/imports/:batch_id/errors",
            get(error_report_handler::<S>),
        )
        .route("/api/v1/leads/:lead_id", get(lead_handler::<S>))
        .route("/api/v1/leads/:lead_id/history", get(history_handler::<S>))
        .route("/api/v1/leads/:lead_id/checkout", post(checkout_handler::<S>))
        .route("/api/v1/leads/:lead_id/release", post(release_handler::<S>))
        .route(
            "/api/v1/leads/:lead_id/disposition",
            post(disposition_handler::<S>),
        )
        .route(
            "/api/v1/leads/:lead_id/conversion",
            post(conversion_handler::<S>),
        )
        .route(
            "/api/v1/agents/:agent_id/next-lead",
            post(next_lead_handler::<S>),
        )
        .route(
            "/api/v1/agents/:agent_id/lead-stats",
            get(stats_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Json(request): Json<ManualLeadRequest>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.create_lead(request) {
        Ok(lead) => (StatusCode::CREATED, Json(lead)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn lead_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.get_lead(LeadId(lead_id)) {
        Ok(lead) => (StatusCode::OK, Json(lead)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn history_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.lead_history(LeadId(lead_id)) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn checkout_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
    Json(payload): Json<AgentPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.checkout_lead(LeadId(lead_id), &payload.agent_id) {
        Ok(lead) => (StatusCode::OK, Json(lead)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn release_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
    Json(payload): Json<AgentPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.release_lead(LeadId(lead_id), &payload.agent_id) {
        Ok(released) => (StatusCode::OK, Json(json!({ "released": released }))).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn disposition_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
    Json(payload): Json<DispositionPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    let request = DispositionRequest {
        status: payload.status,
        notes: payload.notes,
        callback_at: payload.callback_at,
    };

    match service.dispose_lead(LeadId(lead_id), &payload.agent_id, request) {
        Ok(lead) => (StatusCode::OK, Json(lead)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn conversion_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(lead_id): Path<u64>,
    Json(payload): Json<ConversionPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.record_conversion(LeadId(lead_id), payload.sale_id, &payload.converted_by) {
        Ok(link) => (StatusCode::CREATED, Json(link)).into_response(),
        Err(error) => conversion_error_response(error),
    }
}

pub(crate) async fn assign_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Json(payload): Json<AssignmentPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.assign_leads(&payload.lead_ids, &payload.agent_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn next_lead_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(agent_id): Path<String>,
    options: Option<Json<QueueOptions>>,
) -> Response
where
    S: LeadStore + 'static,
{
    let options = options.map(|Json(options)| options).unwrap_or_default();
    match service.next_lead(&AgentId(agent_id), options) {
        Ok(next) => (StatusCode::OK, Json(next)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn stats_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: LeadStore + 'static,
{
    match service.lead_stats(&AgentId(agent_id)) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn import_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Json(payload): Json<ImportPayload>,
) -> Response
where
    S: LeadStore + 'static,
{
    let request = ImportRequest {
        filename: payload.filename,
        imported_by: payload.imported_by,
        assign_to: payload.assign_to,
    };

    match service.import_csv(payload.csv.as_bytes(), &request) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(error) => import_error_response(error),
    }
}

pub(crate) async fn batch_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(batch_id): Path<u64>,
) -> Response
where
    S: LeadStore + 'static,
{
    let batch_id = ImportBatchId(batch_id);
    match service.import_batch(batch_id) {
        Ok(Some(batch)) => (StatusCode::OK, Json(batch)).into_response(),
        Ok(None) => batch_not_found(batch_id),
        Err(error) => workflow_error_response(error.into()),
    }
}

pub(crate) async fn error_report_handler<S>(
    State(service): State<Arc<LeadWorkflowService<S>>>,
    Path(batch_id): Path<u64>,
) -> Response
where
    S: LeadStore + 'static,
{
    let batch_id = ImportBatchId(batch_id);
    match service.import_error_report(batch_id) {
        Ok(Some(report)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            report,
        )
            .into_response(),
        Ok(None) => batch_not_found(batch_id),
        Err(error) => import_error_response(error),
    }
}

/// HTTP status for each workflow failure.
pub fn workflow_status(error: &LeadWorkflowError) -> StatusCode {
    match error {
        LeadWorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        LeadWorkflowError::NotAssigned { .. } => StatusCode::FORBIDDEN,
        LeadWorkflowError::NotLeased { .. }
        | LeadWorkflowError::WrongHolder { .. }
        | LeadWorkflowError::AlreadyLeased { .. } => StatusCode::CONFLICT,
        LeadWorkflowError::InvalidTransition { .. } | LeadWorkflowError::ValidationFailed(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LeadWorkflowError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        LeadWorkflowError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        LeadWorkflowError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn workflow_error_response(error: LeadWorkflowError) -> Response {
    let status = workflow_status(&error);
    if status.is_server_error() {
        warn!(error = %error, "lead workflow request failed");
    } else if error.is_contention() {
        info!(code = error.code(), error = %error, "lead workflow contention");
    }
    error_body(status, error.code(), error.to_string())
}

pub(crate) fn import_error_response(error: ImportError) -> Response {
    let status = match &error {
        ImportError::TooManyRows { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ImportError::Csv(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImportError::Aborted { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        warn!(error = %error, "lead import request failed");
    }
    error_body(status, error.code(), error.to_string())
}

pub(crate) fn conversion_error_response(error: ConversionError) -> Response {
    let (status, code) = match &error {
        ConversionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ConversionError::NotSaleMade { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "not_sale_made"),
        ConversionError::AlreadyLinked(_) => (StatusCode::CONFLICT, "already_converted"),
        ConversionError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
    };
    error_body(status, code, error.to_string())
}

fn batch_not_found(batch_id: ImportBatchId) -> Response {
    error_body(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("import {batch_id} not found"),
    )
}

fn error_body(status: StatusCode, code: &str, message: String) -> Response {
    let payload = json!({
        "error": message,
        "code": code,
    });
    (status, Json(payload)).into_response()
}
