use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::leads::router::{
    conversion_error_response, import_error_response, workflow_error_response,
};
use crate::workflows::leads::{ConversionError, ImportError, LeadWorkflowError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Workflow(LeadWorkflowError),
    Import(ImportError),
    Conversion(ConversionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Workflow(err) => write!(f, "lead workflow error: {}", err),
            AppError::Import(err) => write!(f, "lead import error: {}", err),
            AppError::Conversion(err) => write!(f, "conversion error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Conversion(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Workflow(err) => workflow_error_response(err),
            AppError::Import(err) => import_error_response(err),
            AppError::Conversion(err) => conversion_error_response(err),
            other => {
                let body = Json(json!({ "error": other.to_string(), "code": "internal" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<LeadWorkflowError> for AppError {
    fn from(value: LeadWorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<ConversionError> for AppError {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::leads::LeadId;

    #[test]
    fn workflow_errors_keep_their_http_mapping() {
        let response = AppError::from(LeadWorkflowError::NotFound(LeadId(7))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(ImportError::TooManyRows {
            limit: 10,
            found: 11,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let response = AppError::from(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
