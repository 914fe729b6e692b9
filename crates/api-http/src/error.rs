//! API Error Types
//!
//! Maps application errors to HTTP status codes and OperationOutcome bodies.
//! Clients see a coarse category plus a short diagnostic, internal detail
//! stays in the logs.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bulkex_core::domain::{IssueType, OperationOutcome};
use bulkex_core::error::AppError;
use tracing::error;

use crate::auth::TokenError;

pub const FHIR_JSON: &str = "application/fhir+json";

/// Diagnostic categories carried in the outcome coding
pub mod category {
    pub const FORMAT_ERROR: &str = "Format Error";
    pub const TOKEN_ERROR: &str = "Invalid Token";
    pub const NOT_FOUND: &str = "Not Found";
    pub const DATABASE_ERROR: &str = "Database Error";
    pub const PROCESSING_ERROR: &str = "Processing Error";
    pub const QUEUE_ERROR: &str = "Queue Error";
    pub const JOB_FAILED: &str = "Job Failed";
    pub const INTERNAL_ERROR: &str = "Internal Error";
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal {
        category: &'static str,
        diagnostics: String,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn internal(category: &'static str, diagnostics: impl Into<String>) -> Self {
        ApiError::Internal {
            category,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        match self {
            ApiError::BadRequest(msg) => {
                OperationOutcome::error(IssueType::Invalid, category::FORMAT_ERROR, Some(msg.clone()))
            }
            ApiError::Unauthorized(msg) => {
                OperationOutcome::error(IssueType::Security, category::TOKEN_ERROR, Some(msg.clone()))
            }
            ApiError::NotFound(msg) => {
                OperationOutcome::error(IssueType::NotFound, category::NOT_FOUND, Some(msg.clone()))
            }
            ApiError::Internal {
                category,
                diagnostics,
            } => OperationOutcome::error(IssueType::Exception, category, Some(diagnostics.clone())),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            AppError::Domain(e) => ApiError::BadRequest(e.to_string()),
            AppError::NotFound(msg) => ApiError::NotFound(msg),
            AppError::PopulationResolution(msg) => {
                ApiError::internal(category::PROCESSING_ERROR, msg)
            }
            AppError::Dispatch(msg) => {
                error!(error = %msg, "Queue unavailable");
                ApiError::internal(category::QUEUE_ERROR, "unable to queue export job")
            }
            AppError::Lookup(msg) => {
                error!(error = %msg, "Job lookup failed");
                ApiError::internal(category::DATABASE_ERROR, "unable to resolve job")
            }
            AppError::Database(msg) => {
                error!(error = %msg, "Database failure");
                ApiError::internal(category::DATABASE_ERROR, "database unavailable")
            }
            other => {
                error!(error = %other, "Unhandled application error");
                ApiError::internal(category::INTERNAL_ERROR, "request could not be completed")
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Serialize an outcome as a FHIR JSON response
pub fn outcome_response(status: StatusCode, outcome: &OperationOutcome) -> Response {
    let body = serde_json::to_vec(outcome).unwrap_or_else(|_| b"{}".to_vec());
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON))],
        body,
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        outcome_response(self.status_code(), &self.to_operation_outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_of(err: &ApiError) -> String {
        err.to_operation_outcome().issue[0].details.text.clone()
    }

    #[test]
    fn test_population_failure_is_processing_error() {
        let err = ApiError::from(AppError::PopulationResolution(
            "no beneficiaries found for organization A0001".to_string(),
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(category_of(&err), category::PROCESSING_ERROR);
        assert_eq!(
            err.to_operation_outcome().issue[0].diagnostics.as_deref(),
            Some("no beneficiaries found for organization A0001")
        );
    }

    #[test]
    fn test_dispatch_failure_is_queue_error() {
        let err = ApiError::from(AppError::Dispatch("connection refused".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(category_of(&err), category::QUEUE_ERROR);
    }

    #[test]
    fn test_lookup_failure_is_database_error() {
        let err = ApiError::from(AppError::Lookup("job 9 not found".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(category_of(&err), category::DATABASE_ERROR);
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(
            ApiError::from(AppError::Validation("bad".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AppError::NotFound("gone".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(TokenError::Missing).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_response_is_fhir_json() {
        let response = ApiError::bad_request("Accept header is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], FHIR_JSON);
    }
}
