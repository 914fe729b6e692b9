//! Route handlers
//!
//! Thin adapters: check headers and the bearer token, call the application
//! service, shape the HTTP response.

use axum::extract::{Path, State};
use axum::http::header::{ACCEPT, CONTENT_LOCATION, CONTENT_TYPE, EXPIRES};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bulkex_core::application::{ExportRequest, StatusReport};
use bulkex_core::domain::{IssueType, OperationOutcome};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tracing::info;

use crate::auth::Authenticated;
use crate::error::{category, outcome_response, ApiError, FHIR_JSON};
use crate::server::AppState;

const PREFER: HeaderName = HeaderName::from_static("prefer");
const X_PROGRESS: HeaderName = HeaderName::from_static("x-progress");
const RESPOND_ASYNC: &str = "respond-async";
const FHIR_NDJSON: &str = "application/fhir+ndjson";

/// `GET /api/v1/{resource_type}/$export`
pub async fn bulk_export(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(resource_type): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_bulk_headers(&headers)?;

    let request_url = format!("{}/api/v1/{}/$export", state.public_base_url, resource_type);
    let job = state
        .export
        .submit(ExportRequest {
            org_id: claims.aco,
            user_id: claims.sub,
            request_url,
        })
        .await?;

    let location = format!("{}/api/v1/jobs/{}", state.public_base_url, job.id);
    info!(job_id = %job.id, location = %location, "Export accepted");

    let location = HeaderValue::from_str(&location)
        .map_err(|e| ApiError::internal(category::INTERNAL_ERROR, e.to_string()))?;
    Ok((StatusCode::ACCEPTED, [(CONTENT_LOCATION, location)]).into_response())
}

/// `GET /api/v1/jobs/{job_id}`
pub async fn job_status(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let report = state.status.status(&job_id, &claims.aco).await?;
    let expires = report.expires_at().and_then(http_date);

    let mut response = match report {
        StatusReport::Accepted { status } => (
            StatusCode::ACCEPTED,
            [(X_PROGRESS, HeaderValue::from_static(status.as_str()))],
        )
            .into_response(),
        StatusReport::Failed => outcome_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &OperationOutcome::error(
                IssueType::Exception,
                category::JOB_FAILED,
                Some("Service encountered numerous errors, unable to complete the request".to_string()),
            ),
        ),
        StatusReport::Completed { manifest, .. } => {
            (StatusCode::OK, Json(manifest)).into_response()
        }
        StatusReport::Gone { .. } => outcome_response(
            StatusCode::GONE,
            &OperationOutcome::error(
                IssueType::NotFound,
                category::NOT_FOUND,
                Some(format!("Job {} has expired", job_id.trim())),
            ),
        ),
    };

    if let Some(expires) = expires.and_then(|v| HeaderValue::from_str(&v).ok()) {
        response.headers_mut().insert(EXPIRES, expires);
    }
    Ok(response)
}

/// `GET /data/{job_id}/{file_name}`
pub async fn serve_data(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path((job_id, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let body = state
        .status
        .read_file(&job_id, &claims.aco, &file_name)
        .await?;
    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(FHIR_NDJSON))],
        body,
    )
        .into_response())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": bulkex_core::VERSION }))
}

fn validate_bulk_headers(headers: &HeaderMap) -> Result<(), ApiError> {
    match header_str(headers, &ACCEPT) {
        None => return Err(ApiError::bad_request("Accept header is required")),
        Some(v) if v != FHIR_JSON => {
            return Err(ApiError::bad_request(
                "application/fhir+json is the only supported response format",
            ))
        }
        Some(_) => {}
    }
    match header_str(headers, &PREFER) {
        None => Err(ApiError::bad_request("Prefer header is required")),
        Some(v) if v != RESPOND_ASYNC => Err(ApiError::bad_request(
            "Only asynchronous responses are supported",
        )),
        Some(_) => Ok(()),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// RFC 7231 HTTP-date for an epoch-millis instant
pub fn http_date(epoch_millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}
