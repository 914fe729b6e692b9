// HTTP FHIR DataSource

use async_trait::async_trait;
use bulkex_core::domain::{JobId, ResourceType};
use bulkex_core::port::{DataSource, FetchError};
use std::time::Duration;
use tracing::debug;

/// Header carrying the export job id to the upstream service
pub const JOB_ID_HEADER: &str = "X-Bulkex-Job-Id";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(
        &self,
        resource_type: ResourceType,
        member_id: &str,
        job_id: JobId,
    ) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}/{}/", self.base_url, resource_type.as_str());
        let response = self
            .client
            .get(&url)
            .query(&[("patient", member_id)])
            .header(JOB_ID_HEADER, job_id.to_string())
            .header(reqwest::header::ACCEPT, "application/fhir+json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(job_id = %job_id, resource_type = %resource_type, "Fetched resource");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn patient(
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        let member = params.get("patient").cloned().unwrap_or_default();
        if member == "missing" {
            return Err(StatusCode::NOT_FOUND);
        }
        let job = headers
            .get(JOB_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(Json(json!({ "resourceType": "Patient", "id": member, "job": job })))
    }

    async fn serve() -> String {
        let app = Router::new().route("/Patient/", get(patient));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_passes_member_and_job() {
        let source = HttpDataSource::new(serve().await).unwrap();

        let body = source.fetch(ResourceType::Patient, "10000", 42).await.unwrap();

        assert_eq!(body["id"], "10000");
        assert_eq!(body["job"], "42");
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let source = HttpDataSource::new(serve().await).unwrap();

        let err = source.fetch(ResourceType::Patient, "missing", 1).await.unwrap_err();

        assert_eq!(err, FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let source = HttpDataSource::new("http://127.0.0.1:1").unwrap();

        let err = source.fetch(ResourceType::Patient, "1", 1).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }
}
