//! HTTP boundary over the real adapters: submit, let the worker run, poll,
//! download and decrypt.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use bulkex_api_http::auth::HmacTokenProvider;
use bulkex_api_http::{router, AppState, TokenProvider};
use bulkex_infra_system::decrypt_bytes;
use common::{Harness, Options, HOUR_MS, ORG, START};
use tower::ServiceExt;

const BASE: &str = "https://bulkex.local";

struct Api {
    state: AppState,
    tokens: Arc<HmacTokenProvider>,
}

impl Api {
    fn new(h: &Harness) -> Self {
        let tokens = Arc::new(HmacTokenProvider::new(b"integration-secret", 3600).unwrap());
        let state = AppState::new(h.export.clone(), h.status.clone(), tokens.clone(), BASE);
        Self { state, tokens }
    }

    async fn get(&self, uri: &str, org_id: &str) -> Response {
        let token = self.tokens.issue("user-1", org_id).unwrap();
        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/fhir+json")
            .header("Prefer", "respond-async")
            .body(Body::empty())
            .unwrap();
        router(self.state.clone()).oneshot(request).await.unwrap()
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

/// Submit, complete, poll the manifest and fetch a file it lists
#[tokio::test]
async fn test_export_round_trip_over_http() {
    let h = Harness::new(Options {
        max_batch_size: 2,
        ..Default::default()
    })
    .await;
    h.attribute(ORG, 3).await;
    let api = Api::new(&h);

    let response = api.get("/api/v1/ExplanationOfBenefit/$export", ORG).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = response.headers()["Content-Location"].to_str().unwrap().to_string();
    assert_eq!(location, "https://bulkex.local/api/v1/jobs/1");
    let status_path = location.trim_start_matches(BASE).to_string();

    let response = api.get(&status_path, ORG).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["X-Progress"], "Pending");

    h.worker.process_next_unit().await.unwrap();
    let response = api.get(&status_path, ORG).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["X-Progress"], "In Progress");

    assert_eq!(h.drain().await, 1);
    let response = api.get(&status_path, ORG).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["Expires"], "Wed, 15 Nov 2023 22:13:20 GMT");
    let manifest: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(manifest["transactionTime"], "2023-11-14T22:13:20.000Z");
    assert_eq!(manifest["requiresAccessToken"], true);
    let outputs = manifest["output"].as_array().unwrap();
    assert_eq!(outputs.len(), 2);

    let url = outputs[0]["url"].as_str().unwrap();
    let file_name = url.rsplit('/').next().unwrap().to_string();
    let wrapped_key = hex::decode(manifest["KeyMap"][&file_name].as_str().unwrap()).unwrap();

    let response = api.get(url.trim_start_matches(BASE), ORG).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ciphertext = body_bytes(response).await;
    let plaintext = decrypt_bytes(&h.private_key, &ciphertext, &wrapped_key, &file_name).unwrap();
    assert!(!plaintext.is_empty());

    // Another organization sees neither the job nor its files
    assert_eq!(api.get(&status_path, "A0002").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        api.get(url.trim_start_matches(BASE), "A0002").await.status(),
        StatusCode::NOT_FOUND
    );
}

/// After the TTL the status is 410 and files are no longer served
#[tokio::test]
async fn test_expired_job_is_gone() {
    let h = Harness::new(Options::default()).await;
    h.attribute(ORG, 1).await;
    let api = Api::new(&h);

    let response = api.get("/api/v1/ExplanationOfBenefit/$export", ORG).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    h.drain().await;

    h.clock.set(START + 24 * HOUR_MS);
    let response = api.get("/api/v1/jobs/1", ORG).await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(response.headers()["Expires"], "Wed, 15 Nov 2023 22:13:20 GMT");

    let response = api.get("/data/1/A0001-0.ndjson", ORG).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Organization without beneficiaries gets a 500 Processing Error
#[tokio::test]
async fn test_submission_without_beneficiaries() {
    let h = Harness::new(Options::default()).await;
    let api = Api::new(&h);

    let response = api.get("/api/v1/ExplanationOfBenefit/$export", ORG).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["issue"][0]["details"]["text"], "Processing Error");
    assert_eq!(h.count("SELECT COUNT(*) FROM jobs").await, 0);
}
