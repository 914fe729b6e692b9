//! HTTP Server
//!
//! Router assembly and the listener loop. The server stops on the shared
//! shutdown token and drains in-flight requests.

use axum::routing::get;
use axum::Router;
use bulkex_core::application::{ExportService, JobStatusService, ShutdownToken};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenProvider;
use crate::handler;

const DEFAULT_HTTP_HOST: &str = "0.0.0.0";
const DEFAULT_HTTP_PORT: u16 = 3000;

/// Shared handler dependencies
#[derive(Clone)]
pub struct AppState {
    pub export: Arc<ExportService>,
    pub status: Arc<JobStatusService>,
    pub tokens: Arc<dyn TokenProvider>,
    /// Scheme and authority clients use to reach this API
    pub public_base_url: Arc<str>,
}

impl AppState {
    pub fn new(
        export: Arc<ExportService>,
        status: Arc<JobStatusService>,
        tokens: Arc<dyn TokenProvider>,
        public_base_url: &str,
    ) -> Self {
        Self {
            export,
            status,
            tokens,
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/{resource_type}/$export", get(handler::bulk_export))
        .route("/api/v1/jobs/{job_id}", get(handler::job_status))
        .route("/data/{job_id}/{file_name}", get(handler::serve_data))
        .route("/_health", get(handler::health))
        .route("/_version", get(handler::version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

pub struct HttpServer {
    config: HttpServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until `shutdown` fires
    pub async fn serve(self, mut shutdown: ShutdownToken) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            "HTTP server listening"
        );

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
