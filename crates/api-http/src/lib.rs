//! HTTP API Layer
//!
//! Axum boundary for Bulkex: export submission, job status polling and
//! download of published files. Every failure leaves as an OperationOutcome.

pub mod auth;
pub mod error;
pub mod handler;
pub mod server;

pub use auth::{AuthConfig, AuthProvider, Claims, TokenError, TokenProvider};
pub use error::ApiError;
pub use server::{router, AppState, HttpServer, HttpServerConfig};
