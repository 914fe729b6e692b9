// Data Source Port
// Clinical data retrieval for one member; implemented outside the core.

use crate::domain::{JobId, ResourceType};
use async_trait::async_trait;
use thiserror::Error;

/// Per-member retrieval failure. Recorded in the unit's error file, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(
        &self,
        resource_type: ResourceType,
        member_id: &str,
        job_id: JobId,
    ) -> std::result::Result<serde_json::Value, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a minimal resource per member, except for members marked as failing
    #[derive(Default)]
    pub struct MockDataSource {
        failing: Mutex<HashSet<String>>,
        calls: AtomicUsize,
    }

    impl MockDataSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_for(members: &[&str]) -> Self {
            let source = Self::new();
            source
                .failing
                .lock()
                .unwrap()
                .extend(members.iter().map(|m| m.to_string()));
            source
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for MockDataSource {
        async fn fetch(
            &self,
            resource_type: ResourceType,
            member_id: &str,
            _job_id: JobId,
        ) -> std::result::Result<serde_json::Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(member_id) {
                return Err(FetchError::Status(500));
            }
            Ok(json!({
                "resourceType": resource_type.as_str(),
                "id": member_id,
            }))
        }
    }
}
