// Population Repository Port
// Resolves the beneficiaries attributed to an organization.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PopulationRepository: Send + Sync {
    /// External member ids attributed to `org_id`, in attribution order
    async fn member_ids(&self, org_id: &str) -> Result<Vec<String>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryPopulationRepository {
        members: Mutex<HashMap<String, Vec<String>>>,
    }

    impl InMemoryPopulationRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_members(org_id: &str, member_ids: Vec<String>) -> Self {
            let repo = Self::new();
            repo.set(org_id, member_ids);
            repo
        }

        pub fn set(&self, org_id: &str, member_ids: Vec<String>) {
            self.members
                .lock()
                .unwrap()
                .insert(org_id.to_string(), member_ids);
        }
    }

    #[async_trait]
    impl PopulationRepository for InMemoryPopulationRepository {
        async fn member_ids(&self, org_id: &str) -> Result<Vec<String>> {
            Ok(self
                .members
                .lock()
                .unwrap()
                .get(org_id)
                .cloned()
                .unwrap_or_default())
        }
    }
}
