// Population Partitioner

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{ExportUnit, Job, ResourceType};
use crate::error::{AppError, Result};
use crate::port::PopulationRepository;

/// Split members into consecutive batches of at most `max_batch_size`,
/// preserving order. The last batch may be smaller.
pub fn partition_members(members: &[String], max_batch_size: usize) -> Vec<Vec<String>> {
    debug_assert!(max_batch_size > 0, "batch size must be positive");
    members
        .chunks(max_batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub struct Partitioner {
    population: Arc<dyn PopulationRepository>,
    max_batch_size: usize,
}

impl Partitioner {
    pub fn new(population: Arc<dyn PopulationRepository>, max_batch_size: usize) -> Self {
        Self {
            population,
            max_batch_size,
        }
    }

    /// Members attributed to the organization. Empty population is an error.
    pub async fn resolve_population(&self, org_id: &str) -> Result<Vec<String>> {
        let members = self.population.member_ids(org_id).await?;
        if members.is_empty() {
            warn!(org_id = %org_id, "No beneficiaries attributed to organization");
            return Err(AppError::PopulationResolution(format!(
                "no beneficiaries found for organization {}",
                org_id
            )));
        }
        debug!(org_id = %org_id, members = members.len(), "Resolved population");
        Ok(members)
    }

    /// Build one unit per batch for an already persisted job
    pub fn build_units(
        &self,
        job: &Job,
        resource_type: ResourceType,
        encrypt: bool,
        members: &[String],
    ) -> Vec<ExportUnit> {
        partition_members(members, self.max_batch_size)
            .into_iter()
            .enumerate()
            .map(|(seq, member_ids)| ExportUnit {
                job_id: job.id,
                org_id: job.org_id.clone(),
                user_id: job.user_id.clone(),
                seq: seq as u32,
                member_ids,
                resource_type,
                encrypt,
            })
            .collect()
    }
}
