// Work Dispatcher

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{ExportUnit, JobId};
use crate::error::{AppError, Result};
use crate::port::WorkQueue;

pub struct Dispatcher {
    queue: Arc<dyn WorkQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self { queue }
    }

    /// Publish all units of a job. Any failure fails the whole dispatch.
    pub async fn dispatch(&self, job_id: JobId, units: &[ExportUnit]) -> Result<()> {
        if let Some(stray) = units.iter().find(|u| u.job_id != job_id) {
            return Err(AppError::Internal(format!(
                "unit {} belongs to job {}, not {}",
                stray.seq, stray.job_id, job_id
            )));
        }

        self.queue.publish(units).await.map_err(|e| {
            error!(job_id = %job_id, error = %e, "Failed to publish units");
            AppError::Dispatch(e.to_string())
        })?;

        info!(job_id = %job_id, units = units.len(), "Units dispatched");
        Ok(())
    }
}
