// Worker - Unit processing loop

pub mod constants;
pub mod processor;
mod shutdown;

use constants::*;
pub use processor::{UnitOutcome, UnitProcessor};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::completion::CompletionAggregator;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Delivery, JobStatus};
use crate::error::Result;
use crate::port::{JobRepository, WorkQueue};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker pulls units from the shared queue, one at a time
pub struct Worker {
    name: String,
    queue: Arc<dyn WorkQueue>,
    job_repo: Arc<dyn JobRepository>,
    processor: Arc<UnitProcessor>,
    aggregator: Arc<CompletionAggregator>,
    retry_policy: Arc<RetryPolicy>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<dyn WorkQueue>,
        job_repo: Arc<dyn JobRepository>,
        processor: Arc<UnitProcessor>,
        aggregator: Arc<CompletionAggregator>,
        retry_policy: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            job_repo,
            processor,
            aggregator,
            retry_policy,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker = %self.name, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker = %self.name, "Worker shutting down");
                break;
            }
            match self.process_next_unit().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker = %self.name, "Worker stopped");
        Ok(())
    }

    /// Process the next unit from the queue (returns true if one was handled)
    pub async fn process_next_unit(&self) -> Result<bool> {
        let delivery = match self.queue.pop_next().await? {
            Some(d) => d,
            None => return Ok(false),
        };

        info!(
            worker = %self.name,
            job_id = %delivery.unit.job_id,
            seq = delivery.unit.seq,
            attempt = delivery.attempt,
            "Processing unit"
        );

        // Spawned so a panic fails only this delivery
        let unit = delivery.unit.clone();
        let processor = Arc::clone(&self.processor);
        let aggregator = Arc::clone(&self.aggregator);
        let handle = tokio::task::spawn(async move {
            let outcome = processor.process(&unit).await?;
            if let UnitOutcome::Processed { .. } = outcome {
                aggregator.check(unit.job_id).await?;
            }
            Ok::<_, crate::error::AppError>(outcome)
        });

        match handle.await {
            Ok(Ok(outcome)) => {
                self.queue.ack(delivery.id).await?;
                if let UnitOutcome::Skipped { reason } = outcome {
                    info!(job_id = %delivery.unit.job_id, seq = delivery.unit.seq, reason = %reason, "Unit dropped");
                }
            }
            Ok(Err(e)) => {
                warn!(
                    job_id = %delivery.unit.job_id,
                    seq = delivery.unit.seq,
                    error = %e,
                    "Unit failed"
                );
                self.handle_failure(&delivery, &e.to_string()).await?;
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "unit processing panicked"
                } else {
                    "unit processing cancelled"
                };
                error!(job_id = %delivery.unit.job_id, seq = delivery.unit.seq, "{}", reason);
                self.handle_failure(&delivery, reason).await?;
            }
        }
        Ok(true)
    }

    async fn handle_failure(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        match self.retry_policy.should_retry(delivery) {
            RetryDecision::Retry(delay_ms) => {
                self.queue.requeue(delivery.id, delay_ms, reason).await
            }
            RetryDecision::Failed => {
                self.queue.bury(delivery.id, reason).await?;
                if self
                    .job_repo
                    .transition_status(delivery.unit.job_id, JobStatus::Failed)
                    .await?
                {
                    error!(
                        job_id = %delivery.unit.job_id,
                        seq = delivery.unit.seq,
                        reason = %reason,
                        "Unit exhausted its attempts, job failed"
                    );
                }
                Ok(())
            }
        }
    }
}
