// Crash recovery: requeue units whose worker disappeared
use crate::application::worker::constants::{DEFAULT_VISIBILITY_TIMEOUT_MS, RECOVERY_SCAN_INTERVAL};
use crate::application::worker::ShutdownToken;
use crate::port::{TimeProvider, WorkQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Visibility-timeout recovery service
///
/// A unit claimed by a worker stays RUNNING until it is acked, requeued or
/// buried. If the process dies mid-unit, the row stays RUNNING forever;
/// this service hands such units out again once the timeout elapses.
pub struct RecoveryService {
    queue: Arc<dyn WorkQueue>,
    time_provider: Arc<dyn TimeProvider>,
    visibility_timeout_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Work queue
    /// * `time_provider` - Time provider
    /// * `visibility_timeout_ms` - Optional custom timeout (default: 10 minutes)
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        time_provider: Arc<dyn TimeProvider>,
        visibility_timeout_ms: Option<i64>,
    ) -> Self {
        Self {
            queue,
            time_provider,
            visibility_timeout_ms: visibility_timeout_ms.unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_MS),
        }
    }

    /// Requeue RUNNING units claimed more than the visibility timeout ago
    ///
    /// # Returns
    /// Number of units recovered
    pub async fn recover_stale_units(&self) -> crate::error::Result<u64> {
        let cutoff = self.time_provider.now_millis() - self.visibility_timeout_ms;
        let recovered = self.queue.requeue_stale(cutoff).await?;
        if recovered > 0 {
            info!(
                recovered = recovered,
                cutoff = cutoff,
                visibility_timeout_ms = self.visibility_timeout_ms,
                "Requeued stale units"
            );
        }
        Ok(recovered)
    }

    /// Run recovery once at startup, then every scan interval until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        self.run_every(RECOVERY_SCAN_INTERVAL, &mut shutdown).await
    }

    async fn run_every(&self, period: Duration, shutdown: &mut ShutdownToken) {
        info!(
            visibility_timeout_ms = self.visibility_timeout_ms,
            "Recovery service started"
        );
        let mut tick = interval(period);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.recover_stale_units().await {
                        error!(error = %e, "Stale unit recovery failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Recovery service stopped");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportUnit, ResourceType};
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::work_queue::mocks::InMemoryWorkQueue;
    use crate::port::DeliveryState;

    fn unit(seq: u32) -> ExportUnit {
        ExportUnit {
            job_id: 1,
            org_id: "A0001".to_string(),
            user_id: "user-1".to_string(),
            seq,
            member_ids: vec!["m".to_string()],
            resource_type: ResourceType::Patient,
            encrypt: false,
        }
    }

    #[tokio::test]
    async fn test_only_stale_units_are_requeued() {
        let queue = Arc::new(InMemoryWorkQueue::new(3));
        queue.publish(&[unit(0), unit(1)]).await.unwrap();

        queue.set_clock(1_000);
        queue.pop_next().await.unwrap().unwrap();
        queue.set_clock(50_000);
        queue.pop_next().await.unwrap().unwrap();

        let clock = Arc::new(FixedTimeProvider::new(61_000));
        let recovery = RecoveryService::new(queue.clone(), clock, Some(60_000));

        assert_eq!(recovery.recover_stale_units().await.unwrap(), 1);
        assert_eq!(queue.count_in_state(DeliveryState::Queued), 1);
        assert_eq!(queue.count_in_state(DeliveryState::Running), 1);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let queue = Arc::new(InMemoryWorkQueue::new(3));
        let recovery = RecoveryService::new(queue, Arc::new(FixedTimeProvider::new(0)), None);
        let (sender, token) = crate::application::worker::shutdown_channel();
        sender.shutdown();

        tokio::time::timeout(Duration::from_secs(1), recovery.run(token))
            .await
            .expect("recovery loop should stop");
    }
}
