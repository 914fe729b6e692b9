// Retry logic for unit-level failures
use crate::domain::Delivery;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the unit (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, the unit has failed permanently
    Failed,
}

/// Exponential backoff with deterministic jitter.
///
/// delay = base_delay * (backoff_factor ^ (attempt - 1)) * (1.0 ± 0.1)
pub struct RetryPolicy {
    base_delay_ms: i64,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the second attempt
    /// * `backoff_factor` - Multiplier applied per further attempt
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(1000, 2.0);
    /// ```
    pub fn new(base_delay_ms: i64, backoff_factor: f64) -> Self {
        Self {
            base_delay_ms,
            backoff_factor,
        }
    }

    /// Decide what to do with a delivery whose processing failed
    pub fn should_retry(&self, delivery: &Delivery) -> RetryDecision {
        if delivery.is_last_attempt() {
            warn!(
                job_id = %delivery.unit.job_id,
                seq = delivery.unit.seq,
                attempt = delivery.attempt,
                max_attempts = delivery.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let exponent = (delivery.attempt - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);

        // ±10% jitter, seeded by unit identity so siblings spread out
        let jitter_seed = (delivery.unit.job_id as u64)
            .wrapping_mul(31)
            .wrapping_add(u64::from(delivery.unit.seq));
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            job_id = %delivery.unit.job_id,
            seq = delivery.unit.seq,
            attempt = delivery.attempt,
            delay_ms = delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}
