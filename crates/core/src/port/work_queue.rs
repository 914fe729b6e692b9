// Work Queue Port
// Durable, at-least-once delivery of export units.

use crate::domain::{Delivery, ExportUnit};
use crate::error::Result;
use async_trait::async_trait;

/// Queue-side state of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Queued,
    Running,
    Dead,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Queued => "QUEUED",
            DeliveryState::Running => "RUNNING",
            DeliveryState::Dead => "DEAD",
        }
    }
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Publish every unit or none of them
    async fn publish(&self, units: &[ExportUnit]) -> Result<()>;

    /// Atomically claim the next available unit, incrementing its attempt count
    async fn pop_next(&self) -> Result<Option<Delivery>>;

    /// Remove a successfully processed unit
    async fn ack(&self, delivery_id: i64) -> Result<()>;

    /// Hand the unit back to the queue after `delay_ms`
    async fn requeue(&self, delivery_id: i64, delay_ms: i64, reason: &str) -> Result<()>;

    /// Park a unit that exhausted its attempts
    async fn bury(&self, delivery_id: i64, reason: &str) -> Result<()>;

    /// Requeue RUNNING units claimed at or before `started_before`.
    /// Returns the number of units recovered.
    async fn requeue_stale(&self, started_before: i64) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct QueuedUnit {
        pub unit: ExportUnit,
        pub state: DeliveryState,
        pub attempts: i32,
        pub started_at: Option<i64>,
        pub last_error: Option<String>,
        pub last_delay_ms: Option<i64>,
    }

    /// In-memory queue. Delays are recorded but not enforced.
    pub struct InMemoryWorkQueue {
        entries: Mutex<BTreeMap<i64, QueuedUnit>>,
        max_attempts: i32,
        fail_publish: AtomicBool,
        clock: Mutex<i64>,
    }

    impl InMemoryWorkQueue {
        pub fn new(max_attempts: i32) -> Self {
            Self {
                entries: Mutex::new(BTreeMap::new()),
                max_attempts,
                fail_publish: AtomicBool::new(false),
                clock: Mutex::new(0),
            }
        }

        /// Make every subsequent `publish` fail
        pub fn fail_publish(&self, fail: bool) {
            self.fail_publish.store(fail, Ordering::SeqCst);
        }

        /// Timestamp stamped on claimed units
        pub fn set_clock(&self, now_millis: i64) {
            *self.clock.lock().unwrap() = now_millis;
        }

        pub fn entries(&self) -> Vec<(i64, QueuedUnit)> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|(id, e)| (*id, e.clone()))
                .collect()
        }

        pub fn count_in_state(&self, state: DeliveryState) -> usize {
            self.entries
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.state == state)
                .count()
        }

        /// Put a unit back in the queue as if it were redelivered
        pub fn redeliver(&self, unit: ExportUnit) {
            let mut entries = self.entries.lock().unwrap();
            let id = entries.keys().next_back().copied().unwrap_or(0) + 1;
            entries.insert(id, Self::queued(unit));
        }

        fn queued(unit: ExportUnit) -> QueuedUnit {
            QueuedUnit {
                unit,
                state: DeliveryState::Queued,
                attempts: 0,
                started_at: None,
                last_error: None,
                last_delay_ms: None,
            }
        }
    }

    #[async_trait]
    impl WorkQueue for InMemoryWorkQueue {
        async fn publish(&self, units: &[ExportUnit]) -> Result<()> {
            if self.fail_publish.load(Ordering::SeqCst) {
                return Err(AppError::Database("queue unavailable".to_string()));
            }
            let mut entries = self.entries.lock().unwrap();
            let mut next = entries.keys().next_back().copied().unwrap_or(0);
            for unit in units {
                next += 1;
                entries.insert(next, Self::queued(unit.clone()));
            }
            Ok(())
        }

        async fn pop_next(&self) -> Result<Option<Delivery>> {
            let now = *self.clock.lock().unwrap();
            let mut entries = self.entries.lock().unwrap();
            let next = entries
                .iter_mut()
                .find(|(_, e)| e.state == DeliveryState::Queued);
            Ok(next.map(|(id, entry)| {
                entry.state = DeliveryState::Running;
                entry.attempts += 1;
                entry.started_at = Some(now);
                Delivery {
                    id: *id,
                    unit: entry.unit.clone(),
                    attempt: entry.attempts,
                    max_attempts: self.max_attempts,
                }
            }))
        }

        async fn ack(&self, delivery_id: i64) -> Result<()> {
            self.entries.lock().unwrap().remove(&delivery_id);
            Ok(())
        }

        async fn requeue(&self, delivery_id: i64, delay_ms: i64, reason: &str) -> Result<()> {
            if let Some(entry) = self.entries.lock().unwrap().get_mut(&delivery_id) {
                entry.state = DeliveryState::Queued;
                entry.started_at = None;
                entry.last_error = Some(reason.to_string());
                entry.last_delay_ms = Some(delay_ms);
            }
            Ok(())
        }

        async fn bury(&self, delivery_id: i64, reason: &str) -> Result<()> {
            if let Some(entry) = self.entries.lock().unwrap().get_mut(&delivery_id) {
                entry.state = DeliveryState::Dead;
                entry.last_error = Some(reason.to_string());
            }
            Ok(())
        }

        async fn requeue_stale(&self, started_before: i64) -> Result<u64> {
            let mut recovered = 0;
            for entry in self.entries.lock().unwrap().values_mut() {
                if entry.state == DeliveryState::Running
                    && entry.started_at.is_some_and(|t| t <= started_before)
                {
                    entry.state = DeliveryState::Queued;
                    entry.started_at = None;
                    recovered += 1;
                }
            }
            Ok(recovered)
        }
    }
}
