// SQLite WorkQueue Implementation
// Units live in export_units; a claim is a single UPDATE ... RETURNING.

use async_trait::async_trait;
use bulkex_core::domain::{Delivery, ExportUnit};
use bulkex_core::error::{AppError, Result};
use bulkex_core::port::{DeliveryState, TimeProvider, WorkQueue};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::map_sqlx_error;

pub struct SqliteWorkQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    max_attempts: i32,
}

impl SqliteWorkQueue {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>, max_attempts: i32) -> Self {
        Self {
            pool,
            time_provider,
            max_attempts,
        }
    }

    /// Count units in a state
    pub async fn count_by_state(&self, state: DeliveryState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM export_units WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClaimedRow {
    id: i64,
    payload: String,
    attempts: i32,
    max_attempts: i32,
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    async fn publish(&self, units: &[ExportUnit]) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for unit in units {
            let payload = serde_json::to_string(unit)?;
            sqlx::query(
                r#"
                INSERT INTO export_units (job_id, seq, payload, state, attempts, max_attempts, available_at, enqueued_at)
                VALUES (?, ?, ?, ?, 0, ?, ?, ?)
                "#,
            )
            .bind(unit.job_id)
            .bind(unit.seq as i64)
            .bind(payload)
            .bind(DeliveryState::Queued.as_str())
            .bind(self.max_attempts)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(units = units.len(), "Published units");
        Ok(())
    }

    async fn pop_next(&self) -> Result<Option<Delivery>> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, ClaimedRow>(
            r#"
            UPDATE export_units
            SET state = ?, attempts = attempts + 1, started_at = ?
            WHERE id = (
                SELECT id FROM export_units
                WHERE state = ? AND available_at <= ?
                ORDER BY available_at ASC, id ASC
                LIMIT 1
            )
            RETURNING id, payload, attempts, max_attempts
            "#,
        )
        .bind(DeliveryState::Running.as_str())
        .bind(now)
        .bind(DeliveryState::Queued.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<ExportUnit>(&row.payload) {
            Ok(unit) => Ok(Some(Delivery {
                id: row.id,
                unit,
                attempt: row.attempts,
                max_attempts: row.max_attempts,
            })),
            Err(e) => {
                // Unreadable payload can never succeed
                error!(delivery_id = row.id, error = %e, "Corrupt unit payload, burying");
                self.bury(row.id, &format!("corrupt payload: {}", e)).await?;
                Err(AppError::Serialization(e))
            }
        }
    }

    async fn ack(&self, delivery_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM export_units WHERE id = ?")
            .bind(delivery_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn requeue(&self, delivery_id: i64, delay_ms: i64, reason: &str) -> Result<()> {
        let available_at = self.time_provider.now_millis() + delay_ms.max(0);
        sqlx::query(
            r#"
            UPDATE export_units
            SET state = ?, available_at = ?, started_at = NULL, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(DeliveryState::Queued.as_str())
        .bind(available_at)
        .bind(reason)
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn bury(&self, delivery_id: i64, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE export_units
            SET state = ?, started_at = NULL, last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(DeliveryState::Dead.as_str())
        .bind(reason)
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn requeue_stale(&self, started_before: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE export_units
            SET state = ?, started_at = NULL, available_at = ?, last_error = 'visibility timeout'
            WHERE state = ? AND started_at <= ?
            "#,
        )
        .bind(DeliveryState::Queued.as_str())
        .bind(self.time_provider.now_millis())
        .bind(DeliveryState::Running.as_str())
        .bind(started_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_job, migrated_pool};
    use bulkex_core::domain::ResourceType;
    use bulkex_core::port::time_provider::mocks::FixedTimeProvider;

    fn unit(job_id: i64, seq: u32) -> ExportUnit {
        ExportUnit {
            job_id,
            org_id: "A0001".to_string(),
            user_id: "user-1".to_string(),
            seq,
            member_ids: vec![format!("m{}", seq)],
            resource_type: ResourceType::ExplanationOfBenefit,
            encrypt: true,
        }
    }

    async fn setup(max_attempts: i32) -> (SqliteWorkQueue, Arc<FixedTimeProvider>, i64) {
        let pool = migrated_pool().await;
        let job_id = insert_job(&pool, "A0001").await;
        let clock = Arc::new(FixedTimeProvider::new(1_000));
        (
            SqliteWorkQueue::new(pool, clock.clone(), max_attempts),
            clock,
            job_id,
        )
    }

    #[tokio::test]
    async fn test_publish_pop_ack() {
        let (queue, _clock, job_id) = setup(3).await;
        queue.publish(&[unit(job_id, 0), unit(job_id, 1)]).await.unwrap();

        let first = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(first.unit, unit(job_id, 0));
        assert_eq!(first.attempt, 1);
        assert_eq!(first.max_attempts, 3);

        let second = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(second.unit.seq, 1);
        assert!(queue.pop_next().await.unwrap().is_none());

        queue.ack(first.id).await.unwrap();
        queue.ack(second.id).await.unwrap();
        assert_eq!(queue.count_by_state(DeliveryState::Running).await.unwrap(), 0);
        assert_eq!(queue.count_by_state(DeliveryState::Queued).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publish_is_all_or_nothing() {
        let (queue, _clock, job_id) = setup(3).await;

        // Second unit references a missing job and violates the foreign key
        let result = queue.publish(&[unit(job_id, 0), unit(job_id + 50, 1)]).await;

        assert!(result.is_err());
        assert_eq!(queue.count_by_state(DeliveryState::Queued).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requeue_respects_delay() {
        let (queue, clock, job_id) = setup(3).await;
        queue.publish(&[unit(job_id, 0)]).await.unwrap();

        let delivery = queue.pop_next().await.unwrap().unwrap();
        queue.requeue(delivery.id, 5_000, "disk full").await.unwrap();
        assert!(queue.pop_next().await.unwrap().is_none());

        clock.advance(5_000);
        let again = queue.pop_next().await.unwrap().unwrap();
        assert_eq!(again.id, delivery.id);
        assert_eq!(again.attempt, 2);
    }

    #[tokio::test]
    async fn test_buried_units_are_never_delivered() {
        let (queue, _clock, job_id) = setup(1).await;
        queue.publish(&[unit(job_id, 0)]).await.unwrap();

        let delivery = queue.pop_next().await.unwrap().unwrap();
        assert!(delivery.is_last_attempt());
        queue.bury(delivery.id, "exhausted").await.unwrap();

        assert!(queue.pop_next().await.unwrap().is_none());
        assert_eq!(queue.count_by_state(DeliveryState::Dead).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_requeue_stale_running_units() {
        let (queue, clock, job_id) = setup(3).await;
        queue.publish(&[unit(job_id, 0), unit(job_id, 1)]).await.unwrap();

        queue.pop_next().await.unwrap().unwrap();
        clock.set(100_000);
        queue.pop_next().await.unwrap().unwrap();

        assert_eq!(queue.requeue_stale(50_000).await.unwrap(), 1);
        assert_eq!(queue.count_by_state(DeliveryState::Queued).await.unwrap(), 1);
        assert_eq!(queue.pop_next().await.unwrap().unwrap().unit.seq, 0);
    }
}
