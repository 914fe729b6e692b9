// SQLite JobRepository Implementation

use async_trait::async_trait;
use bulkex_core::domain::{Job, JobId, JobStatus};
use bulkex_core::error::{AppError, Result};
use bulkex_core::port::{JobRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::map_sqlx_error;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<JobId> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (org_id, user_id, request_url, status, job_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.org_id)
        .bind(&job.user_id)
        .bind(&job.request_url)
        .bind(job.status.as_str())
        .bind(job.job_count)
        .bind(job.created_at)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, org_id, user_id, request_url, status, job_count, created_at FROM jobs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn set_job_count(&self, id: JobId, job_count: i32) -> Result<()> {
        // Write-once: only a job without a count can receive one
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET job_count = ?, updated_at = ?
            WHERE id = ? AND job_count = 0
            "#,
        )
        .bind(job_count)
        .bind(self.time_provider.now_millis())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            let existing: Option<i32> = sqlx::query_scalar("SELECT job_count FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            return match existing {
                None => Err(AppError::NotFound(format!("Job {} not found", id))),
                Some(current) => Err(AppError::InvalidState(format!(
                    "Job {} already has job_count {}",
                    id, current
                ))),
            };
        }
        Ok(())
    }

    async fn transition_status(&self, id: JobId, to: JobStatus) -> Result<bool> {
        let from = to.predecessors();
        if from.is_empty() {
            return Ok(false);
        }

        // Conditional update keeps transitions monotonic under concurrency
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(self.time_provider.now_millis())
            .bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_archivable(&self, created_before: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT id, org_id, user_id, request_url, status, job_count, created_at
            FROM jobs
            WHERE status IN (?, ?) AND created_at <= ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(JobStatus::Expired.as_str())
        .bind(created_before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    org_id: String,
    user_id: String,
    request_url: String,
    status: String,
    job_count: i32,
    created_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            id: self.id,
            org_id: self.org_id,
            user_id: self.user_id,
            request_url: self.request_url,
            status: self.status.parse()?,
            job_count: self.job_count,
            created_at: self.created_at,
        })
    }
}
