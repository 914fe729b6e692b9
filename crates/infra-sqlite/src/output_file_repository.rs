// SQLite OutputFileRepository Implementation

use async_trait::async_trait;
use bulkex_core::domain::{JobId, OutputFile};
use bulkex_core::error::Result;
use bulkex_core::port::{OutputFileRepository, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::map_sqlx_error;

pub struct SqliteOutputFileRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteOutputFileRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl OutputFileRepository for SqliteOutputFileRepository {
    async fn record(&self, file: &OutputFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO output_files (job_id, file_name, encrypted_key, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (job_id, file_name)
            DO UPDATE SET encrypted_key = excluded.encrypted_key
            "#,
        )
        .bind(file.job_id)
        .bind(&file.file_name)
        .bind(&file.encrypted_key)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn count_for_job(&self, job_id: JobId) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM output_files WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Vec<OutputFile>> {
        let rows: Vec<(i64, String, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT job_id, file_name, encrypted_key
            FROM output_files
            WHERE job_id = ?
            ORDER BY file_name ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(job_id, file_name, key)| OutputFile::new(job_id, file_name, key))
            .collect())
    }
}
