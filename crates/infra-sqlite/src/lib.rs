// Bulkex Infrastructure - SQLite Adapter
// Implements: JobRepository, OutputFileRepository, PopulationRepository, WorkQueue

mod connection;
mod error;
mod job_repository;
mod migration;
mod output_file_repository;
mod population_repository;
mod work_queue;

pub use connection::create_pool;
pub use job_repository::SqliteJobRepository;
pub use migration::run_migrations;
pub use output_file_repository::SqliteOutputFileRepository;
pub use population_repository::SqlitePopulationRepository;
pub use work_queue::SqliteWorkQueue;

// Note: sqlx::Error conversion is handled by error::map_sqlx_error
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;

    /// Fresh in-memory database with the full schema
    pub async fn migrated_pool() -> SqlitePool {
        let pool = crate::create_pool("sqlite::memory:").await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        pool
    }

    /// Insert a bare job row and return its id
    pub async fn insert_job(pool: &SqlitePool, org_id: &str) -> i64 {
        sqlx::query(
            "INSERT INTO jobs (org_id, user_id, request_url, status, job_count, created_at, updated_at)
             VALUES (?, 'user-1', '/api/v1/Patient/$export', 'Pending', 1, 0, 0)",
        )
        .bind(org_id)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }
}
