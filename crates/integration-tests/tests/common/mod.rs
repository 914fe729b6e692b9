//! Shared fixture: SQLite in memory, files in temp dirs, a mock data source
//! and real RSA/AES encryption.

#![allow(dead_code)]

use std::sync::Arc;

use bulkex_core::application::{
    CompletionAggregator, ExportConfig, ExportRequest, ExportService, JobStatusService,
    RecoveryService, RetryPolicy, StatusConfig, UnitProcessor, Worker,
};
use bulkex_core::domain::JobId;
use bulkex_core::port::data_source::mocks::MockDataSource;
use bulkex_core::port::id_provider::mocks::SequentialIdProvider;
use bulkex_core::port::time_provider::mocks::FixedTimeProvider;
use bulkex_infra_sqlite::{
    create_pool, run_migrations, SqliteJobRepository, SqliteOutputFileRepository,
    SqlitePopulationRepository, SqliteWorkQueue,
};
use bulkex_infra_system::{LocalFileStore, RsaEncryptor};
use rsa::RsaPrivateKey;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const ORG: &str = "A0001";
pub const START: i64 = 1_700_000_000_000;
pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const VISIBILITY_TIMEOUT_MS: i64 = 60_000;
pub const EOB_URL: &str = "https://bulkex.local/api/v1/ExplanationOfBenefit/$export";
pub const DATA_BASE_URL: &str = "https://bulkex.local/data";

pub struct Options {
    pub max_batch_size: usize,
    pub max_attempts: i32,
    pub failing_members: Vec<&'static str>,
    /// Without a key every encrypted write fails
    pub with_key: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_batch_size: 15,
            max_attempts: 3,
            failing_members: Vec::new(),
            with_key: true,
        }
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub clock: Arc<FixedTimeProvider>,
    pub jobs: Arc<SqliteJobRepository>,
    pub outputs: Arc<SqliteOutputFileRepository>,
    pub population: Arc<SqlitePopulationRepository>,
    pub queue: Arc<SqliteWorkQueue>,
    pub store: Arc<LocalFileStore>,
    pub source: Arc<MockDataSource>,
    pub private_key: RsaPrivateKey,
    pub processor: Arc<UnitProcessor>,
    pub export: Arc<ExportService>,
    pub status: Arc<JobStatusService>,
    pub recovery: RecoveryService,
    pub worker: Worker,
    _staging: TempDir,
    _payload: TempDir,
}

impl Harness {
    pub async fn new(options: Options) -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let clock = Arc::new(FixedTimeProvider::new(START));
        let jobs = Arc::new(SqliteJobRepository::new(pool.clone(), clock.clone()));
        let outputs = Arc::new(SqliteOutputFileRepository::new(pool.clone(), clock.clone()));
        let population = Arc::new(SqlitePopulationRepository::new(pool.clone()));
        let queue = Arc::new(SqliteWorkQueue::new(
            pool.clone(),
            clock.clone(),
            options.max_attempts,
        ));

        let staging = tempfile::tempdir().unwrap();
        let payload = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalFileStore::new(staging.path(), payload.path()));

        let source = Arc::new(MockDataSource::failing_for(&options.failing_members));
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).unwrap();
        let encryptor = if options.with_key {
            RsaEncryptor::new(private_key.to_public_key())
        } else {
            RsaEncryptor::default()
        };

        let processor = Arc::new(UnitProcessor::new(
            jobs.clone(),
            outputs.clone(),
            source.clone(),
            Arc::new(encryptor),
            store.clone(),
            Arc::new(SequentialIdProvider::new()),
        ));
        let aggregator = Arc::new(CompletionAggregator::new(
            jobs.clone(),
            outputs.clone(),
            store.clone(),
        ));
        let worker = Worker::new(
            "worker-test",
            queue.clone(),
            jobs.clone(),
            processor.clone(),
            aggregator,
            Arc::new(RetryPolicy::new(10, 2.0)),
        );

        let export = Arc::new(ExportService::new(
            jobs.clone(),
            population.clone(),
            queue.clone(),
            clock.clone(),
            ExportConfig {
                max_batch_size: options.max_batch_size,
                ..Default::default()
            },
        ));
        let status = Arc::new(JobStatusService::new(
            jobs.clone(),
            outputs.clone(),
            store.clone(),
            clock.clone(),
            StatusConfig::new(24, DATA_BASE_URL).unwrap(),
        ));
        let recovery = RecoveryService::new(queue.clone(), clock.clone(), Some(VISIBILITY_TIMEOUT_MS));

        Self {
            pool,
            clock,
            jobs,
            outputs,
            population,
            queue,
            store,
            source,
            private_key,
            processor,
            export,
            status,
            recovery,
            worker,
            _staging: staging,
            _payload: payload,
        }
    }

    /// Attribute members `m0`..`m{count-1}` to the organization
    pub async fn attribute(&self, org_id: &str, count: usize) -> Vec<String> {
        let members: Vec<String> = (0..count).map(|i| format!("m{}", i)).collect();
        self.population.attribute(org_id, &members).await.unwrap();
        members
    }

    pub async fn submit(&self, org_id: &str) -> bulkex_core::Result<JobId> {
        self.export
            .submit(ExportRequest {
                org_id: org_id.to_string(),
                user_id: "user-1".to_string(),
                request_url: EOB_URL.to_string(),
            })
            .await
            .map(|job| job.id)
    }

    /// Run the worker until nothing is available. Returns units handled.
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        while self.worker.process_next_unit().await.unwrap() {
            handled += 1;
        }
        handled
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }
}
