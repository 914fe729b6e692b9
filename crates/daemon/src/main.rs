//! Bulkex - Main Entry Point
//! HTTP API + worker pool + recovery and archive loops over one SQLite database

mod logging;
mod settings;

use anyhow::{anyhow, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use bulkex_api_http::{AppState, AuthProvider, HttpServer, HttpServerConfig};
use bulkex_core::application::worker::constants::{DEFAULT_BACKOFF_FACTOR, DEFAULT_RETRY_BASE_DELAY_MS};
use bulkex_core::application::{
    shutdown_channel, ArchiveScheduler, CompletionAggregator, ExportService, JobStatusService,
    RecoveryService, RetryPolicy, UnitProcessor, Worker,
};
use bulkex_core::port::id_provider::UuidProvider;
use bulkex_core::port::time_provider::SystemTimeProvider;
use bulkex_core::port::TimeProvider;
use bulkex_infra_sqlite::{
    create_pool, run_migrations, SqliteJobRepository, SqliteOutputFileRepository,
    SqlitePopulationRepository, SqliteWorkQueue,
};
use bulkex_infra_system::{HttpDataSource, LocalFileStore, RsaEncryptor};
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = Settings::load()?;
    let _log_guard = logging::init(&settings.log_format, settings.log_dir.as_deref())?;

    info!("Bulkex v{} starting...", VERSION);

    let export_config = settings.export_config()?;
    let status_config = settings.status_config()?;

    // 2. Database
    info!(database_url = %settings.database_url, "Initializing database...");
    let pool = create_pool(&settings.database_url)
        .await
        .map_err(|e| anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow!("Migration failed: {}", e))?;

    // 3. Adapters
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let output_repo = Arc::new(SqliteOutputFileRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let population = Arc::new(SqlitePopulationRepository::new(pool.clone()));
    let queue = Arc::new(SqliteWorkQueue::new(
        pool.clone(),
        time_provider.clone(),
        settings.max_unit_attempts,
    ));
    let file_store = Arc::new(LocalFileStore::new(
        settings.staging_dir(),
        settings.payload_dir(),
    ));
    let data_source = Arc::new(
        HttpDataSource::new(settings.fhir_source_url.as_str())
            .map_err(|e| anyhow!("Data source setup failed: {}", e))?,
    );
    let encryptor = Arc::new(match settings.public_key_file() {
        Some(path) => RsaEncryptor::from_pem_file(&path)
            .map_err(|e| anyhow!("Public key load failed: {}", e))?,
        None if export_config.encryption_enabled => {
            return Err(anyhow!(
                "BULKEX_PUBLIC_KEY_FILE is required while encryption is enabled"
            ));
        }
        None => RsaEncryptor::default(),
    });
    let tokens = Arc::new(
        AuthProvider::new(settings.auth_config()?, settings.token_ttl_secs())
            .map_err(|e| anyhow!("Auth provider setup failed: {}", e))?,
    );
    info!(provider = tokens.name(), "Auth provider selected");

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut handles = Vec::new();

    // 4. Visibility timeout recovery
    let recovery = RecoveryService::new(
        queue.clone(),
        time_provider.clone(),
        Some(settings.visibility_timeout_secs * 1000),
    );
    match recovery.recover_stale_units().await {
        Ok(count) => info!(recovered_units = count, "Startup recovery completed"),
        Err(e) => error!(error = %e, "Startup recovery failed"),
    }
    handles.push(tokio::spawn(recovery.run(shutdown_rx.clone())));

    // 5. Worker pool
    let processor = Arc::new(UnitProcessor::new(
        job_repo.clone(),
        output_repo.clone(),
        data_source,
        encryptor,
        file_store.clone(),
        Arc::new(UuidProvider),
    ));
    let aggregator = Arc::new(CompletionAggregator::new(
        job_repo.clone(),
        output_repo.clone(),
        file_store.clone(),
    ));
    let retry_policy = Arc::new(RetryPolicy::new(
        DEFAULT_RETRY_BASE_DELAY_MS,
        DEFAULT_BACKOFF_FACTOR,
    ));

    info!(workers = settings.worker_pool_size, "Starting workers...");
    for i in 0..settings.worker_pool_size {
        let worker = Worker::new(
            format!("worker-{}", i),
            queue.clone(),
            job_repo.clone(),
            processor.clone(),
            aggregator.clone(),
            retry_policy.clone(),
        );
        let token = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(error = %e, "Worker failed");
            }
        }));
    }

    // 6. Archive loop
    let archiver = ArchiveScheduler::new(
        job_repo.clone(),
        file_store.clone(),
        time_provider.clone(),
        settings.job_ttl_ms(),
        settings.archive_interval_hours,
    );
    handles.push(tokio::spawn(archiver.run(shutdown_rx.clone())));

    // 7. HTTP API
    let export = Arc::new(ExportService::new(
        job_repo.clone(),
        population,
        queue.clone(),
        time_provider.clone(),
        export_config,
    ));
    let status = Arc::new(JobStatusService::new(
        job_repo,
        output_repo,
        file_store,
        time_provider,
        status_config,
    ));
    let state = AppState::new(export, status, tokens, &settings.public_base_url);
    let server = HttpServer::new(
        HttpServerConfig {
            port: settings.http_port,
            ..Default::default()
        },
        state,
    );
    let server_token = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = server.serve(server_token).await {
            error!(error = %e, "HTTP server failed");
        }
    }));

    info!("System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, join_all(handles)).await;
    if drained.is_err() {
        warn!("Background tasks did not stop within the grace period");
    }

    pool.close().await;
    info!("Shutdown complete.");
    Ok(())
}
