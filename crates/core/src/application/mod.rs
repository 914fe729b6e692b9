// Application Layer - Use Cases and Business Logic

pub mod archive;
pub mod completion;
pub mod config;
pub mod export;
pub mod recovery;
pub mod retry;
pub mod status;
pub mod worker;

// Re-exports
pub use archive::ArchiveScheduler;
pub use completion::{CompletionAggregator, CompletionOutcome};
pub use config::{ExportConfig, StatusConfig};
pub use export::{ExportRequest, ExportService};
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use status::{JobStatusService, StatusReport};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, UnitProcessor, Worker};
