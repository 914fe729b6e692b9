// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no units are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Default multiplier between consecutive retry delays
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default attempts per unit before it is buried
pub const DEFAULT_MAX_UNIT_ATTEMPTS: i32 = 5;

/// Default time a unit may stay RUNNING before recovery requeues it (10 minutes)
pub const DEFAULT_VISIBILITY_TIMEOUT_MS: i64 = 10 * 60 * 1000;

/// How often the recovery loop scans for stale units (30s)
pub const RECOVERY_SCAN_INTERVAL: Duration = Duration::from_secs(30);
