/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Task queue defaults
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_QUEUE_LOG_INTERVAL: usize = 5;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Shutdown defaults
pub const DEFAULT_CLEAR_REASON: &str = "Server shutting down";
pub const DEFAULT_DRAIN_TIMEOUT_SECONDS: u64 = 10;

// Environment overrides, e.g. M3U_TASK_QUEUE_TASK_QUEUE__MAX_CONCURRENCY=8
pub const ENV_PREFIX: &str = "M3U_TASK_QUEUE_";
pub const ENV_SECTION_SEPARATOR: &str = "__";
