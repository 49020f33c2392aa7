use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub task_queue: TaskQueueConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Bounded execution of interpreter processes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQueueConfig {
    /// Ceiling on simultaneously running processes
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Budget applied when a submission does not carry its own
    #[serde(default = "default_task_timeout", with = "duration_serde::duration")]
    pub default_timeout: Duration,
    /// Program that receives each task's argument list
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Working directory for spawned processes (inherited when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Log the queue depth every time it reaches a multiple of this value
    #[serde(default = "default_queue_log_interval")]
    pub queue_log_interval: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Message delivered to every task still waiting when shutdown begins
    #[serde(default = "default_clear_reason")]
    pub clear_reason: String,
    /// How long running tasks may keep going once the server stops
    #[serde(default = "default_drain_timeout", with = "duration_serde::duration")]
    pub drain_timeout: Duration,
}

// Task queue defaults
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_task_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS)
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_queue_log_interval() -> usize {
    DEFAULT_QUEUE_LOG_INTERVAL
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Shutdown defaults
fn default_clear_reason() -> String {
    DEFAULT_CLEAR_REASON.to_string()
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECONDS)
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            default_timeout: default_task_timeout(),
            interpreter: default_interpreter(),
            working_dir: None,
            queue_log_interval: default_queue_log_interval(),
        }
    }
}

impl TaskQueueConfig {
    /// Reject settings the queue cannot operate with
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrency == 0 {
            return Err(AppError::configuration(
                "task_queue.max_concurrency must be at least 1",
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(AppError::configuration(
                "task_queue.default_timeout must be a positive duration",
            ));
        }
        if self.interpreter.trim().is_empty() {
            return Err(AppError::configuration(
                "task_queue.interpreter must not be empty",
            ));
        }
        if self.queue_log_interval == 0 {
            return Err(AppError::configuration(
                "task_queue.queue_log_interval must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            clear_reason: default_clear_reason(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from `config_file`, layering environment overrides on top
    ///
    /// A default file is written when `config_file` does not exist yet.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        let path = Path::new(config_file);
        if !path.exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .map_err(|e| AppError::internal(format!("Failed to render default config: {e}")))?;
            std::fs::write(path, contents)?;
            info!("Created default config file: {}", config_file);
        }

        Self::figment(path).extract::<Self>().map_err(AppError::from).and_then(|config| {
            config.validate()?;
            Ok(config)
        })
    }

    /// Defaults, then the TOML file, then `M3U_TASK_QUEUE_*` environment variables
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SECTION_SEPARATOR))
    }

    pub fn validate(&self) -> AppResult<()> {
        self.task_queue.validate()
    }
}
