//! Centralized error handling for the task queue service
//!
//! # Error Categories
//!
//! - **Task Errors**: the per-task outcome taxonomy (configuration, spawn,
//!   non-zero exit, timeout, queue cleared)
//! - **Application Errors**: configuration loading, validation and startup
//!
//! # Usage
//!
//! ```rust
//! use m3u_task_queue::errors::{AppResult, TaskResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//!
//! fn example_task() -> TaskResult<String> {
//!     Ok("output".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Outcome of a single submitted task
pub type TaskResult<T = String> = Result<T, TaskError>;
