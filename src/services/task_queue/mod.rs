//! Bounded-concurrency execution of interpreter tasks
//!
//! [`TaskQueue`] admits submissions, runs up to `max_concurrency` of them
//! through a [`ProcessRunner`](crate::services::ProcessRunner) and queues the
//! rest in FIFO order. [`QueueStats`] is the read-only view used by health
//! and monitoring endpoints.

mod queue;
mod stats;
mod task;

pub use queue::TaskQueue;
pub use stats::QueueStats;
pub use task::{Invocation, TaskHandle, TaskId};
