//! Service layer
//!
//! - [`task_queue`]: admission, dispatch and statistics for interpreter tasks
//! - [`process_runner`]: launching the interpreter and classifying its exit

pub mod process_runner;
pub mod task_queue;

pub use process_runner::{InterpreterRunner, ProcessRunner};
pub use task_queue::{Invocation, QueueStats, TaskHandle, TaskId, TaskQueue};
