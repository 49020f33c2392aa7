//! Task records and the caller-side completion handle

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{TaskError, TaskResult};

/// Identifier assigned to every submitted task
pub type TaskId = Uuid;

/// One request to run the interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: TaskId,
    /// First element is the target script, the rest are its parameters
    pub args: Vec<String>,
    pub timeout: Duration,
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new(args: Vec<String>, timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            args,
            timeout,
            created_at: Utc::now(),
        }
    }

    pub fn script(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Time spent since submission, for diagnostics
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }
}

/// A task waiting in the queue or about to start
pub(crate) struct PendingTask {
    pub invocation: Invocation,
    responder: oneshot::Sender<TaskResult>,
}

impl PendingTask {
    pub fn new(invocation: Invocation) -> (Self, TaskHandle) {
        let (responder, receiver) = oneshot::channel();
        let handle = TaskHandle {
            id: invocation.id,
            receiver,
        };
        (
            Self {
                invocation,
                responder,
            },
            handle,
        )
    }

    /// Deliver the outcome; consuming `self` makes a second delivery impossible
    pub fn fulfil(self, outcome: TaskResult) {
        // The submitter may have dropped its handle; the outcome is simply discarded then.
        let _ = self.responder.send(outcome);
    }

    pub fn into_parts(self) -> (Invocation, Responder) {
        (self.invocation, Responder(self.responder))
    }
}

/// Write side of a running task's handle
pub(crate) struct Responder(oneshot::Sender<TaskResult>);

impl Responder {
    pub fn fulfil(self, outcome: TaskResult) {
        let _ = self.0.send(outcome);
    }
}

/// Future resolving to a task's trimmed output or its classified error
///
/// Dropping the handle does not cancel the task; it still runs to completion
/// and occupies its slot until then.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    receiver: oneshot::Receiver<TaskResult>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Future for TaskHandle {
    type Output = TaskResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(TaskError::queue_cleared(
                    "Task queue shut down before the task completed",
                ))
            })
        })
    }
}
