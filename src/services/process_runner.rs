//! Interpreter Process Runner
//!
//! Launches the external interpreter for one admitted task and turns its exit
//! into a classified outcome. Timeouts are enforced by the caller: dropping the
//! future returned by [`ProcessRunner::run`] kills the child process.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tracing::{debug, error};

use crate::config::TaskQueueConfig;
use crate::errors::{TaskError, TaskResult};
use crate::services::task_queue::Invocation;

/// Executes one invocation to a terminal outcome
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, resolving with trimmed stdout on a zero exit status
    async fn run(&self, invocation: &Invocation) -> TaskResult<String>;
}

/// Spawns `program` with each task's arguments
#[derive(Debug, Clone)]
pub struct InterpreterRunner {
    program: String,
    working_dir: Option<PathBuf>,
}

impl InterpreterRunner {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &TaskQueueConfig) -> Self {
        Self {
            program: config.interpreter.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    pub fn with_working_dir(mut self, working_dir: PathBuf) -> Self {
        self.working_dir = Some(working_dir);
        self
    }

    fn command(&self, invocation: &Invocation) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl ProcessRunner for InterpreterRunner {
    async fn run(&self, invocation: &Invocation) -> TaskResult<String> {
        let mut child = self.command(invocation).spawn().map_err(|e| {
            error!(
                "task_id={} status=spawn_failed program={} error={}",
                invocation.id, self.program, e
            );
            TaskError::spawn(&self.program, e.to_string())
        })?;

        debug!(
            "task_id={} status=spawned pid={:?} script={}",
            invocation.id,
            child.id(),
            invocation.script()
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained to EOF concurrently with the wait.
        let (status, stdout, stderr) =
            tokio::try_join!(child.wait(), read_to_end(stdout), read_to_end(stderr)).map_err(
                |e| TaskError::spawn(&self.program, format!("Failed to collect process output: {e}")),
            )?;

        if status.success() {
            Ok(String::from_utf8_lossy(&stdout).trim().to_string())
        } else {
            Err(TaskError::non_zero_exit(
                status.code(),
                &String::from_utf8_lossy(&stderr),
            ))
        }
    }
}

async fn read_to_end<R>(stream: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}
