//! Bounded Task Queue
//!
//! Admission, dispatch and completion for interpreter tasks. At most
//! `max_concurrency` tasks run at once; everything else waits in FIFO order
//! and is promoted the moment a running task reaches a terminal outcome.
//!
//! All shared state (active count, wait queue, counters) lives behind one
//! mutex and every transition updates it as a single unit. No lock is held
//! across an await point.
//!
//! FIFO order is decided when a slot is claimed: the oldest waiting task
//! takes the freed slot inside the completion's critical section. The
//! process itself is spawned from a runtime task afterwards, so on a
//! multi-thread runtime two tasks promoted back to back may reach the
//! interpreter in either order.

use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

use super::stats::{QueueCounters, QueueStats};
use super::task::{Invocation, PendingTask, Responder, TaskHandle};
use crate::config::TaskQueueConfig;
use crate::errors::{AppResult, TaskError, TaskResult};
use crate::services::process_runner::{InterpreterRunner, ProcessRunner};

/// Bounded-concurrency executor for interpreter processes
///
/// Cloning is cheap and every clone drives the same queue. Submissions must
/// happen inside a Tokio runtime because admitted tasks are spawned onto it.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

struct Shared {
    runner: Arc<dyn ProcessRunner>,
    max_concurrency: usize,
    default_timeout: Duration,
    queue_log_interval: usize,
    state: Mutex<QueueState>,
    idle: Notify,
    /// Set once by `abort_running`; every running task watches it
    abort: watch::Sender<Option<String>>,
}

#[derive(Default)]
struct QueueState {
    active: usize,
    pending: VecDeque<PendingTask>,
    counters: QueueCounters,
}

impl TaskQueue {
    /// Queue backed by the configured interpreter
    pub fn from_config(config: &TaskQueueConfig) -> AppResult<Self> {
        Self::with_runner(Arc::new(InterpreterRunner::from_config(config)), config)
    }

    pub fn with_runner(runner: Arc<dyn ProcessRunner>, config: &TaskQueueConfig) -> AppResult<Self> {
        config.validate()?;

        info!(
            "Task queue initialized: max_concurrency={} default_timeout={}",
            config.max_concurrency,
            humantime::format_duration(config.default_timeout)
        );

        Ok(Self {
            shared: Arc::new(Shared {
                runner,
                max_concurrency: config.max_concurrency,
                default_timeout: config.default_timeout,
                queue_log_interval: config.queue_log_interval,
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
                abort: watch::channel(None).0,
            }),
        })
    }

    /// Admit a task, starting it now or appending it to the wait queue
    ///
    /// Invalid parameters are rejected here and never reach the queue. The
    /// returned handle resolves with the trimmed output or a classified error.
    pub fn submit<I, S>(&self, args: I, timeout: Option<Duration>) -> TaskResult<TaskHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(TaskError::configuration("argument list must not be empty"));
        }

        let timeout = timeout.unwrap_or(self.shared.default_timeout);
        if timeout.is_zero() {
            return Err(TaskError::configuration(
                "timeout must be a positive duration",
            ));
        }

        let (task, handle) = PendingTask::new(Invocation::new(args, timeout));
        if let Some(task) = self.shared.admit(task) {
            self.shared.launch(task);
        }

        Ok(handle)
    }

    /// Submit and wait for the outcome
    pub async fn execute<I, S>(&self, args: I, timeout: Option<Duration>) -> TaskResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(args, timeout)?.await
    }

    pub fn snapshot(&self) -> QueueStats {
        let state = self.shared.state();
        state.counters.snapshot(
            state.active,
            state.pending.len(),
            self.shared.max_concurrency,
        )
    }

    /// Fail every task that has not started yet with `reason`
    ///
    /// Running tasks are left alone. Returns how many tasks were discarded.
    pub fn clear_queue(&self, reason: &str) -> usize {
        let (cleared, idle) = {
            let mut guard = self.shared.state();
            let state = &mut *guard;
            let cleared: Vec<PendingTask> = state.pending.drain(..).collect();
            state.counters.total_cleared += cleared.len() as u64;
            (cleared, state.active == 0)
        };

        let count = cleared.len();
        for task in cleared {
            task.fulfil(Err(TaskError::queue_cleared(reason)));
        }

        if count > 0 {
            warn!("Cleared {} pending task(s) from the queue: {}", count, reason);
        }
        if idle {
            self.shared.idle.notify_waiters();
        }

        count
    }

    /// No task is running or waiting
    pub fn is_idle(&self) -> bool {
        self.shared.state().is_idle()
    }

    /// Resolve once the queue has no running or waiting tasks
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Stop every running task with `reason`, killing its process
    ///
    /// Tasks that start afterwards are stopped the same way, so this is only
    /// meant for the end of the queue's life. Aborted tasks resolve as
    /// `queue_cleared` and count as processed with an error. Returns how many
    /// tasks were running.
    pub fn abort_running(&self, reason: &str) -> usize {
        let active = self.shared.state().active;
        self.shared.abort.send_replace(Some(reason.to_string()));
        if active > 0 {
            warn!("Aborting {} running task(s): {}", active, reason);
        }
        active
    }
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.active == 0 && self.pending.is_empty()
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        // Critical sections never panic, so a poisoned lock still holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a slot for `task`, or enqueue it and return `None`
    fn admit(&self, task: PendingTask) -> Option<PendingTask> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.counters.total_submitted += 1;

        if state.active < self.max_concurrency {
            state.active += 1;
            state.counters.record_start(state.active);
            debug!(
                "task_id={} status=admitted active={}/{}",
                task.invocation.id, state.active, self.max_concurrency
            );
            return Some(task);
        }

        let task_id = task.invocation.id;
        state.pending.push_back(task);
        let depth = state.pending.len();
        state.counters.record_enqueued(depth);
        let active = state.active;
        drop(guard);

        debug!("task_id={} status=queued position={}", task_id, depth);
        if depth % self.queue_log_interval == 0 {
            info!(
                "Task queue depth reached {} (active: {}/{})",
                depth, active, self.max_concurrency
            );
        }

        None
    }

    /// Run an admitted task on the runtime; its slot is already counted
    fn launch(self: &Arc<Self>, task: PendingTask) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let (invocation, responder) = task.into_parts();
            debug!(
                "task_id={} status=started script={} waited_ms={}",
                invocation.id,
                invocation.script(),
                invocation.age().as_millis()
            );

            let outcome = shared.run(&invocation).await;
            shared.complete(&invocation, responder, outcome);
        });
    }

    /// Race the runner against the task's budget and a queue abort; exactly one side wins
    async fn run(&self, invocation: &Invocation) -> TaskResult {
        let execution = AssertUnwindSafe(self.runner.run(invocation)).catch_unwind();
        let mut abort = self.abort.subscribe();

        let outcome = tokio::select! {
            outcome = tokio::time::timeout(invocation.timeout, execution) => outcome,
            reason = abort_reason(&mut abort) => {
                warn!("task_id={} status=aborted reason={}", invocation.id, reason);
                return Err(TaskError::queue_cleared(reason));
            }
        };

        match outcome {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                error!("task_id={} status=runner_panicked", invocation.id);
                Err(TaskError::spawn(
                    invocation.script(),
                    "process runner panicked",
                ))
            }
            // The runner future is gone by now, which kills the child.
            Err(_) => {
                warn!(
                    "task_id={} status=timeout budget={} script={}",
                    invocation.id,
                    humantime::format_duration(invocation.timeout),
                    invocation.script()
                );
                Err(TaskError::Timeout {
                    timeout: invocation.timeout,
                })
            }
        }
    }

    /// Release the slot, record the outcome, deliver it and backfill from the queue
    fn complete(self: &Arc<Self>, invocation: &Invocation, responder: Responder, outcome: TaskResult) {
        let (next, idle) = {
            let mut guard = self.state();
            let state = &mut *guard;
            debug_assert!(state.active > 0, "completion without an active slot");
            state.active = state.active.saturating_sub(1);
            state.counters.record_completion(outcome.is_err());

            // The freed slot goes to the oldest waiting task before any new
            // submission can observe it.
            let next = state.pending.pop_front();
            if next.is_some() {
                state.active += 1;
                state.counters.record_start(state.active);
            }
            (next, state.is_idle())
        };

        match &outcome {
            Ok(output) => debug!(
                "task_id={} status=completed output_bytes={} elapsed_ms={}",
                invocation.id,
                output.len(),
                invocation.age().as_millis()
            ),
            Err(e) => warn!(
                "task_id={} status=failed kind={} error={}",
                invocation.id,
                e.kind(),
                e
            ),
        }

        responder.fulfil(outcome);

        if idle {
            self.idle.notify_waiters();
        }
        if let Some(next) = next {
            self.launch(next);
        }
    }
}

async fn abort_reason(abort: &mut watch::Receiver<Option<String>>) -> String {
    let reason = abort
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|reason| (*reason).clone());
    match reason {
        Some(reason) => reason,
        // The sender lives as long as the queue
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process_runner::MockProcessRunner;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, oneshot};
    use tracing_test::traced_test;

    /// Runner whose tasks finish only when the test releases them
    struct ControlledRunner {
        started: mpsc::UnboundedSender<String>,
        gates: Mutex<HashMap<String, oneshot::Receiver<TaskResult>>>,
    }

    impl ControlledRunner {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (started, started_rx) = mpsc::unbounded_channel();
            let runner = Arc::new(Self {
                started,
                gates: Mutex::new(HashMap::new()),
            });
            (runner, started_rx)
        }

        fn gate(&self, label: &str) -> oneshot::Sender<TaskResult> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(label.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl ProcessRunner for ControlledRunner {
        async fn run(&self, invocation: &Invocation) -> TaskResult<String> {
            let label = invocation.script().to_string();
            let gate = self.gates.lock().unwrap().remove(&label);
            let _ = self.started.send(label.clone());
            match gate {
                Some(gate) => gate
                    .await
                    .unwrap_or_else(|_| Err(TaskError::spawn(&label, "gate dropped"))),
                None => Ok(label),
            }
        }
    }

    struct SleepingRunner(Duration);

    #[async_trait]
    impl ProcessRunner for SleepingRunner {
        async fn run(&self, _invocation: &Invocation) -> TaskResult<String> {
            tokio::time::sleep(self.0).await;
            Ok("finished".to_string())
        }
    }

    fn config(max_concurrency: usize) -> TaskQueueConfig {
        TaskQueueConfig {
            max_concurrency,
            ..TaskQueueConfig::default()
        }
    }

    fn assert_conserved(stats: &QueueStats) {
        assert_eq!(
            stats.total_submitted,
            stats.total_processed
                + stats.active_processes as u64
                + stats.queued_tasks as u64
                + stats.total_cleared
        );
    }

    #[tokio::test]
    async fn five_tasks_through_two_slots() {
        let (runner, mut started) = ControlledRunner::new();
        let [gate_a, gate_b, gate_c, gate_d, gate_e] =
            ["A", "B", "C", "D", "E"].map(|label| runner.gate(label));
        let queue = TaskQueue::with_runner(runner.clone(), &config(2)).unwrap();

        let [a, b, c, d, e] =
            ["A", "B", "C", "D", "E"].map(|label| queue.submit([label], None).unwrap());

        let mut first = vec![started.recv().await.unwrap(), started.recv().await.unwrap()];
        first.sort();
        assert_eq!(first, ["A", "B"]);

        let stats = queue.snapshot();
        assert_eq!(stats.active_processes, 2);
        assert_eq!(stats.queued_tasks, 3);
        assert!(stats.peak_queue_size >= 3);
        assert_eq!(stats.utilization_percent, 100);
        assert_conserved(&stats);

        gate_a.send(Ok("a".into())).unwrap();
        assert_eq!(a.await, Ok("a".to_string()));
        assert_eq!(started.recv().await.unwrap(), "C");
        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.active_processes, 2);
        assert_eq!(stats.queued_tasks, 2);

        gate_b.send(Ok("b".into())).unwrap();
        assert_eq!(b.await, Ok("b".to_string()));
        assert_eq!(started.recv().await.unwrap(), "D");

        gate_c.send(Ok("c".into())).unwrap();
        assert_eq!(c.await, Ok("c".to_string()));
        assert_eq!(started.recv().await.unwrap(), "E");

        gate_d.send(Ok("d".into())).unwrap();
        gate_e.send(Ok("e".into())).unwrap();
        assert_eq!(d.await, Ok("d".to_string()));
        assert_eq!(e.await, Ok("e".to_string()));

        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 5);
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.active_processes, 0);
        assert_eq!(stats.peak_active, 2);
        assert_eq!(stats.total_queued, 3);
        assert_eq!(stats.total_errors, 0);
        assert_conserved(&stats);
    }

    #[tokio::test]
    async fn waiting_tasks_start_in_submission_order() {
        let labels = ["t1", "t2", "t3", "t4", "t5", "t6"];
        let (runner, mut started) = ControlledRunner::new();
        let gates: Vec<_> = labels.iter().map(|label| runner.gate(label)).collect();
        let queue = TaskQueue::with_runner(runner.clone(), &config(1)).unwrap();

        let handles: Vec<_> = labels
            .iter()
            .map(|label| queue.submit([*label], None).unwrap())
            .collect();

        for (expected, gate) in labels.iter().zip(gates) {
            assert_eq!(started.recv().await.unwrap(), *expected);
            assert!(queue.snapshot().active_processes <= 1);
            gate.send(Ok(expected.to_string())).unwrap();
        }

        for (expected, handle) in labels.iter().zip(handles) {
            assert_eq!(handle.await, Ok(expected.to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_task_and_frees_slot() {
        let queue =
            TaskQueue::with_runner(Arc::new(SleepingRunner(Duration::from_secs(5))), &config(1))
                .unwrap();
        let before = queue.snapshot().active_processes;

        let started = tokio::time::Instant::now();
        let outcome = queue
            .execute(["slow.py"], Some(Duration::from_millis(50)))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(
            outcome,
            Err(TaskError::Timeout {
                timeout: Duration::from_millis(50)
            })
        );
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));

        let stats = queue.snapshot();
        assert_eq!(stats.active_processes, before);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.total_processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_exit_and_timeout_resolve_once() {
        let queue =
            TaskQueue::with_runner(Arc::new(SleepingRunner(Duration::from_millis(50))), &config(2))
                .unwrap();

        let outcome = queue
            .execute(["edge.py"], Some(Duration::from_millis(50)))
            .await;
        assert!(matches!(
            outcome,
            Ok(_) | Err(TaskError::Timeout { .. })
        ));

        // Let any straggling timer fire.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.active_processes, 0);
    }

    #[tokio::test]
    async fn clear_queue_rejects_only_pending_tasks() {
        let (runner, mut started) = ControlledRunner::new();
        let [gate_a, gate_b, _gate_c, _gate_d, _gate_e] =
            ["A", "B", "C", "D", "E"].map(|label| runner.gate(label));
        let queue = TaskQueue::with_runner(runner.clone(), &config(2)).unwrap();
        let [a, b, c, d, e] =
            ["A", "B", "C", "D", "E"].map(|label| queue.submit([label], None).unwrap());

        started.recv().await.unwrap();
        started.recv().await.unwrap();

        assert_eq!(queue.clear_queue("shutdown"), 3);
        for handle in [c, d, e] {
            match handle.await {
                Err(TaskError::QueueCleared { reason }) => assert!(reason.contains("shutdown")),
                other => panic!("expected queue_cleared, got {other:?}"),
            }
        }

        let stats = queue.snapshot();
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.active_processes, 2);
        assert_eq!(stats.total_cleared, 3);
        assert_conserved(&stats);

        gate_a.send(Ok("a".into())).unwrap();
        gate_b.send(Ok("b".into())).unwrap();
        assert_eq!(a.await, Ok("a".to_string()));
        assert_eq!(b.await, Ok("b".to_string()));

        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.total_errors, 0);
        assert_eq!(stats.active_processes, 0);
        assert_conserved(&stats);
        assert!(started.try_recv().is_err());
    }

    #[tokio::test]
    async fn clear_on_empty_queue_is_a_no_op() {
        let queue = TaskQueue::with_runner(Arc::new(SleepingRunner(Duration::ZERO)), &config(2))
            .unwrap();
        assert_eq!(queue.clear_queue("nothing to do"), 0);
        assert_eq!(queue.snapshot().total_cleared, 0);
    }

    #[tokio::test]
    async fn spawn_failures_never_leak_slots() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(3)
            .returning(|_| Err(TaskError::spawn("python3", "No such file or directory")));
        let queue = TaskQueue::with_runner(Arc::new(runner), &config(1)).unwrap();

        let handles: Vec<_> = (0..3)
            .map(|i| queue.submit([format!("job_{i}.py")], None).unwrap())
            .collect();
        for handle in handles {
            assert!(matches!(handle.await, Err(TaskError::Spawn { .. })));
        }

        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.active_processes, 0);
        assert_eq!(stats.queued_tasks, 0);
    }

    #[tokio::test]
    async fn runner_receives_arguments_and_timeout() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|invocation| {
                invocation.args == ["M3U_Matrix_Pro.py", "--validate", "list.m3u"]
                    && invocation.timeout == Duration::from_secs(7)
            })
            .times(1)
            .returning(|_| Ok("valid".to_string()));
        let queue = TaskQueue::with_runner(Arc::new(runner), &config(4)).unwrap();

        let output = queue
            .execute(
                ["M3U_Matrix_Pro.py", "--validate", "list.m3u"],
                Some(Duration::from_secs(7)),
            )
            .await;
        assert_eq!(output, Ok("valid".to_string()));
    }

    #[tokio::test]
    async fn default_timeout_applies_when_none_given() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|invocation| invocation.timeout == Duration::from_millis(1500))
            .times(1)
            .returning(|_| Ok(String::new()));
        let queue = TaskQueue::with_runner(
            Arc::new(runner),
            &TaskQueueConfig {
                default_timeout: Duration::from_millis(1500),
                ..config(1)
            },
        )
        .unwrap();

        assert_eq!(queue.execute(["noop.py"], None).await, Ok(String::new()));
    }

    #[rstest]
    #[case::empty_arguments(Vec::new(), None)]
    #[case::zero_timeout(vec!["script.py".to_string()], Some(Duration::ZERO))]
    #[tokio::test]
    async fn invalid_submissions_never_enter_the_queue(
        #[case] args: Vec<String>,
        #[case] timeout: Option<Duration>,
    ) {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().never();
        let queue = TaskQueue::with_runner(Arc::new(runner), &config(1)).unwrap();

        let result = queue.submit(args, timeout);
        assert!(matches!(result, Err(TaskError::Configuration { .. })));

        let stats = queue.snapshot();
        assert_eq!(stats.total_submitted, 0);
        assert_eq!(stats.queued_tasks, 0);
        assert_eq!(stats.active_processes, 0);
    }

    #[tokio::test]
    async fn panicking_runner_still_releases_its_slot() {
        struct PanickingRunner;

        #[async_trait]
        impl ProcessRunner for PanickingRunner {
            async fn run(&self, _invocation: &Invocation) -> TaskResult<String> {
                panic!("runner bug");
            }
        }

        let queue = TaskQueue::with_runner(Arc::new(PanickingRunner), &config(1)).unwrap();
        let outcome = queue.execute(["boom.py"], None).await;
        assert!(matches!(outcome, Err(TaskError::Spawn { .. })));

        let stats = queue.snapshot();
        assert_eq!(stats.active_processes, 0);
        assert_eq!(stats.total_errors, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_bound_holds_under_load() {
        struct CountingRunner {
            in_flight: AtomicUsize,
            max_seen: AtomicUsize,
        }

        #[async_trait]
        impl ProcessRunner for CountingRunner {
            async fn run(&self, invocation: &Invocation) -> TaskResult<String> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(invocation.script().to_string())
            }
        }

        let runner = Arc::new(CountingRunner {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let queue = TaskQueue::with_runner(runner.clone(), &config(3)).unwrap();

        let handles: Vec<_> = (0..40)
            .map(|i| queue.submit([format!("task_{i}")], None).unwrap())
            .collect();
        let mut peak_observed = 0;
        for (i, handle) in handles.into_iter().enumerate() {
            peak_observed = peak_observed.max(queue.snapshot().active_processes);
            assert_eq!(handle.await, Ok(format!("task_{i}")));
        }

        assert!(peak_observed <= 3);
        assert!(runner.max_seen.load(Ordering::SeqCst) <= 3);

        let stats = queue.snapshot();
        assert_eq!(stats.total_processed, 40);
        assert_eq!(stats.peak_active, 3);
        assert!(stats.peak_queue_size <= 37);
        assert_conserved(&stats);
    }

    #[tokio::test]
    async fn queued_handle_stays_pending_until_promoted() {
        let (runner, mut started) = ControlledRunner::new();
        let gate = runner.gate("first");
        let queue = TaskQueue::with_runner(runner.clone(), &config(1)).unwrap();

        let first = queue.submit(["first"], None).unwrap();
        let mut second = tokio_test::task::spawn(queue.submit(["second"], None).unwrap());
        started.recv().await.unwrap();
        tokio_test::assert_pending!(second.poll());

        gate.send(Ok("one".into())).unwrap();
        assert_eq!(first.await, Ok("one".to_string()));
        assert_eq!(second.await, Ok("second".to_string()));
    }

    #[tokio::test]
    async fn abort_running_stops_tasks_and_releases_slots() {
        let (runner, mut started) = ControlledRunner::new();
        let _gates = [runner.gate("A"), runner.gate("B")];
        let queue = TaskQueue::with_runner(runner.clone(), &config(2)).unwrap();

        let a = queue.submit(["A"], None).unwrap();
        let b = queue.submit(["B"], None).unwrap();
        started.recv().await.unwrap();
        started.recv().await.unwrap();

        assert_eq!(queue.abort_running("drain timeout"), 2);
        for handle in [a, b] {
            assert_eq!(handle.await, Err(TaskError::queue_cleared("drain timeout")));
        }
        tokio::time::timeout(Duration::from_secs(1), queue.wait_idle())
            .await
            .expect("aborted tasks should release their slots");

        let stats = queue.snapshot();
        assert_eq!(stats.active_processes, 0);
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.total_cleared, 0);
        assert_conserved(&stats);
    }

    #[tokio::test]
    async fn abort_on_idle_queue_reports_nothing_running() {
        let queue = TaskQueue::with_runner(Arc::new(SleepingRunner(Duration::ZERO)), &config(2))
            .unwrap();
        assert_eq!(queue.abort_running("drain timeout"), 0);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_task() {
        let (runner, mut started) = ControlledRunner::new();
        let gate = runner.gate("only");
        let queue = TaskQueue::with_runner(runner.clone(), &config(1)).unwrap();

        assert!(queue.is_idle());
        let handle = queue.submit(["only"], None).unwrap();
        started.recv().await.unwrap();
        assert!(!queue.is_idle());

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.send(Ok("done".into())).unwrap();
        assert_eq!(handle.await, Ok("done".to_string()));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_idle should resolve")
            .unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn queue_depth_is_logged_at_threshold() {
        let (runner, mut started) = ControlledRunner::new();
        let _gates: Vec<_> = (0..6).map(|i| runner.gate(&format!("job{i}"))).collect();
        let queue = TaskQueue::with_runner(runner.clone(), &config(1)).unwrap();

        let _handles: Vec<_> = (0..6)
            .map(|i| queue.submit([format!("job{i}")], None).unwrap())
            .collect();
        started.recv().await.unwrap();

        assert_eq!(queue.snapshot().queued_tasks, 5);
        assert!(logs_contain("Task queue depth reached 5"));
    }
}
