//! Web layer module
//!
//! Thin HTTP handlers over the task queue. Handlers delegate to
//! [`TaskQueue`] and render every outcome through the standard
//! [`ApiResponse`] envelope.

use axum::{
    Router,
    routing::{get, post},
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::{Config, ShutdownConfig};
use crate::errors::{AppError, AppResult};
use crate::services::TaskQueue;

pub mod extractors;
pub mod handlers;
pub mod responses;

pub use responses::{ApiResponse, handle_error};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub task_queue: TaskQueue,
    pub config: Config,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
    task_queue: TaskQueue,
    shutdown: ShutdownConfig,
}

impl WebServer {
    pub fn new(config: Config, task_queue: TaskQueue) -> AppResult<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Invalid listen address {}:{}: {}",
                    config.web.host, config.web.port, e
                ))
            })?;

        let shutdown = config.shutdown.clone();
        let app = create_router(AppState {
            task_queue: task_queue.clone(),
            config,
        });

        Ok(Self {
            app,
            addr,
            task_queue,
            shutdown,
        })
    }

    /// Serve until `shutdown` resolves, reporting the bound address or the bind failure on `ready_signal`
    ///
    /// Once `shutdown` fires the queue is cleared and running tasks get
    /// `drain_timeout` to finish. Whatever is still running then is aborted,
    /// so in-flight requests answer and the server can stop.
    pub async fn serve_with_shutdown<F>(
        self,
        ready_signal: oneshot::Sender<AppResult<SocketAddr>>,
        shutdown: F,
    ) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                let message = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(AppError::internal(message.clone())));
                return Err(AppError::internal(message));
            }
        };
        let local_addr = listener.local_addr()?;
        let _ = ready_signal.send(Ok(local_addr));

        let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
        let signal = async move {
            shutdown.await;
            let _ = stopping_tx.send(());
        };
        let server = axum::serve(listener, self.app)
            .with_graceful_shutdown(signal)
            .into_future();
        let drain = drain_on_shutdown(stopping_rx, self.task_queue, self.shutdown);

        let (served, ()) = tokio::join!(server, drain);
        served?;
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Clear pending work, then bound how long running tasks may keep the server alive
async fn drain_on_shutdown(
    stopping: oneshot::Receiver<()>,
    task_queue: TaskQueue,
    config: ShutdownConfig,
) {
    // The sender is dropped without firing when the server stops on its own
    if stopping.await.is_err() {
        return;
    }

    let cleared = task_queue.clear_queue(&config.clear_reason);
    info!("Cleared {} queued tasks on shutdown", cleared);

    let running = task_queue.snapshot().active_processes;
    if running == 0 {
        return;
    }
    info!(
        "Waiting up to {} for {} running tasks",
        humantime::format_duration(config.drain_timeout),
        running
    );
    if tokio::time::timeout(config.drain_timeout, task_queue.wait_idle())
        .await
        .is_err()
    {
        let aborted = task_queue.abort_running(&config.clear_reason);
        warn!("Drain timeout elapsed, aborted {} running tasks", aborted);
    }
}

/// Build the router for the given state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/live", get(handlers::health::liveness_check))
        .nest("/api/v1", api_v1_routes())
        // Middleware (applied in reverse order)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(handlers::tasks::run_task))
        .route("/tasks/stats", get(handlers::tasks::queue_stats))
}

/// Resolves on SIGTERM or SIGINT (Ctrl+C elsewhere)
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down gracefully");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install signal handlers ({}), falling back to Ctrl+C", e);
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
