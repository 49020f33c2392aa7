use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_task_queue::{
    config::Config,
    services::TaskQueue,
    web::{WebServer, shutdown_signal},
};

#[derive(Parser)]
#[command(name = "m3u-task-queue")]
#[command(version)]
#[command(about = "Bounded-concurrency runner for playlist backend scripts")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Maximum number of scripts running at once
    #[arg(short = 'j', long, value_name = "N")]
    max_concurrency: Option<usize>,

    /// Interpreter that runs each script
    #[arg(short, long, value_name = "PROGRAM")]
    interpreter: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("m3u_task_queue={},tower_http=trace", cli.log_level)
    } else {
        format!("m3u_task_queue={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting M3U Task Queue v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(max_concurrency) = cli.max_concurrency {
        config.task_queue.max_concurrency = max_concurrency;
    }
    if let Some(interpreter) = cli.interpreter {
        config.task_queue.interpreter = interpreter;
    }

    let task_queue = TaskQueue::from_config(&config.task_queue)?;
    let web_server = WebServer::new(config, task_queue.clone())?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle =
        tokio::spawn(web_server.serve_with_shutdown(server_ready_tx, shutdown_signal()));

    match server_ready_rx.await {
        Ok(Ok(addr)) => info!("Web server is now listening on {}", addr),
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(bind_error.into());
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    match server_handle.await {
        Ok(Ok(())) => info!("Web server stopped"),
        Ok(Err(e)) => tracing::error!("Web server failed: {}", e),
        Err(e) => tracing::error!("Web server task panicked: {}", e),
    }

    let stats = task_queue.snapshot();
    info!(
        "Shutdown complete: submitted={} processed={} errors={} cleared={}",
        stats.total_submitted, stats.total_processed, stats.total_errors, stats.total_cleared
    );

    Ok(())
}
