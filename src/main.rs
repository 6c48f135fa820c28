//! WebhookTrader - Main Entry Point
//!
//! Listens for trading alerts over HTTP and executes them on the configured
//! futures venues.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use webhook_trader::api::{create_router, AppState};
use webhook_trader::common::channels::create_notification_channel_with_size;
use webhook_trader::config::{load_config, load_from_env, AppConfig};
use webhook_trader::engine::DedupWindow;
use webhook_trader::notify::spawn_dispatcher;
use webhook_trader::{Exchange, ExecutionGateway, RestGateway, SignalOrchestrator, TelegramNotifier};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Listen port, overrides configuration
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Listen address, overrides configuration
    #[arg(long)]
    host: Option<String>,
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load(args: &Args) -> Result<AppConfig> {
    let config = if Path::new(&args.config).exists() {
        load_config(Some(args.config.as_str()))
    } else {
        load_from_env()
    };
    config.context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_logging(&args)?;
    info!("Starting WebhookTrader");
    info!("Configuration file: {}", args.config);

    let mut config = load(&args)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    let settings = &config.settings;

    let gateway = RestGateway::with_timeout(
        &config.exchanges,
        settings.use_sandbox,
        Duration::from_secs(settings.order_timeout_seconds),
    )?;
    if settings.use_sandbox {
        info!("Sandbox mode: orders go to testnet / demo environments");
    } else {
        warn!("Production mode: orders use real funds");
    }
    for exchange in Exchange::ALL {
        if gateway.is_configured(exchange) {
            info!(%exchange, "Exchange configured");
        }
    }
    if gateway.configured().is_empty() {
        warn!("No exchange credentials found, every alert will be rejected");
    }

    let notify_timeout = Duration::from_secs(settings.notify_timeout_seconds);
    let notifier = TelegramNotifier::with_timeout(config.telegram.clone(), notify_timeout)?;
    let (sender, receiver) = create_notification_channel_with_size(settings.notification_buffer);
    let dispatcher = spawn_dispatcher(receiver, Arc::new(notifier), notify_timeout);

    let orchestrator = SignalOrchestrator::new(Arc::new(gateway), sender)
        .with_dedup(DedupWindow::new(settings.dedup_bucket_seconds, settings.dedup_capacity))
        .with_order_timeout(Duration::from_secs(settings.order_timeout_seconds));
    let app = create_router(AppState::new(Arc::new(orchestrator), settings.use_sandbox));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for alerts");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal, cleaning up...");
        })
        .await?;

    // The router owned the last sender; let queued notifications drain
    if tokio::time::timeout(notify_timeout, dispatcher).await.is_err() {
        warn!("Notification dispatcher did not finish in time");
    }

    Ok(())
}
