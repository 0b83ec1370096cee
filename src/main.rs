use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use turnstile::config::TurnstileConfig;
use turnstile::http::HttpServer;
use turnstile::ratelimit::{spawn_rules_reloader, RateLimiter, RuleSet, Sweeper};

/// Per-endpoint HTTP rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Rate limit rules file, overriding the configuration
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting Turnstile Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = TurnstileConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.http_addr = bind;
    }
    if let Some(rules) = args.rules {
        config.rate_limiting.rules_path = Some(rules.display().to_string());
    }
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let rules_path = config.rate_limiting.rules_path.as_ref().map(PathBuf::from);
    let rules = match &rules_path {
        Some(path) => RuleSet::from_file(path)?,
        None => RuleSet::default(),
    };
    info!(
        namespace = %rules.namespace(),
        rules = rules.rules().len(),
        "Rate limit rules loaded"
    );

    let rate_limiter = Arc::new(RateLimiter::new(rules));
    let sweeper = Sweeper::spawn(rate_limiter.clone(), config.rate_limiting.sweep_interval());

    let reloader = match (rules_path, config.rate_limiting.reload_interval()) {
        (Some(path), Some(interval)) => {
            Some(spawn_rules_reloader(rate_limiter.clone(), path, interval))
        }
        _ => None,
    };

    let server = HttpServer::new(config.server.http_addr, rate_limiter);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(reloader) = reloader {
        reloader.abort();
    }
    sweeper.shutdown().await;

    info!("Turnstile Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
