//! Plot API service.
//!
//! HTTP server turning combined multi-panel plot requests into series,
//! coordinate transforms and CSV exports.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use plot_api::config::ServiceConfig;
use plot_api::handlers;
use plot_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "plot-api")]
#[command(about = "Multi-panel scientific plot server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Backend and source configuration file
    #[arg(long, env = "PLOT_DATA_CONFIG")]
    data_config: Option<PathBuf>,

    /// Time zone used when a panel names none
    #[arg(long, env = "PLOT_DEFAULT_TZ")]
    default_tz: Option<String>,

    /// Wait on an exhausted backend pool, in milliseconds (0 fails fast)
    #[arg(long, env = "PLOT_POOL_WAIT_MS")]
    pool_wait_ms: Option<u64>,

    /// Lifetime of cached rank and channel lists, in seconds
    #[arg(long, env = "PLOT_CACHE_TTL_SECS")]
    cache_ttl_secs: Option<u64>,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::from_env();
        if let Some(path) = &self.data_config {
            config.data_config = path.clone();
        }
        if let Some(tz) = &self.default_tz {
            config.default_tz = tz.clone();
        }
        if let Some(ms) = self.pool_wait_ms {
            config.pool_wait_ms = ms;
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.cache_ttl_secs = secs;
        }
        config
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    } else if let Ok(threads_str) = env::var("TOKIO_WORKER_THREADS") {
        if let Ok(threads) = threads_str.parse::<usize>() {
            runtime_builder.worker_threads(threads);
        }
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(args))?;
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow!("Failed to install Prometheus recorder: {}", e))?;

    let config = args.service_config();
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    info!(
        data_config = %config.data_config.display(),
        default_tz = %config.default_tz,
        pool_wait_ms = config.pool_wait_ms,
        cache_ttl_secs = config.cache_ttl_secs,
        "Starting plot API server"
    );

    let state = Arc::new(AppState::new(config)?);

    let app = handlers::router(state, prometheus_handle)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
