use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use relay::config::BackendConfig;
use shared::admin_service::AdminService;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
use config::{Config, MetricsConfig};

/// Relay façade for the portal backend.
#[derive(Parser)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long)]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum PortalError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("backend config error: {0}")]
    Backend(#[from] relay::config::ConfigError),

    #[error("relay error: {0}")]
    Relay(#[from] relay::errors::RelayError),

    #[error("metrics error: {0}")]
    Metrics(String),
}

fn init_metrics(config: &MetricsConfig) -> Result<(), PortalError> {
    let recorder = StatsdBuilder::from(&config.statsd_host, config.statsd_port)
        .build(Some("portal"))
        .map_err(|e| PortalError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| PortalError::Metrics(e.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), PortalError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    if let Some(metrics_config) = &config.metrics {
        init_metrics(metrics_config)?;
    }

    let backend = match config.backend.clone() {
        Some(backend) => Some(backend),
        None => BackendConfig::from_env()?,
    };
    if backend.is_none() {
        tracing::error!(
            "no backend base URL configured; every relay call will answer with a 500"
        );
    }

    let configured = backend.is_some();
    let admin_service: AdminService<_, relay::errors::RelayError> =
        AdminService::new(move || configured);
    let admin_task = shared::http::run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    let relay_task = relay::run(&config.listener.host, config.listener.port, backend);

    tokio::select! {
        result = relay_task => result?,
        result = admin_task => result?,
    }

    Ok(())
}
