//! Loyalty tier service. Keeps customer tiers current as transactions arrive.
//!
//! Main entry point that loads configuration and reference data, then
//! starts the HTTP server.

use clap::Parser;
use std::sync::Arc;
use tier_api::ApiServer;
use tier_core::config::AppConfig;
use tier_loyalty::LoyaltyService;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tier-service")]
#[command(about = "Loyalty tier transition service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "TIER_SERVICE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "TIER_SERVICE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// JSON tier program to load instead of the built-in one
    #[arg(long, env = "TIER_SERVICE__LOYALTY__REFERENCE_DATA_PATH")]
    reference_data: Option<String>,

    /// Accept transactions older than the customer's last one
    #[arg(long, default_value_t = false)]
    allow_out_of_order: bool,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tier_service=info,tier_loyalty=info,tier_api=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Loyalty tier service starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(path) = cli.reference_data {
        config.loyalty.reference_data_path = Some(path);
    }
    if cli.allow_out_of_order {
        config.loyalty.reject_out_of_order = false;
    }
    if cli.no_metrics {
        config.metrics.enabled = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        active_window_days = config.loyalty.active_window_days,
        downgrade_window_days = config.loyalty.downgrade_window_days,
        reference_data = config.loyalty.reference_data_path.as_deref().unwrap_or("built-in"),
        "Configuration loaded"
    );

    // Reference data problems are fatal: no transaction can be processed.
    let service = Arc::new(LoyaltyService::from_config(&config.loyalty)?);

    let api_server = ApiServer::new(config.clone(), service);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Loyalty tier service is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
