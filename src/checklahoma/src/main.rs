//! Checklahoma — constituent event check-in and points dashboard,
//! backed by NeonCRM.
//!
//! Main entry point that initializes all subsystems and starts the server.

use checkin_api::{ApiServer, SessionStore};
use checkin_core::config::AppConfig;
use checkin_crm::CrmClient;
use checkin_points::PointsReconciler;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "checklahoma")]
#[command(about = "Constituent check-in and points dashboard backed by NeonCRM")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CHECKLAHOMA__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CHECKLAHOMA__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "CHECKLAHOMA__METRICS__PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checklahoma=info,checkin_api=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Checklahoma starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    if config.crm.org_id.is_empty() || config.crm.api_key.is_empty() {
        warn!("CRM org id or API key not configured; CRM calls will fail");
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    // Initialize the CRM client and points reconciler
    let crm = Arc::new(CrmClient::new(&config.crm)?);
    let reconciler = Arc::new(PointsReconciler::new(&config.points));
    let sessions = Arc::new(SessionStore::new(&config.session));

    // Start API server
    let api_server = ApiServer::new(config, crm, reconciler, sessions.clone());

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn session maintenance task
    let sessions_for_maintenance = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            sessions_for_maintenance.purge_expired();
        }
    });

    info!("Checklahoma is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
