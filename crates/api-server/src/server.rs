//! API server — wires state into the HTTP router and metrics exporter.

use crate::rest::{self, AppState};
use crate::{auth_rest, points_rest, SessionStore};
use axum::routing::{get, post};
use axum::Router;
use checkin_core::config::AppConfig;
use checkin_crm::CrmClient;
use checkin_points::PointsReconciler;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    crm: Arc<CrmClient>,
    reconciler: Arc<PointsReconciler>,
    sessions: Arc<SessionStore>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        crm: Arc<CrmClient>,
        reconciler: Arc<PointsReconciler>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            crm,
            reconciler,
            sessions,
        }
    }

    /// Start the HTTP REST server (blocks until shutdown).
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            crm: self.crm.clone(),
            reconciler: self.reconciler.clone(),
            sessions: self.sessions.clone(),
            checkin_groups: Arc::new(self.config.checkin.groups.clone()),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Auth flow
            .route("/v1/auth/login-url", get(auth_rest::handle_login_url))
            .route("/v1/auth/callback", get(auth_rest::handle_callback))
            .route("/v1/auth/logout", post(auth_rest::handle_logout))
            // Points
            .route("/v1/dashboard", get(points_rest::handle_dashboard))
            .route("/v1/points", get(points_rest::handle_points))
            .route("/v1/checkin", post(points_rest::handle_checkin))
            .route("/v1/data-update", post(points_rest::handle_data_update))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
