//! API server — HTTP REST endpoints and the Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use eventrank_analyzer::RecommendationEngine;
use eventrank_core::config::AppConfig;
use eventrank_core::sink::ActionSink;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Collector
        .route("/v1/actions", post(rest::submit_action))
        // Queries
        .route(
            "/v1/users/:user_id/recommendations",
            get(rest::recommendations),
        )
        .route("/v1/events/:event_id/similar", get(rest::similar_events))
        .route("/v1/events/interactions", post(rest::interactions))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    engine: Arc<RecommendationEngine>,
    actions: Arc<dyn ActionSink>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        engine: Arc<RecommendationEngine>,
        actions: Arc<dyn ActionSink>,
    ) -> Self {
        Self {
            config,
            engine,
            actions,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            engine: self.engine.clone(),
            actions: self.actions.clone(),
            analyzer: self.config.analyzer.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
