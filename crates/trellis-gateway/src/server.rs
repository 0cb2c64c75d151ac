use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use trellis_core::config::GatewayConfig;
use trellis_graph::Scheduler;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway that runs the configured graph once per chat request.
pub struct GatewayServer {
    config: GatewayConfig,
    scheduler: Scheduler,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, scheduler: Scheduler) -> Self {
        Self { config, scheduler }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            scheduler: self.scheduler.clone(),
        });
        let app = build_router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, nodes = self.scheduler.graph().len(), "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/graph", get(routes::describe_graph))
        .route("/api/chat", post(routes::chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
