use trellis_core::config::GatewayConfig;
use trellis_graph::Scheduler;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    /// Every chat request starts a fresh run of this scheduler's graph.
    pub scheduler: Scheduler,
}
