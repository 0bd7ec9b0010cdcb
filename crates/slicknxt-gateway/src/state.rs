use slicknxt_core::config::GatewayConfig;
use slicknxt_engine::EngineHandle;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: EngineHandle,
}
