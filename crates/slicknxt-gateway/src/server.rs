use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use slicknxt_core::config::GatewayConfig;
use slicknxt_engine::EngineHandle;

use crate::routes;
use crate::state::AppState;

/// Routes of the gateway, without a listener.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(routes::ws_handler))
        // REST API
        .route("/api/health", get(routes::health))
        .route("/api/flow", get(routes::get_flow).put(routes::put_flow))
        .route("/api/flow/start", post(routes::start))
        .route("/api/flow/stop", post(routes::stop))
        .route("/api/flow/status", get(routes::status))
        .route("/api/flow/snapshot", get(routes::snapshot))
        .route("/api/flow/input", post(routes::input))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// WebSocket + HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: EngineHandle,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, engine: EngineHandle) -> Self {
        Self { config, engine }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            engine: self.engine.clone(),
        });
        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(
            bind = %self.config.bind,
            auth = self.config.token.as_deref().is_some_and(|t| !t.is_empty()),
            "Gateway listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
