use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, info, warn};

use slicknxt_core::error::SlickError;
use slicknxt_core::types::{FlowDescription, InputEvent};

use crate::connection;
use crate::middleware::Authenticated;
use crate::protocol::ErrorBody;
use crate::state::AppState;

/// Error returned by REST handlers, rendered as `{error, kind}`.
pub enum ApiError {
    Engine(SlickError),
    BadBody(JsonRejection),
}

impl From<SlickError> for ApiError {
    fn from(e: SlickError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadBody(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(e) => {
                let status = match &e {
                    SlickError::Construction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    SlickError::Cycle(_) => StatusCode::CONFLICT,
                    SlickError::MalformedInput(_) => StatusCode::BAD_REQUEST,
                    SlickError::EngineUnavailable | SlickError::InputQueueFull => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ErrorBody::from(&e))
            }
            ApiError::BadBody(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("bad_request", rejection.body_text()),
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// GET /api/health (no auth)
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/flow
pub async fn get_flow(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<FlowDescription>> {
    Ok(Json(state.engine.describe().await?))
}

// PUT /api/flow
pub async fn put_flow(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    body: Result<Json<FlowDescription>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(flow) = body?;
    let (nodes, edges) = (flow.nodes.len(), flow.edges.len());
    if let Err(e) = state.engine.replace_flow(flow).await {
        warn!(error = %e, "Flow rejected");
        return Err(e.into());
    }
    info!(nodes, edges, "Flow replaced via API");
    Ok(Json(serde_json::json!({ "nodes": nodes, "edges": edges })))
}

// POST /api/flow/start
pub async fn start(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let run_state = state.engine.start().await?;
    Ok(Json(serde_json::json!({ "state": run_state })))
}

// POST /api/flow/stop
pub async fn stop(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let run_state = state.engine.stop().await?;
    Ok(Json(serde_json::json!({ "state": run_state })))
}

// GET /api/flow/status
pub async fn status(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = state.engine.status().await?;
    Ok(Json(serde_json::to_value(status).map_err(SlickError::from)?))
}

// GET /api/flow/snapshot, 204 until the first tick
pub async fn snapshot(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    Ok(match state.engine.latest_snapshot().await? {
        Some(snap) => Json(snap.as_ref().clone()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

// POST /api/flow/input
pub async fn input(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    body: Result<Json<InputEvent>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(event) = body?;
    debug!(node = %event.node_id, port = %event.port_name, "Input via API");
    state.engine.submit_input(event)?;
    Ok(StatusCode::ACCEPTED)
}

// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket client connected");
    connection::handle_connection(socket, state.engine.clone()).await;
    debug!("WebSocket client disconnected");
}
