use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use slicknxt_core::error::SlickError;
use slicknxt_core::types::FlowDescription;
use slicknxt_engine::EngineHandle;

use crate::protocol::{ClientFrame, ErrorBody, ServerEvent, ServerResponse};

type WsSink = Arc<Mutex<futures::stream::SplitSink<WebSocket, Message>>>;

async fn send_json<T: serde::Serialize>(tx: &WsSink, frame: &T) -> bool {
    let Ok(json) = serde_json::to_string(frame) else {
        return false;
    };
    tx.lock().await.send(Message::Text(json.into())).await.is_ok()
}

/// Handle a single WebSocket connection until the client goes away.
pub async fn handle_connection(ws: WebSocket, engine: EngineHandle) {
    let (ws_tx, mut ws_rx) = ws.split();
    let ws_tx: WsSink = Arc::new(Mutex::new(ws_tx));

    let mut event_rx = engine.subscribe();
    let event_ws_tx = ws_tx.clone();
    let event_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "WebSocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !send_json(&event_ws_tx, &ServerEvent::from_engine(&event)).await {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "WebSocket read error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "Unparseable WebSocket frame");
                        let resp = ServerResponse::err(
                            "0".to_string(),
                            ErrorBody::new("bad_request", format!("Parse error: {e}")),
                        );
                        send_json(&ws_tx, &resp).await;
                        continue;
                    }
                };

                match frame {
                    ClientFrame::Input(event) => {
                        // Fire-and-forget; type errors come back as input_rejected events.
                        if let Err(e) = engine.submit_input(event) {
                            debug!(error = %e, "WebSocket input not queued");
                        }
                    }
                    ClientFrame::Req { id, method, params } => {
                        let resp = match process_request(&method, params, &engine).await {
                            Ok(result) => ServerResponse::ok(id, result),
                            Err(body) => ServerResponse::err(id, body),
                        };
                        send_json(&ws_tx, &resp).await;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(data) => {
                let _ = ws_tx.lock().await.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    event_task.abort();
    debug!("Connection closed");
}

async fn process_request(
    method: &str,
    params: serde_json::Value,
    engine: &EngineHandle,
) -> Result<serde_json::Value, ErrorBody> {
    let engine_err = |e: SlickError| ErrorBody::from(&e);
    match method {
        "flow.replace" => {
            let flow: FlowDescription = serde_json::from_value(params)
                .map_err(|e| ErrorBody::new("bad_request", e.to_string()))?;
            let (nodes, edges) = (flow.nodes.len(), flow.edges.len());
            engine.replace_flow(flow).await.map_err(engine_err)?;
            Ok(serde_json::json!({ "nodes": nodes, "edges": edges }))
        }
        "flow.describe" => {
            let flow = engine.describe().await.map_err(engine_err)?;
            serde_json::to_value(flow).map_err(|e| engine_err(e.into()))
        }
        "flow.start" => {
            let state = engine.start().await.map_err(engine_err)?;
            Ok(serde_json::json!({ "state": state }))
        }
        "flow.stop" => {
            let state = engine.stop().await.map_err(engine_err)?;
            Ok(serde_json::json!({ "state": state }))
        }
        "flow.status" => {
            let status = engine.status().await.map_err(engine_err)?;
            serde_json::to_value(status).map_err(|e| engine_err(e.into()))
        }
        other => Err(ErrorBody::new(
            "unknown_method",
            format!("Unknown method: {other}"),
        )),
    }
}
