use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use slicknxt_core::config::{EngineConfig, GatewayConfig};
use slicknxt_core::event::EventBus;
use slicknxt_engine::{Engine, LoggingMotorDriver};
use slicknxt_gateway::{router, AppState};

async fn serve() -> (String, CancellationToken) {
    let cancel = CancellationToken::new();
    let config = EngineConfig {
        tick_rate_hz: 100.0,
        ..EngineConfig::default()
    };
    let (engine, handle) = Engine::new(
        &config,
        Arc::new(EventBus::new(64)),
        Box::new(LoggingMotorDriver::new()),
        cancel.clone(),
    );
    tokio::spawn(engine.run());

    let state = Arc::new(AppState {
        config: GatewayConfig::default(),
        engine: handle,
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });
    (format!("ws://{addr}/ws"), cancel)
}

/// Read frames until one satisfies `pred`.
async fn next_matching<S>(ws: &mut S, pred: impl Fn(&Value) -> bool) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws.next().await.expect("socket closed").expect("read error");
            if let Message::Text(t) = msg {
                let v: Value = serde_json::from_str(&t.to_string()).unwrap();
                if pred(&v) {
                    return v;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for frame")
}

#[tokio::test]
async fn test_request_response_and_snapshot_events() {
    let (url, cancel) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let replace = json!({
        "type": "req",
        "id": "1",
        "method": "flow.replace",
        "params": {
            "nodes": [
                {"id": "sw", "type": "switchNode"},
                {"id": "not", "type": "notNode"}
            ],
            "edges": [
                {"source": "sw", "sourceHandle": "value", "target": "not", "targetHandle": "input"}
            ]
        }
    });
    ws.send(Message::Text(replace.to_string().into())).await.unwrap();
    let resp = next_matching(&mut ws, |v| v["type"] == "response" && v["id"] == "1").await;
    assert_eq!(resp["result"], json!({"nodes": 2, "edges": 1}));

    let start = json!({"type": "req", "id": "2", "method": "flow.start"});
    ws.send(Message::Text(start.to_string().into())).await.unwrap();
    let resp = next_matching(&mut ws, |v| v["type"] == "response" && v["id"] == "2").await;
    assert_eq!(resp["result"]["state"], "running");

    let input = json!({"type": "input", "nodeId": "sw", "portName": "value", "value": true});
    ws.send(Message::Text(input.to_string().into())).await.unwrap();
    let snap = next_matching(&mut ws, |v| {
        v["type"] == "event"
            && v["event"]["kind"] == "snapshot"
            && v["event"]["data"]["nodes"]["not"]["output"] == json!(false)
    })
    .await;
    assert_eq!(snap["event"]["data"]["nodes"]["sw"]["value"], true);

    cancel.cancel();
}

#[tokio::test]
async fn test_unknown_method_and_bad_frame() {
    let (url, cancel) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let req = json!({"type": "req", "id": "9", "method": "flow.explode"});
    ws.send(Message::Text(req.to_string().into())).await.unwrap();
    let resp = next_matching(&mut ws, |v| v["type"] == "response" && v["id"] == "9").await;
    assert_eq!(resp["error"]["kind"], "unknown_method");

    ws.send(Message::Text("not json".to_string().into())).await.unwrap();
    let resp = next_matching(&mut ws, |v| v["type"] == "response" && v["id"] == "0").await;
    assert_eq!(resp["error"]["kind"], "bad_request");

    cancel.cancel();
}

#[tokio::test]
async fn test_mistyped_input_is_reported() {
    let (url, cancel) = serve().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let replace = json!({
        "type": "req",
        "id": "1",
        "method": "flow.replace",
        "params": {"nodes": [{"id": "d", "type": "dialNode"}], "edges": []}
    });
    ws.send(Message::Text(replace.to_string().into())).await.unwrap();
    next_matching(&mut ws, |v| v["id"] == "1").await;

    let input = json!({"type": "input", "nodeId": "d", "portName": "value", "value": "fast"});
    ws.send(Message::Text(input.to_string().into())).await.unwrap();
    let ev = next_matching(&mut ws, |v| v["event"]["kind"] == "input_rejected").await;
    assert_eq!(ev["event"]["data"]["nodeId"], "d");

    cancel.cancel();
}
