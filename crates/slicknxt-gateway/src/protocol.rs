use serde::{Deserialize, Serialize};

use slicknxt_core::error::SlickError;
use slicknxt_core::types::{EngineEvent, InputEvent};

/// A frame sent from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Request expecting a `response` frame with the same id.
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Fire-and-forget input event.
    Input(InputEvent),
}

/// A response frame sent to the client.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Error shape shared by HTTP responses and WebSocket frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl ErrorBody {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.to_string(),
        }
    }
}

impl From<&SlickError> for ErrorBody {
    fn from(e: &SlickError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

/// An event frame pushed to the client.
#[derive(Debug, Serialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: EventPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ServerResponse {
    pub fn ok(id: String, result: serde_json::Value) -> Self {
        Self {
            frame_type: "response".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: String, error: ErrorBody) -> Self {
        Self {
            frame_type: "response".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl ServerEvent {
    pub fn new(kind: &str) -> Self {
        Self {
            frame_type: "event".to_string(),
            event: EventPayload {
                kind: kind.to_string(),
                data: None,
            },
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.event.data = Some(data);
        self
    }

    /// Frame for an engine event.
    pub fn from_engine(event: &EngineEvent) -> Self {
        match event {
            EngineEvent::Snapshot(snapshot) => Self::new("snapshot")
                .with_data(serde_json::to_value(snapshot.as_ref()).unwrap_or_default()),
            EngineEvent::StateChanged { state } => {
                Self::new("state_changed").with_data(serde_json::json!({ "state": state }))
            }
            EngineEvent::FlowLoaded { nodes, edges } => Self::new("flow_loaded")
                .with_data(serde_json::json!({ "nodes": nodes, "edges": edges })),
            EngineEvent::Fault { error } => Self::new("fault").with_data(serde_json::json!({
                "error": error.to_string(),
                "nodes": error.nodes,
            })),
            EngineEvent::FaultCleared => Self::new("fault_cleared"),
            EngineEvent::InputRejected { event, reason } => {
                Self::new("input_rejected").with_data(serde_json::json!({
                    "nodeId": event.node_id,
                    "portName": event.port_name,
                    "reason": reason,
                }))
            }
        }
    }
}
