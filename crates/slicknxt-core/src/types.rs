use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CycleError;
use crate::port::PortValue;

/// Complete flow as exchanged with the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDescription {
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub edges: Vec<EdgeDescription>,
}

impl FlowDescription {
    pub fn new(nodes: Vec<NodeDescription>, edges: Vec<EdgeDescription>) -> Self {
        Self { nodes, edges }
    }
}

/// Editor canvas position. Carried through, never interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: String,
    /// Node type tag, e.g. `dialNode`.
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Configuration record.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Editor-only fields (selection, dimensions, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeDescription {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: None,
            data: serde_json::Map::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Set one configuration field.
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl EdgeDescription {
    /// Edge between two named ports.
    pub fn connect(
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            source_handle: Some(source_port.into()),
            target: target.into(),
            target_handle: Some(target_port.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// An external write to a node field, e.g. a dial being turned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEvent {
    pub node_id: String,
    pub port_name: String,
    /// Raw JSON so that type mismatches are reported, not rejected at parse time.
    pub value: serde_json::Value,
}

impl InputEvent {
    pub fn new(
        node_id: impl Into<String>,
        port_name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            port_name: port_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
        }
    }
}

/// How a history display should render its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    #[default]
    Unknown,
    Boolean,
    Numeric,
}

/// One timestamped history sample. `t` is engine run time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub value: PortValue,
}

/// Per-node data rendered by the editor beside the output values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuxDisplay {
    /// Number/Bool display readout.
    Display { value: Option<PortValue> },
    History {
        signal: SignalKind,
        current: Option<PortValue>,
        samples: Vec<Sample>,
    },
}

/// Output values of every node after one tick. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSnapshot {
    pub tick: u64,
    /// Simulated run time at this tick, in seconds.
    pub elapsed_secs: f64,
    pub at: DateTime<Utc>,
    /// node id -> output port -> value
    pub nodes: BTreeMap<String, BTreeMap<String, Option<PortValue>>>,
    /// node id -> display data, only for nodes that render something
    pub aux_display_data: BTreeMap<String, AuxDisplay>,
}

impl TickSnapshot {
    /// Look up one output value.
    pub fn output(&self, node: &str, port: &str) -> Option<PortValue> {
        self.nodes.get(node)?.get(port).copied().flatten()
    }

    pub fn aux(&self, node: &str) -> Option<&AuxDisplay> {
        self.aux_display_data.get(node)
    }
}

/// Summary of the engine for status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStatus {
    pub state: RunState,
    pub tick: u64,
    pub nodes: usize,
    pub edges: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

/// Engine event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A tick completed.
    Snapshot(Arc<TickSnapshot>),
    /// The executor was started or stopped.
    StateChanged { state: RunState },
    /// A replacement flow was accepted.
    FlowLoaded { nodes: usize, edges: usize },
    /// Evaluation is paused on a cycle; the last snapshot stays current.
    Fault { error: CycleError },
    /// A previously reported cycle was resolved by a graph edit.
    FaultCleared,
    /// An input event was dropped.
    InputRejected { event: InputEvent, reason: String },
}
