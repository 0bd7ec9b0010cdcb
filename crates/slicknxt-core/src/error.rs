use thiserror::Error;

use crate::port::{PortDirection, PortType};

/// A rejected graph edit. The graph is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("Unknown node type '{node_type}' for node {node}")]
    UnknownNodeType { node: String, node_type: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Invalid configuration for node {node}: {message}")]
    InvalidConfig { node: String, message: String },

    #[error("Node not found: {0}")]
    UnknownNode(String),

    #[error("Node {node} has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: PortDirection,
    },

    #[error("Incompatible ports: {source_node}.{source_port} ({source_type}) -> {target_node}.{target_port} ({target_type})")]
    IncompatiblePorts {
        source_node: String,
        source_port: String,
        source_type: PortType,
        target_node: String,
        target_port: String,
        target_type: PortType,
    },

    #[error("Input {node}.{port} already has an incoming edge")]
    InputAlreadyConnected { node: String, port: String },

    #[error("Duplicate edge id: {0}")]
    DuplicateEdge(String),

    #[error("Edge not found: {0}")]
    UnknownEdge(String),

    #[error("Device {resource} is bound by node {existing}, cannot bind it to {node}")]
    DeviceAlreadyBound {
        resource: String,
        node: String,
        existing: String,
    },
}

impl ConstructionError {
    /// Stable machine-readable rule name, sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ConstructionError::UnknownNodeType { .. } => "unknown_node_type",
            ConstructionError::DuplicateNode(_) => "duplicate_node",
            ConstructionError::InvalidConfig { .. } => "invalid_config",
            ConstructionError::UnknownNode(_) => "unknown_node",
            ConstructionError::UnknownPort { .. } => "unknown_port",
            ConstructionError::IncompatiblePorts { .. } => "incompatible_ports",
            ConstructionError::InputAlreadyConnected { .. } => "input_already_connected",
            ConstructionError::DuplicateEdge(_) => "duplicate_edge",
            ConstructionError::UnknownEdge(_) => "unknown_edge",
            ConstructionError::DeviceAlreadyBound { .. } => "device_already_bound",
        }
    }
}

/// The graph has no topological order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Flow contains a cycle through nodes: {}", .nodes.join(", "))]
pub struct CycleError {
    /// Nodes left unresolved by the sort, in insertion order.
    pub nodes: Vec<String>,
}

/// An external input event that cannot be applied. Dropped with a warning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Input for unknown node: {0}")]
    UnknownNode(String),

    #[error("Node {node} has no writable field '{field}'")]
    UnknownField { node: String, field: String },

    #[error("Input {node}.{field} is connected and cannot be overridden")]
    Connected { node: String, field: String },

    #[error("Input {node}.{field} expects {expected}, got {got}")]
    TypeMismatch {
        node: String,
        field: String,
        expected: PortType,
        got: String,
    },

    #[error("Input {node}.{field} rejected: {message}")]
    InvalidSetting {
        node: String,
        field: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum SlickError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Malformed input event: {0}")]
    MalformedInput(#[from] InputError),

    // Engine errors
    #[error("Engine is not running")]
    EngineUnavailable,

    #[error("Input queue full, event dropped")]
    InputQueueFull,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlickError {
    pub fn kind(&self) -> &'static str {
        match self {
            SlickError::Construction(e) => e.kind(),
            SlickError::Cycle(_) => "cycle",
            SlickError::MalformedInput(_) => "malformed_input",
            SlickError::EngineUnavailable => "engine_unavailable",
            SlickError::InputQueueFull => "input_queue_full",
            SlickError::Config(_) | SlickError::ConfigNotFound(_) => "config",
            SlickError::Gateway(_) => "gateway",
            SlickError::Io(_) => "io",
            SlickError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, SlickError>;
