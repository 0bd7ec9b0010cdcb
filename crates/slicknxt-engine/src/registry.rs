//! The closed set of node types: their ports, configuration fields and
//! which fields accept external writes.

use std::collections::BTreeMap;
use std::str::FromStr;

use slicknxt_core::error::ConstructionError;
use slicknxt_core::port::{PortDirection, PortType, PortValue};

/// Every node type the engine can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Dial,
    Switch,
    Motor,
    NumberDisplay,
    BoolDisplay,
    And,
    Or,
    Xor,
    Not,
    PulseTimer,
    DelayTimer,
    Comparator,
    BoolGate,
    Cap,
    Add,
    Subtract,
    HistoryDisplay,
    Integrator,
    PController,
}

/// A named, typed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    pub port_type: PortType,
}

/// A configuration field. Fields sharing a name with an input port act as
/// that port's fallback value while it is unconnected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: PortType,
    pub default: PortValue,
    /// Accepts external input events.
    pub writable: bool,
}

const fn port(name: &'static str, port_type: PortType) -> PortSpec {
    PortSpec { name, port_type }
}

const fn field(name: &'static str, default: PortValue, writable: bool) -> FieldSpec {
    let field_type = match default {
        PortValue::Bool(_) => PortType::Boolean,
        PortValue::Number(_) => PortType::Numeric,
    };
    FieldSpec {
        name,
        field_type,
        default,
        writable,
    }
}

use PortType::{Boolean as B, Numeric as N, Wildcard as W};
use PortValue::{Bool, Number};

static NONE: &[PortSpec] = &[];
static NO_FIELDS: &[FieldSpec] = &[];

static VALUE_NUM: &[PortSpec] = &[port("value", N)];
static VALUE_BOOL: &[PortSpec] = &[port("value", B)];
static MOTOR_PORTS: &[PortSpec] = &[port("onOff", B), port("forward", B), port("speed", N)];
static GATE_IN: &[PortSpec] = &[port("a", B), port("b", B)];
static NOT_IN: &[PortSpec] = &[port("input", B)];
static BOOL_OUT: &[PortSpec] = &[port("output", B)];
static NUM_OUT: &[PortSpec] = &[port("output", N)];
static ANY_OUT: &[PortSpec] = &[port("output", W)];
static NUM_AB: &[PortSpec] = &[port("a", N), port("b", N)];
static PULSE_IN: &[PortSpec] = &[port("enable", B), port("onDuration", N), port("offDuration", N)];
static DELAY_IN: &[PortSpec] = &[port("input", W), port("delay", N)];
static GATE_SIGNAL_IN: &[PortSpec] = &[port("signal", W), port("enable", B)];
static CAP_IN: &[PortSpec] = &[port("input", N), port("min", N), port("max", N)];
static HISTORY_IN: &[PortSpec] = &[port("value", W), port("sampleRate", N)];
static INTEGRATOR_IN: &[PortSpec] = &[port("input", N), port("enabled", B), port("reset", B)];
static PCONTROL_IN: &[PortSpec] = &[
    port("enabled", B),
    port("pGain", N),
    port("setpoint", N),
    port("currentValue", N),
];

static DIAL_FIELDS: &[FieldSpec] = &[field("value", Number(0.0), true)];
static SWITCH_FIELDS: &[FieldSpec] = &[field("value", Bool(false), true)];
static MOTOR_FIELDS: &[FieldSpec] = &[
    field("onOff", Bool(false), true),
    field("forward", Bool(true), true),
    field("speed", Number(50.0), true),
];
static PULSE_FIELDS: &[FieldSpec] = &[
    field("enable", Bool(false), true),
    field("onDuration", Number(2.0), true),
    field("offDuration", Number(2.0), true),
];
static DELAY_FIELDS: &[FieldSpec] = &[field("delay", Number(1.0), true)];
static COMPARATOR_FIELDS: &[FieldSpec] = &[field("threshold", Number(0.0), false)];
static BOOL_GATE_FIELDS: &[FieldSpec] = &[field("enable", Bool(false), true)];
static CAP_FIELDS: &[FieldSpec] = &[
    field("min", Number(0.0), true),
    field("max", Number(100.0), true),
];
static HISTORY_FIELDS: &[FieldSpec] = &[field("sampleRate", Number(0.5), true)];
static INTEGRATOR_FIELDS: &[FieldSpec] = &[
    field("enabled", Bool(true), true),
    field("reset", Bool(false), true),
];
static PCONTROL_FIELDS: &[FieldSpec] = &[
    field("enabled", Bool(false), true),
    field("pGain", Number(1.0), true),
    field("setpoint", Number(50.0), true),
    field("currentValue", Number(0.0), false),
];

impl NodeKind {
    pub const ALL: [NodeKind; 19] = [
        NodeKind::Dial,
        NodeKind::Switch,
        NodeKind::Motor,
        NodeKind::NumberDisplay,
        NodeKind::BoolDisplay,
        NodeKind::And,
        NodeKind::Or,
        NodeKind::Xor,
        NodeKind::Not,
        NodeKind::PulseTimer,
        NodeKind::DelayTimer,
        NodeKind::Comparator,
        NodeKind::BoolGate,
        NodeKind::Cap,
        NodeKind::Add,
        NodeKind::Subtract,
        NodeKind::HistoryDisplay,
        NodeKind::Integrator,
        NodeKind::PController,
    ];

    /// Type tag used in flow descriptions.
    pub fn type_tag(self) -> &'static str {
        match self {
            NodeKind::Dial => "dialNode",
            NodeKind::Switch => "switchNode",
            NodeKind::Motor => "motorNode",
            NodeKind::NumberDisplay => "numberDisplayNode",
            NodeKind::BoolDisplay => "boolDisplayNode",
            NodeKind::And => "andNode",
            NodeKind::Or => "orNode",
            NodeKind::Xor => "xorNode",
            NodeKind::Not => "notNode",
            NodeKind::PulseTimer => "pulseTimerNode",
            NodeKind::DelayTimer => "delayTimerNode",
            NodeKind::Comparator => "comparatorNode",
            NodeKind::BoolGate => "boolGateNode",
            NodeKind::Cap => "capNode",
            NodeKind::Add => "addNode",
            NodeKind::Subtract => "subtractNode",
            NodeKind::HistoryDisplay => "historyDisplayNode",
            NodeKind::Integrator => "integratorNode",
            NodeKind::PController => "pControllerNode",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Dial => "Dial",
            NodeKind::Switch => "Switch",
            NodeKind::Motor => "Motor",
            NodeKind::NumberDisplay => "Number Display",
            NodeKind::BoolDisplay => "Bool Display",
            NodeKind::And => "AND",
            NodeKind::Or => "OR",
            NodeKind::Xor => "XOR",
            NodeKind::Not => "NOT",
            NodeKind::PulseTimer => "Pulse Timer",
            NodeKind::DelayTimer => "Delay Timer",
            NodeKind::Comparator => "Comparator",
            NodeKind::BoolGate => "Bool Gate",
            NodeKind::Cap => "Cap",
            NodeKind::Add => "Add",
            NodeKind::Subtract => "Subtract",
            NodeKind::HistoryDisplay => "History Display",
            NodeKind::Integrator => "Integrator",
            NodeKind::PController => "P Controller",
        }
    }

    pub fn inputs(self) -> &'static [PortSpec] {
        match self {
            NodeKind::Dial | NodeKind::Switch => NONE,
            NodeKind::Motor => MOTOR_PORTS,
            NodeKind::NumberDisplay => VALUE_NUM,
            NodeKind::BoolDisplay => VALUE_BOOL,
            NodeKind::And | NodeKind::Or | NodeKind::Xor => GATE_IN,
            NodeKind::Not => NOT_IN,
            NodeKind::PulseTimer => PULSE_IN,
            NodeKind::DelayTimer => DELAY_IN,
            NodeKind::Comparator | NodeKind::Add | NodeKind::Subtract => NUM_AB,
            NodeKind::BoolGate => GATE_SIGNAL_IN,
            NodeKind::Cap => CAP_IN,
            NodeKind::HistoryDisplay => HISTORY_IN,
            NodeKind::Integrator => INTEGRATOR_IN,
            NodeKind::PController => PCONTROL_IN,
        }
    }

    pub fn outputs(self) -> &'static [PortSpec] {
        match self {
            NodeKind::Dial => VALUE_NUM,
            NodeKind::Switch => VALUE_BOOL,
            NodeKind::Motor => MOTOR_PORTS,
            NodeKind::NumberDisplay | NodeKind::BoolDisplay | NodeKind::HistoryDisplay => NONE,
            NodeKind::And
            | NodeKind::Or
            | NodeKind::Xor
            | NodeKind::Not
            | NodeKind::PulseTimer
            | NodeKind::Comparator => BOOL_OUT,
            NodeKind::DelayTimer | NodeKind::BoolGate => ANY_OUT,
            NodeKind::Cap
            | NodeKind::Add
            | NodeKind::Subtract
            | NodeKind::Integrator
            | NodeKind::PController => NUM_OUT,
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            NodeKind::Dial => DIAL_FIELDS,
            NodeKind::Switch => SWITCH_FIELDS,
            NodeKind::Motor => MOTOR_FIELDS,
            NodeKind::PulseTimer => PULSE_FIELDS,
            NodeKind::DelayTimer => DELAY_FIELDS,
            NodeKind::Comparator => COMPARATOR_FIELDS,
            NodeKind::BoolGate => BOOL_GATE_FIELDS,
            NodeKind::Cap => CAP_FIELDS,
            NodeKind::HistoryDisplay => HISTORY_FIELDS,
            NodeKind::Integrator => INTEGRATOR_FIELDS,
            NodeKind::PController => PCONTROL_FIELDS,
            _ => NO_FIELDS,
        }
    }

    pub fn ports(self, direction: PortDirection) -> &'static [PortSpec] {
        match direction {
            PortDirection::Input => self.inputs(),
            PortDirection::Output => self.outputs(),
        }
    }

    pub fn port(self, direction: PortDirection, name: &str) -> Option<&'static PortSpec> {
        self.ports(direction).iter().find(|p| p.name == name)
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Whether instances drive a physical actuator.
    pub fn is_device_backed(self) -> bool {
        matches!(self, NodeKind::Motor)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_tag())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.type_tag() == s)
            .ok_or_else(|| format!("unknown node type: {s}"))
    }
}

/// Motor output port on the NXT brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MotorPort {
    A,
    B,
    C,
}

impl FromStr for MotorPort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(MotorPort::A),
            "B" => Ok(MotorPort::B),
            "C" => Ok(MotorPort::C),
            other => Err(format!("invalid motor port '{other}', expected A, B or C")),
        }
    }
}

impl std::fmt::Display for MotorPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotorPort::A => write!(f, "A"),
            MotorPort::B => write!(f, "B"),
            MotorPort::C => write!(f, "C"),
        }
    }
}

/// Relational mode of a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    #[default]
    Greater,
    Less,
    Equal,
}

impl CompareMode {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            CompareMode::Greater => a > b,
            CompareMode::Less => a < b,
            CompareMode::Equal => a == b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareMode::Greater => ">",
            CompareMode::Less => "<",
            CompareMode::Equal => "==",
        }
    }
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(CompareMode::Greater),
            "<" => Ok(CompareMode::Less),
            "==" => Ok(CompareMode::Equal),
            other => Err(format!("invalid comparator mode '{other}', expected >, < or ==")),
        }
    }
}

/// Configuration that is not a port value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Settings {
    #[default]
    None,
    Motor { port: MotorPort },
    Comparator { mode: CompareMode },
}

/// Parsed configuration record of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    fields: BTreeMap<&'static str, PortValue>,
    pub settings: Settings,
}

impl NodeConfig {
    /// Defaults for `kind` with nothing overridden.
    pub fn defaults(kind: NodeKind) -> Self {
        Self {
            fields: kind.fields().iter().map(|f| (f.name, f.default)).collect(),
            settings: Settings::None,
        }
    }

    /// Parse a node's `data` record. Unknown keys are ignored; known keys
    /// with the wrong JSON type are rejected.
    pub fn parse(
        kind: NodeKind,
        node: &str,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<Self, ConstructionError> {
        let invalid = |message: String| ConstructionError::InvalidConfig {
            node: node.to_string(),
            message,
        };

        let mut config = Self::defaults(kind);
        for spec in kind.fields() {
            let Some(raw) = data.get(spec.name) else { continue };
            if raw.is_null() {
                continue;
            }
            match PortValue::from_json(raw) {
                Some(value) if value.port_type() == spec.field_type => {
                    config.fields.insert(spec.name, value);
                }
                _ => {
                    return Err(invalid(format!(
                        "field '{}' expects {}, got {}",
                        spec.name, spec.field_type, raw
                    )))
                }
            }
        }

        config.settings = match kind {
            NodeKind::Motor => {
                let port = match data.get("port") {
                    Some(serde_json::Value::String(s)) => s.parse::<MotorPort>().map_err(invalid)?,
                    Some(other) => return Err(invalid(format!("field 'port' expects a string, got {other}"))),
                    None => return Err(invalid("motor node requires a 'port' (A, B or C)".into())),
                };
                Settings::Motor { port }
            }
            NodeKind::Comparator => {
                let mode = match data.get("mode") {
                    Some(serde_json::Value::String(s)) => s.parse::<CompareMode>().map_err(invalid)?,
                    Some(serde_json::Value::Null) | None => CompareMode::default(),
                    Some(other) => return Err(invalid(format!("field 'mode' expects a string, got {other}"))),
                };
                Settings::Comparator { mode }
            }
            _ => Settings::None,
        };

        Ok(config)
    }

    /// Configured value of a field.
    pub fn field(&self, name: &str) -> Option<PortValue> {
        self.fields.get(name).copied()
    }

    /// Physical resource claimed by a device-backed node.
    pub fn device_resource(&self) -> Option<String> {
        match self.settings {
            Settings::Motor { port } => Some(format!("motor:{port}")),
            _ => None,
        }
    }

    pub fn motor_port(&self) -> Option<MotorPort> {
        match self.settings {
            Settings::Motor { port } => Some(port),
            _ => None,
        }
    }

    /// Same record with other settings, e.g. a comparator mode written at runtime.
    pub fn with_settings(&self, settings: Settings) -> Self {
        Self {
            fields: self.fields.clone(),
            settings,
        }
    }

    pub fn compare_mode(&self) -> CompareMode {
        match self.settings {
            Settings::Comparator { mode } => mode,
            _ => CompareMode::default(),
        }
    }
}
