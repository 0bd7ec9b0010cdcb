use serde::{Deserialize, Serialize};

/// Data type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Boolean,
    Numeric,
    /// Accepts or produces either kind of value.
    Wildcard,
}

impl PortType {
    /// Whether a value of this type may flow into a port of type `target`.
    pub fn can_connect_to(self, target: PortType) -> bool {
        compatible(self, target)
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::Boolean => write!(f, "boolean"),
            PortType::Numeric => write!(f, "numeric"),
            PortType::Wildcard => write!(f, "wildcard"),
        }
    }
}

/// Connection rule between an output of type `source` and an input of type `target`.
///
/// Wildcard connects with anything; otherwise the types must match.
pub fn compatible(source: PortType, target: PortType) -> bool {
    match (source, target) {
        (PortType::Wildcard, _) | (_, PortType::Wildcard) => true,
        (PortType::Boolean, PortType::Boolean) | (PortType::Numeric, PortType::Numeric) => true,
        (PortType::Boolean, PortType::Numeric) | (PortType::Numeric, PortType::Boolean) => false,
    }
}

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// A value held by a port. Absent values are modelled as `Option::None`
/// and serialize as JSON `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Bool(bool),
    Number(f64),
}

impl PortValue {
    /// The concrete port type of this value.
    pub fn port_type(&self) -> PortType {
        match self {
            PortValue::Bool(_) => PortType::Boolean,
            PortValue::Number(_) => PortType::Numeric,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PortValue::Bool(b) => Some(*b),
            PortValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PortValue::Number(n) => Some(*n),
            PortValue::Bool(_) => None,
        }
    }

    /// Convert a JSON scalar into a port value. Anything but a bool or a
    /// number yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(PortValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(PortValue::Number),
            _ => None,
        }
    }

    /// JSON form. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PortValue::Bool(b) => serde_json::Value::Bool(*b),
            PortValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<bool> for PortValue {
    fn from(b: bool) -> Self {
        PortValue::Bool(b)
    }
}

impl From<f64> for PortValue {
    fn from(n: f64) -> Self {
        PortValue::Number(n)
    }
}

impl std::fmt::Display for PortValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortValue::Bool(b) => write!(f, "{b}"),
            PortValue::Number(n) => write!(f, "{n}"),
        }
    }
}
