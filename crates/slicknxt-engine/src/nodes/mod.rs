//! Per-type compute steps.
//!
//! A compute step takes the resolved inputs, the node's configuration and
//! its prior internal state (by value) and returns the outputs, the next
//! state and any display data. Compute steps never fail: absent or
//! mistyped inputs fall back to `false` / `0`.

mod display;
mod io;
mod logic;
mod math;
mod timer;

use std::collections::BTreeMap;

use slicknxt_core::port::PortValue;
use slicknxt_core::types::AuxDisplay;

use crate::registry::{NodeConfig, NodeKind};

pub use display::HistoryState;
pub use timer::{DelayState, PulsePhase, PulseState};

/// Tolerance for comparing accumulated simulated time against durations.
pub(crate) const TIME_EPSILON: f64 = 1e-9;

/// Timing of the tick being evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Nominal tick interval in seconds.
    pub dt: f64,
    /// Simulated run time of this tick in seconds.
    pub now: f64,
}

/// Resolved input and field values for one compute step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    values: BTreeMap<&'static str, Option<PortValue>>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: Option<PortValue>) {
        self.values.insert(name, value);
    }

    pub fn value(&self, name: &str) -> Option<PortValue> {
        self.values.get(name).copied().flatten()
    }

    /// Boolean input; absent or numeric reads as `false`.
    pub fn bool(&self, name: &str) -> bool {
        self.value(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Numeric input; absent or boolean reads as `0`.
    pub fn num(&self, name: &str) -> f64 {
        self.num_opt(name).unwrap_or(0.0)
    }

    pub fn num_opt(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(|v| v.as_f64())
    }
}

impl<V: Into<PortValue>> FromIterator<(&'static str, V)> for Inputs {
    fn from_iter<I: IntoIterator<Item = (&'static str, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, v)| (name, Some(v.into())))
                .collect(),
        }
    }
}

/// Internal state carried between ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeState {
    #[default]
    Stateless,
    Pulse(PulseState),
    Delay(DelayState),
    History(HistoryState),
    Integrator { accumulator: f64 },
}

impl NodeState {
    /// State of a freshly inserted node.
    pub fn initial(kind: NodeKind) -> Self {
        match kind {
            NodeKind::PulseTimer => NodeState::Pulse(PulseState::default()),
            NodeKind::DelayTimer => NodeState::Delay(DelayState::default()),
            NodeKind::HistoryDisplay => NodeState::History(HistoryState::default()),
            NodeKind::Integrator => NodeState::Integrator { accumulator: 0.0 },
            _ => NodeState::Stateless,
        }
    }
}

/// Result of one compute step.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub outputs: Vec<(&'static str, Option<PortValue>)>,
    pub state: NodeState,
    pub aux: Option<AuxDisplay>,
}

impl Computed {
    pub(crate) fn stateless(outputs: Vec<(&'static str, Option<PortValue>)>) -> Self {
        Self {
            outputs,
            state: NodeState::Stateless,
            aux: None,
        }
    }

    /// Look up an output by port name.
    pub fn output(&self, name: &str) -> Option<PortValue> {
        self.outputs
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| *v)
    }
}

/// Evaluate one node.
pub fn compute(
    kind: NodeKind,
    inputs: &Inputs,
    config: &NodeConfig,
    state: NodeState,
    ctx: &TickContext,
) -> Computed {
    match kind {
        NodeKind::Dial => io::dial(inputs),
        NodeKind::Switch => io::switch(inputs),
        NodeKind::Motor => io::motor(inputs),
        NodeKind::NumberDisplay | NodeKind::BoolDisplay => display::readout(inputs),
        NodeKind::HistoryDisplay => display::history(inputs, state, ctx),
        NodeKind::And => logic::and(inputs),
        NodeKind::Or => logic::or(inputs),
        NodeKind::Xor => logic::xor(inputs),
        NodeKind::Not => logic::not(inputs),
        NodeKind::Comparator => logic::comparator(inputs, config),
        NodeKind::BoolGate => logic::bool_gate(inputs),
        NodeKind::Cap => math::cap(inputs),
        NodeKind::Add => math::add(inputs),
        NodeKind::Subtract => math::subtract(inputs),
        NodeKind::Integrator => math::integrator(inputs, state, ctx),
        NodeKind::PController => math::p_controller(inputs),
        NodeKind::PulseTimer => timer::pulse(inputs, state, ctx),
        NodeKind::DelayTimer => timer::delay(inputs, state, ctx),
    }
}
