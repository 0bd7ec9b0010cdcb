use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, trace, warn};

use slicknxt_core::error::{ConstructionError, CycleError, InputError};
use slicknxt_core::port::{PortDirection, PortType, PortValue};
use slicknxt_core::types::{
    AuxDisplay, EdgeDescription, FlowDescription, FlowStatus, InputEvent, NodeDescription,
    RunState, TickSnapshot,
};

use crate::device::MotorCommand;
use crate::graph::{FlowNode, Graph};
use crate::nodes::{self, Inputs, NodeState, TickContext};
use crate::registry::{CompareMode, NodeKind, Settings};
use crate::scheduler::Scheduler;

/// Per-node data owned by the executor.
#[derive(Debug, Clone)]
struct NodeRuntime {
    state: NodeState,
    /// Values written by external input events, by field name.
    overrides: BTreeMap<&'static str, PortValue>,
    /// Settings replaced at runtime, e.g. a comparator mode.
    settings: Option<Settings>,
    outputs: Vec<(&'static str, Option<PortValue>)>,
    aux: Option<AuxDisplay>,
}

impl NodeRuntime {
    fn new(kind: NodeKind) -> Self {
        Self {
            state: NodeState::initial(kind),
            overrides: BTreeMap::new(),
            settings: None,
            outputs: kind.outputs().iter().map(|p| (p.name, None)).collect(),
            aux: None,
        }
    }

    fn output(&self, port: &str) -> Option<PortValue> {
        self.outputs
            .iter()
            .find(|(name, _)| *name == port)
            .and_then(|(_, v)| *v)
    }
}

/// Change of the cycle fault caused by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTransition {
    Unchanged,
    Raised,
    Cleared,
}

/// Result of one `tick` call.
#[derive(Debug)]
pub struct TickReport {
    pub outcome: Result<Arc<TickSnapshot>, CycleError>,
    /// Queued input events dropped during the drain step.
    pub rejected: Vec<(InputEvent, InputError)>,
    pub fault: FaultTransition,
}

/// Evaluates a graph one tick at a time.
///
/// The executor is synchronous and owns all node state; the async engine
/// wraps it and decides when to call `tick`.
pub struct FlowExecutor {
    graph: Graph,
    scheduler: Scheduler,
    runtime: HashMap<String, NodeRuntime>,
    pending: Vec<InputEvent>,
    state: RunState,
    /// Index of the next tick to evaluate.
    tick: u64,
    dt: f64,
    last_snapshot: Option<Arc<TickSnapshot>>,
    fault: Option<CycleError>,
}

impl FlowExecutor {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            graph: Graph::new(),
            scheduler: Scheduler::new(),
            runtime: HashMap::new(),
            pending: Vec::new(),
            state: RunState::Stopped,
            tick: 0,
            dt: tick_interval.as_secs_f64(),
            last_snapshot: None,
            fault: None,
        }
    }

    /// Build an executor around an already validated description.
    pub fn with_flow(tick_interval: Duration, desc: &FlowDescription) -> Result<Self, ConstructionError> {
        let mut executor = Self::new(tick_interval);
        executor.replace_flow(desc)?;
        Ok(executor)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// STOPPED -> RUNNING. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.state == RunState::Running {
            return false;
        }
        self.state = RunState::Running;
        info!(tick = self.tick, nodes = self.graph.node_count(), "Flow started");
        true
    }

    /// RUNNING -> STOPPED. Node state is kept for the next `start`.
    pub fn stop(&mut self) -> bool {
        if self.state == RunState::Stopped {
            return false;
        }
        self.state = RunState::Stopped;
        info!(tick = self.tick, "Flow stopped");
        true
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn status(&self) -> FlowStatus {
        FlowStatus {
            state: self.state,
            tick: self.tick,
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            fault: self.fault.as_ref().map(|e| e.to_string()),
        }
    }

    // ── Graph edits ─────────────────────────────────────────────

    /// Swap in a complete new flow. On error the current flow is untouched.
    pub fn replace_flow(&mut self, desc: &FlowDescription) -> Result<(), ConstructionError> {
        let graph = Graph::from_description(desc)?;
        self.runtime = graph
            .nodes()
            .map(|n| (n.id.clone(), NodeRuntime::new(n.kind)))
            .collect();
        self.graph = graph;
        self.scheduler.invalidate();
        self.fault = None;
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Flow loaded"
        );
        Ok(())
    }

    pub fn add_node(&mut self, desc: NodeDescription) -> Result<(), ConstructionError> {
        let id = desc.id.clone();
        self.graph.add_node(desc)?;
        if let Some(node) = self.graph.node(&id) {
            self.runtime.insert(id, NodeRuntime::new(node.kind));
        }
        Ok(())
    }

    pub fn add_edge(&mut self, desc: EdgeDescription) -> Result<String, ConstructionError> {
        self.graph.add_edge(desc)
    }

    /// Remove a node, its edges and its state.
    pub fn remove_node(&mut self, id: &str) -> Result<(), ConstructionError> {
        self.graph.remove_node(id)?;
        self.runtime.remove(id);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<(), ConstructionError> {
        self.graph.remove_edge(id).map(|_| ())
    }

    /// Current flow with external overrides folded into each node's data.
    pub fn describe(&self) -> FlowDescription {
        let mut desc = self.graph.describe();
        for node in &mut desc.nodes {
            if let Some(rt) = self.runtime.get(&node.id) {
                for (field, value) in &rt.overrides {
                    node.data.insert(field.to_string(), value.to_json());
                }
                if let Some(Settings::Comparator { mode }) = rt.settings {
                    node.data.insert("mode".into(), mode.symbol().into());
                }
            }
        }
        desc
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    // ── Inputs ──────────────────────────────────────────────────

    /// Queue an input event for the next tick's drain step.
    pub fn queue_input(&mut self, event: InputEvent) {
        self.pending.push(event);
    }

    pub fn pending_inputs(&self) -> usize {
        self.pending.len()
    }

    /// Apply one input event right away.
    pub fn apply_input(&mut self, event: &InputEvent) -> Result<(), InputError> {
        let node = self
            .graph
            .node(&event.node_id)
            .ok_or_else(|| InputError::UnknownNode(event.node_id.clone()))?;
        if node.kind == NodeKind::Comparator && event.port_name == "mode" {
            let mode = event
                .value
                .as_str()
                .ok_or_else(|| format!("expects a string, got {}", event.value))
                .and_then(|s| s.parse::<CompareMode>())
                .map_err(|message| InputError::InvalidSetting {
                    node: node.id.clone(),
                    field: event.port_name.clone(),
                    message,
                })?;
            self.runtime
                .entry(event.node_id.clone())
                .or_insert_with(|| NodeRuntime::new(NodeKind::Comparator))
                .settings = Some(Settings::Comparator { mode });
            return Ok(());
        }
        let field = node
            .kind
            .field(&event.port_name)
            .filter(|f| f.writable)
            .ok_or_else(|| InputError::UnknownField {
                node: node.id.clone(),
                field: event.port_name.clone(),
            })?;

        if node.kind.port(PortDirection::Input, field.name).is_some()
            && self.graph.is_connected(&node.id, field.name)
        {
            return Err(InputError::Connected {
                node: node.id.clone(),
                field: field.name.to_string(),
            });
        }

        let value = PortValue::from_json(&event.value)
            .filter(|v| field.field_type == PortType::Wildcard || v.port_type() == field.field_type)
            .ok_or_else(|| InputError::TypeMismatch {
                node: node.id.clone(),
                field: field.name.to_string(),
                expected: field.field_type,
                got: event.value.to_string(),
            })?;

        let kind = node.kind;
        self.runtime
            .entry(event.node_id.clone())
            .or_insert_with(|| NodeRuntime::new(kind))
            .overrides
            .insert(field.name, value);
        Ok(())
    }

    // ── Evaluation ──────────────────────────────────────────────

    /// Run one tick: drain queued inputs, evaluate every node in order and
    /// publish a snapshot. On a cycle nothing is evaluated, the clock does
    /// not advance and the previous snapshot stays current.
    pub fn tick(&mut self) -> TickReport {
        let rejected = self.drain_inputs();

        let order = match self.scheduler.order(&self.graph) {
            Ok(order) => order,
            Err(err) => {
                let fault = if self.fault.is_none() {
                    error!(nodes = ?err.nodes, "Flow contains a cycle, evaluation paused");
                    FaultTransition::Raised
                } else {
                    FaultTransition::Unchanged
                };
                self.fault = Some(err.clone());
                return TickReport {
                    outcome: Err(err),
                    rejected,
                    fault,
                };
            }
        };

        let fault = match self.fault.take() {
            Some(_) => {
                info!("Cycle resolved, evaluation resumed");
                FaultTransition::Cleared
            }
            None => FaultTransition::Unchanged,
        };

        let ctx = TickContext {
            dt: self.dt,
            now: self.tick as f64 * self.dt,
        };

        for id in order.iter() {
            let Some(node) = self.graph.node(id) else { continue };
            let inputs = resolve_inputs(&self.graph, &self.runtime, node);
            let rt = self
                .runtime
                .entry(id.clone())
                .or_insert_with(|| NodeRuntime::new(node.kind));
            let prior = std::mem::take(&mut rt.state);
            let config = match rt.settings {
                Some(settings) => Cow::Owned(node.config.with_settings(settings)),
                None => Cow::Borrowed(&node.config),
            };
            let computed = nodes::compute(node.kind, &inputs, &config, prior, &ctx);
            rt.state = computed.state;
            rt.outputs = computed.outputs;
            rt.aux = computed.aux;
        }

        let snapshot = Arc::new(self.build_snapshot(ctx.now));
        trace!(tick = self.tick, nodes = order.len(), "Tick evaluated");
        self.tick += 1;
        self.last_snapshot = Some(snapshot.clone());

        TickReport {
            outcome: Ok(snapshot),
            rejected,
            fault,
        }
    }

    fn drain_inputs(&mut self) -> Vec<(InputEvent, InputError)> {
        let mut rejected = Vec::new();
        for event in std::mem::take(&mut self.pending) {
            if let Err(e) = self.apply_input(&event) {
                warn!(node = %event.node_id, port = %event.port_name, error = %e, "Input dropped");
                rejected.push((event, e));
            }
        }
        rejected
    }

    fn build_snapshot(&self, now: f64) -> TickSnapshot {
        let mut nodes = BTreeMap::new();
        let mut aux_display_data = BTreeMap::new();
        for node in self.graph.nodes() {
            let Some(rt) = self.runtime.get(&node.id) else { continue };
            let outputs = rt
                .outputs
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect();
            nodes.insert(node.id.clone(), outputs);
            if let Some(aux) = &rt.aux {
                aux_display_data.insert(node.id.clone(), aux.clone());
            }
        }
        TickSnapshot {
            tick: self.tick,
            elapsed_secs: now,
            at: Utc::now(),
            nodes,
            aux_display_data,
        }
    }

    pub fn last_snapshot(&self) -> Option<Arc<TickSnapshot>> {
        self.last_snapshot.clone()
    }

    pub fn fault(&self) -> Option<&CycleError> {
        self.fault.as_ref()
    }

    /// Ticks evaluated so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Latest command for every motor node.
    pub fn motor_commands(&self) -> Vec<MotorCommand> {
        self.graph
            .nodes()
            .filter_map(|node| {
                let port = node.config.motor_port()?;
                let rt = self.runtime.get(&node.id)?;
                Some(MotorCommand {
                    node_id: node.id.clone(),
                    port,
                    on: rt.output("onOff").and_then(|v| v.as_bool()).unwrap_or(false),
                    forward: rt.output("forward").and_then(|v| v.as_bool()).unwrap_or(true),
                    speed: rt.output("speed").and_then(|v| v.as_f64()).unwrap_or(0.0),
                })
            })
            .collect()
    }
}

/// Resolve every input port and config field of `node`: the upstream
/// output if connected, else an external override, else the configured
/// value.
fn resolve_inputs(graph: &Graph, runtime: &HashMap<String, NodeRuntime>, node: &FlowNode) -> Inputs {
    let rt = runtime.get(&node.id);
    let fallback = |name: &str| {
        rt.and_then(|r| r.overrides.get(name).copied())
            .or_else(|| node.config.field(name))
    };

    let mut inputs = Inputs::new();
    for port in node.kind.inputs() {
        let value = match graph.incoming(&node.id, port.name) {
            Some(edge) => runtime
                .get(&edge.source)
                .and_then(|up| up.output(edge.source_port)),
            None => fallback(port.name),
        };
        inputs.set(port.name, value);
    }
    for field in node.kind.fields() {
        if node.kind.port(PortDirection::Input, field.name).is_none() {
            inputs.set(field.name, fallback(field.name));
        }
    }
    inputs
}
