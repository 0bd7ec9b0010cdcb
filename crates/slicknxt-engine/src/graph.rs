use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use slicknxt_core::error::ConstructionError;
use slicknxt_core::port::{compatible, PortDirection};
use slicknxt_core::types::{EdgeDescription, FlowDescription, NodeDescription};

use crate::registry::{NodeConfig, NodeKind, PortSpec};

/// A node instance in the graph.
#[derive(Debug, Clone)]
pub struct FlowNode {
    pub id: String,
    pub kind: NodeKind,
    pub config: NodeConfig,
    description: NodeDescription,
}

/// A validated connection from an output port to an input port.
#[derive(Debug, Clone)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub source_port: &'static str,
    pub target: String,
    pub target_port: &'static str,
    description: EdgeDescription,
}

/// Nodes and edges of one flow.
///
/// Every mutation validates first and then applies in full, so a failed call
/// leaves the graph untouched. Nodes and edges keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<String, FlowNode>,
    edges: IndexMap<String, FlowEdge>,
    /// source node -> outgoing edge ids
    outgoing: HashMap<String, Vec<String>>,
    /// target node -> input port -> edge id
    bindings: HashMap<String, HashMap<&'static str, String>>,
    version: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a complete description.
    pub fn from_description(desc: &FlowDescription) -> Result<Self, ConstructionError> {
        let mut graph = Self::new();
        for node in &desc.nodes {
            graph.add_node(node.clone())?;
        }
        for edge in &desc.edges {
            graph.add_edge(edge.clone())?;
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Graph built"
        );
        Ok(graph)
    }

    /// Current description, edges carrying their assigned ids.
    pub fn describe(&self) -> FlowDescription {
        FlowDescription {
            nodes: self.nodes.values().map(|n| n.description.clone()).collect(),
            edges: self.edges.values().map(|e| e.description.clone()).collect(),
        }
    }

    pub fn add_node(&mut self, desc: NodeDescription) -> Result<(), ConstructionError> {
        if self.nodes.contains_key(&desc.id) {
            return Err(ConstructionError::DuplicateNode(desc.id));
        }
        let kind: NodeKind =
            desc.node_type
                .parse()
                .map_err(|_| ConstructionError::UnknownNodeType {
                    node: desc.id.clone(),
                    node_type: desc.node_type.clone(),
                })?;
        let config = NodeConfig::parse(kind, &desc.id, &desc.data)?;

        if let Some(resource) = config.device_resource() {
            if let Some(existing) = self.device_holder(&resource, &desc.id) {
                return Err(ConstructionError::DeviceAlreadyBound {
                    resource,
                    node: desc.id,
                    existing: existing.to_string(),
                });
            }
        }

        let id = desc.id.clone();
        self.nodes.insert(
            id.clone(),
            FlowNode {
                id,
                kind,
                config,
                description: desc,
            },
        );
        self.version += 1;
        Ok(())
    }

    /// Validate and insert an edge. Returns the edge id, generated if the
    /// description has none.
    pub fn add_edge(&mut self, mut desc: EdgeDescription) -> Result<String, ConstructionError> {
        let id = desc
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.edges.contains_key(&id) {
            return Err(ConstructionError::DuplicateEdge(id));
        }

        let source = self.require(&desc.source)?;
        let target = self.require(&desc.target)?;
        let source_port = resolve_port(source, desc.source_handle.as_deref(), PortDirection::Output)?;
        let target_port = resolve_port(target, desc.target_handle.as_deref(), PortDirection::Input)?;

        if !compatible(source_port.port_type, target_port.port_type) {
            return Err(ConstructionError::IncompatiblePorts {
                source_node: source.id.clone(),
                source_port: source_port.name.to_string(),
                source_type: source_port.port_type,
                target_node: target.id.clone(),
                target_port: target_port.name.to_string(),
                target_type: target_port.port_type,
            });
        }

        if self.is_connected(&target.id, target_port.name) {
            return Err(ConstructionError::InputAlreadyConnected {
                node: target.id.clone(),
                port: target_port.name.to_string(),
            });
        }

        for node in [source, target] {
            if let Some(resource) = node.config.device_resource() {
                if let Some(existing) = self.device_holder(&resource, &node.id) {
                    return Err(ConstructionError::DeviceAlreadyBound {
                        resource,
                        node: node.id.clone(),
                        existing: existing.to_string(),
                    });
                }
            }
        }

        desc.id = Some(id.clone());
        let edge = FlowEdge {
            id: id.clone(),
            source: source.id.clone(),
            source_port: source_port.name,
            target: target.id.clone(),
            target_port: target_port.name,
            description: desc,
        };
        self.edges.insert(id.clone(), edge);
        self.rebuild_adjacency();
        Ok(id)
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<FlowNode, ConstructionError> {
        let node = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| ConstructionError::UnknownNode(id.to_string()))?;
        self.edges.retain(|_, e| e.source != id && e.target != id);
        self.rebuild_adjacency();
        Ok(node)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<FlowEdge, ConstructionError> {
        let edge = self
            .edges
            .shift_remove(id)
            .ok_or_else(|| ConstructionError::UnknownEdge(id.to_string()))?;
        self.rebuild_adjacency();
        Ok(edge)
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Insertion index of a node.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    pub fn outgoing(&self, node: &str) -> impl Iterator<Item = &FlowEdge> {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    /// The edge feeding an input port, if any.
    pub fn incoming(&self, node: &str, port: &str) -> Option<&FlowEdge> {
        let id = self.bindings.get(node)?.get(port)?;
        self.edges.get(id)
    }

    pub fn is_connected(&self, node: &str, port: &str) -> bool {
        self.incoming(node, port).is_some()
    }

    /// Bumped on every structural change; used to invalidate cached orders.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn require(&self, id: &str) -> Result<&FlowNode, ConstructionError> {
        self.nodes
            .get(id)
            .ok_or_else(|| ConstructionError::UnknownNode(id.to_string()))
    }

    /// Another node already bound to `resource`.
    fn device_holder(&self, resource: &str, except: &str) -> Option<&str> {
        self.nodes
            .values()
            .filter(|n| n.id != except)
            .find(|n| n.config.device_resource().as_deref() == Some(resource))
            .map(|n| n.id.as_str())
    }

    fn rebuild_adjacency(&mut self) {
        self.outgoing.clear();
        self.bindings.clear();
        for edge in self.edges.values() {
            self.outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge.id.clone());
            self.bindings
                .entry(edge.target.clone())
                .or_default()
                .insert(edge.target_port, edge.id.clone());
        }
        self.version += 1;
    }
}

/// Map an editor handle to a port. `in-on-off` / `out-on-off` become
/// `onOff`, unprefixed handles are taken verbatim and a missing handle picks
/// the first port.
fn resolve_port(
    node: &FlowNode,
    handle: Option<&str>,
    direction: PortDirection,
) -> Result<&'static PortSpec, ConstructionError> {
    let ports = node.kind.ports(direction);
    let unknown = |port: &str| ConstructionError::UnknownPort {
        node: node.id.clone(),
        port: port.to_string(),
        direction,
    };

    let handle = match handle.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return ports.first().ok_or_else(|| unknown("<default>")),
    };

    let prefix = match direction {
        PortDirection::Input => "in-",
        PortDirection::Output => "out-",
    };
    let name = match handle.strip_prefix(prefix) {
        Some(rest) => kebab_to_camel(rest),
        None => handle.to_string(),
    };

    ports
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| unknown(&name))
}

fn kebab_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, ty: &str) -> NodeDescription {
        NodeDescription::new(id, ty)
    }

    fn motor(id: &str, port: &str) -> NodeDescription {
        NodeDescription::new(id, "motorNode").with("port", json!(port))
    }

    #[test]
    fn test_kebab_to_camel() {
        assert_eq!(kebab_to_camel("on-off"), "onOff");
        assert_eq!(kebab_to_camel("current-value"), "currentValue");
        assert_eq!(kebab_to_camel("value"), "value");
    }

    #[test]
    fn test_unknown_node_type_rejected() {
        let mut g = Graph::new();
        let err = g.add_node(node("x", "teleporterNode")).unwrap_err();
        assert_eq!(err.kind(), "unknown_node_type");
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut g = Graph::new();
        g.add_node(node("a", "andNode")).unwrap();
        let err = g.add_node(node("a", "orNode")).unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateNode("a".into()));
    }

    #[test]
    fn test_bool_to_numeric_rejected_atomically() {
        let mut g = Graph::new();
        g.add_node(node("sw", "switchNode")).unwrap();
        g.add_node(node("add", "addNode")).unwrap();
        let version = g.version();

        let err = g
            .add_edge(EdgeDescription::connect("sw", "out-value", "add", "in-a"))
            .unwrap_err();
        assert!(matches!(err, ConstructionError::IncompatiblePorts { .. }));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.version(), version);
    }

    #[test]
    fn test_wildcard_output_into_bool_accepted() {
        let mut g = Graph::new();
        g.add_node(node("d", "delayTimerNode")).unwrap();
        g.add_node(node("n", "notNode")).unwrap();
        g.add_edge(EdgeDescription::connect("d", "output", "n", "input"))
            .unwrap();
        assert!(g.is_connected("n", "input"));
    }

    #[test]
    fn test_second_edge_into_input_rejected() {
        let mut g = Graph::new();
        g.add_node(node("s1", "switchNode")).unwrap();
        g.add_node(node("s2", "switchNode")).unwrap();
        g.add_node(node("and", "andNode")).unwrap();
        g.add_edge(EdgeDescription::connect("s1", "value", "and", "a"))
            .unwrap();
        let err = g
            .add_edge(EdgeDescription::connect("s2", "value", "and", "in-a"))
            .unwrap_err();
        assert_eq!(err.kind(), "input_already_connected");
        assert_eq!(g.incoming("and", "a").unwrap().source, "s1");
    }

    #[test]
    fn test_duplicate_motor_port_rejected() {
        let mut g = Graph::new();
        g.add_node(motor("m1", "A")).unwrap();
        g.add_node(motor("m2", "B")).unwrap();
        let err = g.add_node(motor("m3", "a")).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::DeviceAlreadyBound {
                resource: "motor:A".into(),
                node: "m3".into(),
                existing: "m1".into(),
            }
        );
    }

    #[test]
    fn test_unknown_port_and_node() {
        let mut g = Graph::new();
        g.add_node(node("a", "andNode")).unwrap();
        g.add_node(node("o", "orNode")).unwrap();
        let err = g
            .add_edge(EdgeDescription::connect("a", "out-result", "o", "in-a"))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_port");
        let err = g
            .add_edge(EdgeDescription::connect("ghost", "output", "o", "a"))
            .unwrap_err();
        assert_eq!(err, ConstructionError::UnknownNode("ghost".into()));
    }

    #[test]
    fn test_handles_normalized_and_defaulted() {
        let mut g = Graph::new();
        g.add_node(node("sw", "switchNode")).unwrap();
        g.add_node(motor("m", "C")).unwrap();
        g.add_node(node("dial", "dialNode")).unwrap();
        g.add_node(node("cap", "capNode")).unwrap();
        g.add_edge(EdgeDescription::connect("sw", "out-value", "m", "in-on-off"))
            .unwrap();
        g.add_edge(EdgeDescription {
            id: None,
            source: "dial".into(),
            source_handle: None,
            target: "cap".into(),
            target_handle: None,
        })
        .unwrap();
        assert!(g.is_connected("m", "onOff"));
        assert!(g.is_connected("cap", "input"));
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut g = Graph::new();
        g.add_node(node("s", "switchNode")).unwrap();
        g.add_node(node("n", "notNode")).unwrap();
        g.add_node(node("b", "boolDisplayNode")).unwrap();
        g.add_edge(EdgeDescription::connect("s", "value", "n", "input"))
            .unwrap();
        g.add_edge(EdgeDescription::connect("n", "output", "b", "value"))
            .unwrap();

        g.remove_node("n").unwrap();
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.outgoing("s").count(), 0);
        assert_eq!(g.index_of("b"), Some(1));
        assert!(g.remove_node("n").is_err());
    }

    #[test]
    fn test_describe_round_trips() {
        let desc = FlowDescription::new(
            vec![
                node("d", "dialNode").with("value", json!(60)).at(10.0, 20.0),
                node("c", "comparatorNode").with("threshold", json!(50)),
            ],
            vec![EdgeDescription::connect("d", "out-value", "c", "in-a").with_id("e1")],
        );
        let g = Graph::from_description(&desc).unwrap();
        assert_eq!(g.describe(), desc);
    }

    #[test]
    fn test_missing_edge_id_generated() {
        let mut g = Graph::new();
        g.add_node(node("s", "switchNode")).unwrap();
        g.add_node(node("n", "notNode")).unwrap();
        let id = g
            .add_edge(EdgeDescription::connect("s", "value", "n", "input"))
            .unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_eq!(g.describe().edges[0].id.as_deref(), Some(id.as_str()));
    }
}
