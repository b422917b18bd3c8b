// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Graph Model (`spec.md` §4.3): structural build from a
//! [`GraphConfig`], the six validation checks, and Kahn's-algorithm
//! topological ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use weave_core::{PluginRegistry, Port, Result, TypeRegistry, WeaveError};

use crate::config_format::GraphConfig;

/// A resolved, validated edge between two enabled nodes' ports.
#[derive(Debug, Clone)]
pub struct ResolvedEdge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

/// An instantiated, enabled node: its plugin instance and cached port
/// lists (`spec.md` §3 "Node (plugin instance)").
pub struct GraphNode {
    pub id: String,
    pub plugin_type: String,
    pub plugin: Box<dyn weave_core::Plugin>,
    pub input_ports: Vec<Port>,
    pub output_ports: Vec<Port>,
}

impl GraphNode {
    #[must_use]
    pub fn required_input_names(&self) -> Vec<&str> {
        self.input_ports.iter().filter(|p| p.required).map(|p| p.name.as_str()).collect()
    }
}

/// A validated, queryable graph: enabled nodes plus enabled edges between
/// them, with derived adjacency.
pub struct Graph {
    nodes: IndexMap<String, GraphNode>,
    edges: Vec<ResolvedEdge>,
}

impl Graph {
    /// Phase A (structural build) + Phase B (validation). Phase C (topo
    /// order) is computed on demand via [`Self::topological_order`] since
    /// it is diagnostic only (`spec.md` §4.3).
    ///
    /// # Errors
    ///
    /// Returns the first [`WeaveError::GraphStructure`] or
    /// [`WeaveError::TypeMismatch`] encountered, with full context
    /// naming the offending node/port/edge.
    pub fn build(
        config: &GraphConfig,
        plugin_registry: &PluginRegistry,
        type_registry: &TypeRegistry,
    ) -> Result<Self> {
        let nodes = Self::instantiate_nodes(config, plugin_registry)?;
        let edges = Self::resolve_edges(config, &nodes)?;

        let graph = Self { nodes, edges };
        graph.validate(type_registry)?;
        Ok(graph)
    }

    /// Phase A: instantiate each enabled node via the plugin registry and
    /// validate its config. Disabled nodes are skipped entirely.
    fn instantiate_nodes(
        config: &GraphConfig,
        plugin_registry: &PluginRegistry,
    ) -> Result<IndexMap<String, GraphNode>> {
        let mut nodes = IndexMap::new();
        for node_cfg in &config.nodes {
            if !node_cfg.enabled {
                continue;
            }
            if nodes.contains_key(&node_cfg.id) {
                return Err(WeaveError::GraphStructure(format!(
                    "duplicate node id '{}'",
                    node_cfg.id
                )));
            }
            let config_value =
                if node_cfg.config.is_null() { None } else { Some(&node_cfg.config) };
            let plugin = plugin_registry
                .create_instance(&node_cfg.plugin_type, config_value)
                .map_err(|source| WeaveError::PluginInstantiation(format!("node '{}': {source}", node_cfg.id)))?;
            let (input_ports, output_ports) = plugin.get_ports();
            nodes.insert(
                node_cfg.id.clone(),
                GraphNode {
                    id: node_cfg.id.clone(),
                    plugin_type: node_cfg.plugin_type.clone(),
                    plugin,
                    input_ports,
                    output_ports,
                },
            );
        }
        Ok(nodes)
    }

    /// Resolves enabled connections into [`ResolvedEdge`]s, checking
    /// existence and direction (Phase B checks 1-2).
    fn resolve_edges(
        config: &GraphConfig,
        nodes: &IndexMap<String, GraphNode>,
    ) -> Result<Vec<ResolvedEdge>> {
        let mut edges = Vec::new();
        for conn in &config.connections {
            if !conn.enabled {
                continue;
            }
            let ((from_node, from_port), (to_node, to_port)) = conn.endpoints()?;

            let source = nodes.get(from_node).ok_or_else(|| {
                WeaveError::GraphStructure(format!(
                    "connection references non-existent node '{from_node}'"
                ))
            })?;
            let dest = nodes.get(to_node).ok_or_else(|| {
                WeaveError::GraphStructure(format!(
                    "connection references non-existent node '{to_node}'"
                ))
            })?;

            if !source.output_ports.iter().any(|p| p.name == from_port) {
                return Err(WeaveError::GraphStructure(format!(
                    "'{from_node}' has no output port '{from_port}'"
                )));
            }
            if !dest.input_ports.iter().any(|p| p.name == to_port) {
                return Err(WeaveError::GraphStructure(format!(
                    "'{to_node}' has no input port '{to_port}'"
                )));
            }

            edges.push(ResolvedEdge {
                from_node: from_node.to_string(),
                from_port: from_port.to_string(),
                to_node: to_node.to_string(),
                to_port: to_port.to_string(),
            });
        }
        Ok(edges)
    }

    /// Phase B checks 3-6: type compatibility, single-incoming-edge,
    /// required-input coverage, and cycle detection.
    fn validate(&self, type_registry: &TypeRegistry) -> Result<()> {
        self.validate_type_compatibility(type_registry)?;
        self.validate_single_incoming_edge()?;
        self.validate_required_inputs()?;
        self.validate_acyclic()?;
        Ok(())
    }

    fn validate_type_compatibility(&self, type_registry: &TypeRegistry) -> Result<()> {
        for edge in &self.edges {
            let source = &self.nodes[&edge.from_node];
            let dest = &self.nodes[&edge.to_node];
            let src_type = source
                .output_ports
                .iter()
                .find(|p| p.name == edge.from_port)
                .map(|p| p.type_name.clone())
                .ok_or_else(|| WeaveError::GraphStructure("output port vanished".to_string()))?;
            let dst_type = dest
                .input_ports
                .iter()
                .find(|p| p.name == edge.to_port)
                .map(|p| p.type_name.clone())
                .ok_or_else(|| WeaveError::GraphStructure("input port vanished".to_string()))?;

            let src_name = weave_core::type_registry::type_name_of(src_type);
            let dst_name = weave_core::type_registry::type_name_of(dst_type);
            if !type_registry.check_compatibility(src_name, dst_name) {
                return Err(WeaveError::TypeMismatch(format!(
                    "{}.{} ({src_name}) is not compatible with {}.{} ({dst_name})",
                    edge.from_node, edge.from_port, edge.to_node, edge.to_port
                )));
            }
        }
        Ok(())
    }

    fn validate_single_incoming_edge(&self) -> Result<()> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        for edge in &self.edges {
            let key = (edge.to_node.as_str(), edge.to_port.as_str());
            if !seen.insert(key) {
                return Err(WeaveError::GraphStructure(format!(
                    "input port '{}.{}' receives more than one enabled edge",
                    edge.to_node, edge.to_port
                )));
            }
        }
        Ok(())
    }

    fn validate_required_inputs(&self) -> Result<()> {
        let fed: HashSet<(&str, &str)> =
            self.edges.iter().map(|e| (e.to_node.as_str(), e.to_port.as_str())).collect();
        for node in self.nodes.values() {
            for required in node.required_input_names() {
                if !fed.contains(&(node.id.as_str(), required)) {
                    return Err(WeaveError::GraphStructure(format!(
                        "required input '{}.{required}' has no incoming edge",
                        node.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Three-color DFS cycle detection (`spec.md` §4.3 check 6).
    fn validate_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let adjacency = self.forward_adjacency();
        let mut color: HashMap<&str, Color> =
            self.nodes.keys().map(|id| (id.as_str(), Color::White)).collect();
        let mut path: Vec<&str> = Vec::new();

        fn visit<'a>(
            node: &'a str,
            adjacency: &HashMap<&'a str, Vec<&'a str>>,
            color: &mut HashMap<&'a str, Color>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<&'a str>> {
            color.insert(node, Color::Gray);
            path.push(node);
            if let Some(neighbors) = adjacency.get(node) {
                for &next in neighbors {
                    match color.get(next).copied().unwrap_or(Color::White) {
                        Color::White => {
                            if let Some(cycle) = visit(next, adjacency, color, path) {
                                return Some(cycle);
                            }
                        },
                        Color::Gray => {
                            let start = path.iter().position(|&n| n == next).unwrap_or(0);
                            return Some(path[start..].to_vec());
                        },
                        Color::Black => {},
                    }
                }
            }
            path.pop();
            color.insert(node, Color::Black);
            None
        }

        for id in self.nodes.keys() {
            if color.get(id.as_str()).copied() == Some(Color::White) {
                if let Some(cycle) = visit(id.as_str(), &adjacency, &mut color, &mut path) {
                    return Err(WeaveError::GraphStructure(format!(
                        "cycle detected: {}",
                        cycle.join(" -> ")
                    )));
                }
            }
        }
        Ok(())
    }

    fn forward_adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adjacency: HashMap<&str, Vec<&str>> =
            self.nodes.keys().map(|id| (id.as_str(), Vec::new())).collect();
        for edge in &self.edges {
            adjacency.entry(edge.from_node.as_str()).or_default().push(edge.to_node.as_str());
        }
        adjacency
    }

    /// Phase C: Kahn's algorithm, diagnostic only — the executor does not
    /// run nodes in this order (`spec.md` §4.3).
    #[must_use]
    pub fn topological_order(&self) -> Vec<String> {
        let adjacency = self.forward_adjacency();
        let mut in_degree: HashMap<&str, usize> = self.nodes.keys().map(|id| (id.as_str(), 0)).collect();
        for neighbors in adjacency.values() {
            for &n in neighbors {
                *in_degree.entry(n).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            if let Some(neighbors) = adjacency.get(id) {
                for &next in neighbors {
                    if let Some(degree) = in_degree.get_mut(next) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }
        order
    }

    #[must_use]
    pub fn source_nodes(&self) -> Vec<&str> {
        let fed: HashSet<&str> = self.edges.iter().map(|e| e.to_node.as_str()).collect();
        self.nodes.keys().map(String::as_str).filter(|id| !fed.contains(id)).collect()
    }

    #[must_use]
    pub fn sink_nodes(&self) -> Vec<&str> {
        let feeding: HashSet<&str> = self.edges.iter().map(|e| e.from_node.as_str()).collect();
        self.nodes.keys().map(String::as_str).filter(|id| !feeding.contains(id)).collect()
    }

    #[must_use]
    pub fn edges_from_port<'a>(&'a self, node_id: &str, port: &str) -> Vec<&'a ResolvedEdge> {
        self.edges.iter().filter(|e| e.from_node == node_id && e.from_port == port).collect()
    }

    #[must_use]
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn edges(&self) -> &[ResolvedEdge] {
        &self.edges
    }

    /// Consumes the graph, handing ownership of its nodes to the executor.
    #[must_use]
    pub fn into_parts(self) -> (IndexMap<String, GraphNode>, Vec<ResolvedEdge>) {
        (self.nodes, self.edges)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use weave_core::{DataType, NodeMetadata, PluginRegistry, Port, RunContext, RunOutcome, TypeRegistry};

    use super::*;
    use crate::config_format::{ConnectionConfig, GraphConfig, NodeConfig};

    struct FixedPortsPlugin {
        metadata: NodeMetadata,
        inputs: Vec<Port>,
        outputs: Vec<Port>,
    }

    #[async_trait]
    impl weave_core::Plugin for FixedPortsPlugin {
        fn metadata(&self) -> NodeMetadata {
            self.metadata.clone()
        }
        fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
            (self.inputs.clone(), self.outputs.clone())
        }
        fn validate_config(&self, _config: &serde_json::Value) -> Result<()> {
            Ok(())
        }
        async fn initialize(&mut self) -> Result<()> {
            Ok(())
        }
        async fn run(&mut self, _ctx: RunContext) -> RunOutcome {
            RunOutcome::ok(std::collections::HashMap::new(), std::time::Duration::ZERO)
        }
        async fn cleanup(&mut self) {}
    }

    fn register_type(registry: &mut PluginRegistry, type_name: &str, inputs: Vec<Port>, outputs: Vec<Port>) {
        let metadata = NodeMetadata {
            type_name: type_name.to_string(),
            name: type_name.to_string(),
            version: "0.1.0".to_string(),
            author: "test".to_string(),
            description: String::new(),
            category: "test".to_string(),
            dependencies: vec![],
        };
        let metadata_for_factory = metadata.clone();
        registry.register(
            metadata,
            Arc::new(move |_cfg| {
                Ok(Box::new(FixedPortsPlugin {
                    metadata: metadata_for_factory.clone(),
                    inputs: inputs.clone(),
                    outputs: outputs.clone(),
                }) as Box<dyn weave_core::Plugin>)
            }),
        );
    }

    fn node_config(id: &str, plugin_type: &str) -> NodeConfig {
        NodeConfig {
            id: id.to_string(),
            plugin_type: plugin_type.to_string(),
            config: serde_json::Value::Null,
            position: None,
            enabled: true,
        }
    }

    fn connection(from: &str, to: &str) -> ConnectionConfig {
        ConnectionConfig { from: from.to_string(), to: to.to_string(), enabled: true }
    }

    fn linear_fixture() -> (PluginRegistry, TypeRegistry, GraphConfig) {
        let mut plugins = PluginRegistry::new();
        register_type(&mut plugins, "source", vec![], vec![Port::output("out", DataType::Number)]);
        register_type(&mut plugins, "sink", vec![Port::required_input("in", DataType::Number)], vec![]);

        let config = GraphConfig {
            name: "linear".to_string(),
            version: "1".to_string(),
            nodes: vec![node_config("src", "source"), node_config("sink", "sink")],
            connections: vec![connection("src.out", "sink.in")],
            metadata: None,
        };

        (plugins, TypeRegistry::default(), config)
    }

    fn cyclic_fixture() -> (PluginRegistry, TypeRegistry, GraphConfig) {
        let mut plugins = PluginRegistry::new();
        let passthrough_ports =
            || (vec![Port::required_input("in", DataType::Number)], vec![Port::output("out", DataType::Number)]);
        let (a_in, a_out) = passthrough_ports();
        register_type(&mut plugins, "a", a_in, a_out);
        let (b_in, b_out) = passthrough_ports();
        register_type(&mut plugins, "b", b_in, b_out);

        let config = GraphConfig {
            name: "cyclic".to_string(),
            version: "1".to_string(),
            nodes: vec![node_config("a", "a"), node_config("b", "b")],
            connections: vec![connection("a.out", "b.in"), connection("b.out", "a.in")],
            metadata: None,
        };

        (plugins, TypeRegistry::default(), config)
    }

    #[test]
    fn builds_linear_graph_and_topo_order() {
        let (plugins, types, config) = linear_fixture();
        let graph = Graph::build(&config, &plugins, &types).expect("valid graph");
        assert_eq!(graph.topological_order(), vec!["src", "sink"]);
        assert_eq!(graph.source_nodes(), vec!["src"]);
        assert_eq!(graph.sink_nodes(), vec!["sink"]);
    }

    #[test]
    fn rejects_cycle() {
        let (plugins, types, config) = cyclic_fixture();
        let err = Graph::build(&config, &plugins, &types).unwrap_err();
        assert!(matches!(err, WeaveError::GraphStructure(msg) if msg.contains("cycle")));
    }

    #[test]
    fn rejects_missing_required_input() {
        let (plugins, types, mut config) = linear_fixture();
        config.connections.clear();
        let err = Graph::build(&config, &plugins, &types).unwrap_err();
        assert!(matches!(err, WeaveError::GraphStructure(msg) if msg.contains("required input")));
    }

    #[test]
    fn rejects_duplicate_incoming_edge() {
        let (mut plugins, types, mut config) = linear_fixture();
        register_type(&mut plugins, "source2", vec![], vec![Port::output("out", DataType::Number)]);
        config.nodes.push(node_config("src2", "source2"));
        config.connections.push(connection("src2.out", "sink.in"));
        let err = Graph::build(&config, &plugins, &types).unwrap_err();
        assert!(matches!(err, WeaveError::GraphStructure(msg) if msg.contains("more than one enabled edge")));
    }
}
