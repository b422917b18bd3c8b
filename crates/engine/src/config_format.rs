// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The on-disk graph configuration format (`spec.md` §6): a JSON document
//! naming nodes and port-to-port connections. `load`/`save` round-trip: a
//! document that is saved right after being loaded is structurally
//! identical, order of `nodes`/`connections` preserved.

use std::path::Path;

use serde::{Deserialize, Serialize};

use weave_core::{Result, WeaveError};

fn default_true() -> bool {
    true
}

/// One entry of the `nodes` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(default = "serde_json::Value::default", skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 2]>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// One entry of the `connections` array. `from`/`to` are `"node.port"`
/// strings, split by [`ConnectionConfig::endpoints`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ConnectionConfig {
    /// Splits `"node.port"` into `(node, port)`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::GraphStructure`] if either endpoint is missing
    /// its `.port` suffix.
    pub fn endpoints(&self) -> Result<((&str, &str), (&str, &str))> {
        let from = split_endpoint(&self.from)?;
        let to = split_endpoint(&self.to)?;
        Ok((from, to))
    }
}

fn split_endpoint(endpoint: &str) -> Result<(&str, &str)> {
    endpoint.split_once('.').ok_or_else(|| {
        WeaveError::GraphStructure(format!(
            "connection endpoint '{endpoint}' is not of the form 'node.port'"
        ))
    })
}

/// The top-level graph configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub name: String,
    pub version: String,
    pub nodes: Vec<NodeConfig>,
    pub connections: Vec<ConnectionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl GraphConfig {
    /// Loads a graph configuration document from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Io`] if the file cannot be read, or
    /// [`WeaveError::Config`] if it is not a valid document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(WeaveError::from)
    }

    /// Saves this configuration to `path`, pretty-printed, preserving the
    /// order of `nodes` and `connections`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Io`] on write failure, or [`WeaveError::Config`]
    /// if serialization somehow fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(WeaveError::from)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphConfig {
        GraphConfig {
            name: "demo".to_string(),
            version: "1".to_string(),
            nodes: vec![
                NodeConfig {
                    id: "src".to_string(),
                    plugin_type: "demo::source".to_string(),
                    config: serde_json::json!({}),
                    position: Some([0.0, 0.0]),
                    enabled: true,
                },
                NodeConfig {
                    id: "sink".to_string(),
                    plugin_type: "demo::sink".to_string(),
                    config: serde_json::Value::Null,
                    position: None,
                    enabled: true,
                },
            ],
            connections: vec![ConnectionConfig {
                from: "src.out".to_string(),
                to: "sink.in".to_string(),
                enabled: true,
            }],
            metadata: None,
        }
    }

    #[test]
    fn round_trips_through_json_text() {
        let original = sample();
        let text = serde_json::to_string_pretty(&original).expect("serialize");
        let parsed: GraphConfig = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(original, parsed);
        assert_eq!(parsed.nodes[0].id, "src");
        assert_eq!(parsed.nodes[1].id, "sink");
    }

    #[test]
    fn connection_endpoints_split_node_and_port() {
        let conn = ConnectionConfig { from: "a.out".to_string(), to: "b.in".to_string(), enabled: true };
        let ((from_node, from_port), (to_node, to_port)) = conn.endpoints().expect("valid endpoints");
        assert_eq!((from_node, from_port), ("a", "out"));
        assert_eq!((to_node, to_port), ("b", "in"));
    }

    #[test]
    fn malformed_endpoint_is_a_graph_structure_error() {
        let conn = ConnectionConfig { from: "missing-dot".to_string(), to: "b.in".to_string(), enabled: true };
        assert!(matches!(conn.endpoints(), Err(WeaveError::GraphStructure(_))));
    }
}
