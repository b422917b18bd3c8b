// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The `Plugin` trait (`spec.md` §6's `INode` contract) and the per-invocation
//! context/outcome types the executor uses to drive it.
//!
//! Unlike an actor-style node that owns an internal loop, a `Plugin` is
//! invoked once per packet by the executor's per-node task loop
//! (`spec.md` §4.4): `initialize()` once, then `run()` once per packet (or
//! once per source-loop iteration), then `cleanup()` on loop exit. This
//! mirrors the three-phase lifecycle the specification names explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WeaveError;
use crate::port::Port;
use crate::types::{PacketId, Value};

/// Static metadata a plugin declares about itself (`spec.md` §4.2 item 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// The observable lifecycle states of a node (`spec.md` §4.4 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Idle,
    Running,
    Completed,
    Error,
    Restarting,
    Stopped,
}

/// Inputs and ambient handles passed to a single `run()` invocation.
pub struct RunContext {
    pub node_id: String,
    /// `port_name → value` for this invocation's inputs. Empty for source
    /// nodes, which synthesize their own output with no inputs.
    pub inputs: HashMap<String, Arc<Value>>,
    pub packet_id: PacketId,
}

/// What a `run()` invocation returns to the executor.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub success: bool,
    /// `output_name → value` produced by this invocation.
    pub outputs: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub execution_time: Duration,
}

impl RunOutcome {
    #[must_use]
    pub fn ok(outputs: HashMap<String, Value>, execution_time: Duration) -> Self {
        Self { success: true, outputs, error_message: None, metadata: HashMap::new(), execution_time }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            outputs: HashMap::new(),
            error_message: Some(message.into()),
            metadata: HashMap::new(),
            execution_time,
        }
    }
}

/// The plugin contract every node implementation satisfies.
///
/// `get_ports`, `validate_config`, `initialize`, `run`, `cleanup`, and
/// `input_data_processed_hook` correspond one-to-one to the `INode`
/// requirements in `spec.md` §6; `metadata` corresponds to the metadata
/// block required by the plugin registry in `spec.md` §4.2.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> NodeMetadata;

    /// Returns `(input_ports, output_ports)`.
    fn get_ports(&self) -> (Vec<Port>, Vec<Port>);

    /// Validates a node's configuration ahead of instantiation. May return a
    /// descriptive error instead of a bare bool so the registry can surface
    /// the failure to a caller.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Config`] if `config` is structurally invalid
    /// for this node type.
    fn validate_config(&self, config: &serde_json::Value) -> Result<(), WeaveError>;

    /// Called once before the executor starts invoking `run`. Must be
    /// idempotent after a preceding `cleanup()` (e.g. for the `restart`
    /// error strategy).
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot acquire whatever resource it
    /// needs to process packets.
    async fn initialize(&mut self) -> Result<(), WeaveError>;

    /// Processes one invocation: a single packet for interior nodes, or one
    /// loop iteration for a source node (whose `ctx.inputs` is empty).
    async fn run(&mut self, ctx: RunContext) -> RunOutcome;

    /// Called on loop exit, regardless of whether it exited via stop signal,
    /// a fatal error, or source completion.
    async fn cleanup(&mut self);

    /// Called by the executor when a packet's reference count for the given
    /// input port reaches zero, i.e. every branch that received a copy of it
    /// has been processed. Default implementation does nothing; stateful
    /// nodes (e.g. ones pooling buffers) may override it to reclaim state.
    fn input_data_processed_hook(&mut self, port: &str, packet_id: PacketId) {
        let _ = (port, packet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_outcome_ok_marks_success() {
        let outcome = RunOutcome::ok(HashMap::new(), Duration::from_millis(1));
        assert!(outcome.success);
        assert!(outcome.error_message.is_none());
    }

    #[test]
    fn run_outcome_failed_carries_message() {
        let outcome = RunOutcome::failed("boom", Duration::ZERO);
        assert!(!outcome.success);
        assert_eq!(outcome.error_message.as_deref(), Some("boom"));
    }
}
