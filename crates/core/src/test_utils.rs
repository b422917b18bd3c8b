// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared test helpers for building stub [`Plugin`] instances and
//! [`RunContext`]s, used by this crate's own tests and by `weave-engine`'s
//! executor tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::WeaveError;
use crate::node::{NodeMetadata, Plugin, RunContext, RunOutcome};
use crate::port::Port;
use crate::types::{PacketId, Value};

/// Builds a [`RunContext`] from `(port, value)` pairs, for convenience in
/// tests that only care about a single invocation.
#[must_use]
pub fn make_run_context(node_id: &str, packet_id: PacketId, inputs: Vec<(&str, Value)>) -> RunContext {
    RunContext {
        node_id: node_id.to_string(),
        inputs: inputs.into_iter().map(|(port, value)| (port.to_string(), Arc::new(value))).collect(),
        packet_id,
    }
}

/// A node that forwards its single `"in"` input to its single `"out"`
/// output unchanged, or emits a constant if it has no inputs (acting as a
/// source).
pub struct StubPassthrough {
    pub metadata: NodeMetadata,
    pub source_value: Option<Value>,
    pub initialized: bool,
    pub cleaned_up: bool,
}

impl StubPassthrough {
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            metadata: NodeMetadata {
                type_name: type_name.to_string(),
                name: type_name.to_string(),
                version: "0.1.0".to_string(),
                author: "test".to_string(),
                description: "test stub".to_string(),
                category: "test".to_string(),
                dependencies: vec![],
            },
            source_value: None,
            initialized: false,
            cleaned_up: false,
        }
    }

    #[must_use]
    pub fn source(type_name: &str, value: Value) -> Self {
        let mut stub = Self::new(type_name);
        stub.source_value = Some(value);
        stub
    }
}

#[async_trait]
impl Plugin for StubPassthrough {
    fn metadata(&self) -> NodeMetadata {
        self.metadata.clone()
    }

    fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
        if self.source_value.is_some() {
            (vec![], vec![Port::output("out", crate::types::DataType::Any)])
        } else {
            (
                vec![Port::required_input("in", crate::types::DataType::Any)],
                vec![Port::output("out", crate::types::DataType::Any)],
            )
        }
    }

    fn validate_config(&self, _config: &serde_json::Value) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), WeaveError> {
        self.initialized = true;
        Ok(())
    }

    async fn run(&mut self, ctx: RunContext) -> RunOutcome {
        let mut outputs = HashMap::new();
        if let Some(value) = &self.source_value {
            outputs.insert("out".to_string(), value.clone());
        } else if let Some(value) = ctx.inputs.get("in") {
            outputs.insert("out".to_string(), (**value).clone());
        }
        RunOutcome::ok(outputs, Duration::from_micros(1))
    }

    async fn cleanup(&mut self) {
        self.cleaned_up = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_passthrough_forwards_input_to_output() {
        let mut node = StubPassthrough::new("stub::passthrough");
        node.initialize().await.expect("initialize");
        let ctx = make_run_context("n1", 1, vec![("in", Value::Number(7.0))]);
        let outcome = node.run(ctx).await;
        assert!(outcome.success);
        assert!(matches!(outcome.outputs.get("out"), Some(Value::Number(n)) if (*n - 7.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn stub_source_emits_constant_with_no_inputs() {
        let mut node = StubPassthrough::source("stub::source", Value::Boolean(true));
        node.initialize().await.expect("initialize");
        let ctx = make_run_context("n1", 1, vec![]);
        let outcome = node.run(ctx).await;
        assert!(matches!(outcome.outputs.get("out"), Some(Value::Boolean(true))));
    }
}
