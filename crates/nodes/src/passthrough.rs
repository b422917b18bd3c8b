// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A node that forwards its single input to its single output unchanged.
//! Useful for graph wiring, debugging, and exercising the executor's
//! routing path without any transformation logic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use weave_core::{DataType, NodeMetadata, Plugin, PluginRegistry, Port, RunContext, RunOutcome, WeaveError};

#[derive(Default)]
pub struct PassthroughNode;

#[async_trait]
impl Plugin for PassthroughNode {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            type_name: "demo::passthrough".to_string(),
            name: "Passthrough".to_string(),
            version: "0.1.0".to_string(),
            author: "Weave Contributors".to_string(),
            description: "Forwards its single input to its single output unchanged".to_string(),
            category: "demo".to_string(),
            dependencies: vec![],
        }
    }

    fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
        (vec![Port::required_input("in", DataType::Any)], vec![Port::output("out", DataType::Any)])
    }

    fn validate_config(&self, _config: &serde_json::Value) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn run(&mut self, ctx: RunContext) -> RunOutcome {
        let mut outputs = std::collections::HashMap::new();
        if let Some(value) = ctx.inputs.get("in") {
            outputs.insert("out".to_string(), (**value).clone());
        }
        RunOutcome::ok(outputs, Duration::ZERO)
    }

    async fn cleanup(&mut self) {}
}

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register(PassthroughNode.metadata(), Arc::new(|_config| Ok(Box::new(PassthroughNode) as Box<dyn Plugin>)));
}

#[cfg(test)]
mod tests {
    use weave_core::test_utils::make_run_context;
    use weave_core::Value;

    use super::*;

    #[tokio::test]
    async fn forwards_input_value_to_output_unchanged() {
        let mut node = PassthroughNode;
        let ctx = make_run_context("p", 0, vec![("in", Value::Str("hello".to_string()))]);
        let outcome = node.run(ctx).await;
        assert!(matches!(outcome.outputs.get("out"), Some(Value::Str(s)) if s == "hello"));
    }

    #[tokio::test]
    async fn no_input_present_yields_no_output() {
        let mut node = PassthroughNode;
        let outcome = node.run(make_run_context("p", 0, vec![])).await;
        assert!(outcome.outputs.is_empty());
    }
}
