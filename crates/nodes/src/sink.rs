// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A terminal node that accepts any packet and discards it. Useful for
//! side-branches that exist only to exercise the fan-out path, or as a
//! graph's final node when nothing downstream needs the result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use weave_core::{DataType, NodeMetadata, Plugin, PluginRegistry, Port, RunContext, RunOutcome, WeaveError};

#[derive(Default)]
pub struct DiscardSink;

#[async_trait]
impl Plugin for DiscardSink {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            type_name: "demo::discard_sink".to_string(),
            name: "Discard Sink".to_string(),
            version: "0.1.0".to_string(),
            author: "Weave Contributors".to_string(),
            description: "Accepts any packet and discards it".to_string(),
            category: "demo".to_string(),
            dependencies: vec![],
        }
    }

    fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
        (vec![Port::required_input("in", DataType::Any)], vec![])
    }

    fn validate_config(&self, _config: &serde_json::Value) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn run(&mut self, _ctx: RunContext) -> RunOutcome {
        RunOutcome::ok(std::collections::HashMap::new(), Duration::ZERO)
    }

    async fn cleanup(&mut self) {}
}

pub fn register(registry: &mut PluginRegistry) {
    registry.register(DiscardSink.metadata(), Arc::new(|_config| Ok(Box::new(DiscardSink) as Box<dyn Plugin>)));
}

#[cfg(test)]
mod tests {
    use weave_core::test_utils::make_run_context;

    use super::*;

    #[tokio::test]
    async fn run_succeeds_and_produces_no_outputs() {
        let mut node = DiscardSink;
        let ctx = make_run_context("sink", 0, vec![("in", weave_core::Value::Number(1.0))]);
        let outcome = node.run(ctx).await;
        assert!(outcome.success);
        assert!(outcome.outputs.is_empty());
    }

    #[test]
    fn declares_one_required_input_and_no_outputs() {
        let (inputs, outputs) = DiscardSink.get_ports();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].required);
        assert!(outputs.is_empty());
    }
}
