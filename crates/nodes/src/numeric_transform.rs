// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A node that applies a configurable arithmetic operation to a single
//! numeric input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weave_core::{DataType, NodeMetadata, Plugin, PluginRegistry, Port, RunContext, RunOutcome, Value, WeaveError};

fn default_operand() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Add,
    Multiply,
    Negate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NumericTransformConfig {
    operation: Operation,
    #[serde(default = "default_operand")]
    operand: f64,
}

/// Applies `operation` to its `"in"` input and emits the result on `"out"`.
/// `Negate` ignores `operand`.
pub struct NumericTransform {
    operation: Operation,
    operand: f64,
}

impl NumericTransform {
    fn new(config: Option<&serde_json::Value>) -> Result<Self, WeaveError> {
        let config = config.ok_or_else(|| {
            WeaveError::Config("demo::numeric_transform requires a config with an 'operation' field".to_string())
        })?;
        let config: NumericTransformConfig = serde_json::from_value(config.clone())?;
        Ok(Self { operation: config.operation, operand: config.operand })
    }

    fn apply(&self, input: f64) -> f64 {
        match self.operation {
            Operation::Add => input + self.operand,
            Operation::Multiply => input * self.operand,
            Operation::Negate => -input,
        }
    }
}

#[async_trait]
impl Plugin for NumericTransform {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            type_name: "demo::numeric_transform".to_string(),
            name: "Numeric Transform".to_string(),
            version: "0.1.0".to_string(),
            author: "Weave Contributors".to_string(),
            description: "Applies add, multiply, or negate to a numeric input".to_string(),
            category: "demo".to_string(),
            dependencies: vec![],
        }
    }

    fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
        (vec![Port::required_input("in", DataType::Number)], vec![Port::output("out", DataType::Number)])
    }

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), WeaveError> {
        serde_json::from_value::<NumericTransformConfig>(config.clone()).map(|_| ()).map_err(WeaveError::from)
    }

    async fn initialize(&mut self) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn run(&mut self, ctx: RunContext) -> RunOutcome {
        let Some(input) = ctx.inputs.get("in") else {
            return RunOutcome::failed("missing required input 'in'", Duration::ZERO);
        };
        let Value::Number(n) = input.as_ref() else {
            return RunOutcome::failed("input 'in' is not a number", Duration::ZERO);
        };
        let mut outputs = std::collections::HashMap::new();
        outputs.insert("out".to_string(), Value::Number(self.apply(*n)));
        RunOutcome::ok(outputs, Duration::ZERO)
    }

    async fn cleanup(&mut self) {}
}

pub fn register(registry: &mut PluginRegistry) {
    let metadata = NumericTransform { operation: Operation::Add, operand: 0.0 }.metadata();
    registry.register(metadata, Arc::new(|config| Ok(Box::new(NumericTransform::new(config)?) as Box<dyn Plugin>)));
}

#[cfg(test)]
mod tests {
    use weave_core::test_utils::make_run_context;

    use super::*;

    #[tokio::test]
    async fn add_applies_operand_to_input() {
        let mut node =
            NumericTransform::new(Some(&serde_json::json!({ "operation": "add", "operand": 3.0 }))).expect("valid");
        let outcome = node.run(make_run_context("t", 0, vec![("in", Value::Number(2.0))])).await;
        assert!(matches!(outcome.outputs.get("out"), Some(Value::Number(n)) if (*n - 5.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn negate_ignores_operand() {
        let mut node =
            NumericTransform::new(Some(&serde_json::json!({ "operation": "negate" }))).expect("valid");
        let outcome = node.run(make_run_context("t", 0, vec![("in", Value::Number(4.0))])).await;
        assert!(matches!(outcome.outputs.get("out"), Some(Value::Number(n)) if (*n + 4.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn non_numeric_input_fails_the_invocation() {
        let mut node =
            NumericTransform::new(Some(&serde_json::json!({ "operation": "add" }))).expect("valid");
        let outcome = node.run(make_run_context("t", 0, vec![("in", Value::Boolean(true))])).await;
        assert!(!outcome.success);
    }

    #[test]
    fn missing_config_is_rejected_at_construction() {
        assert!(NumericTransform::new(None).is_err());
    }
}
