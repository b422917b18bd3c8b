// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A source node with no inputs that emits an incrementing numeric
//! sequence, one value per invocation of the executor's source loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weave_core::{
    DataType, NodeMetadata, Plugin, PluginRegistry, Port, RunContext, RunOutcome, WeaveError,
};

fn default_step() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct CounterSourceConfig {
    start: f64,
    #[serde(default = "default_step")]
    step: f64,
}

impl Default for CounterSourceConfig {
    fn default() -> Self {
        Self { start: 0.0, step: default_step() }
    }
}

/// Emits `start`, `start + step`, `start + 2*step`, ... forever, one value
/// per source-loop iteration (`spec.md` §4.4: a source's `run()` is invoked
/// with an empty `ctx.inputs`).
pub struct CounterSource {
    current: f64,
    step: f64,
}

impl CounterSource {
    fn new(config: Option<&serde_json::Value>) -> Result<Self, WeaveError> {
        let config: CounterSourceConfig = match config {
            Some(value) => serde_json::from_value(value.clone())?,
            None => CounterSourceConfig::default(),
        };
        Ok(Self { current: config.start, step: config.step })
    }
}

#[async_trait]
impl Plugin for CounterSource {
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            type_name: "demo::counter_source".to_string(),
            name: "Counter Source".to_string(),
            version: "0.1.0".to_string(),
            author: "Weave Contributors".to_string(),
            description: "Emits an incrementing numeric sequence with no inputs".to_string(),
            category: "demo".to_string(),
            dependencies: vec![],
        }
    }

    fn get_ports(&self) -> (Vec<Port>, Vec<Port>) {
        (vec![], vec![Port::output("out", DataType::Number)])
    }

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), WeaveError> {
        serde_json::from_value::<CounterSourceConfig>(config.clone()).map(|_| ()).map_err(WeaveError::from)
    }

    async fn initialize(&mut self) -> Result<(), WeaveError> {
        Ok(())
    }

    async fn run(&mut self, _ctx: RunContext) -> RunOutcome {
        let value = self.current;
        self.current += self.step;
        let mut outputs = std::collections::HashMap::new();
        outputs.insert("out".to_string(), weave_core::Value::Number(value));
        RunOutcome::ok(outputs, Duration::ZERO)
    }

    async fn cleanup(&mut self) {}
}

pub fn register(registry: &mut PluginRegistry) {
    let metadata = CounterSource { current: 0.0, step: 1.0 }.metadata();
    registry.register(metadata, Arc::new(|config| Ok(Box::new(CounterSource::new(config)?) as Box<dyn Plugin>)));
}

#[cfg(test)]
mod tests {
    use weave_core::test_utils::make_run_context;

    use super::*;

    #[tokio::test]
    async fn emits_start_then_increments_by_step() {
        let mut node = CounterSource::new(Some(&serde_json::json!({ "start": 5.0, "step": 2.0 })))
            .expect("valid config");

        let first = node.run(make_run_context("src", 0, vec![])).await;
        assert!(matches!(first.outputs.get("out"), Some(weave_core::Value::Number(n)) if (*n - 5.0).abs() < f64::EPSILON));

        let second = node.run(make_run_context("src", 1, vec![])).await;
        assert!(matches!(second.outputs.get("out"), Some(weave_core::Value::Number(n)) if (*n - 7.0).abs() < f64::EPSILON));
    }

    #[test]
    fn default_config_starts_at_zero_with_unit_step() {
        let node = CounterSource::new(None).expect("default config is valid");
        assert!((node.current - 0.0).abs() < f64::EPSILON);
        assert!((node.step - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn register_adds_one_entry_to_the_registry() {
        let mut registry = PluginRegistry::new();
        register(&mut registry);
        assert!(registry.get("demo::counter_source").is_some());
    }
}
