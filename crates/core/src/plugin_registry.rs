// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Plugin Registry (`spec.md` §4.2).
//!
//! `spec.md` §9 calls for replacing runtime directory scanning with a
//! compile-time registry: node constructors register themselves via calls
//! made once at process startup, rather than being discovered by loading
//! files from disk. The "never crash the host on a bad registration",
//! "duplicate types: later wins", and "unsatisfied dependency ⇒
//! instantiation-disabled, still registered" invariants from §4.2 apply
//! exactly the same to this static registration path as they would to a
//! directory scan.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::WeaveError;
use crate::node::{NodeMetadata, Plugin};

/// A factory that constructs a fresh [`Plugin`] instance from a config
/// value. Registered once per node type.
pub type PluginFactory =
    Arc<dyn Fn(Option<&serde_json::Value>) -> Result<Box<dyn Plugin>, WeaveError> + Send + Sync>;

/// A probe that reports whether a declared dependency is currently
/// available (e.g. a binary on `PATH`, an environment variable, a model
/// file). Returns `true` when unset, matching "no dependencies declared".
pub type DependencyProbe = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// The specific ways [`PluginRegistry::create_instance`] can fail
/// (`spec.md` §4.2).
#[derive(Debug, thiserror::Error)]
pub enum PluginInstantiationError {
    #[error("plugin type '{0}' not found in registry")]
    NotFound(String),
    #[error("plugin type '{type_name}' has unsatisfied dependency '{dependency}'")]
    MissingDependency { type_name: String, dependency: String },
    #[error("failed to construct instance of '{type_name}': {source}")]
    ConstructionFailed { type_name: String, source: WeaveError },
    #[error("invalid config for plugin type '{type_name}': {source}")]
    InvalidConfig { type_name: String, source: WeaveError },
}

struct PluginEntry {
    metadata: NodeMetadata,
    factory: PluginFactory,
}

/// A disabled/enabled inventory entry, as returned by
/// [`PluginRegistry::dependency_report`].
#[derive(Debug, Clone)]
pub struct DependencyReportEntry {
    pub type_name: String,
    pub dependencies: Vec<String>,
    pub unsatisfied: Vec<String>,
    pub instantiation_disabled: bool,
}

/// Process-wide registry of node types, populated at startup and frozen
/// thereafter (`spec.md` §4.2: "populated at process startup and then
/// frozen" — enforced here by convention: callers build a registry with
/// [`PluginRegistry::register`] calls and then hand out shared `Arc`
/// clones, never mutating it concurrently with lookups).
#[derive(Default)]
pub struct PluginRegistry {
    entries: HashMap<String, PluginEntry>,
    dependency_probe: Option<DependencyProbe>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a dependency probe used by [`Self::dependency_report`] and
    /// [`Self::create_instance`]'s missing-dependency check. Without one,
    /// all declared dependencies are treated as available.
    pub fn with_dependency_probe(mut self, probe: DependencyProbe) -> Self {
        self.dependency_probe = Some(probe);
        self
    }

    /// Registers a node type under `metadata.type_name`. A bad registration
    /// (e.g. a panic inside a badly-written factory closure at call time)
    /// never corrupts the registry itself — registration is just a table
    /// insert; construction failures surface later, from
    /// [`Self::create_instance`].
    ///
    /// Duplicate `type_name`s: later registration wins, per `spec.md` §4.2
    /// item 3.
    pub fn register(&mut self, metadata: NodeMetadata, factory: PluginFactory) -> bool {
        let replaced = self.entries.contains_key(&metadata.type_name);
        if replaced {
            tracing::warn!(type_name = %metadata.type_name, "duplicate plugin registration, later wins");
        }
        self.entries.insert(metadata.type_name.clone(), PluginEntry { metadata, factory });
        replaced
    }

    /// Count of distinct registered types, mirroring `discover_plugins()`'s
    /// return value for the directory-scanning design this registry
    /// replaces.
    #[must_use]
    pub fn discover_plugins(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn list_plugins(&self) -> Vec<NodeMetadata> {
        self.entries.values().map(|e| e.metadata.clone()).collect()
    }

    #[must_use]
    pub fn list_by_category(&self, category: &str) -> Vec<NodeMetadata> {
        self.entries.values().map(|e| e.metadata.clone()).filter(|m| m.category == category).collect()
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<NodeMetadata> {
        self.entries.get(type_name).map(|e| e.metadata.clone())
    }

    fn unsatisfied_dependencies(&self, metadata: &NodeMetadata) -> Vec<String> {
        let Some(probe) = &self.dependency_probe else { return Vec::new() };
        metadata.dependencies.iter().filter(|dep| !probe(dep)).cloned().collect()
    }

    /// Constructs a new node instance and validates its config.
    ///
    /// # Errors
    ///
    /// See [`PluginInstantiationError`] for the distinct failure kinds.
    pub fn create_instance(
        &self,
        type_name: &str,
        config: Option<&serde_json::Value>,
    ) -> Result<Box<dyn Plugin>, PluginInstantiationError> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| PluginInstantiationError::NotFound(type_name.to_string()))?;

        let unsatisfied = self.unsatisfied_dependencies(&entry.metadata);
        if let Some(dependency) = unsatisfied.into_iter().next() {
            return Err(PluginInstantiationError::MissingDependency {
                type_name: type_name.to_string(),
                dependency,
            });
        }

        let instance = (entry.factory)(config).map_err(|source| {
            PluginInstantiationError::ConstructionFailed { type_name: type_name.to_string(), source }
        })?;

        if let Some(config) = config {
            instance.validate_config(config).map_err(|source| PluginInstantiationError::InvalidConfig {
                type_name: type_name.to_string(),
                source,
            })?;
        }

        Ok(instance)
    }

    #[must_use]
    pub fn dependency_report(&self) -> Vec<DependencyReportEntry> {
        self.entries
            .values()
            .map(|entry| {
                let unsatisfied = self.unsatisfied_dependencies(&entry.metadata);
                DependencyReportEntry {
                    type_name: entry.metadata.type_name.clone(),
                    dependencies: entry.metadata.dependencies.clone(),
                    instantiation_disabled: !unsatisfied.is_empty(),
                    unsatisfied,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{RunContext, RunOutcome};
    use async_trait::async_trait;

    struct StubPlugin;

    #[async_trait]
    impl Plugin for StubPlugin {
        fn metadata(&self) -> NodeMetadata {
            NodeMetadata {
                type_name: "stub".into(),
                name: "Stub".into(),
                version: "0.1.0".into(),
                author: "test".into(),
                description: "a stub node".into(),
                category: "test".into(),
                dependencies: vec![],
            }
        }
        fn get_ports(&self) -> (Vec<crate::port::Port>, Vec<crate::port::Port>) {
            (vec![], vec![])
        }
        fn validate_config(&self, _config: &serde_json::Value) -> Result<(), WeaveError> {
            Ok(())
        }
        async fn initialize(&mut self) -> Result<(), WeaveError> {
            Ok(())
        }
        async fn run(&mut self, _ctx: RunContext) -> RunOutcome {
            RunOutcome::ok(HashMap::new(), std::time::Duration::ZERO)
        }
        async fn cleanup(&mut self) {}
    }

    fn registry_with_stub() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(StubPlugin.metadata(), Arc::new(|_cfg| Ok(Box::new(StubPlugin) as Box<dyn Plugin>)));
        registry
    }

    #[test]
    fn create_instance_succeeds_for_registered_type() {
        let registry = registry_with_stub();
        assert!(registry.create_instance("stub", None).is_ok());
    }

    #[test]
    fn create_instance_not_found_for_unknown_type() {
        let registry = PluginRegistry::new();
        let err = registry.create_instance("ghost", None).unwrap_err();
        assert!(matches!(err, PluginInstantiationError::NotFound(_)));
    }

    #[test]
    fn later_registration_wins_on_duplicate_type_name() {
        let mut registry = registry_with_stub();
        let replaced = registry.register(StubPlugin.metadata(), Arc::new(|_cfg| Ok(Box::new(StubPlugin) as Box<dyn Plugin>)));
        assert!(replaced);
        assert_eq!(registry.discover_plugins(), 1);
    }

    #[test]
    fn missing_dependency_disables_instantiation_but_keeps_registration() {
        let mut registry = PluginRegistry::new().with_dependency_probe(Arc::new(|_dep| false));
        let mut metadata = StubPlugin.metadata();
        metadata.dependencies = vec!["some-external-tool".into()];
        registry.register(metadata, Arc::new(|_cfg| Ok(Box::new(StubPlugin) as Box<dyn Plugin>)));

        assert_eq!(registry.discover_plugins(), 1);
        let err = registry.create_instance("stub", None).unwrap_err();
        assert!(matches!(err, PluginInstantiationError::MissingDependency { .. }));

        let report = registry.dependency_report();
        assert_eq!(report.len(), 1);
        assert!(report[0].instantiation_disabled);
    }
}
