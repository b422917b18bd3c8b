// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Demonstration [`weave_core::Plugin`] implementations: a numeric source,
//! a discarding sink, a passthrough, and a numeric transform. These exist
//! to exercise the engine's graph model and executor end to end, and to
//! back `weave-cli`'s `dry-run` command.

pub mod numeric_transform;
pub mod passthrough;
pub mod sink;
pub mod source;

use weave_core::PluginRegistry;

/// Registers every demonstration node type with `registry`, the
/// compile-time registration path `spec.md` §4.2/§9 calls for in place of
/// filesystem plugin discovery.
pub fn register_builtin_nodes(registry: &mut PluginRegistry) {
    source::register(registry);
    sink::register(registry);
    passthrough::register(registry);
    numeric_transform::register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_four_demo_node_types() {
        let mut registry = PluginRegistry::new();
        register_builtin_nodes(&mut registry);
        assert_eq!(registry.discover_plugins(), 4);
        for type_name in
            ["demo::counter_source", "demo::discard_sink", "demo::passthrough", "demo::numeric_transform"]
        {
            assert!(registry.get(type_name).is_some(), "{type_name} should be registered");
        }
    }
}
