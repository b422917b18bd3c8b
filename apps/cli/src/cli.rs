// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Command definitions and dispatch for the `weave` binary: `validate`,
//! `run`, and `dry-run`, matching the process lifecycle commands named by
//! `spec.md` §6 and their exit codes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use weave_core::{PluginRegistry, TypeRegistry};
use weave_engine::{Executor, EventBus, Graph, GraphConfig, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Console (and file, if enabled) log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Additionally write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, construct, and validate a graph without running it
    Validate {
        /// Path to a graph configuration document
        graph: PathBuf,
    },
    /// Validate a graph, then execute it until a stop signal
    Run {
        /// Path to a graph configuration document
        graph: PathBuf,
        /// Path to an optional runtime configuration TOML file
        #[arg(long, default_value = "weave.toml")]
        runtime_config: PathBuf,
    },
    /// Validate a graph and print its topological order without running it
    DryRun {
        /// Path to a graph configuration document
        graph: PathBuf,
    },
}

fn build_plugin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    weave_nodes::register_builtin_nodes(&mut registry);
    registry
}

/// Loads a graph configuration document and runs Phase A/B construction
/// and validation against it (`spec.md` §4.3). Does not execute anything.
fn build_graph(graph_path: &Path) -> weave_core::Result<Graph> {
    let config = GraphConfig::load(graph_path)?;
    let plugin_registry = build_plugin_registry();
    let type_registry = TypeRegistry::default();
    Graph::build(&config, &plugin_registry, &type_registry)
}

/// Exit code 0 on success, 1 on any configuration or validation failure
/// (`spec.md` §6).
fn handle_validate(graph_path: &Path) {
    match build_graph(graph_path) {
        Ok(graph) => {
            println!(
                "graph '{}' is valid: {} node(s), {} edge(s)",
                graph_path.display(),
                graph.node_ids().len(),
                graph.edges().len()
            );
        },
        Err(err) => {
            eprintln!("validation failed: {err}");
            std::process::exit(1);
        },
    }
}

/// Validates, then prints the diagnostic topological order (`spec.md` §4.3
/// Phase C) without constructing an executor.
fn handle_dry_run(graph_path: &Path) {
    match build_graph(graph_path) {
        Ok(graph) => {
            println!("topological order:");
            for (index, node_id) in graph.topological_order().iter().enumerate() {
                println!("  {}. {node_id}", index + 1);
            }
        },
        Err(err) => {
            eprintln!("validation failed: {err}");
            std::process::exit(1);
        },
    }
}

/// Validates, then runs the graph until every source is naturally
/// exhausted (exit 0) or an interrupt is received (exit 130). Runtime
/// configuration failures exit 1, matching a configuration error rather
/// than a runtime one.
async fn handle_run(graph_path: &Path, runtime_config_path: &Path) {
    let graph = match build_graph(graph_path) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("validation failed: {err}");
            std::process::exit(1);
        },
    };

    let runtime_config = match RuntimeConfig::load(&runtime_config_path.to_string_lossy()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load runtime configuration: {err}");
            std::process::exit(1);
        },
    };

    let bus = Arc::new(EventBus::spawn_with(
        runtime_config.event_queue_capacity,
        weave_engine::constants::DEFAULT_THROTTLE_TABLE,
    ));
    let shutdown_grace_period = Duration::from_millis(runtime_config.shutdown_grace_period_ms);

    let executor = Executor::spawn(graph, bus, runtime_config.executor_config());
    let handle = executor.handle();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let join_task = tokio::spawn(async move {
        executor.join().await;
        let _ = done_tx.send(());
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, stopping graph");
            handle.stop();
            if tokio::time::timeout(shutdown_grace_period, join_task).await.is_err() {
                warn!("graph did not stop within the shutdown grace period; exiting anyway");
            }
            std::process::exit(130);
        },
        _ = done_rx => {
            info!("every source exhausted, graph run complete");
            std::process::exit(0);
        },
    }
}

pub async fn handle_command(cli: &Cli) {
    match &cli.command {
        Commands::Validate { graph } => handle_validate(graph),
        Commands::DryRun { graph } => handle_dry_run(graph),
        Commands::Run { graph, runtime_config } => handle_run(graph, runtime_config).await,
    }
}

#[cfg(test)]
mod tests {
    use weave_engine::{ConnectionConfig, NodeConfig};

    use super::*;

    fn sample_config() -> GraphConfig {
        GraphConfig {
            name: "demo".to_string(),
            version: "1".to_string(),
            nodes: vec![
                NodeConfig {
                    id: "src".to_string(),
                    plugin_type: "demo::counter_source".to_string(),
                    config: serde_json::json!({}),
                    position: None,
                    enabled: true,
                },
                NodeConfig {
                    id: "sink".to_string(),
                    plugin_type: "demo::discard_sink".to_string(),
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
    fn build_plugin_registry_registers_the_demo_nodes() {
        let registry = build_plugin_registry();
        assert!(registry.get("demo::counter_source").is_some());
        assert!(registry.get("demo::discard_sink").is_some());
    }

    #[test]
    fn a_valid_two_node_graph_builds_and_orders_source_before_sink() {
        let config = sample_config();
        let plugin_registry = build_plugin_registry();
        let type_registry = TypeRegistry::default();
        let graph = Graph::build(&config, &plugin_registry, &type_registry).expect("graph should validate");
        assert_eq!(graph.topological_order(), vec!["src".to_string(), "sink".to_string()]);
    }

    #[test]
    fn an_unsatisfied_required_input_fails_validation() {
        let mut config = sample_config();
        config.connections.clear();
        let plugin_registry = build_plugin_registry();
        let type_registry = TypeRegistry::default();
        assert!(Graph::build(&config, &plugin_registry, &type_registry).is_err());
    }
}
