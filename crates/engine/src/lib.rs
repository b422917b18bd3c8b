// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph model, streaming executor, event bus, and metrics collector for
//! the Weave DAG engine.
//!
//! This crate turns a validated [`crate::graph::Graph`] into a running set
//! of per-node tasks (`spec.md` §4.4), routes packets between them with
//! copy-on-write fan-out, and publishes lifecycle/telemetry events on a
//! topic-based [`crate::event_bus::EventBus`] that [`crate::metrics`]
//! periodically summarizes.

pub mod config_format;
pub mod constants;
pub mod event_bus;
pub mod executor;
pub mod graph;
pub mod metrics;
pub mod runtime_config;

pub use config_format::{ConnectionConfig, GraphConfig, NodeConfig};
pub use event_bus::{topic_matches, DeliveryMode, EventBus};
pub use executor::{Executor, ExecutorConfig, ExecutorHandle, NodeStats};
pub use graph::{Graph, GraphNode, ResolvedEdge};
pub use metrics::{MetricsCollector, MetricsPublisher, NodeStatsSnapshot};
pub use runtime_config::RuntimeConfig;
