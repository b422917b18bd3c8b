// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data model and plugin contract for the Weave streaming DAG engine.
//!
//! This crate is deliberately small: it defines the types that cross the
//! boundary between the engine and a node implementation (`DataPacket`,
//! `Port`, `Event`, the `Plugin` trait) and the two process-wide,
//! read-mostly registries (`TypeRegistry`, `PluginRegistry`). Graph
//! construction, execution, the event bus, and metrics live in
//! `weave-engine`, which depends on this crate.

pub mod control;
pub mod error;
pub mod event;
pub mod node;
pub mod plugin_registry;
pub mod port;
pub mod type_registry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use control::ErrorStrategy;
pub use error::{Result, WeaveError};
pub use event::{Event, Priority, SharedEvent};
pub use node::{NodeMetadata, NodeState, Plugin, RunContext, RunOutcome};
pub use plugin_registry::{DependencyProbe, PluginFactory, PluginInstantiationError, PluginRegistry};
pub use port::{Port, PortDirection};
pub use type_registry::{TypeDescriptor, TypeRegistry};
pub use types::{BoundingBox, DataPacket, DataType, ImageData, PacketId, Payload, Value};
