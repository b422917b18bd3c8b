// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the Weave engine.
//!
//! Error variants mirror the error taxonomy used throughout the engine and
//! bus: each stage of graph construction, plugin loading, and execution has
//! its own variant so callers can match on the failure category instead of
//! parsing strings.

use thiserror::Error;

/// Top-level error type for Weave operations.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// A graph configuration document failed to parse or is internally
    /// inconsistent (unknown fields, bad types) before structural validation
    /// even runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A plugin's shared object/crate could not be loaded or its metadata
    /// could not be read. Load failures must never abort the host process;
    /// this variant is how they are reported instead.
    #[error("plugin load error: {0}")]
    PluginLoad(String),

    /// A plugin was found and its metadata is valid, but constructing an
    /// instance of it failed (bad config, failed dependency probe).
    #[error("plugin instantiation error: {0}")]
    PluginInstantiation(String),

    /// The graph itself is structurally invalid: a cycle, a dangling edge,
    /// an unknown port, or any other violation of the invariants in
    /// [`crate`]'s graph model.
    #[error("graph structure error: {0}")]
    GraphStructure(String),

    /// Two connected ports have incompatible data types.
    #[error("type mismatch error: {0}")]
    TypeMismatch(String),

    /// A node raised an error while running (as opposed to while being
    /// constructed or validated).
    #[error("node run error: {0}")]
    NodeRun(String),

    /// A resource limit was hit: a bounded queue stayed full past its
    /// timeout, a thread could not be spawned, or similar exhaustion.
    #[error("resource error: {0}")]
    Resource(String),

    /// The event bus failed to deliver or process an event.
    #[error("bus error: {0}")]
    Bus(String),

    /// Wraps an I/O failure (reading a graph config file from disk, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, WeaveError>`.
pub type Result<T> = std::result::Result<T, WeaveError>;

impl From<serde_json::Error> for WeaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_prefix() {
        let err = WeaveError::GraphStructure("cycle detected".to_string());
        assert_eq!(err.to_string(), "graph structure error: cycle detected");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: WeaveError = io_err.into();
        assert!(matches!(err, WeaveError::Io(_)));
    }
}
