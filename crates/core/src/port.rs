// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Port declarations: the typed input/output endpoints a node exposes.

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Which side of a node a [`Port`] sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

/// A single named, typed port on a node.
///
/// `required` governs whether the graph's structural validation
/// (`spec.md` §4.3 Phase B) rejects a graph that leaves this input
/// unconnected. Output ports are never "required" in that sense; an
/// unconnected output is a silent sink, not a structural error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
    pub type_name: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Port {
    #[must_use]
    pub fn required_input(name: impl Into<String>, type_name: DataType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            type_name,
            required: true,
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn optional_input(name: impl Into<String>, type_name: DataType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            type_name,
            required: false,
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn output(name: impl Into<String>, type_name: DataType) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            type_name,
            required: false,
            default: None,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_input_marks_required_true() {
        let port = Port::required_input("in", DataType::Image);
        assert!(port.required);
        assert_eq!(port.direction, PortDirection::Input);
    }

    #[test]
    fn output_port_is_never_required() {
        let port = Port::output("out", DataType::Image);
        assert!(!port.required);
    }
}
