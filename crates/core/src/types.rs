// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The data model that flows through a graph: [`DataType`] descriptors,
//! the runtime [`Value`] payloads, and the [`DataPacket`] envelope that
//! carries a value between nodes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The built-in data type descriptors a port can carry.
///
/// Each variant corresponds to one kind of [`Value`]. `check_compatibility`
/// in [`crate::type_registry::TypeRegistry`] decides which descriptors may
/// connect to which; this enum itself only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Image,
    BoundingBox,
    DetectionList,
    Metadata,
    String,
    Number,
    Boolean,
    /// Matches any other type. Used by pass-through ports (see
    /// `spec.md` §4.1's `Any` compatibility rule).
    Any,
}

impl DataType {
    /// Returns the descriptor that best matches a concrete [`Value`].
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Image(_) => Self::Image,
            Value::BoundingBox(_) => Self::BoundingBox,
            Value::DetectionList(_) => Self::DetectionList,
            Value::Metadata(_) => Self::Metadata,
            Value::Str(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Boolean(_) => Self::Boolean,
        }
    }
}

/// A decoded image buffer. Kept deliberately minimal: format, geometry, and
/// raw bytes. Real codecs live outside the scope of this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel channel stride; e.g. 3 for RGB8, 4 for RGBA8.
    pub channels: u8,
    pub data: Arc<Vec<u8>>,
}

impl ImageData {
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// A single axis-aligned detection box in normalized `[0, 1]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub confidence: f32,
}

/// The runtime payload carried by a [`DataPacket`].
///
/// `Value` is the concrete union of all built-in [`DataType`] descriptors.
/// It implements [`Payload`] so the executor's fan-out routing can decide
/// whether to deep-copy or share a branch without knowing the variant.
#[derive(Debug, Clone)]
pub enum Value {
    Image(ImageData),
    BoundingBox(BoundingBox),
    DetectionList(Vec<BoundingBox>),
    Metadata(HashMap<String, serde_json::Value>),
    Str(String),
    Number(f64),
    Boolean(bool),
}

/// Copy-on-write sizing and cloning contract used by the executor's
/// fan-out policy (`spec.md` §4.4, §9 design note on the `Payload` trait).
///
/// `size_hint` need not be exact; it only has to be cheap and monotonic
/// enough to compare against the executor's deep-copy threshold
/// (`weave-engine`'s `ExecutorConfig::deep_copy_threshold_bytes`).
pub trait Payload {
    /// Approximate size in bytes, used to decide deep-vs-shallow copy on
    /// fan-out.
    fn size_hint(&self) -> usize;

    /// Produces an independent copy that shares no mutable state with
    /// `self`. For value types this is just `clone()`; for types backed by
    /// `Arc` buffers it must actually duplicate the backing storage.
    fn deep_clone(&self) -> Self;
}

impl Payload for Value {
    fn size_hint(&self) -> usize {
        match self {
            Self::Image(img) => img.byte_len(),
            Self::BoundingBox(_) => std::mem::size_of::<BoundingBox>(),
            Self::DetectionList(list) => list.len() * std::mem::size_of::<BoundingBox>(),
            Self::Metadata(map) => map.len() * 64,
            Self::Str(s) => s.len(),
            Self::Number(_) | Self::Boolean(_) => std::mem::size_of::<Self>(),
        }
    }

    fn deep_clone(&self) -> Self {
        match self {
            Self::Image(img) => Self::Image(ImageData {
                width: img.width,
                height: img.height,
                channels: img.channels,
                data: Arc::new((*img.data).clone()),
            }),
            other => other.clone(),
        }
    }
}

/// A unique packet identifier. Monotonic per graph run; not globally unique
/// across runs.
pub type PacketId = u64;

/// The envelope that moves between nodes over a port's edge.
///
/// `ref_count` tracks how many downstream branches still hold a reference
/// to this packet's lineage; the executor sets it to the branch count at
/// fan-out time (`spec.md` §9 open question resolution) purely for
/// diagnostics — it is not used for memory reclamation, which Rust's own
/// `Arc`/ownership already handles.
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub packet_id: PacketId,
    pub timestamp: std::time::SystemTime,
    pub value: Arc<Value>,
    pub ref_count: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DataPacket {
    #[must_use]
    pub fn new(packet_id: PacketId, value: Value) -> Self {
        Self {
            packet_id,
            timestamp: std::time::SystemTime::now(),
            value: Arc::new(value),
            ref_count: 1,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        DataType::of(&self.value)
    }

    #[must_use]
    pub fn size_hint(&self) -> usize {
        self.value.size_hint()
    }
}
