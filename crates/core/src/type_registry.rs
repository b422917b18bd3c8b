// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The Type Registry (`spec.md` §4.1): a process-wide, read-after-init
//! table of [`DataType`] descriptors used to validate port connections and
//! coerce values between compatible types.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::WeaveError;
use crate::types::{DataType, Value};

/// Per-type behavior the registry dispatches to. One implementation per
/// built-in [`DataType`] variant; a plugin author extending the type system
/// would provide one of these for a new descriptor name.
pub trait TypeDescriptor: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, value: &Value) -> bool;

    /// Attempts to coerce `value` into this descriptor's type.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::TypeMismatch`] naming `value`'s actual type if
    /// no conversion exists.
    fn convert(&self, value: &Value) -> Result<Value, WeaveError>;

    /// Whether a value of `other`'s type may flow into a port of this type.
    fn is_compatible_with(&self, other: &str) -> bool {
        other == self.name() || other == "any"
    }
}

macro_rules! identity_descriptor {
    ($struct_name:ident, $type_name:literal, $pattern:pat) => {
        struct $struct_name;
        impl TypeDescriptor for $struct_name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn validate(&self, value: &Value) -> bool {
                matches!(value, $pattern)
            }
            fn convert(&self, value: &Value) -> Result<Value, WeaveError> {
                if self.validate(value) {
                    Ok(value.clone())
                } else {
                    Err(WeaveError::TypeMismatch(format!(
                        "cannot convert {:?} into {}",
                        DataType::of(value),
                        $type_name
                    )))
                }
            }
        }
    };
}

identity_descriptor!(ImageDescriptor, "image", Value::Image(_));
identity_descriptor!(BoundingBoxDescriptor, "bounding_box", Value::BoundingBox(_));
identity_descriptor!(DetectionListDescriptor, "detection_list", Value::DetectionList(_));
identity_descriptor!(MetadataDescriptor, "metadata", Value::Metadata(_));
identity_descriptor!(BooleanDescriptor, "boolean", Value::Boolean(_));

struct StringDescriptor;
impl TypeDescriptor for StringDescriptor {
    fn name(&self) -> &'static str {
        "string"
    }
    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::Str(_))
    }
    fn convert(&self, value: &Value) -> Result<Value, WeaveError> {
        match value {
            Value::Str(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::Str(n.to_string())),
            Value::Boolean(b) => Ok(Value::Str(b.to_string())),
            other => {
                Err(WeaveError::TypeMismatch(format!("cannot convert {:?} into string", DataType::of(other))))
            },
        }
    }
}

struct NumberDescriptor;
impl TypeDescriptor for NumberDescriptor {
    fn name(&self) -> &'static str {
        "number"
    }
    fn validate(&self, value: &Value) -> bool {
        matches!(value, Value::Number(_))
    }
    fn convert(&self, value: &Value) -> Result<Value, WeaveError> {
        match value {
            Value::Number(_) => Ok(value.clone()),
            Value::Str(s) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| WeaveError::TypeMismatch(format!("cannot convert string {s:?} into number"))),
            other => {
                Err(WeaveError::TypeMismatch(format!("cannot convert {:?} into number", DataType::of(other))))
            },
        }
    }
}

struct AnyDescriptor;
impl TypeDescriptor for AnyDescriptor {
    fn name(&self) -> &'static str {
        "any"
    }
    fn validate(&self, _value: &Value) -> bool {
        true
    }
    fn convert(&self, value: &Value) -> Result<Value, WeaveError> {
        Ok(value.clone())
    }
    fn is_compatible_with(&self, _other: &str) -> bool {
        true
    }
}

/// Maps a [`DataType`] variant to its registry key, used by port validation
/// to look up the right descriptor without the caller spelling the string.
#[must_use]
pub const fn type_name_of(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Image => "image",
        DataType::BoundingBox => "bounding_box",
        DataType::DetectionList => "detection_list",
        DataType::Metadata => "metadata",
        DataType::String => "string",
        DataType::Number => "number",
        DataType::Boolean => "boolean",
        DataType::Any => "any",
    }
}

/// Process-wide table of [`TypeDescriptor`]s. Built with the seven built-in
/// descriptors from `spec.md` §3 plus `any`; read-only after construction
/// except for [`TypeRegistry::register`], which plugin authors are expected
/// never to call (`spec.md` §4.1: "Downstream plugin code may only *read*
/// the registry").
#[derive(Clone)]
pub struct TypeRegistry {
    descriptors: HashMap<String, Arc<dyn TypeDescriptor>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self { descriptors: HashMap::new() };
        registry.register_unchecked(ImageDescriptor);
        registry.register_unchecked(BoundingBoxDescriptor);
        registry.register_unchecked(DetectionListDescriptor);
        registry.register_unchecked(MetadataDescriptor);
        registry.register_unchecked(StringDescriptor);
        registry.register_unchecked(NumberDescriptor);
        registry.register_unchecked(BooleanDescriptor);
        registry.register_unchecked(AnyDescriptor);
        registry
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register_unchecked(&mut self, descriptor: impl TypeDescriptor + 'static) {
        self.descriptors.insert(descriptor.name().to_string(), Arc::new(descriptor));
    }

    /// Registers a new descriptor under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Config`] if `name` is already registered
    /// (registration is idempotent by name, not overwrite-on-conflict).
    pub fn register(&mut self, descriptor: impl TypeDescriptor + 'static) -> Result<(), WeaveError> {
        let name = descriptor.name();
        if self.descriptors.contains_key(name) {
            return Err(WeaveError::Config(format!("type '{name}' is already registered")));
        }
        self.register_unchecked(descriptor);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`WeaveError::Config`] if `name` is not registered.
    pub fn get(&self, name: &str) -> Result<Arc<dyn TypeDescriptor>, WeaveError> {
        self.descriptors.get(name).cloned().ok_or_else(|| WeaveError::Config(format!("unknown type '{name}'")))
    }

    /// Unknown names yield `false` rather than an error (`spec.md` §4.1).
    #[must_use]
    pub fn check_compatibility(&self, src_name: &str, dst_name: &str) -> bool {
        let Some(dst) = self.descriptors.get(dst_name) else { return false };
        if !self.descriptors.contains_key(src_name) {
            return false;
        }
        dst.is_compatible_with(src_name)
    }

    #[must_use]
    pub fn validate_value(&self, name: &str, value: &Value) -> bool {
        self.descriptors.get(name).is_some_and(|d| d.validate(value))
    }

    /// # Errors
    ///
    /// Returns [`WeaveError::Config`] if `name` is unknown, or
    /// [`WeaveError::TypeMismatch`] if `value` cannot be converted.
    pub fn convert_value(&self, name: &str, value: &Value) -> Result<Value, WeaveError> {
        self.get(name)?.convert(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_at_construction() {
        let registry = TypeRegistry::new();
        for name in ["image", "bounding_box", "detection_list", "metadata", "string", "number", "boolean", "any"] {
            assert!(registry.get(name).is_ok(), "{name} should be registered");
        }
    }

    #[test]
    fn unknown_names_are_incompatible_not_erroring() {
        let registry = TypeRegistry::new();
        assert!(!registry.check_compatibility("ghost", "image"));
        assert!(!registry.check_compatibility("image", "ghost"));
    }

    #[test]
    fn any_is_compatible_with_everything() {
        let registry = TypeRegistry::new();
        assert!(registry.check_compatibility("image", "any"));
        assert!(registry.check_compatibility("number", "any"));
    }

    #[test]
    fn exact_type_is_self_compatible() {
        let registry = TypeRegistry::new();
        assert!(registry.check_compatibility("string", "string"));
        assert!(!registry.check_compatibility("string", "number"));
    }

    #[test]
    fn convert_number_to_string() {
        let registry = TypeRegistry::new();
        let converted = registry.convert_value("string", &Value::Number(42.0)).expect("convert");
        assert!(matches!(converted, Value::Str(s) if s == "42"));
    }

    #[test]
    fn convert_incompatible_type_errors() {
        let registry = TypeRegistry::new();
        let err = registry.convert_value("image", &Value::Number(1.0)).unwrap_err();
        assert!(matches!(err, WeaveError::TypeMismatch(_)));
    }

    #[test]
    fn double_register_is_a_configuration_error() {
        let mut registry = TypeRegistry::new();
        let err = registry.register(AnyDescriptor).unwrap_err();
        assert!(matches!(err, WeaveError::Config(_)));
    }
}
