//! Built-in operations
//!
//! - `map`: copies a source value into a TARGET property
//! - `concat`: joins string values with an optional separator
//! - `sum`: adds numeric values

use super::descriptor::{Arity, Descriptor, Effect, SlotDescriptor};
use super::operation::{Bindings, OperationError, OperationKind, ResolvedInputs};
use crate::models::{PropertyType, PropertyValue};
use crate::validation::ValidationProblems;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MAP: &str = "map";
pub const CONCAT: &str = "concat";
pub const SUM: &str = "sum";

const STRING_TYPES: [PropertyType; 4] = [
    PropertyType::String,
    PropertyType::Name,
    PropertyType::Path,
    PropertyType::Uri,
];

fn evaluation_error(operation: &str, message: impl Into<String>) -> OperationError {
    OperationError::Evaluation {
        operation: operation.to_string(),
        message: message.into(),
    }
}

/// Writes the value of `source` into the property bound to `target`
pub struct MapOperation {
    descriptor: Descriptor,
}

impl MapOperation {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(MAP, Effect::WritesTarget)
                .with_description("Copy a SOURCE value into a TARGET property")
                .with_slot(SlotDescriptor::new("source", Arity::Single).with_description("Value to copy"))
                .with_slot(
                    SlotDescriptor::new("target", Arity::Single)
                        .with_description("Property receiving the value")
                        .target(),
                ),
        }
    }
}

impl Default for MapOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationKind for MapOperation {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn check_bindings(&self, bindings: &Bindings, source_id: &str, problems: &mut ValidationProblems) {
        let source = bindings.get("source").and_then(|terms| terms.first());
        let target = bindings.get("target").and_then(|terms| terms.first());
        if let (Some(source), Some(target)) = (source, target)
            && source.value_type != target.value_type
        {
            problems.error(
                source_id,
                format!(
                    "cannot map {} '{}' onto {} '{}'",
                    source.value_type, source.name, target.value_type, target.name
                ),
            );
        }
    }

    fn evaluate(&self, inputs: &ResolvedInputs) -> Result<PropertyValue, OperationError> {
        inputs
            .single("source")
            .cloned()
            .ok_or_else(|| evaluation_error(MAP, "source value is missing"))
    }
}

/// Joins string values in binding order
pub struct ConcatOperation {
    descriptor: Descriptor,
}

impl ConcatOperation {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(CONCAT, Effect::Pure)
                .with_description("Join strings")
                .with_slot(
                    SlotDescriptor::new("values", Arity::Unbounded)
                        .with_types(STRING_TYPES.to_vec()),
                )
                .with_slot(
                    SlotDescriptor::new("separator", Arity::Single)
                        .with_types(vec![PropertyType::String])
                        .optional(),
                )
                .with_result_type(PropertyType::String),
        }
    }
}

impl Default for ConcatOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationKind for ConcatOperation {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn evaluate(&self, inputs: &ResolvedInputs) -> Result<PropertyValue, OperationError> {
        let separator = inputs
            .single("separator")
            .and_then(PropertyValue::as_str)
            .unwrap_or("");
        let parts = inputs
            .values("values")
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| evaluation_error(CONCAT, format!("{} is not a string", v.property_type())))
            })
            .collect::<Result<Vec<&str>, _>>()?;
        Ok(PropertyValue::String(parts.join(separator)))
    }
}

/// Adds numeric values; the result is a long unless a double takes part
pub struct SumOperation {
    descriptor: Descriptor,
}

impl SumOperation {
    pub fn new() -> Self {
        Self {
            descriptor: Descriptor::new(SUM, Effect::Pure)
                .with_description("Add numbers")
                .with_slot(
                    SlotDescriptor::new("values", Arity::Unbounded)
                        .with_types(vec![PropertyType::Long, PropertyType::Double]),
                ),
        }
    }
}

impl Default for SumOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationKind for SumOperation {
    fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn evaluate(&self, inputs: &ResolvedInputs) -> Result<PropertyValue, OperationError> {
        let values = inputs.values("values");
        if values.iter().all(|v| matches!(v, PropertyValue::Long(_))) {
            let mut total: i64 = 0;
            for value in values {
                let number = value.as_long().unwrap_or_default();
                total = total
                    .checked_add(number)
                    .ok_or_else(|| evaluation_error(SUM, "long overflow"))?;
            }
            return Ok(PropertyValue::Long(total));
        }

        let mut total = 0.0;
        for value in values {
            total += value.as_double().ok_or_else(|| {
                evaluation_error(SUM, format!("{} is not numeric", value.property_type()))
            })?;
        }
        Ok(PropertyValue::Double(total))
    }
}

/// Operation kinds by descriptor id
#[derive(Clone, Default)]
pub struct OperationCatalog {
    kinds: BTreeMap<String, Arc<dyn OperationKind>>,
}

impl OperationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding `map`, `concat` and `sum`
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(MapOperation::new()));
        catalog.register(Arc::new(ConcatOperation::new()));
        catalog.register(Arc::new(SumOperation::new()));
        catalog
    }

    /// Register a kind under its descriptor id, replacing any previous one
    pub fn register(&mut self, kind: Arc<dyn OperationKind>) {
        self.kinds.insert(kind.descriptor().id.clone(), kind);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn OperationKind>> {
        self.kinds.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for OperationCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds.keys()).finish()
    }
}
