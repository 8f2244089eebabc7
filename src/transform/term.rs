//! Terms bound to operation inputs

use crate::models::{PropertyType, PropertyValue};
use crate::storage::{NodeId, Session, StoreError};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Identifier of an operation inside a transformation
pub type OperationId = Uuid;

/// Where a term's value comes from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TermKind {
    /// A constant
    Literal { value: PropertyValue },
    /// The live value of a node property
    Property { node: NodeId, property: String },
    /// The result of another operation in the same transformation
    OperationResult { operation: OperationId },
}

/// A typed, named binding supplied to an operation input slot.
///
/// The declared type is what validation checks against the slot; live
/// property terms are checked again when their value is read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub name: String,
    pub value_type: PropertyType,
    pub kind: TermKind,
}

impl Term {
    pub fn literal(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            value_type: value.property_type(),
            kind: TermKind::Literal { value },
        }
    }

    pub fn property(
        name: impl Into<String>,
        value_type: PropertyType,
        node: NodeId,
        property: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            kind: TermKind::Property {
                node,
                property: property.into(),
            },
        }
    }

    /// Property term typed after the property's current value
    pub fn from_property(
        session: &Session<'_>,
        node: NodeId,
        property: &str,
    ) -> Result<Self, StoreError> {
        let Some(value) = session.property(node, property)? else {
            return Err(StoreError::PathNotFound(format!(
                "{}@{}",
                session.path_of(node)?,
                property
            )));
        };
        Ok(Self::property(property, value.property_type(), node, property))
    }

    pub fn operation_result(
        name: impl Into<String>,
        value_type: PropertyType,
        operation: OperationId,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            kind: TermKind::OperationResult { operation },
        }
    }

    /// Whether the value can change without the binding changing
    pub fn is_live(&self) -> bool {
        !matches!(self.kind, TermKind::Literal { .. })
    }

    /// Target of a property term
    pub fn property_target(&self) -> Option<(NodeId, &str)> {
        match &self.kind {
            TermKind::Property { node, property } => Some((*node, property)),
            _ => None,
        }
    }

    /// Producer of an operation-result term
    pub fn producer(&self) -> Option<OperationId> {
        match self.kind {
            TermKind::OperationResult { operation } => Some(operation),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Literal { value } => write!(f, "{}: {} = {}", self.name, self.value_type, value),
            TermKind::Property { node, property } => {
                write!(f, "{}: {} <- {}@{}", self.name, self.value_type, node, property)
            }
            TermKind::OperationResult { operation } => {
                write!(f, "{}: {} <- result of {}", self.name, self.value_type, operation)
            }
        }
    }
}
