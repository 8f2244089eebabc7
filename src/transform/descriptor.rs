//! Operation descriptors
//!
//! A descriptor is the declared contract of an operation kind: its input
//! slots with arity and accepted types, its result type and whether it
//! writes into TARGET models.

use crate::models::PropertyType;
use serde::Serialize;
use std::fmt;

/// How many terms a slot takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Arity {
    Single,
    Many(usize),
    Unbounded,
}

impl Arity {
    /// Maximum number of terms, `None` when unbounded
    pub fn max(&self) -> Option<usize> {
        match self {
            Arity::Single => Some(1),
            Arity::Many(n) => Some(*n),
            Arity::Unbounded => None,
        }
    }

    pub fn allows(&self, count: usize) -> bool {
        self.max().is_none_or(|max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Single => write!(f, "1"),
            Arity::Many(n) => write!(f, "{}", n),
            Arity::Unbounded => write!(f, "*"),
        }
    }
}

/// What a slot's terms are used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotRole {
    /// Read to compute the result
    Input,
    /// Property written with the result; must be a property term in a TARGET model
    Target,
}

/// Declared input slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotDescriptor {
    pub id: String,
    pub description: String,
    /// Accepted term types; empty accepts any type
    pub value_types: Vec<PropertyType>,
    pub required: bool,
    pub arity: Arity,
    pub role: SlotRole,
}

impl SlotDescriptor {
    pub fn new(id: impl Into<String>, arity: Arity) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            value_types: Vec::new(),
            required: true,
            arity,
            role: SlotRole::Input,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_types(mut self, value_types: Vec<PropertyType>) -> Self {
        self.value_types = value_types;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn target(mut self) -> Self {
        self.role = SlotRole::Target;
        self
    }

    pub fn accepts(&self, value_type: PropertyType) -> bool {
        self.value_types.is_empty() || self.value_types.contains(&value_type)
    }
}

/// Declared side effect of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Only computes a result
    Pure,
    /// Writes the result into the properties bound to its target slots
    WritesTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// Stable id, e.g. `map`
    pub id: String,
    pub description: String,
    pub slots: Vec<SlotDescriptor>,
    /// Declared result type; `None` when it follows the inputs
    pub result_type: Option<PropertyType>,
    pub effect: Effect,
}

impl Descriptor {
    pub fn new(id: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            slots: Vec::new(),
            result_type: None,
            effect,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_slot(mut self, slot: SlotDescriptor) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_result_type(mut self, result_type: PropertyType) -> Self {
        self.result_type = Some(result_type);
        self
    }

    pub fn slot(&self, id: &str) -> Option<&SlotDescriptor> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn has_side_effect(&self) -> bool {
        self.effect == Effect::WritesTarget
    }
}
