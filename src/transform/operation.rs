//! Operations
//!
//! An operation binds terms to the input slots of an [`OperationKind`] and
//! tracks where it stands:
//!
//! ```text
//! Unbound -> PartiallyBound -> Valid -> Executed
//!                  \              \
//!                   `-> Invalid <-'
//! ```
//!
//! Every binding change re-runs validation and recomputes the state. Only
//! Valid and Executed operations can be evaluated.

use super::descriptor::{Descriptor, SlotRole};
use super::term::{OperationId, Term};
use crate::models::{PropertyType, PropertyValue};
use crate::storage::StoreError;
use crate::validation::ValidationProblems;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Terms bound per slot id
pub type Bindings = BTreeMap<String, Vec<Term>>;

/// Error type for operation and transformation calls
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("Operation not found: {0}")]
    NotFound(String),
    #[error("Operation {operation} has no input slot '{slot}'")]
    UnknownSlot { operation: String, slot: String },
    #[error("Input '{slot}' of {operation} takes at most {max} term(s)")]
    Arity {
        operation: String,
        slot: String,
        max: usize,
    },
    #[error("Term '{term}' is declared {expected} but the value is {actual}")]
    TypeMismatch {
        term: String,
        expected: PropertyType,
        actual: PropertyType,
    },
    #[error("Operation {operation} cannot run in state {state}: {problems}")]
    Invalid {
        operation: String,
        state: OperationState,
        problems: ValidationProblems,
    },
    #[error("Unauthorized write to {path}: not part of a TARGET model")]
    UnauthorizedWrite { path: String },
    #[error("Evaluation of {operation} failed: {message}")]
    Evaluation { operation: String, message: String },
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Lifecycle state of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationState {
    Unbound,
    PartiallyBound,
    Valid,
    Invalid,
    Executed,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Unbound => write!(f, "UNBOUND"),
            OperationState::PartiallyBound => write!(f, "PARTIALLY_BOUND"),
            OperationState::Valid => write!(f, "VALID"),
            OperationState::Invalid => write!(f, "INVALID"),
            OperationState::Executed => write!(f, "EXECUTED"),
        }
    }
}

/// Input values resolved for one evaluation, per slot id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedInputs {
    values: BTreeMap<String, Vec<PropertyValue>>,
}

impl ResolvedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: impl Into<String>, values: Vec<PropertyValue>) {
        self.values.insert(slot.into(), values);
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with(mut self, slot: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        self.insert(slot, values);
        self
    }

    /// Values bound to `slot`, empty when unbound
    pub fn values(&self, slot: &str) -> &[PropertyValue] {
        self.values.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// First value bound to `slot`
    pub fn single(&self, slot: &str) -> Option<&PropertyValue> {
        self.values(slot).first()
    }
}

/// Behaviour behind a descriptor
pub trait OperationKind: Send + Sync {
    fn descriptor(&self) -> &Descriptor;

    /// Checks beyond the declared slot constraints. Errors added here make the
    /// operation Invalid.
    fn check_bindings(&self, _bindings: &Bindings, _source_id: &str, _problems: &mut ValidationProblems) {}

    /// Compute the result from resolved input values
    fn evaluate(&self, inputs: &ResolvedInputs) -> Result<PropertyValue, OperationError>;
}

/// One step of a transformation
#[derive(Clone)]
pub struct Operation {
    id: OperationId,
    kind: Arc<dyn OperationKind>,
    bindings: Bindings,
    state: OperationState,
    problems: ValidationProblems,
    last_inputs: Option<ResolvedInputs>,
    last_result: Option<PropertyValue>,
}

impl Operation {
    pub fn new(kind: Arc<dyn OperationKind>) -> Self {
        let mut operation = Self {
            id: Uuid::new_v4(),
            kind,
            bindings: Bindings::new(),
            state: OperationState::Unbound,
            problems: ValidationProblems::new(),
            last_inputs: None,
            last_result: None,
        };
        operation.revalidate();
        operation
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn descriptor(&self) -> &Descriptor {
        self.kind.descriptor()
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Problems found by the last validation
    pub fn problems(&self) -> &ValidationProblems {
        &self.problems
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Terms bound to `slot`
    pub fn terms(&self, slot: &str) -> &[Term] {
        self.bindings.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    /// Result of the last execution, while it is current
    pub fn last_result(&self) -> Option<&PropertyValue> {
        match self.state {
            OperationState::Executed => self.last_result.as_ref(),
            _ => None,
        }
    }

    /// Short human-readable id used as validation source
    pub fn label(&self) -> String {
        let id = self.id.simple().to_string();
        format!("{}#{}", self.descriptor().id, &id[..8])
    }

    /// Append a term to a slot
    pub fn add_input(&mut self, slot: &str, term: Term) -> Result<OperationState, OperationError> {
        let descriptor = self.kind.descriptor();
        let Some(slot_descriptor) = descriptor.slot(slot) else {
            return Err(OperationError::UnknownSlot {
                operation: self.label(),
                slot: slot.to_string(),
            });
        };
        let bound = self.terms(slot).len();
        if let Some(max) = slot_descriptor.arity.max()
            && bound + 1 > max
        {
            return Err(OperationError::Arity {
                operation: self.label(),
                slot: slot.to_string(),
                max,
            });
        }

        trace!(operation = %self.label(), slot, term = %term, "Binding input");
        self.bindings.entry(slot.to_string()).or_default().push(term);
        self.revalidate();
        Ok(self.state)
    }

    /// Remove one occurrence of `term` from a slot; returns whether it was bound
    pub fn remove_input(&mut self, slot: &str, term: &Term) -> Result<bool, OperationError> {
        if self.kind.descriptor().slot(slot).is_none() {
            return Err(OperationError::UnknownSlot {
                operation: self.label(),
                slot: slot.to_string(),
            });
        }
        let Some(terms) = self.bindings.get_mut(slot) else {
            return Ok(false);
        };
        let Some(position) = terms.iter().position(|t| t == term) else {
            return Ok(false);
        };
        terms.remove(position);
        if terms.is_empty() {
            self.bindings.remove(slot);
        }
        self.revalidate();
        Ok(true)
    }

    /// Check the bindings against the descriptor. Pure.
    pub fn validate(&self) -> ValidationProblems {
        self.check().0
    }

    fn check(&self) -> (ValidationProblems, OperationState) {
        let label = self.label();
        let descriptor = self.kind.descriptor();
        let mut problems = ValidationProblems::new();
        let mut missing = false;
        let mut violation = false;

        for slot in &descriptor.slots {
            let terms = self.terms(&slot.id);
            if terms.is_empty() {
                if slot.required {
                    missing = true;
                    problems.error(&label, format!("required input '{}' is not bound", slot.id));
                }
                continue;
            }
            if !slot.arity.allows(terms.len()) {
                violation = true;
                problems.error(
                    &label,
                    format!("input '{}' takes at most {} term(s), {} bound", slot.id, slot.arity, terms.len()),
                );
            }
            for term in terms {
                if !slot.accepts(term.value_type) {
                    violation = true;
                    let accepted: Vec<&str> = slot.value_types.iter().map(|t| t.name()).collect();
                    problems.error(
                        &label,
                        format!(
                            "input '{}' accepts {}, term '{}' is {}",
                            slot.id,
                            accepted.join(" | "),
                            term.name,
                            term.value_type
                        ),
                    );
                }
                if slot.role == SlotRole::Target && term.property_target().is_none() {
                    violation = true;
                    problems.error(
                        &label,
                        format!("target '{}' must be bound to a model property", slot.id),
                    );
                }
            }
        }

        let before = problems.errors().count();
        self.kind.check_bindings(&self.bindings, &label, &mut problems);
        if problems.errors().count() > before {
            violation = true;
        }

        let state = if self.bindings.is_empty() {
            problems.info(&label, "no inputs bound");
            OperationState::Unbound
        } else if violation {
            OperationState::Invalid
        } else if missing {
            OperationState::PartiallyBound
        } else {
            OperationState::Valid
        };
        (problems, state)
    }

    fn revalidate(&mut self) {
        let (problems, state) = self.check();
        self.problems = problems;
        self.state = state;
        self.last_inputs = None;
        self.last_result = None;
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.state, OperationState::Valid | OperationState::Executed)
    }

    /// Fail unless the operation may be evaluated
    pub fn ensure_executable(&self) -> Result<(), OperationError> {
        if self.is_executable() {
            Ok(())
        } else {
            Err(OperationError::Invalid {
                operation: self.label(),
                state: self.state,
                problems: self.problems.clone(),
            })
        }
    }

    /// Compute the result from resolved inputs; only Valid or Executed
    /// operations evaluate
    pub fn evaluate(&self, inputs: &ResolvedInputs) -> Result<PropertyValue, OperationError> {
        self.ensure_executable()?;
        self.kind.evaluate(inputs)
    }

    /// Whether the last execution used exactly these inputs
    pub(crate) fn is_up_to_date(&self, inputs: &ResolvedInputs) -> bool {
        self.state == OperationState::Executed && self.last_inputs.as_ref() == Some(inputs)
    }

    pub(crate) fn mark_executed(&mut self, inputs: ResolvedInputs, result: PropertyValue) {
        self.state = OperationState::Executed;
        self.last_inputs = Some(inputs);
        self.last_result = Some(result);
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor().id)
            .field("state", &self.state)
            .field("bindings", &self.bindings)
            .finish()
    }
}
