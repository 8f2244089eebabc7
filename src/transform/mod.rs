//! Transformation engine
//!
//! A [`Transformation`] holds an ordered list of [`Operation`]s plus the
//! SOURCE and TARGET models they work on. Terms bound to operation inputs
//! read literals, live model properties or the results of earlier
//! operations; the latter form the operation graph checked by [`graph`].
//!
//! Execution happens in one store session: every operation is validated
//! first, then evaluated in insertion order, and effectful operations write
//! their result into TARGET model properties. Nothing is committed unless
//! every operation succeeds.

pub mod descriptor;
pub mod graph;
pub mod operation;
pub mod operations;
pub mod term;

pub use descriptor::{Arity, Descriptor, Effect, SlotDescriptor, SlotRole};
pub use graph::OperationGraph;
pub use operation::{
    Bindings, Operation, OperationError, OperationKind, OperationState, ResolvedInputs,
};
pub use operations::{ConcatOperation, MapOperation, OperationCatalog, SumOperation};
pub use term::{OperationId, Term, TermKind};

use crate::models::{Model, PropertyValue};
use crate::storage::{NodeId, Session, StoreError, TreeStore};
use crate::validation::ValidationProblems;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// Role of a model within a transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelRole {
    /// Read only
    Source,
    /// May be written by effectful operations
    Target,
}

/// Outcome of [`Transformation::execute`] and [`Transformation::recompute`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Operations evaluated in this run
    pub executed: usize,
    /// Operations left alone because their inputs did not change
    pub skipped: usize,
    /// Property writes into TARGET models
    pub writes: usize,
}

#[derive(Debug, Clone)]
pub struct Transformation {
    id: Uuid,
    name: String,
    operations: Vec<Operation>,
    sources: Vec<Model>,
    targets: Vec<Model>,
}

impl Transformation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            operations: Vec::new(),
            sources: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an operation; it runs after every operation added before it
    pub fn add(&mut self, operation: Operation) -> OperationId {
        let id = operation.id();
        debug!(transformation = %self.name, operation = %operation.label(), "Added operation");
        self.operations.push(operation);
        id
    }

    /// Remove an operation. Terms in other operations that referred to it
    /// show up as validation errors.
    pub fn remove(&mut self, id: OperationId) -> Result<Operation, OperationError> {
        let index = self.index_of(id)?;
        Ok(self.operations.remove(index))
    }

    /// Register a model under a role; registering it twice is a no-op
    pub fn add_model(&mut self, role: ModelRole, model: Model) {
        let models = match role {
            ModelRole::Source => &mut self.sources,
            ModelRole::Target => &mut self.targets,
        };
        if !models.iter().any(|m| m.node == model.node) {
            models.push(model);
        }
    }

    pub fn models(&self, role: ModelRole) -> &[Model] {
        match role {
            ModelRole::Source => &self.sources,
            ModelRole::Target => &self.targets,
        }
    }

    pub fn operation(&self, id: OperationId) -> Result<&Operation, OperationError> {
        self.operations
            .iter()
            .find(|op| op.id() == id)
            .ok_or_else(|| OperationError::NotFound(id.to_string()))
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn add_input(
        &mut self,
        operation: OperationId,
        slot: &str,
        term: Term,
    ) -> Result<OperationState, OperationError> {
        let index = self.index_of(operation)?;
        self.operations[index].add_input(slot, term)
    }

    pub fn remove_input(
        &mut self,
        operation: OperationId,
        slot: &str,
        term: &Term,
    ) -> Result<bool, OperationError> {
        let index = self.index_of(operation)?;
        self.operations[index].remove_input(slot, term)
    }

    fn index_of(&self, id: OperationId) -> Result<usize, OperationError> {
        self.operations
            .iter()
            .position(|op| op.id() == id)
            .ok_or_else(|| OperationError::NotFound(id.to_string()))
    }

    /// Problems of every operation plus the operation graph checks
    pub fn validate(&self) -> ValidationProblems {
        let mut problems = ValidationProblems::new();
        for operation in &self.operations {
            problems.extend(operation.validate());
        }
        problems.extend(graph::check(&self.operations));
        if self.targets.is_empty()
            && let Some(op) = self.operations.iter().find(|op| op.descriptor().has_side_effect())
        {
            problems.warning(op.label(), "no TARGET model registered; writes will be refused");
        }
        problems
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn ensure_runnable(&self, operations: &[&Operation]) -> Result<(), OperationError> {
        for operation in operations {
            operation.ensure_executable()?;
        }
        let problems = graph::check(&self.operations);
        if !problems.is_ok() {
            return Err(OperationError::Invalid {
                operation: self.name.clone(),
                state: OperationState::Invalid,
                problems,
            });
        }
        Ok(())
    }

    /// Compute the current result of one operation without writing anything.
    ///
    /// Only the operations feeding `id` are evaluated.
    pub fn result(&self, store: &dyn TreeStore, id: OperationId) -> Result<PropertyValue, OperationError> {
        let needed = self.upstream(id)?;
        let plan: Vec<&Operation> = self
            .operations
            .iter()
            .filter(|op| needed.contains(&op.id()))
            .collect();
        self.ensure_runnable(&plan)?;

        let session = Session::open(store)?;
        let mut results = HashMap::new();
        for operation in plan {
            let inputs = self.resolve_inputs(&session, operation, &results)?;
            results.insert(operation.id(), operation.evaluate(&inputs)?);
        }
        session.rollback();
        results
            .remove(&id)
            .ok_or_else(|| OperationError::NotFound(id.to_string()))
    }

    /// `id` and every operation it transitively depends on
    fn upstream(&self, id: OperationId) -> Result<HashSet<OperationId>, OperationError> {
        self.index_of(id)?;
        let graph = OperationGraph::build(&self.operations);
        let mut needed = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if needed.insert(current) {
                stack.extend(graph.producers(current));
            }
        }
        Ok(needed)
    }

    /// Evaluate every operation in order and apply their writes
    pub fn execute(&mut self, store: &dyn TreeStore) -> Result<ExecutionReport, OperationError> {
        self.run(store, false)
    }

    /// Like [`execute`](Self::execute), but operations whose resolved inputs
    /// are unchanged since their last execution are skipped
    pub fn recompute(&mut self, store: &dyn TreeStore) -> Result<ExecutionReport, OperationError> {
        self.run(store, true)
    }

    fn run(&mut self, store: &dyn TreeStore, incremental: bool) -> Result<ExecutionReport, OperationError> {
        let span = info_span!("transformation", name = %self.name, incremental);
        let _guard = span.enter();

        let all: Vec<&Operation> = self.operations.iter().collect();
        self.ensure_runnable(&all)?;

        let mut session = Session::open(store)?;
        let mut report = ExecutionReport::default();
        let mut results: HashMap<OperationId, PropertyValue> = HashMap::new();
        let mut executed = Vec::new();

        for (index, operation) in self.operations.iter().enumerate() {
            let inputs = self.resolve_inputs(&session, operation, &results)?;
            if incremental
                && operation.is_up_to_date(&inputs)
                && let Some(result) = operation.last_result()
            {
                debug!(operation = %operation.label(), "Inputs unchanged, skipping");
                results.insert(operation.id(), result.clone());
                report.skipped += 1;
                continue;
            }

            let result = operation.evaluate(&inputs)?;
            if operation.descriptor().has_side_effect() {
                report.writes += self.write_targets(&mut session, operation, &result)?;
            }
            debug!(operation = %operation.label(), result = %result, "Executed operation");
            results.insert(operation.id(), result.clone());
            executed.push((index, inputs, result));
        }

        session.commit()?;
        report.executed = executed.len();
        for (index, inputs, result) in executed {
            self.operations[index].mark_executed(inputs, result);
        }
        info!(
            executed = report.executed,
            skipped = report.skipped,
            writes = report.writes,
            "Transformation finished"
        );
        Ok(report)
    }

    fn resolve_inputs(
        &self,
        session: &Session<'_>,
        operation: &Operation,
        results: &HashMap<OperationId, PropertyValue>,
    ) -> Result<ResolvedInputs, OperationError> {
        let mut inputs = ResolvedInputs::new();
        for slot in &operation.descriptor().slots {
            if slot.role == SlotRole::Target {
                continue;
            }
            let terms = operation.terms(&slot.id);
            if terms.is_empty() {
                continue;
            }
            let values = terms
                .iter()
                .map(|term| self.resolve_term(session, term, results))
                .collect::<Result<Vec<_>, _>>()?;
            inputs.insert(slot.id.clone(), values);
        }
        Ok(inputs)
    }

    fn resolve_term(
        &self,
        session: &Session<'_>,
        term: &Term,
        results: &HashMap<OperationId, PropertyValue>,
    ) -> Result<PropertyValue, OperationError> {
        match &term.kind {
            TermKind::Literal { value } => Ok(value.clone()),
            TermKind::Property { node, property } => {
                let value = read_property(session, *node, property)?;
                check_type(term, value)?;
                Ok(value.clone())
            }
            TermKind::OperationResult { operation } => {
                let value = results
                    .get(operation)
                    .or_else(|| self.operation(*operation).ok().and_then(Operation::last_result))
                    .ok_or_else(|| OperationError::Evaluation {
                        operation: operation.to_string(),
                        message: format!("no result available for term '{}'", term.name),
                    })?;
                check_type(term, value)?;
                Ok(value.clone())
            }
        }
    }

    fn write_targets(
        &self,
        session: &mut Session<'_>,
        operation: &Operation,
        value: &PropertyValue,
    ) -> Result<usize, OperationError> {
        let mut writes = 0;
        for slot in operation.descriptor().slots.iter().filter(|s| s.role == SlotRole::Target) {
            for term in operation.terms(&slot.id) {
                let Some((node, property)) = term.property_target() else {
                    continue;
                };
                if !session.exists(node) {
                    return Err(StoreError::NodeNotFound(node.to_string()).into());
                }
                if !self.targets.iter().any(|model| model.contains(session, node)) {
                    return Err(OperationError::UnauthorizedWrite {
                        path: format!("{}@{}", session.path_of(node)?, property),
                    });
                }
                if let Some(current) = session.property(node, property)? {
                    check_type(term, current)?;
                    if current == value {
                        continue;
                    }
                }
                session.set_property(node, property, value.clone())?;
                writes += 1;
            }
        }
        Ok(writes)
    }
}

fn read_property<'a>(
    session: &'a Session<'_>,
    node: NodeId,
    property: &str,
) -> Result<&'a PropertyValue, OperationError> {
    match session.property(node, property)? {
        Some(value) => Ok(value),
        None => Err(StoreError::PathNotFound(format!("{}@{}", session.path_of(node)?, property)).into()),
    }
}

fn check_type(term: &Term, value: &PropertyValue) -> Result<(), OperationError> {
    let actual = value.property_type();
    if actual != term.value_type {
        return Err(OperationError::TypeMismatch {
            term: term.name.clone(),
            expected: term.value_type,
            actual,
        });
    }
    Ok(())
}

/// Creates transformations and operations from an operation catalog
#[derive(Debug, Clone)]
pub struct TransformationFactory {
    catalog: OperationCatalog,
}

impl TransformationFactory {
    pub fn new(catalog: OperationCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    pub fn create(&self, name: impl Into<String>) -> Transformation {
        Transformation::new(name)
    }

    /// A fresh, unbound operation of the given kind
    pub fn operation(&self, descriptor_id: &str) -> Result<Operation, OperationError> {
        self.catalog
            .get(descriptor_id)
            .map(Operation::new)
            .ok_or_else(|| OperationError::NotFound(descriptor_id.to_string()))
    }

    pub fn descriptor(&self, descriptor_id: &str) -> Result<Descriptor, OperationError> {
        self.catalog
            .get(descriptor_id)
            .map(|kind| kind.descriptor().clone())
            .ok_or_else(|| OperationError::NotFound(descriptor_id.to_string()))
    }
}

impl Default for TransformationFactory {
    fn default() -> Self {
        Self::new(OperationCatalog::with_builtins())
    }
}
