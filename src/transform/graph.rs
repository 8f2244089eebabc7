//! Operation graph checks
//!
//! Operation-result terms are edges from the producing operation to the
//! consuming one. Producers must exist, come earlier in insertion order, and
//! must not take part in a cycle.

use super::operation::Operation;
use super::term::OperationId;
use crate::validation::ValidationProblems;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Graph};
use std::collections::HashMap;

/// Dependency graph over the operations of one transformation
pub struct OperationGraph {
    graph: Graph<OperationId, (), Directed>,
    node_map: HashMap<OperationId, NodeIndex>,
}

impl OperationGraph {
    /// Build the graph; references to unknown operations are left out
    pub fn build(operations: &[Operation]) -> Self {
        let mut graph = Graph::<OperationId, (), Directed>::new();
        let mut node_map = HashMap::new();

        for operation in operations {
            let index = graph.add_node(operation.id());
            node_map.insert(operation.id(), index);
        }
        for operation in operations {
            let consumer = node_map[&operation.id()];
            for term in operation.bindings().values().flatten() {
                if let Some(producer) = term.producer().and_then(|id| node_map.get(&id)) {
                    graph.add_edge(*producer, consumer, ());
                }
            }
        }
        Self { graph, node_map }
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.node_map.contains_key(&id)
    }

    /// Operations on a cycle, one group per strongly connected component
    pub fn cycles(&self) -> Vec<Vec<OperationId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.contains_edge(component[0], component[0])
            })
            .map(|component| component.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }

    /// Operations whose result feeds `id`
    pub fn producers(&self, id: OperationId) -> Vec<OperationId> {
        self.node_map
            .get(&id)
            .map(|idx| {
                self.graph
                    .neighbors_directed(*idx, petgraph::Direction::Incoming)
                    .map(|n| self.graph[n])
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Check the operation references of a transformation
pub fn check(operations: &[Operation]) -> ValidationProblems {
    let mut problems = ValidationProblems::new();
    let graph = OperationGraph::build(operations);
    let position: HashMap<OperationId, usize> = operations
        .iter()
        .enumerate()
        .map(|(i, op)| (op.id(), i))
        .collect();

    for (index, operation) in operations.iter().enumerate() {
        let label = operation.label();
        for term in operation.bindings().values().flatten() {
            let Some(producer_id) = term.producer() else {
                continue;
            };
            let Some(&producer_index) = position.get(&producer_id) else {
                problems.error(
                    &label,
                    format!("term '{}' refers to unknown operation {}", term.name, producer_id),
                );
                continue;
            };
            let producer = &operations[producer_index];
            if producer_index > index {
                problems.error(
                    &label,
                    format!(
                        "term '{}' refers to {} which runs later",
                        term.name,
                        producer.label()
                    ),
                );
            }
            if let Some(result_type) = producer.descriptor().result_type
                && result_type != term.value_type
            {
                problems.error(
                    &label,
                    format!(
                        "term '{}' is declared {} but {} produces {}",
                        term.name,
                        term.value_type,
                        producer.label(),
                        result_type
                    ),
                );
            }
        }
    }

    for cycle in graph.cycles() {
        let labels: Vec<String> = cycle
            .iter()
            .filter_map(|id| position.get(id).map(|i| operations[*i].label()))
            .collect();
        let source = labels.first().cloned().unwrap_or_default();
        problems.error(source, format!("cyclic operation references: {}", labels.join(" -> ")));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;
    use crate::transform::operations::{ConcatOperation, SumOperation};
    use crate::transform::term::Term;
    use std::sync::Arc;

    #[test]
    fn test_chain_in_order_is_clean() {
        let mut first = Operation::new(Arc::new(SumOperation::new()));
        first.add_input("values", Term::literal("a", 1i64)).unwrap();
        let mut second = Operation::new(Arc::new(SumOperation::new()));
        second
            .add_input("values", Term::operation_result("prev", PropertyType::Long, first.id()))
            .unwrap();

        let operations = vec![first.clone(), second.clone()];
        assert!(check(&operations).is_ok());
        assert_eq!(OperationGraph::build(&operations).producers(second.id()), vec![first.id()]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut op = Operation::new(Arc::new(SumOperation::new()));
        let id = op.id();
        op.add_input("values", Term::operation_result("me", PropertyType::Long, id)).unwrap();

        let graph = OperationGraph::build(std::slice::from_ref(&op));
        assert_eq!(graph.cycles(), vec![vec![id]]);
        assert!(!check(&[op]).is_ok());
    }

    #[test]
    fn test_result_type_must_match_producer() {
        let mut concat = Operation::new(Arc::new(ConcatOperation::new()));
        concat.add_input("values", Term::literal("a", "x")).unwrap();
        let mut sum = Operation::new(Arc::new(SumOperation::new()));
        sum.add_input("values", Term::operation_result("text", PropertyType::Long, concat.id()))
            .unwrap();

        let problems = check(&[concat, sum]);
        assert!(problems.errors().any(|p| p.message.contains("produces string")));
    }
}
