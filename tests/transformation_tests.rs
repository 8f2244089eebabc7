//! Transformation engine tests

use artifact_modelling_sdk::transform::ExecutionReport;
use artifact_modelling_sdk::{
    ErrorKind, ImportPipeline, InMemoryArtifactSource, MemoryTreeStore, MetamodelRegistry, Model,
    ModelRole, NodeId, OperationError, OperationState, PropertyType, PropertyValue, SdkConfig,
    SdkError, Term, Transformation, TransformationFactory,
};
use std::sync::Arc;

struct Fixture {
    pipeline: ImportPipeline,
    source: Model,
    target: Model,
    person: NodeId,
    record: NodeId,
}

impl Fixture {
    fn new() -> Self {
        let registry = Arc::new(MetamodelRegistry::with_builtins());
        registry.install("xml").unwrap();
        let pipeline = ImportPipeline::new(
            registry,
            Arc::new(MemoryTreeStore::new()),
            Arc::new(InMemoryArtifactSource::new()),
            SdkConfig::default(),
        )
        .unwrap();
        let source = pipeline
            .import(br#"<person first="Ada" last="Lovelace"/>"#, "person.xml", None, true)
            .unwrap();
        let target = pipeline
            .import(br#"<record fullName="" first=""/>"#, "record.xml", None, true)
            .unwrap();

        let session = pipeline.open_session().unwrap();
        let person = source.root(&session).unwrap().id;
        let record = target.root(&session).unwrap().id;
        drop(session);

        Self {
            pipeline,
            source,
            target,
            person,
            record,
        }
    }

    fn transformation(&self) -> Transformation {
        let mut transformation = TransformationFactory::default().create("person-to-record");
        transformation.add_model(ModelRole::Source, self.source.clone());
        transformation.add_model(ModelRole::Target, self.target.clone());
        transformation
    }

    fn store(&self) -> &dyn artifact_modelling_sdk::TreeStore {
        self.pipeline.store().as_ref()
    }

    fn property(&self, node: NodeId, name: &str) -> Option<PropertyValue> {
        let session = self.pipeline.open_session().unwrap();
        session.property(node, name).unwrap().cloned()
    }

    fn set_property(&self, node: NodeId, name: &str, value: impl Into<PropertyValue>) {
        let mut session = self.pipeline.open_session().unwrap();
        session.set_property(node, name, value).unwrap();
        session.commit().unwrap();
    }

    fn source_term(&self, property: &str) -> Term {
        let session = self.pipeline.open_session().unwrap();
        Term::from_property(&session, self.person, property).unwrap()
    }

    fn target_term(&self, property: &str) -> Term {
        Term::property(property, PropertyType::String, self.record, property)
    }
}

fn map_operation(
    fixture: &Fixture,
    transformation: &mut Transformation,
    source: Term,
    target: &str,
) -> uuid::Uuid {
    let factory = TransformationFactory::default();
    let id = transformation.add(factory.operation("map").unwrap());
    transformation.add_input(id, "source", source).unwrap();
    transformation
        .add_input(id, "target", fixture.target_term(target))
        .unwrap();
    id
}

mod map_tests {
    use super::*;

    #[test]
    fn test_map_writes_target_property() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let id = map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Valid);

        let report = transformation.execute(fixture.store()).unwrap();
        assert_eq!(
            report,
            ExecutionReport {
                executed: 1,
                skipped: 0,
                writes: 1
            }
        );
        assert_eq!(fixture.property(fixture.record, "first"), Some(PropertyValue::from("Ada")));
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Executed);
    }

    #[test]
    fn test_map_is_idempotent() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");

        transformation.execute(fixture.store()).unwrap();
        let again = transformation.execute(fixture.store()).unwrap();
        assert_eq!(again.executed, 1);
        assert_eq!(again.writes, 0);
        assert_eq!(fixture.property(fixture.record, "first"), Some(PropertyValue::from("Ada")));
    }

    #[test]
    fn test_map_follows_source_changes() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");
        transformation.execute(fixture.store()).unwrap();

        fixture.set_property(fixture.person, "first", "Augusta");
        let report = transformation.execute(fixture.store()).unwrap();
        assert_eq!(report.writes, 1);
        assert_eq!(
            fixture.property(fixture.record, "first"),
            Some(PropertyValue::from("Augusta"))
        );
    }

    #[test]
    fn test_result_has_no_side_effect() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let id = map_operation(&fixture, &mut transformation, fixture.source_term("last"), "first");

        assert_eq!(
            transformation.result(fixture.store(), id).unwrap(),
            PropertyValue::from("Lovelace")
        );
        assert_eq!(fixture.property(fixture.record, "first"), Some(PropertyValue::from("")));
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Valid);
    }

    #[test]
    fn test_write_outside_target_models_is_refused() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let id = transformation.add(factory.operation("map").unwrap());
        transformation
            .add_input(id, "source", Term::literal("value", "Grace"))
            .unwrap();
        transformation
            .add_input(
                id,
                "target",
                Term::property("first", PropertyType::String, fixture.person, "first"),
            )
            .unwrap();

        let err = transformation.execute(fixture.store()).unwrap_err();
        assert!(matches!(&err, OperationError::UnauthorizedWrite { path } if path.ends_with("@first")));
        assert_eq!(SdkError::from(err).kind(), ErrorKind::UnauthorizedWrite);
        assert_eq!(fixture.property(fixture.person, "first"), Some(PropertyValue::from("Ada")));
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Valid);
    }

    #[test]
    fn test_live_type_mismatch() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let term = fixture.source_term("first");
        map_operation(&fixture, &mut transformation, term, "first");

        fixture.set_property(fixture.person, "first", 42i64);
        let err = transformation.execute(fixture.store()).unwrap_err();
        assert!(matches!(
            err,
            OperationError::TypeMismatch {
                expected: PropertyType::String,
                actual: PropertyType::Long,
                ..
            }
        ));
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_states_follow_bindings() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let id = transformation.add(factory.operation("map").unwrap());
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Unbound);

        let source = fixture.source_term("first");
        let state = transformation.add_input(id, "source", source.clone()).unwrap();
        assert_eq!(state, OperationState::PartiallyBound);
        assert!(!transformation.is_valid());

        let state = transformation
            .add_input(id, "target", fixture.target_term("first"))
            .unwrap();
        assert_eq!(state, OperationState::Valid);
        assert!(transformation.is_valid());

        assert!(transformation.remove_input(id, "source", &source).unwrap());
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::PartiallyBound);
        assert!(!transformation.remove_input(id, "source", &source).unwrap());
    }

    #[test]
    fn test_incomplete_operation_never_runs() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let id = transformation.add(factory.operation("map").unwrap());
        transformation
            .add_input(id, "source", fixture.source_term("first"))
            .unwrap();

        let problems = transformation.validate();
        assert!(problems.errors().any(|p| p.message.contains("'target'")));
        assert!(matches!(
            transformation.result(fixture.store(), id),
            Err(OperationError::Invalid {
                state: OperationState::PartiallyBound,
                ..
            })
        ));
        assert!(matches!(
            transformation.execute(fixture.store()),
            Err(OperationError::Invalid { .. })
        ));
        assert_eq!(fixture.property(fixture.record, "first"), Some(PropertyValue::from("")));
    }

    #[test]
    fn test_arity_and_unknown_slot() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let id = map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");

        let err = transformation
            .add_input(id, "source", fixture.source_term("last"))
            .unwrap_err();
        assert!(matches!(&err, OperationError::Arity { max: 1, .. }));
        assert_eq!(SdkError::from(err).kind(), ErrorKind::Arity);
        assert_eq!(transformation.operation(id).unwrap().terms("source").len(), 1);

        assert!(matches!(
            transformation.add_input(id, "destination", Term::literal("x", "y")),
            Err(OperationError::UnknownSlot { .. })
        ));
    }

    #[test]
    fn test_declared_type_mismatch_makes_operation_invalid() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let id = map_operation(&fixture, &mut transformation, Term::literal("n", 7i64), "first");
        assert_eq!(transformation.operation(id).unwrap().state(), OperationState::Invalid);

        let factory = TransformationFactory::default();
        let sum = transformation.add(factory.operation("sum").unwrap());
        let state = transformation
            .add_input(sum, "values", Term::literal("text", "seven"))
            .unwrap();
        assert_eq!(state, OperationState::Invalid);
    }

    #[test]
    fn test_target_slot_requires_property_term() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let id = transformation.add(factory.operation("map").unwrap());
        transformation
            .add_input(id, "source", Term::literal("a", "x"))
            .unwrap();
        let state = transformation
            .add_input(id, "target", Term::literal("b", "y"))
            .unwrap();
        assert_eq!(state, OperationState::Invalid);
    }
}

mod graph_tests {
    use super::*;

    fn concat(transformation: &mut Transformation, fixture: &Fixture) -> uuid::Uuid {
        let factory = TransformationFactory::default();
        let id = transformation.add(factory.operation("concat").unwrap());
        transformation.add_input(id, "values", fixture.source_term("first")).unwrap();
        transformation.add_input(id, "values", fixture.source_term("last")).unwrap();
        transformation
            .add_input(id, "separator", Term::literal("sep", " "))
            .unwrap();
        id
    }

    #[test]
    fn test_operation_results_feed_later_operations() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let full_name = concat(&mut transformation, &fixture);
        map_operation(
            &fixture,
            &mut transformation,
            Term::operation_result("fullName", PropertyType::String, full_name),
            "fullName",
        );

        let report = transformation.execute(fixture.store()).unwrap();
        assert_eq!(report.executed, 2);
        assert_eq!(
            fixture.property(fixture.record, "fullName"),
            Some(PropertyValue::from("Ada Lovelace"))
        );
    }

    #[test]
    fn test_operation_result_is_checked_against_declared_type() {
        let fixture = Fixture::new();
        fixture.set_property(fixture.record, "count", 0i64);
        let factory = TransformationFactory::default();
        let mut transformation = fixture.transformation();
        let sum = transformation.add(factory.operation("sum").unwrap());
        transformation.add_input(sum, "values", Term::literal("a", 1i64)).unwrap();
        transformation.add_input(sum, "values", Term::literal("b", 0.5f64)).unwrap();

        let map = transformation.add(factory.operation("map").unwrap());
        transformation
            .add_input(map, "source", Term::operation_result("total", PropertyType::Long, sum))
            .unwrap();
        transformation
            .add_input(
                map,
                "target",
                Term::property("count", PropertyType::Long, fixture.record, "count"),
            )
            .unwrap();
        assert!(transformation.is_valid());

        let err = transformation.execute(fixture.store()).unwrap_err();
        assert!(matches!(
            err,
            OperationError::TypeMismatch {
                expected: PropertyType::Long,
                actual: PropertyType::Double,
                ..
            }
        ));
        assert_eq!(fixture.property(fixture.record, "count"), Some(PropertyValue::Long(0)));
    }

    #[test]
    fn test_forward_reference_is_invalid() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let map = transformation.add(factory.operation("map").unwrap());
        let full_name = concat(&mut transformation, &fixture);
        transformation
            .add_input(
                map,
                "source",
                Term::operation_result("fullName", PropertyType::String, full_name),
            )
            .unwrap();
        transformation
            .add_input(map, "target", fixture.target_term("fullName"))
            .unwrap();

        // Each operation is fine on its own; the ordering is not
        assert_eq!(transformation.operation(map).unwrap().state(), OperationState::Valid);
        assert!(transformation.validate().errors().any(|p| p.message.contains("runs later")));
        assert!(matches!(
            transformation.execute(fixture.store()),
            Err(OperationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_cycle_is_invalid() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let first = transformation.add(factory.operation("sum").unwrap());
        let second = transformation.add(factory.operation("sum").unwrap());
        transformation
            .add_input(first, "values", Term::operation_result("b", PropertyType::Long, second))
            .unwrap();
        transformation
            .add_input(second, "values", Term::operation_result("a", PropertyType::Long, first))
            .unwrap();

        let problems = transformation.validate();
        assert!(problems.errors().any(|p| p.message.contains("cyclic")));
        assert!(transformation.result(fixture.store(), second).is_err());
    }

    #[test]
    fn test_removed_producer_is_reported() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let full_name = concat(&mut transformation, &fixture);
        map_operation(
            &fixture,
            &mut transformation,
            Term::operation_result("fullName", PropertyType::String, full_name),
            "fullName",
        );
        assert!(transformation.is_valid());

        transformation.remove(full_name).unwrap();
        assert!(transformation
            .validate()
            .errors()
            .any(|p| p.message.contains("unknown operation")));
    }
}

mod recompute_tests {
    use super::*;

    #[test]
    fn test_unchanged_inputs_are_skipped() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");
        map_operation(&fixture, &mut transformation, fixture.source_term("last"), "fullName");
        transformation.execute(fixture.store()).unwrap();

        let report = transformation.recompute(fixture.store()).unwrap();
        assert_eq!(report.executed, 0);
        assert_eq!(report.skipped, 2);

        fixture.set_property(fixture.person, "last", "Byron");
        let report = transformation.recompute(fixture.store()).unwrap();
        assert_eq!(
            report,
            ExecutionReport {
                executed: 1,
                skipped: 1,
                writes: 1
            }
        );
        assert_eq!(
            fixture.property(fixture.record, "fullName"),
            Some(PropertyValue::from("Byron"))
        );
    }

    #[test]
    fn test_changes_propagate_through_results() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let factory = TransformationFactory::default();
        let concat = transformation.add(factory.operation("concat").unwrap());
        transformation
            .add_input(concat, "values", fixture.source_term("first"))
            .unwrap();
        map_operation(
            &fixture,
            &mut transformation,
            Term::operation_result("name", PropertyType::String, concat),
            "fullName",
        );
        transformation.recompute(fixture.store()).unwrap();

        fixture.set_property(fixture.person, "first", "Ida");
        let report = transformation.recompute(fixture.store()).unwrap();
        assert_eq!(report.executed, 2);
        assert_eq!(
            fixture.property(fixture.record, "fullName"),
            Some(PropertyValue::from("Ida"))
        );
    }

    #[test]
    fn test_rebinding_forces_execution() {
        let fixture = Fixture::new();
        let mut transformation = fixture.transformation();
        let id = map_operation(&fixture, &mut transformation, fixture.source_term("first"), "first");
        transformation.execute(fixture.store()).unwrap();

        let term = fixture.source_term("first");
        transformation.remove_input(id, "source", &term).unwrap();
        transformation.add_input(id, "source", term).unwrap();
        let report = transformation.recompute(fixture.store()).unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(report.writes, 0);
    }
}
