//! Dependency resolution tests

use artifact_modelling_sdk::models::{NodePath, names};
use artifact_modelling_sdk::{
    ErrorKind, ImportError, ImportPipeline, InMemoryArtifactSource, MemoryTreeStore,
    MetamodelRegistry, Model, SdkConfig, SdkError, Session,
};
use std::sync::Arc;

fn schema(includes: &[&str]) -> String {
    let mut xml = String::from(r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">"#);
    for include in includes {
        xml.push_str(&format!(r#"<xs:include schemaLocation="{}"/>"#, include));
    }
    xml.push_str(r#"<xs:element name="item"/></xs:schema>"#);
    xml
}

fn pipeline_with(source: InMemoryArtifactSource, config: SdkConfig) -> ImportPipeline {
    let registry = Arc::new(MetamodelRegistry::with_builtins());
    registry.install("xml").unwrap();
    ImportPipeline::new(
        registry,
        Arc::new(MemoryTreeStore::new()),
        Arc::new(source),
        config,
    )
    .unwrap()
}

fn pipeline(source: InMemoryArtifactSource) -> ImportPipeline {
    pipeline_with(source, SdkConfig::default())
}

fn session(pipeline: &ImportPipeline) -> Session<'_> {
    pipeline.open_session().unwrap()
}

fn dependency_model(pipeline: &ImportPipeline, path: &str) -> Option<Model> {
    let session = session(pipeline);
    let node = session.find(&NodePath::parse(path).unwrap())?;
    Some(Model::load(&session, node).unwrap())
}

mod resolution_tests {
    use super::*;

    #[test]
    fn test_dependencies_are_imported_and_linked() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("schemas/order.xsd", schema(&["types.xsd", "../common/base.xsd"]))
            .with_artifact("schemas/types.xsd", schema(&[]))
            .with_artifact("common/base.xsd", schema(&[]));
        let pipeline = pipeline(source);

        let model = pipeline.import_path("schemas/order.xsd", None, true).unwrap();
        let session = session(&pipeline);
        let links = model.dependencies(&session).unwrap();
        assert_eq!(links.len(), 2);

        assert_eq!(links[0].source_reference, "types.xsd");
        assert_eq!(links[0].artifact_path, "schemas/types.xsd");
        assert_eq!(links[1].source_reference, "../common/base.xsd");
        assert_eq!(links[1].artifact_path, "common/base.xsd");

        let types = session
            .find(&NodePath::parse("/dependencies/schemas/types.xsd").unwrap())
            .unwrap();
        assert_eq!(links[0].resolve(&session).unwrap(), Some(types));
        assert_eq!(session.get(types).unwrap().primary_type, names::MODEL_TYPE);
        assert_eq!(
            session
                .get(session.get(types).unwrap().parent.unwrap())
                .unwrap()
                .primary_type,
            names::FOLDER_TYPE
        );
    }

    #[test]
    fn test_diamond_imports_shared_dependency_once() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd", "c.xsd"]))
            .with_artifact("b.xsd", schema(&["d.xsd"]))
            .with_artifact("c.xsd", schema(&["d.xsd"]))
            .with_artifact("d.xsd", schema(&[]));
        let pipeline = pipeline(source);
        pipeline.import_path("a.xsd", None, true).unwrap();

        let b = dependency_model(&pipeline, "/dependencies/b.xsd").unwrap();
        let c = dependency_model(&pipeline, "/dependencies/c.xsd").unwrap();
        let d = dependency_model(&pipeline, "/dependencies/d.xsd").unwrap();

        let session = session(&pipeline);
        let from_b = b.dependencies(&session).unwrap();
        let from_c = c.dependencies(&session).unwrap();
        assert_eq!(from_b[0].resolve(&session).unwrap(), Some(d.node));
        assert_eq!(from_c[0].resolve(&session).unwrap(), Some(d.node));

        let dependencies = session
            .find(&NodePath::parse("/dependencies").unwrap())
            .unwrap();
        assert_eq!(session.children(dependencies).unwrap().len(), 3);
    }

    #[test]
    fn test_stored_dependency_is_reused() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["common.xsd"]))
            .with_artifact("b.xsd", schema(&["common.xsd"]))
            .with_artifact("common.xsd", schema(&[]));
        let pipeline = pipeline(source);
        pipeline.import_path("a.xsd", None, true).unwrap();
        let first = dependency_model(&pipeline, "/dependencies/common.xsd").unwrap();

        let b = pipeline.import_path("b.xsd", None, true).unwrap();
        let session = session(&pipeline);
        let links = b.dependencies(&session).unwrap();
        assert_eq!(links[0].resolve(&session).unwrap(), Some(first.node));
    }

    #[test]
    fn test_mm_prefixed_include_is_followed() {
        let main = concat!(
            r#"<mm:schema xmlns:mm="http://www.w3.org/2001/XMLSchema">"#,
            r#"<mm:include schemaLocation="types.xsd"/></mm:schema>"#,
        );
        let source = InMemoryArtifactSource::new()
            .with_artifact("main.xsd", main)
            .with_artifact("types.xsd", schema(&[]));
        let pipeline = pipeline(source);

        let model = pipeline.import_path("main.xsd", None, true).unwrap();
        let session = session(&pipeline);
        let links = model.dependencies(&session).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].artifact_path, "types.xsd");
        assert_eq!(model.root(&session).unwrap().name, "mm:schema");
    }

    #[test]
    fn test_remote_references_are_skipped() {
        let source = InMemoryArtifactSource::new().with_artifact(
            "a.xsd",
            schema(&["http://www.w3.org/2001/xml.xsd"]),
        );
        let pipeline = pipeline(source);
        let model = pipeline.import_path("a.xsd", None, true).unwrap();
        let session = session(&pipeline);
        assert!(model.dependencies(&session).unwrap().is_empty());
    }
}

mod cycle_tests {
    use super::*;

    #[test]
    fn test_two_artifact_cycle() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd"]))
            .with_artifact("b.xsd", schema(&["a.xsd"]));
        let pipeline = pipeline(source);

        match pipeline.import_path("a.xsd", None, true) {
            Err(ImportError::CyclicDependency { chain, .. }) => {
                assert_eq!(chain, vec!["a.xsd", "b.xsd", "a.xsd"]);
            }
            other => panic!("expected a cycle, got {:?}", other.map(|m| m.path)),
        }
        assert!(pipeline.models().unwrap().is_empty());
        assert!(dependency_model(&pipeline, "/dependencies/b.xsd").is_none());
    }

    #[test]
    fn test_self_include() {
        let source = InMemoryArtifactSource::new().with_artifact("a.xsd", schema(&["./a.xsd"]));
        let pipeline = pipeline(source);

        let err = pipeline.import_path("a.xsd", None, true).unwrap_err();
        assert!(matches!(&err, ImportError::CyclicDependency { chain, .. } if chain.len() == 2));
        assert_eq!(SdkError::from(err).kind(), ErrorKind::CyclicDependency);
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_nested_failure_is_wrapped_and_rolled_back() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd"]))
            .with_artifact("b.xsd", schema(&["missing.xsd"]));
        let pipeline = pipeline(source);

        let err = pipeline.import_path("a.xsd", None, true).unwrap_err();
        match &err {
            ImportError::DependencyResolution { path, source } => {
                assert_eq!(path, "b.xsd");
                assert!(matches!(
                    source.as_ref(),
                    ImportError::DependencyResolution { path, .. } if path == "missing.xsd"
                ));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(err.root_cause(), ImportError::NotFound { .. }));
        assert_eq!(SdkError::from(err).kind(), ErrorKind::DependencyResolution);

        // Nothing of the failed import is left behind
        assert!(pipeline.models().unwrap().is_empty());
        let session = session(&pipeline);
        assert!(session.find(&NodePath::parse("/dependencies").unwrap()).is_none());
    }

    #[test]
    fn test_malformed_dependency() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd"]))
            .with_artifact("b.xsd", "<xs:schema>");
        let pipeline = pipeline(source);

        let err = pipeline.import_path("a.xsd", None, true).unwrap_err();
        assert!(matches!(err.root_cause(), ImportError::Malformed { path, .. } if path == "b.xsd"));
    }

    #[test]
    fn test_depth_limit() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd"]))
            .with_artifact("b.xsd", schema(&["c.xsd"]))
            .with_artifact("c.xsd", schema(&[]));
        let pipeline = pipeline_with(source, SdkConfig::default().with_max_dependency_depth(1));

        let err = pipeline.import_path("a.xsd", None, true).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ImportError::DependencyDepth { path, max: 1 } if path == "c.xsd"
        ));
    }
}

mod persistence_tests {
    use super::*;

    #[test]
    fn test_non_persisting_import_keeps_only_top_model() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("schemas/a.xsd", schema(&["b.xsd"]))
            .with_artifact("schemas/b.xsd", schema(&["../common/c.xsd"]))
            .with_artifact("common/c.xsd", schema(&[]));
        let pipeline = pipeline(source);

        let model = pipeline.import_path("schemas/a.xsd", None, false).unwrap();
        let session = session(&pipeline);
        assert!(session.find(&NodePath::parse("/dependencies").unwrap()).is_none());
        assert_eq!(pipeline.models().unwrap(), vec![model.clone()]);

        // The link is recorded but no longer resolves
        let links = model.dependencies(&session).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].artifact_path, "schemas/b.xsd");
        assert_eq!(links[0].resolve(&session).unwrap(), None);
    }

    #[test]
    fn test_configured_default() {
        let source = InMemoryArtifactSource::new()
            .with_artifact("a.xsd", schema(&["b.xsd"]))
            .with_artifact("b.xsd", schema(&[]));
        let pipeline = pipeline_with(
            source,
            SdkConfig::default().with_persist_dependency_artifacts(false),
        );
        let content = schema(&["b.xsd"]);
        pipeline.import_default(content.as_bytes(), "a.xsd").unwrap();
        assert!(dependency_model(&pipeline, "/dependencies/b.xsd").is_none());
    }
}
