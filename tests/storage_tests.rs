//! Tree store tests

use artifact_modelling_sdk::models::{NodePath, names};
use artifact_modelling_sdk::{
    ArtifactSource, ErrorKind, FileSystemArtifactSource, FileTreeStore, ImportError, ImportPipeline,
    InMemoryArtifactSource, MemoryTreeStore, MetamodelRegistry, SdkConfig, SdkError, Session,
    StoreError, TreeStore,
};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

fn registry() -> Arc<MetamodelRegistry> {
    let registry = Arc::new(MetamodelRegistry::with_builtins());
    registry.install("xml").unwrap();
    registry
}

fn pipeline(store: Arc<dyn TreeStore>, source: Arc<dyn ArtifactSource>) -> ImportPipeline {
    ImportPipeline::new(registry(), store, source, SdkConfig::default()).unwrap()
}

mod session_tests {
    use super::*;

    #[test]
    fn test_failed_import_keeps_earlier_commits() {
        let store = Arc::new(MemoryTreeStore::new());
        let pipeline = pipeline(store.clone(), Arc::new(InMemoryArtifactSource::new()));
        pipeline.import(b"<kept/>", "kept.xml", None, true).unwrap();
        let version = store.version().unwrap();

        assert!(pipeline.import(b"<broken>", "broken.xml", None, true).is_err());
        assert_eq!(store.version().unwrap(), version);
        let names: Vec<String> = pipeline
            .models()
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["kept.xml".to_string()]);
    }

    #[test]
    fn test_conflicting_write_surfaces_as_conflict() {
        let store = MemoryTreeStore::new();
        {
            let mut setup = Session::open(&store).unwrap();
            setup
                .ensure_path(&NodePath::parse("/shared").unwrap(), "mm:folder")
                .unwrap();
            setup.commit().unwrap();
        }

        let mut remover = Session::open(&store).unwrap();
        let mut writer = Session::open(&store).unwrap();
        let shared = remover.node_at("/shared").unwrap();
        remover.remove_node(shared).unwrap();
        writer.set_property(shared, "late", 1i64).unwrap();
        remover.commit().unwrap();

        let err = writer.commit().unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(SdkError::from(err).kind(), ErrorKind::Conflict);
    }
}

mod file_store_tests {
    use super::*;

    #[test]
    fn test_imported_model_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let store_path = temp.path().join("tree.json");
        let artifacts = temp.path().join("artifacts");
        std::fs::create_dir_all(&artifacts).unwrap();
        std::fs::write(artifacts.join("doc.xml"), r#"<root attr="x"><leaf/></root>"#).unwrap();

        {
            let store = Arc::new(FileTreeStore::open(&store_path).unwrap());
            let pipeline = pipeline(store, Arc::new(FileSystemArtifactSource::new(&artifacts)));
            pipeline.import_path("doc.xml", None, true).unwrap();
        }

        let store = Arc::new(FileTreeStore::open(&store_path).unwrap());
        let pipeline = pipeline(store, Arc::new(InMemoryArtifactSource::new()));
        let model = pipeline.model("doc.xml").unwrap();
        assert_eq!(model.metamodel_id, "xml");
        let session = pipeline.open_session().unwrap();
        let root = model.root(&session).unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_path_traversal_is_rejected() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(
            Arc::new(MemoryTreeStore::new()),
            Arc::new(FileSystemArtifactSource::new(temp.path())),
        );
        // Leading ".." segments survive normalization
        let err = pipeline.import_path("../outside.xml", None, true).unwrap_err();
        assert!(matches!(err, ImportError::Storage(StoreError::PermissionDenied(_))));
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_parallel_imports_of_unrelated_artifacts() {
        let store = Arc::new(MemoryTreeStore::new());
        let pipeline = pipeline(store, Arc::new(InMemoryArtifactSource::new()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || {
                    let content = format!(r#"<doc index="{}"/>"#, i);
                    pipeline
                        .import(content.as_bytes(), &format!("doc-{}.xml", i), None, true)
                        .map(|m| m.name)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let mut names: Vec<String> = pipeline
            .models()
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        names.sort();
        let expected: Vec<String> = (0..8).map(|i| format!("doc-{}.xml", i)).collect();
        assert_eq!(names, expected);

        let session = pipeline.open_session().unwrap();
        assert!(session.find(&NodePath::parse("/models[2]").unwrap()).is_none());
    }

    #[test]
    fn test_interleaved_model_with_same_name_conflicts() {
        let store = Arc::new(MemoryTreeStore::new());
        let pipeline = pipeline(store, Arc::new(InMemoryArtifactSource::new()));

        let mut stale = pipeline.open_session().unwrap();
        let models = stale.node(pipeline.models_root()).unwrap();
        stale.add_child(models, "a.xml", names::MODEL_TYPE).unwrap();

        pipeline.import(b"<a/>", "a.xml", None, true).unwrap();
        let err = stale.commit().unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(pipeline.models().unwrap().len(), 1);
    }

    #[test]
    fn test_parallel_imports_of_same_name_keep_one_model() {
        let store = Arc::new(MemoryTreeStore::new());
        let pipeline = pipeline(store, Arc::new(InMemoryArtifactSource::new()));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = pipeline.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    pipeline.import(b"<a/>", "a.xml", None, true)
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        for err in outcomes.into_iter().filter_map(Result::err) {
            let kind = SdkError::from(err).kind();
            assert!(matches!(kind, ErrorKind::AlreadyExists | ErrorKind::Conflict));
        }
        let paths: Vec<String> = pipeline
            .models()
            .unwrap()
            .into_iter()
            .map(|m| m.path.to_string())
            .collect();
        assert_eq!(paths, vec!["/models/a.xml".to_string()]);
    }
}
