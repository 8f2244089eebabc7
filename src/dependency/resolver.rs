//! Dependency resolver
//!
//! Drives one import's dependency graph inside one session, depth-first:
//! - a memo maps resolved artifact paths to the models imported for them,
//!   so shared dependencies are imported once
//! - the stack of artifacts being imported detects cycles
//! - dependency models imported for a non-persisting import are removed
//!   before commit

use super::{DependencyContext, ImportCallback};
use crate::import::{ImportError, ImportPipeline, ModelLocation};
use crate::models::{Model, NodePath, names};
use crate::storage::artifact::resolve_reference;
use crate::storage::{NodeId, Session};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

pub struct DependencyResolver<'p> {
    pipeline: &'p ImportPipeline,
    persist: bool,
    memo: HashMap<String, Model>,
    stack: Vec<String>,
    created: Vec<NodeId>,
}

impl<'p> DependencyResolver<'p> {
    pub fn new(pipeline: &'p ImportPipeline, persist: bool) -> Self {
        Self {
            pipeline,
            persist,
            memo: HashMap::new(),
            stack: Vec::new(),
            created: Vec::new(),
        }
    }

    /// Dependency models resolved so far, keyed by artifact path
    pub fn imported(&self) -> &HashMap<String, Model> {
        &self.memo
    }

    pub fn imported_count(&self) -> usize {
        self.memo.len()
    }

    /// Import one artifact and everything it depends on
    pub fn import_artifact(
        &mut self,
        session: &mut Session<'_>,
        content: &[u8],
        artifact_path: &str,
        requested: Option<&str>,
        preferred: Option<&str>,
        location: ModelLocation,
    ) -> Result<Model, ImportError> {
        let metamodel =
            self.pipeline
                .select_metamodel(artifact_path, content, requested, preferred)?;

        self.stack.push(artifact_path.to_string());
        let result = self
            .pipeline
            .create_model(session, content, artifact_path, &metamodel, location)
            .and_then(|model| {
                self.resolve(session, &model)?;
                Ok(model)
            });
        self.stack.pop();
        result
    }

    /// Run the dependency processor of the model's metamodel, if it has one
    pub fn resolve(
        &mut self,
        session: &mut Session<'_>,
        model: &Model,
    ) -> Result<Option<NodePath>, ImportError> {
        let metamodel = self.pipeline.registry().metamodel(&model.metamodel_id)?;
        let Some(processor) = metamodel.dependency_processor().cloned() else {
            trace!(model = %model.path, "No dependency processor");
            return Ok(None);
        };

        let persist = self.persist;
        let root = self.pipeline.dependencies_root().clone();
        let mut ctx = DependencyContext::new(session, self, &model.metamodel_id, root);
        processor.process(&mut ctx, &model.artifact_path, model.node, persist)
    }

    /// Remove the dependency models this resolver created, unless they are
    /// to be kept, along with folders left empty
    pub fn discard_transient(&mut self, session: &mut Session<'_>) -> Result<usize, ImportError> {
        if self.persist {
            self.created.clear();
            return Ok(0);
        }

        let mut removed = 0;
        for node in self.created.drain(..).rev() {
            if !session.exists(node) {
                continue;
            }
            let mut parent = session.get(node)?.parent;
            session.remove_node(node)?;
            removed += 1;

            while let Some(folder) = parent {
                let data = session.get(folder)?;
                if data.primary_type != names::FOLDER_TYPE || !data.children.is_empty() {
                    break;
                }
                parent = data.parent;
                session.remove_node(folder)?;
            }
        }
        debug!(removed, "Discarded transient dependency models");
        Ok(removed)
    }
}

impl ImportCallback for DependencyResolver<'_> {
    fn import_dependency(
        &mut self,
        session: &mut Session<'_>,
        importing_metamodel: &str,
        importing_path: &str,
        reference: &str,
    ) -> Result<Model, ImportError> {
        let resolved = resolve_reference(importing_path, reference);

        if let Some(position) = self.stack.iter().position(|p| *p == resolved) {
            let mut chain = self.stack[position..].to_vec();
            chain.push(resolved.clone());
            warn!(chain = ?chain, "Cyclic dependency");
            return Err(ImportError::CyclicDependency {
                path: resolved,
                chain,
            });
        }

        if let Some(model) = self.memo.get(&resolved) {
            debug!(path = %resolved, model = %model.path, "Dependency already imported");
            return Ok(model.clone());
        }

        let max = self.pipeline.config().max_dependency_depth;
        if self.stack.len() > max {
            return Err(ImportError::DependencyDepth {
                path: resolved,
                max,
            });
        }

        let existing = self
            .pipeline
            .model_path(&resolved, ModelLocation::Dependencies);
        if let Some(node) = session.find(&existing) {
            let model = Model::load(session, node)?;
            debug!(path = %resolved, model = %model.path, "Reusing stored dependency model");
            self.memo.insert(resolved, model.clone());
            return Ok(model);
        }

        debug!(path = %resolved, reference, from = importing_path, "Importing dependency");
        let result = self.pipeline.read_artifact(&resolved).and_then(|content| {
            self.import_artifact(
                session,
                &content,
                &resolved,
                None,
                Some(importing_metamodel),
                ModelLocation::Dependencies,
            )
        });

        match result {
            Ok(model) => {
                self.created.push(model.node);
                self.memo.insert(resolved, model.clone());
                Ok(model)
            }
            Err(e @ ImportError::CyclicDependency { .. }) => Err(e),
            Err(e) => Err(ImportError::DependencyResolution {
                path: resolved,
                source: Box::new(e),
            }),
        }
    }
}
