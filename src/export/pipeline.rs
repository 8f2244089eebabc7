//! Export pipeline

use super::{ExportError, Exporter};
use crate::models::Model;
use crate::registry::MetamodelRegistry;
use crate::storage::{Session, TreeStore};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Writes models through their metamodel's exporter
#[derive(Clone)]
pub struct ExportPipeline {
    registry: Arc<MetamodelRegistry>,
    store: Arc<dyn TreeStore>,
}

impl ExportPipeline {
    pub fn new(registry: Arc<MetamodelRegistry>, store: Arc<dyn TreeStore>) -> Self {
        Self { registry, store }
    }

    fn exporter_for(&self, metamodel_id: &str) -> Result<Arc<dyn Exporter>, ExportError> {
        let metamodel = self.registry.metamodel(metamodel_id)?;
        metamodel
            .exporter()
            .cloned()
            .ok_or_else(|| ExportError::NoExporter(metamodel_id.to_string()))
    }

    /// Whether the metamodel's exporter can produce `mime_type`
    pub fn supports(&self, metamodel_id: &str, mime_type: &str) -> bool {
        self.exporter_for(metamodel_id)
            .is_ok_and(|exporter| exporter.supports(mime_type))
    }

    /// Export `model` into `writer`, returning the number of bytes written.
    ///
    /// The artifact is rendered into a buffer first; `writer` sees a single
    /// write, or nothing at all when rendering fails.
    pub fn export(&self, model: &Model, writer: &mut dyn Write) -> Result<usize, ExportError> {
        let buffer = self.export_to_vec(model)?;
        writer.write_all(&buffer)?;
        writer.flush()?;
        Ok(buffer.len())
    }

    /// Export `model` into a new buffer
    pub fn export_to_vec(&self, model: &Model) -> Result<Vec<u8>, ExportError> {
        let span = info_span!("export", model = %model.path, metamodel = %model.metamodel_id);
        let _guard = span.enter();

        let exporter = self.exporter_for(&model.metamodel_id)?;
        let session = Session::open(self.store.as_ref())?;
        let current = Model::load(&session, model.node)?;

        let mut buffer = Vec::new();
        exporter
            .execute(&session, &current, &mut buffer)
            .map_err(|e| ExportError::Failed {
                model: current.path.to_string(),
                metamodel: current.metamodel_id.clone(),
                source: Box::new(e),
            })?;
        session.rollback();

        debug!(bytes = buffer.len(), exporter = exporter.name(), "Exported model");
        Ok(buffer)
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
