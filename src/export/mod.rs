//! Export functionality
//!
//! Serializes model trees back into artifacts:
//! - [`Exporter`]: per-metamodel plugin
//! - [`ExportPipeline`]: looks up the model's exporter and writes the result
//!   in one call, so the destination is either fully written or untouched
//!
//! Built-in exporters:
//! - XML
//! - DDL

pub mod ddl;
pub mod pipeline;
pub mod xml;

pub use ddl::DdlExporter;
pub use pipeline::ExportPipeline;
pub use xml::XmlExporter;

use crate::models::Model;
use crate::registry::RegistryError;
use crate::storage::{Session, StoreError};
use std::io::Write;

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Metamodel {0} has no exporter")]
    NoExporter(String),
    #[error("Cannot export {model} under metamodel {metamodel}: {source}")]
    Failed {
        model: String,
        metamodel: String,
        #[source]
        source: Box<ExportError>,
    },
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::IoError(err.to_string())
    }
}

/// Exporter plugin contract
pub trait Exporter: Send + Sync {
    /// Name under which manifests refer to this exporter
    fn name(&self) -> &str;

    /// Metamodel family whose trees this exporter writes
    fn metamodel_id(&self) -> &str;

    /// Whether the exporter can produce the given MIME type
    fn supports(&self, mime_type: &str) -> bool;

    /// Write `model` to `out`
    fn execute(
        &self,
        session: &Session<'_>,
        model: &Model,
        out: &mut dyn Write,
    ) -> Result<(), ExportError>;
}
