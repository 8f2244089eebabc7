//! Metamodel definitions

use super::sniff::ArtifactProbe;
use crate::dependency::DependencyProcessor;
use crate::export::Exporter;
use crate::import::Importer;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// What a metamodel can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_import: bool,
    pub can_export: bool,
    pub has_dependency_processor: bool,
}

/// One artifact family's import, export and dependency rules.
///
/// Immutable once registered.
#[derive(Clone)]
pub struct Metamodel {
    id: String,
    category: String,
    description: Option<String>,
    extensions: Vec<String>,
    mime_types: Vec<String>,
    importer: Arc<dyn Importer>,
    exporter: Option<Arc<dyn Exporter>>,
    dependency_processor: Option<Arc<dyn DependencyProcessor>>,
}

impl Metamodel {
    pub fn new(id: impl Into<String>, category: impl Into<String>, importer: Arc<dyn Importer>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            description: None,
            extensions: Vec::new(),
            mime_types: Vec::new(),
            importer,
            exporter: None,
            dependency_processor: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_mime_types(mut self, mime_types: Vec<String>) -> Self {
        self.mime_types = mime_types;
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_dependency_processor(mut self, processor: Arc<dyn DependencyProcessor>) -> Self {
        self.dependency_processor = Some(processor);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    pub fn importer(&self) -> &Arc<dyn Importer> {
        &self.importer
    }

    pub fn exporter(&self) -> Option<&Arc<dyn Exporter>> {
        self.exporter.as_ref()
    }

    pub fn dependency_processor(&self) -> Option<&Arc<dyn DependencyProcessor>> {
        self.dependency_processor.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_import: true,
            can_export: self.exporter.is_some(),
            has_dependency_processor: self.dependency_processor.is_some(),
        }
    }

    /// Whether this metamodel claims the probed artifact.
    ///
    /// Declared extensions or MIME types narrow the candidates first; the
    /// importer's own predicate has the final word.
    pub fn is_applicable(&self, probe: &ArtifactProbe) -> bool {
        let declared = !self.extensions.is_empty() || !self.mime_types.is_empty();
        let matches_declared = self.extensions.iter().any(|e| probe.has_extension(e))
            || probe
                .mime_type
                .as_deref()
                .is_some_and(|m| self.mime_types.iter().any(|t| t.eq_ignore_ascii_case(m)));
        (!declared || matches_declared) && self.importer.applicable(probe)
    }
}

impl fmt::Debug for Metamodel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metamodel")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("extensions", &self.extensions)
            .field("mime_types", &self.mime_types)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl PartialEq for Metamodel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.category == other.category
    }
}
