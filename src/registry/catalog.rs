//! Plugin catalog
//!
//! Maps the plugin names used in category manifests to implementations.

use crate::dependency::DependencyProcessor;
use crate::dependency::xml::XmlIncludeProcessor;
use crate::export::Exporter;
use crate::export::ddl::DdlExporter;
use crate::export::xml::XmlExporter;
use crate::import::Importer;
use crate::import::ddl::DdlImporter;
use crate::import::xml::XmlImporter;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct PluginCatalog {
    importers: HashMap<String, Arc<dyn Importer>>,
    exporters: HashMap<String, Arc<dyn Exporter>>,
    processors: HashMap<String, Arc<dyn DependencyProcessor>>,
}

impl PluginCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the XML and DDL plugins
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register_importer(Arc::new(XmlImporter::new()));
        catalog.register_importer(Arc::new(DdlImporter::new()));
        catalog.register_exporter(Arc::new(XmlExporter::new()));
        catalog.register_exporter(Arc::new(DdlExporter::new()));
        catalog.register_processor(Arc::new(XmlIncludeProcessor::new()));
        catalog
    }

    /// Register an importer under its name, replacing any previous one
    pub fn register_importer(&mut self, importer: Arc<dyn Importer>) {
        self.importers.insert(importer.name().to_string(), importer);
    }

    pub fn register_exporter(&mut self, exporter: Arc<dyn Exporter>) {
        self.exporters.insert(exporter.name().to_string(), exporter);
    }

    pub fn register_processor(&mut self, processor: Arc<dyn DependencyProcessor>) {
        self.processors.insert(processor.name().to_string(), processor);
    }

    pub fn importer(&self, name: &str) -> Option<Arc<dyn Importer>> {
        self.importers.get(name).cloned()
    }

    pub fn exporter(&self, name: &str) -> Option<Arc<dyn Exporter>> {
        self.exporters.get(name).cloned()
    }

    pub fn processor(&self, name: &str) -> Option<Arc<dyn DependencyProcessor>> {
        self.processors.get(name).cloned()
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut importers: Vec<&String> = self.importers.keys().collect();
        let mut exporters: Vec<&String> = self.exporters.keys().collect();
        let mut processors: Vec<&String> = self.processors.keys().collect();
        importers.sort();
        exporters.sort();
        processors.sort();
        f.debug_struct("PluginCatalog")
            .field("importers", &importers)
            .field("exporters", &exporters)
            .field("processors", &processors)
            .finish()
    }
}
