//! XML include processing
//!
//! Follows the references XML vocabularies use to pull in other documents:
//! - XML Schema `include`, `import`, `redefine`, `override` (`schemaLocation`)
//! - XInclude `include` (`href`)
//! - WSDL `import` (`location`)
//!
//! Only the local element name is matched, so any namespace prefix works.
//! Absolute URLs are left alone; they are not artifact paths.

use super::{DependencyContext, DependencyProcessor};
use crate::import::ImportError;
use crate::import::xml::ELEMENT_TYPE;
use crate::models::{ModelObject, NodePath, PropertyValue};
use crate::storage::NodeId;
use tracing::debug;

const SCHEMA_ELEMENTS: [&str; 4] = ["include", "import", "redefine", "override"];
const REFERENCE_ATTRIBUTES: [&str; 3] = ["schemaLocation", "href", "location"];

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlIncludeProcessor;

impl XmlIncludeProcessor {
    pub fn new() -> Self {
        Self
    }

    /// References found in `object`'s subtree, in document order, without repeats
    pub fn references(object: &ModelObject) -> Vec<String> {
        let mut found = Vec::new();
        collect(object, &mut found);
        found
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn is_remote(reference: &str) -> bool {
    reference.contains("://") || reference.starts_with("urn:")
}

fn collect(object: &ModelObject, found: &mut Vec<String>) {
    for child in object.content_children() {
        if child.primary_type != ELEMENT_TYPE {
            continue;
        }
        if SCHEMA_ELEMENTS.contains(&local_name(&child.name)) {
            let reference = REFERENCE_ATTRIBUTES
                .iter()
                .find_map(|attribute| child.property(attribute).and_then(PropertyValue::as_str));
            match reference {
                Some(reference) if is_remote(reference) => {
                    debug!(reference, "Skipping remote reference");
                }
                Some(reference) if !reference.trim().is_empty() => {
                    if !found.iter().any(|r| r == reference) {
                        found.push(reference.to_string());
                    }
                }
                _ => {}
            }
        }
        collect(child, found);
    }
}

impl DependencyProcessor for XmlIncludeProcessor {
    fn name(&self) -> &str {
        "xml-include"
    }

    fn metamodel_id(&self) -> &str {
        "xml"
    }

    fn process(
        &self,
        ctx: &mut DependencyContext<'_, '_>,
        artifact_path: &str,
        model_node: NodeId,
        persist: bool,
    ) -> Result<Option<NodePath>, ImportError> {
        let tree = ModelObject::load(ctx.session(), model_node)?;
        let references = Self::references(&tree);
        if references.is_empty() {
            return Ok(None);
        }

        for reference in &references {
            let dependency = ctx.import(artifact_path, reference)?;
            ctx.link(model_node, reference, &dependency)?;
        }
        debug!(
            artifact = artifact_path,
            dependencies = references.len(),
            "Linked XML dependencies"
        );
        Ok(persist.then(|| ctx.dependencies_root().clone()))
    }
}
