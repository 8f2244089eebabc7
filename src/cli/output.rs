//! Output formatting for CLI

use artifact_modelling_sdk::{Metamodel, Model, ModelObject};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct ImportedModel<'a> {
    model: &'a Model,
    tree: &'a ModelObject,
}

/// Imported model plus its tree as pretty JSON
pub fn format_model_json(model: &Model, tree: &ModelObject) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ImportedModel { model, tree })
}

/// One line per installable category, with its metamodels when installed
pub fn format_categories(categories: &[(String, Vec<Arc<Metamodel>>)]) -> String {
    let mut output = String::new();
    for (category, metamodels) in categories {
        output.push_str(category);
        output.push('\n');
        for metamodel in metamodels {
            let capabilities = metamodel.capabilities();
            let mut flags = vec!["import"];
            if capabilities.can_export {
                flags.push("export");
            }
            if capabilities.has_dependency_processor {
                flags.push("dependencies");
            }
            output.push_str(&format!(
                "  {} [{}] {}\n",
                metamodel.id(),
                flags.join(", "),
                metamodel.extensions().join(" ")
            ));
        }
    }
    output
}
