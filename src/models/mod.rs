//! Model types
//!
//! - [`Model`]: one imported tree plus its metamodel reference
//! - [`ModelObject`]: a materialized node with typed properties and ordered children
//! - [`DependencyLink`]: relation from a model to a dependency model's root
//! - [`NodePath`]: absolute and relative node addressing
//! - [`PropertyValue`]: tagged property values

pub mod dependency;
pub mod model;
pub mod object;
pub mod path;
pub mod value;

pub use dependency::DependencyLink;
pub use model::Model;
pub use object::ModelObject;
pub use path::{NodePath, PathError, Segment};
pub use value::{Property, PropertyType, PropertyValue};

/// Node and property names used by the pipelines.
///
/// Bookkeeping nodes are told apart by primary type, never by name: artifact
/// content may use any name, `mm:` prefixed ones included.
pub mod names {
    pub const FOLDER_TYPE: &str = "mm:folder";
    pub const MODEL_TYPE: &str = "mm:model";
    pub const DEPENDENCIES_NODE: &str = "mm:dependencies";
    pub const DEPENDENCIES_TYPE: &str = "mm:dependencies";
    pub const DEPENDENCY_NODE: &str = "mm:dependency";
    pub const DEPENDENCY_TYPE: &str = "mm:dependency";

    pub const METAMODEL: &str = "mm:metamodel";
    pub const ARTIFACT_PATH: &str = "mm:artifactPath";
    pub const MIME_TYPE: &str = "mm:mimeType";
    pub const IMPORTED_AT: &str = "mm:importedAt";
    pub const SOURCE_REFERENCE: &str = "mm:sourceReference";
    pub const MODEL_PATH: &str = "mm:modelPath";
    pub const MODEL_REFERENCE: &str = "mm:model";

    /// Whether nodes of this primary type must have a unique name among
    /// their siblings. Models and folders are addressed by name alone.
    pub fn is_uniquely_named(primary_type: &str) -> bool {
        matches!(primary_type, FOLDER_TYPE | MODEL_TYPE)
    }

    /// Whether a node of this primary type is pipeline bookkeeping
    pub fn is_bookkeeping(primary_type: &str) -> bool {
        matches!(primary_type, DEPENDENCIES_TYPE | DEPENDENCY_TYPE)
    }
}
