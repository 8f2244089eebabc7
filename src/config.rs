//! SDK configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::path::NodePath;
use crate::registry::BUILTIN_URL;

/// Error type for configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by the registry and the pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Repository URLs searched for category manifests, in order
    pub repositories: Vec<String>,
    /// Categories installed when the SDK is set up from this config
    pub install: Vec<String>,
    /// Store folder holding imported models
    pub models_path: String,
    /// Store folder holding dependency models
    pub dependencies_path: String,
    /// Whether dependency models are kept after an import by default
    pub persist_dependency_artifacts: bool,
    /// Maximum nesting of dependency imports
    pub max_dependency_depth: usize,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            repositories: vec![BUILTIN_URL.to_string()],
            install: Vec::new(),
            models_path: "/models".to_string(),
            dependencies_path: "/dependencies".to_string(),
            persist_dependency_artifacts: true,
            max_dependency_depth: 64,
        }
    }
}

impl SdkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the repository list
    pub fn with_repositories(mut self, repositories: Vec<String>) -> Self {
        self.repositories = repositories;
        self
    }

    /// Append a repository URL
    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repositories.push(url.into());
        self
    }

    /// Categories to install on setup
    pub fn with_install(mut self, categories: Vec<String>) -> Self {
        self.install = categories;
        self
    }

    pub fn with_models_path(mut self, path: impl Into<String>) -> Self {
        self.models_path = path.into();
        self
    }

    pub fn with_dependencies_path(mut self, path: impl Into<String>) -> Self {
        self.dependencies_path = path.into();
        self
    }

    pub fn with_persist_dependency_artifacts(mut self, persist: bool) -> Self {
        self.persist_dependency_artifacts = persist;
        self
    }

    pub fn with_max_dependency_depth(mut self, depth: usize) -> Self {
        self.max_dependency_depth = depth;
        self
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SdkConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let models = self.store_path("models_path", &self.models_path)?;
        let dependencies = self.store_path("dependencies_path", &self.dependencies_path)?;
        if models.starts_with(&dependencies) || dependencies.starts_with(&models) {
            return Err(ConfigError::Invalid(format!(
                "models_path {} and dependencies_path {} overlap",
                models, dependencies
            )));
        }
        if self.max_dependency_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_dependency_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed models folder
    pub fn models_root(&self) -> Result<NodePath, ConfigError> {
        self.store_path("models_path", &self.models_path)
    }

    /// Parsed dependencies folder
    pub fn dependencies_root(&self) -> Result<NodePath, ConfigError> {
        self.store_path("dependencies_path", &self.dependencies_path)
    }

    fn store_path(&self, key: &str, value: &str) -> Result<NodePath, ConfigError> {
        let path = NodePath::parse(value)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", key, e)))?
            .normalize();
        if !path.is_absolute() || path.is_root() {
            return Err(ConfigError::Invalid(format!(
                "{} must be an absolute path below the root, got '{}'",
                key, value
            )));
        }
        Ok(path)
    }
}
