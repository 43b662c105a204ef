use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings of the project storage updater
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// File name of the per-directory manifest
    pub manifest_file_name: String,
    /// Name of the subdirectory holding type annotations
    pub annotation_directory_name: String,
    /// Glob patterns of documents parsed in every module directory
    pub document_patterns: Vec<String>,
    /// Glob patterns of type annotation files
    pub type_annotation_patterns: Vec<String>,
    /// Glob patterns of property editor documents
    pub property_editor_patterns: Vec<String>,
    /// Directory path suffixes that are never recursed into
    pub skipped_directories: Vec<String>,
    /// Module that owns type information files registered on their own
    pub builtin_module_name: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            manifest_file_name: "qmldir".to_string(),
            annotation_directory_name: "designer".to_string(),
            document_patterns: vec!["*.qml".to_string()],
            type_annotation_patterns: vec!["*.metainfo".to_string()],
            property_editor_patterns: vec!["*Pane.qml".to_string(), "*Specifics.qml".to_string()],
            skipped_directories: vec![
                "designer".to_string(),
                "QtQuick/Scene2D".to_string(),
                "QtQuick/Scene3D".to_string(),
            ],
            builtin_module_name: "QML".to_string(),
        }
    }
}

impl UpdaterConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// True when `directory` ends with one of the skipped path suffixes.
    pub fn is_skipped_directory(&self, directory: &Path) -> bool {
        self.skipped_directories
            .iter()
            .any(|suffix| directory.ends_with(suffix))
    }
}
