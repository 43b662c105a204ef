//! Seams to the file parsers. The grammars live outside this crate.

use crate::ids::{SourceContextId, SourceId};
use crate::model::{DirectoryInfo, Import, Type, TypeAnnotation};
use crate::storage::ProjectStorage;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .line.map(|line| format!(" (line {line})")).unwrap_or_default())]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(line: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }
}

/// Parses `*.qmltypes` type information files.
pub trait QmlTypesParser: Send + Sync {
    /// Appends the imports and types declared in `content`. The types belong
    /// to the module in `directory_info`.
    fn parse(
        &self,
        content: &str,
        imports: &mut Vec<Import>,
        types: &mut Vec<Type>,
        directory_info: &DirectoryInfo,
    ) -> Result<(), ParseError>;
}

/// Parses a single QML document into the type it defines.
pub trait QmlDocumentParser: Send + Sync {
    fn parse(
        &self,
        content: &str,
        imports: &mut Vec<Import>,
        source_id: SourceId,
        directory_path: &Path,
    ) -> Result<Type, ParseError>;
}

/// Reads `*.metainfo` type annotation files.
pub trait TypeAnnotationReader: Send + Sync {
    fn parse(
        &self,
        content: &str,
        directory_path: &Path,
        source_id: SourceId,
        directory_id: SourceContextId,
        storage: &dyn ProjectStorage,
    ) -> Result<Vec<TypeAnnotation>, ParseError>;
}
