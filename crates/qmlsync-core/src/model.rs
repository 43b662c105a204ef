use crate::ids::{ModuleId, SourceContextId, SourceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Size and modification time of an existing file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub size: u64,
    pub last_modified: SystemTime,
}

/// Snapshot of one source on disk. A missing `stamp` means the source does
/// not exist, which is a regular, comparable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub source_id: SourceId,
    pub stamp: Option<FileStamp>,
}

impl FileStatus {
    pub fn new(source_id: SourceId, size: u64, last_modified: SystemTime) -> Self {
        Self {
            source_id,
            stamp: Some(FileStamp {
                size,
                last_modified,
            }),
        }
    }

    pub fn not_existing(source_id: SourceId) -> Self {
        Self {
            source_id,
            stamp: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.stamp.is_some()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.stamp.map(|stamp| stamp.last_modified)
    }
}

/// Role of a file inside its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileType {
    Directory,
    QmlDocument,
    QmlTypes,
}

/// "This file belongs to this directory and has this role."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub directory_id: SourceContextId,
    pub source_id: SourceId,
    pub module_id: Option<ModuleId>,
    pub file_type: FileType,
}

impl DirectoryInfo {
    pub fn new(
        directory_id: SourceContextId,
        source_id: SourceId,
        module_id: Option<ModuleId>,
        file_type: FileType,
    ) -> Self {
        Self {
            directory_id,
            source_id,
            module_id,
            file_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    QmlLibrary,
    CppLibrary,
    PathLibrary,
}

/// `major.minor` version; both parts are optional ("auto" or unversioned).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: Option<u32>,
    pub minor: Option<u32>,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major: Some(major),
            minor: Some(minor),
        }
    }

    /// Parses `2`, `2.15` or `2.` style versions. Anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = match text.split_once('.') {
            Some((major, "")) => (major, None),
            Some((major, minor)) => (major, Some(minor)),
            None => (text, None),
        };

        let major = major.parse().ok()?;
        let minor = match minor {
            Some(minor) => Some(minor.parse().ok()?),
            None => None,
        };

        Some(Self {
            major: Some(major),
            minor,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.major.is_none() && self.minor.is_none()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.major, self.minor) {
            (Some(major), Some(minor)) => write!(f, "{major}.{minor}"),
            (Some(major), None) => write!(f, "{major}"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Import {
    pub module_id: ModuleId,
    pub version: Version,
    pub source_id: SourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExportedType {
    pub module_id: ModuleId,
    pub name: String,
    pub version: Version,
}

impl ExportedType {
    pub fn new(module_id: ModuleId, name: impl Into<String>, version: Version) -> Self {
        Self {
            module_id,
            name: name.into(),
            version,
        }
    }
}

/// How much of a stored type a synchronized [`Type`] replaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeLevel {
    /// Everything, including exported types.
    #[default]
    Full,
    /// Only the exported types; the rest of the stored type is kept.
    Minimal,
    /// Everything except the exported types, which stay as stored.
    ExcludeExportedTypes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    pub type_name: String,
}

/// A type record produced by one of the parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub type_name: String,
    pub source_id: SourceId,
    pub prototype: Option<String>,
    pub exported_types: Vec<ExportedType>,
    pub properties: Vec<PropertyDeclaration>,
    pub is_singleton: bool,
    pub change_level: ChangeLevel,
}

impl Type {
    pub fn new(type_name: impl Into<String>, source_id: SourceId) -> Self {
        Self {
            type_name: type_name.into(),
            source_id,
            prototype: None,
            exported_types: Vec::new(),
            properties: Vec::new(),
            is_singleton: false,
            change_level: ChangeLevel::Full,
        }
    }
}

/// `module_id` re-exports `exported_module_id` to everybody importing it.
/// `source_id` is the manifest that declared the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleExportedImport {
    pub module_id: ModuleId,
    pub exported_module_id: ModuleId,
    pub version: Version,
    pub is_auto_version: bool,
    pub source_id: SourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEditorQmlPath {
    pub module_id: ModuleId,
    pub type_name: String,
    pub path_id: SourceId,
    pub directory_id: SourceContextId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAnnotation {
    pub source_id: SourceId,
    pub directory_id: SourceContextId,
    pub type_name: String,
    pub module_id: ModuleId,
    pub icon_path: String,
    pub item_library_json: String,
    pub hints_json: String,
}
