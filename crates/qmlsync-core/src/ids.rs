use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one directory, allocated by the path cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceContextId(pub u32);

/// Identifier of one file name inside any directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileNameId(pub u32);

/// Stable identifier of a single file or directory.
///
/// Ordering is by directory context first and file name second, so all
/// entries of one directory are adjacent in any sorted collection and the
/// directory itself (no file name) sorts before its files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId {
    context: SourceContextId,
    file_name: Option<FileNameId>,
}

impl SourceId {
    pub const fn new(context: SourceContextId, file_name: FileNameId) -> Self {
        Self {
            context,
            file_name: Some(file_name),
        }
    }

    /// The source id standing for the directory entity itself.
    pub const fn for_directory(context: SourceContextId) -> Self {
        Self {
            context,
            file_name: None,
        }
    }

    pub const fn context_id(&self) -> SourceContextId {
        self.context
    }

    pub const fn file_name_id(&self) -> Option<FileNameId> {
        self.file_name
    }

    pub const fn is_directory(&self) -> bool {
        self.file_name.is_none()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_name {
            Some(file_name) => write!(f, "{}:{}", self.context.0, file_name.0),
            None => write!(f, "{}:-", self.context.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// Identifies a separately registered group of roots (e.g. the Qt install vs
/// the user project).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ProjectPartId(pub u32);
