use crate::ids::{FileNameId, SourceContextId, SourceId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathCacheError {
    #[error("no directory is registered for source context id {0:?}")]
    UnknownSourceContextId(SourceContextId),
    #[error("no file name is registered for file name id {0:?}")]
    UnknownFileNameId(FileNameId),
}

/// Bidirectional mapping between filesystem paths and stable ids.
///
/// Ids are never freed: once a path got an id, the same path yields the same
/// id for the lifetime of the cache.
pub trait PathCache: Send + Sync {
    fn source_context_id(&self, directory_path: &Path) -> SourceContextId;

    fn source_id_in(&self, directory_id: SourceContextId, file_name: &str) -> SourceId;

    fn source_context_path(&self, directory_id: SourceContextId) -> Result<PathBuf, PathCacheError>;

    fn source_path(&self, source_id: SourceId) -> Result<PathBuf, PathCacheError>;

    /// Id of a file given by its full path.
    fn source_id(&self, file_path: &Path) -> SourceId {
        match (file_path.parent(), file_path.file_name()) {
            (Some(directory), Some(file_name)) => {
                let directory_id = self.source_context_id(directory);
                self.source_id_in(directory_id, &file_name.to_string_lossy())
            }
            _ => SourceId::for_directory(self.source_context_id(file_path)),
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    directory_to_id: HashMap<PathBuf, SourceContextId>,
    directories: Vec<PathBuf>,
    file_name_to_id: HashMap<String, FileNameId>,
    file_names: Vec<String>,
}

/// Process-wide path registry. Safe to share between the updater, the file
/// system and a watcher thread.
#[derive(Debug, Default)]
pub struct SourcePathCache {
    registry: RwLock<Registry>,
}

impl SourcePathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory_count(&self) -> usize {
        self.registry.read().directories.len()
    }

    fn file_name_id(&self, file_name: &str) -> FileNameId {
        if let Some(id) = self.registry.read().file_name_to_id.get(file_name) {
            return *id;
        }

        let mut registry = self.registry.write();
        if let Some(id) = registry.file_name_to_id.get(file_name) {
            return *id;
        }

        let id = FileNameId(next_id(registry.file_names.len()));
        registry.file_names.push(file_name.to_string());
        registry.file_name_to_id.insert(file_name.to_string(), id);
        id
    }

    fn file_name(&self, id: FileNameId) -> Result<String, PathCacheError> {
        let registry = self.registry.read();
        index_of(id.0)
            .and_then(|index| registry.file_names.get(index))
            .cloned()
            .ok_or(PathCacheError::UnknownFileNameId(id))
    }
}

impl PathCache for SourcePathCache {
    fn source_context_id(&self, directory_path: &Path) -> SourceContextId {
        let directory_path = normalize_path(directory_path);

        if let Some(id) = self.registry.read().directory_to_id.get(&directory_path) {
            return *id;
        }

        let mut registry = self.registry.write();
        if let Some(id) = registry.directory_to_id.get(&directory_path) {
            return *id;
        }

        let id = SourceContextId(next_id(registry.directories.len()));
        registry.directories.push(directory_path.clone());
        registry.directory_to_id.insert(directory_path, id);
        id
    }

    fn source_id_in(&self, directory_id: SourceContextId, file_name: &str) -> SourceId {
        SourceId::new(directory_id, self.file_name_id(file_name))
    }

    fn source_context_path(&self, directory_id: SourceContextId) -> Result<PathBuf, PathCacheError> {
        let registry = self.registry.read();
        index_of(directory_id.0)
            .and_then(|index| registry.directories.get(index))
            .cloned()
            .ok_or(PathCacheError::UnknownSourceContextId(directory_id))
    }

    fn source_path(&self, source_id: SourceId) -> Result<PathBuf, PathCacheError> {
        let directory = self.source_context_path(source_id.context_id())?;
        match source_id.file_name_id() {
            Some(file_name_id) => Ok(directory.join(self.file_name(file_name_id)?)),
            None => Ok(directory),
        }
    }
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len + 1).unwrap_or(u32::MAX)
}

fn index_of(id: u32) -> Option<usize> {
    usize::try_from(id).ok()?.checked_sub(1)
}

/// Lexically removes `.` components and resolves `..` against the preceding
/// component. Symlinks are not followed.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }

    normalized
}
