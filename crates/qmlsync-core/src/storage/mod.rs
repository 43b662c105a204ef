//! The persistent project model the updater writes to.

mod memory;

pub use memory::MemoryProjectStorage;

use crate::ids::{ModuleId, SourceContextId, SourceId};
use crate::model::{DirectoryInfo, FileStatus, FileType, ModuleKind};
use crate::package::SynchronizationPackage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("type name {name:?} does not exist")]
    TypeNameDoesNotExist { name: String },
    #[error("module {0:?} does not exist")]
    ModuleDoesNotExist(ModuleId),
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("incompatible snapshot version {found}, expected {expected}")]
    IncompatibleSnapshotVersion { found: u32, expected: u32 },
}

/// Read accessors plus one atomic mutator.
///
/// `synchronize` applies a whole package or nothing: when it returns an error
/// the stored state is the one from before the call.
pub trait ProjectStorage: Send + Sync {
    fn fetch_file_status(&self, source_id: SourceId) -> Option<FileStatus>;

    /// Rows of one directory, sorted by source id.
    fn fetch_directory_infos(&self, directory_id: SourceContextId) -> Vec<DirectoryInfo>;

    fn fetch_directory_infos_of_type(
        &self,
        directory_id: SourceContextId,
        file_type: FileType,
    ) -> Vec<DirectoryInfo> {
        self.fetch_directory_infos(directory_id)
            .into_iter()
            .filter(|info| info.file_type == file_type)
            .collect()
    }

    fn fetch_directory_info(&self, source_id: SourceId) -> Option<DirectoryInfo>;

    /// Sorted ids of the subdirectories recorded for `directory_id`.
    fn fetch_subdirectory_ids(&self, directory_id: SourceContextId) -> Vec<SourceContextId> {
        let mut ids: Vec<SourceContextId> = self
            .fetch_directory_infos_of_type(directory_id, FileType::Directory)
            .into_iter()
            .map(|info| info.source_id.context_id())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Looks up a module, allocating a new id the first time a name/kind pair
    /// is seen.
    fn module_id(&self, name: &str, kind: ModuleKind) -> ModuleId;

    /// Sorted ids of every directory that holds stored type annotations.
    fn type_annotation_directory_ids(&self) -> Vec<SourceContextId>;

    /// Sorted annotation file ids stored for one directory.
    fn type_annotation_source_ids(&self, directory_id: SourceContextId) -> Vec<SourceId>;

    fn synchronize(&self, package: SynchronizationPackage) -> Result<(), StorageError>;
}
