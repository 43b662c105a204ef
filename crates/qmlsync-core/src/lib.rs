//! qmlsync Core Library
//!
//! Incremental synchronization of a QML project model with the module
//! directories on disk: change detection, directory walking and the
//! package of changes committed to the project storage.
//!

pub mod config;
pub mod error;
pub mod file_status_cache;
pub mod ids;
pub mod manifest;
pub mod model;
pub mod notifier;
pub mod package;
pub mod parser;
pub mod path_cache;
pub mod set_algebra;
pub mod storage;
pub mod updater;
pub mod vfs;
pub mod watcher;

pub use config::UpdaterConfig;
pub use error::UpdateError;
pub use file_status_cache::FileStatusCache;
pub use ids::{ModuleId, ProjectPartId, SourceContextId, SourceId};
pub use package::SynchronizationPackage;
pub use path_cache::{PathCache, SourcePathCache};
pub use storage::{MemoryProjectStorage, ProjectStorage};
pub use updater::{Collaborators, FileState, ProjectStorageUpdater, Update};
pub use vfs::{FileSystem, PhysicalFileSystem};
pub use watcher::{IdPaths, PathWatcher, WatchRegistry};
