use crate::ids::SourceId;
use crate::model::FileStatus;
use crate::path_cache::PathCache;
use glob::Pattern;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Abstract interface for file system operations.
///
/// Querying a missing path is not an error: `file_status` reports a
/// not-existing status and the listing methods return nothing.
pub trait FileSystem: Send + Sync {
    fn file_status(&self, source_id: SourceId) -> FileStatus;

    fn last_modified(&self, source_id: SourceId) -> Option<SystemTime> {
        self.file_status(source_id).last_modified()
    }

    fn content_as_string(&self, path: &Path) -> io::Result<String>;

    /// Sorted names of the regular files directly inside `directory` whose
    /// name matches one of the glob `patterns`.
    fn file_names(&self, directory: &Path, patterns: &[String]) -> Vec<String>;

    /// Sorted direct subdirectories of `directory`.
    fn subdirectories(&self, directory: &Path) -> Vec<PathBuf>;

    /// Every directory below `root`, `root` itself excluded.
    fn directory_tree(&self, root: &Path) -> Vec<PathBuf>;

    /// Every regular file below `root` whose name matches one of `patterns`.
    fn files_recursive(&self, root: &Path, patterns: &[String]) -> Vec<PathBuf>;

    fn remove(&self, source_ids: &[SourceId]);
}

/// Standard implementation of FileSystem using std::fs and walkdir.
pub struct PhysicalFileSystem {
    path_cache: Arc<dyn PathCache>,
}

impl PhysicalFileSystem {
    pub fn new(path_cache: Arc<dyn PathCache>) -> Self {
        Self { path_cache }
    }
}

impl FileSystem for PhysicalFileSystem {
    fn file_status(&self, source_id: SourceId) -> FileStatus {
        let path = match self.path_cache.source_path(source_id) {
            Ok(path) => path,
            Err(error) => {
                debug!("no path for {source_id}: {error}");
                return FileStatus::not_existing(source_id);
            }
        };

        match std::fs::metadata(&path).and_then(|metadata| Ok((metadata.len(), metadata.modified()?))) {
            Ok((size, last_modified)) => FileStatus::new(source_id, size, last_modified),
            Err(_) => FileStatus::not_existing(source_id),
        }
    }

    fn content_as_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn file_names(&self, directory: &Path, patterns: &[String]) -> Vec<String> {
        let patterns = compile_patterns(patterns);
        let Ok(entries) = std::fs::read_dir(directory) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| matches_any(&patterns, name))
            .collect();

        names.sort();
        names
    }

    fn subdirectories(&self, directory: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(directory) else {
            return Vec::new();
        };

        let mut directories: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();

        directories.sort();
        directories
    }

    fn directory_tree(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect()
    }

    fn files_recursive(&self, root: &Path, patterns: &[String]) -> Vec<PathBuf> {
        let patterns = compile_patterns(patterns);

        WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| matches_any(&patterns, name))
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    fn remove(&self, source_ids: &[SourceId]) {
        for source_id in source_ids {
            let Ok(path) = self.path_cache.source_path(*source_id) else {
                continue;
            };

            if let Err(error) = std::fs::remove_file(&path) {
                warn!("cannot remove {}: {error}", path.display());
            }
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Pattern::new(pattern) {
            Ok(pattern) => Some(pattern),
            Err(error) => {
                warn!("ignoring invalid file pattern {pattern:?}: {error}");
                None
            }
        })
        .collect()
}

fn matches_any(patterns: &[Pattern], file_name: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(file_name))
}
