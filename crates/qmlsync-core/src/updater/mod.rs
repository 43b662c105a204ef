//! Keeps the project storage in sync with the module directories on disk.
//!
//! A pass classifies every visited source with [`FileState`], parses only what
//! changed, collects the result in one [`SynchronizationPackage`] and commits
//! it with a single `synchronize` call. Watch registrations are only updated
//! after a successful commit.

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::file_status_cache::FileStatusCache;
use crate::ids::{ProjectPartId, SourceContextId, SourceId};
use crate::notifier::ErrorNotifier;
use crate::package::{NotUpdatedSourceIds, SynchronizationPackage};
use crate::parser::{QmlDocumentParser, QmlTypesParser, TypeAnnotationReader};
use crate::path_cache::PathCache;
use crate::set_algebra::sort_unique;
use crate::storage::ProjectStorage;
use crate::vfs::FileSystem;
use crate::watcher::{IdPaths, PathWatcher, SourceType, WatchedSourceIds};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

mod annotations;
mod components;
mod directory;
mod file_state;

#[cfg(test)]
mod tests;

pub use file_state::{classify, combine_state, FileState};

/// Everything the updater talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub file_system: Arc<dyn FileSystem>,
    pub path_cache: Arc<dyn PathCache>,
    pub storage: Arc<dyn ProjectStorage>,
    pub qml_types_parser: Arc<dyn QmlTypesParser>,
    pub qml_document_parser: Arc<dyn QmlDocumentParser>,
    pub type_annotation_reader: Arc<dyn TypeAnnotationReader>,
    pub path_watcher: Arc<dyn PathWatcher>,
    pub error_notifier: Arc<dyn ErrorNotifier>,
}

/// Input of a full update.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub project_part_id: ProjectPartId,
    /// Module root directories, walked recursively.
    pub directories: Vec<PathBuf>,
    /// Type information files that do not belong to a module directory.
    pub qml_types_paths: Vec<PathBuf>,
    pub property_editor_resources_path: Option<PathBuf>,
    pub type_annotation_paths: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PassStats {
    pub directories: usize,
    pub parsed_qml_types: usize,
    pub parsed_documents: usize,
    pub parsed_annotations: usize,
}

/// State collected while one pass runs.
#[derive(Default)]
pub(crate) struct PassState {
    pub package: SynchronizationPackage,
    pub not_updated: NotUpdatedSourceIds,
    pub watched: WatchedSourceIds,
    pub stats: PassStats,
}

pub struct ProjectStorageUpdater {
    file_system: Arc<dyn FileSystem>,
    path_cache: Arc<dyn PathCache>,
    storage: Arc<dyn ProjectStorage>,
    qml_types_parser: Arc<dyn QmlTypesParser>,
    qml_document_parser: Arc<dyn QmlDocumentParser>,
    type_annotation_reader: Arc<dyn TypeAnnotationReader>,
    path_watcher: Arc<dyn PathWatcher>,
    error_notifier: Arc<dyn ErrorNotifier>,
    file_status_cache: FileStatusCache,
    config: UpdaterConfig,
    pending: Vec<IdPaths>,
}

impl ProjectStorageUpdater {
    pub fn new(collaborators: Collaborators, config: UpdaterConfig) -> Self {
        Self {
            file_status_cache: FileStatusCache::new(collaborators.file_system.clone()),
            file_system: collaborators.file_system,
            path_cache: collaborators.path_cache,
            storage: collaborators.storage,
            qml_types_parser: collaborators.qml_types_parser,
            qml_document_parser: collaborators.qml_document_parser,
            type_annotation_reader: collaborators.type_annotation_reader,
            path_watcher: collaborators.path_watcher,
            error_notifier: collaborators.error_notifier,
            config,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn file_status_cache(&self) -> &FileStatusCache {
        &self.file_status_cache
    }

    /// Notifications kept for the next targeted pass.
    pub fn pending_id_paths(&self) -> &[IdPaths] {
        &self.pending
    }

    /// Full pass over everything in `update`.
    ///
    /// Parse failures abort the pass before anything is committed. A failed
    /// `synchronize` is returned as [`UpdateError::Storage`]; in both cases
    /// the watch registrations stay as they were.
    pub fn update(&mut self, update: Update) -> Result<(), UpdateError> {
        info!(
            "updating project part {:?}: {} directories, {} type information files",
            update.project_part_id,
            update.directories.len(),
            update.qml_types_paths.len()
        );

        self.file_status_cache.clear();
        let mut pass = PassState::default();

        for directory in &update.directories {
            self.update_directory(directory, &[], &mut pass)?;
        }

        self.update_qml_types_files(&update.qml_types_paths, &mut pass)?;

        if let Some(resources_path) = &update.property_editor_resources_path {
            self.update_property_editor_paths(resources_path, &mut pass);
        }

        self.update_type_annotations(&update.type_annotation_paths, &mut pass);

        let PassState {
            package,
            not_updated,
            watched,
            stats,
        } = pass;
        self.commit(package, not_updated)?;

        info!(
            "update finished: {} directories, {} type information files, {} documents, {} annotation files parsed",
            stats.directories, stats.parsed_qml_types, stats.parsed_documents, stats.parsed_annotations
        );

        self.path_watcher
            .update_id_paths(watched.into_id_paths(update.project_part_id));

        Ok(())
    }

    /// Targeted pass for sources the watcher reported as changed.
    ///
    /// Notifications are queued first and only dropped after a successful
    /// commit. A parse failure abandons the pass and keeps the queue; a
    /// failed `synchronize` is returned as an error and keeps the queue too.
    pub fn paths_with_ids_changed(&mut self, changed: &[IdPaths]) -> Result<(), UpdateError> {
        self.queue(changed);

        let mut reported: Vec<SourceId> = self
            .pending
            .iter()
            .flat_map(|id_paths| id_paths.source_ids.iter().copied())
            .collect();
        sort_unique(&mut reported);
        let modified = self.file_status_cache.modified(&reported);
        debug!(
            "{} sources reported, {} differ from the cached status",
            reported.len(),
            modified.len()
        );

        let part_ids: BTreeSet<ProjectPartId> =
            self.pending.iter().map(|id_paths| id_paths.id.part_id).collect();

        for part_id in part_ids {
            match self.update_changed_part(part_id) {
                Ok(()) => {}
                Err(err) if err.is_parse_failure() => {
                    warn!("abandoning targeted update: {err}");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        self.pending.clear();
        Ok(())
    }

    /// Merges `changed` into the pending notifications, one entry per chunk.
    fn queue(&mut self, changed: &[IdPaths]) {
        for id_paths in changed {
            match self
                .pending
                .binary_search_by(|pending| pending.id.cmp(&id_paths.id))
            {
                Ok(index) => {
                    let pending = &mut self.pending[index].source_ids;
                    pending.extend_from_slice(&id_paths.source_ids);
                    sort_unique(pending);
                }
                Err(index) => {
                    let mut id_paths = id_paths.clone();
                    sort_unique(&mut id_paths.source_ids);
                    self.pending.insert(index, id_paths);
                }
            }
        }
    }

    fn update_changed_part(&mut self, part_id: ProjectPartId) -> Result<(), UpdateError> {
        let mut directory_ids = Vec::new();
        let mut document_ids = Vec::new();
        let mut qml_types_ids = Vec::new();

        for id_paths in self.pending.iter().filter(|id_paths| id_paths.id.part_id == part_id) {
            match id_paths.id.source_type {
                SourceType::Directory | SourceType::QmlDir => directory_ids.extend(
                    id_paths
                        .source_ids
                        .iter()
                        .map(|source_id| source_id.context_id()),
                ),
                SourceType::Qml | SourceType::QmlUi => {
                    document_ids.extend_from_slice(&id_paths.source_ids)
                }
                SourceType::QmlTypes => qml_types_ids.extend_from_slice(&id_paths.source_ids),
            }
        }

        sort_unique(&mut directory_ids);
        sort_unique(&mut document_ids);
        sort_unique(&mut qml_types_ids);

        self.refresh_directory_entities(&directory_ids)?;
        let mut pass = PassState::default();

        for directory_id in &directory_ids {
            let directory_path = self.path_cache.source_context_path(*directory_id)?;
            self.update_directory(&directory_path, &directory_ids, &mut pass)?;
        }

        for source_id in outside_of(&document_ids, &directory_ids) {
            self.parse_qml_file(source_id, &mut pass)?;
        }

        for source_id in outside_of(&qml_types_ids, &directory_ids) {
            let Some(directory_info) = self.storage.fetch_directory_info(source_id) else {
                debug!("no directory info for type information file {source_id}");
                continue;
            };
            let path = self.path_cache.source_path(source_id)?;
            self.parse_type_info(directory_info, &path, &mut pass)?;
        }

        let PassState {
            package,
            not_updated,
            watched,
            ..
        } = pass;
        self.commit(package, not_updated)?;

        if !directory_ids.is_empty() {
            self.path_watcher
                .update_context_id_paths(watched.into_id_paths(part_id), &directory_ids);
        }

        Ok(())
    }

    fn commit(
        &mut self,
        mut package: SynchronizationPackage,
        not_updated: NotUpdatedSourceIds,
    ) -> Result<(), UpdateError> {
        package.finish(not_updated);
        debug!(
            "committing {} updated sources, {} types, {} directory infos",
            package.updated_source_ids.len(),
            package.types.len(),
            package.directory_infos.len()
        );

        self.storage.synchronize(package).map_err(|err| {
            error!("synchronizing the project storage failed: {err}");
            UpdateError::from(err)
        })
    }
}

/// Sources whose directory is not in `directory_ids` (sorted).
fn outside_of(source_ids: &[SourceId], directory_ids: &[SourceContextId]) -> Vec<SourceId> {
    source_ids
        .iter()
        .copied()
        .filter(|source_id| directory_ids.binary_search(&source_id.context_id()).is_err())
        .collect()
}
