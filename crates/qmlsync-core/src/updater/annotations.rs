use super::file_state::FileState;
use super::{PassState, ProjectStorageUpdater};
use crate::ids::{SourceContextId, SourceId};
use crate::model::{ModuleKind, PropertyEditorQmlPath};
use crate::set_algebra::set_greedy_difference;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

impl ProjectStorageUpdater {
    /// Rescans the annotation files below `roots`.
    ///
    /// Directories that already hold stored annotations are visited even when
    /// they are gone, so that their vanished files are dropped.
    pub(super) fn update_type_annotations(&mut self, roots: &[PathBuf], pass: &mut PassState) {
        if roots.is_empty() {
            return;
        }

        let mut directories: BTreeMap<SourceContextId, Vec<SourceId>> = BTreeMap::new();

        for directory_id in self.storage.type_annotation_directory_ids() {
            let Ok(path) = self.path_cache.source_context_path(directory_id) else {
                continue;
            };
            if roots.iter().any(|root| path.starts_with(root)) {
                directories.entry(directory_id).or_default();
            }
        }

        for root in roots {
            for path in self
                .file_system
                .files_recursive(root, &self.config.type_annotation_patterns)
            {
                let (Some(directory), Some(file_name)) = (path.parent(), path.file_name()) else {
                    continue;
                };
                let directory_id = self.path_cache.source_context_id(directory);
                let source_id = self
                    .path_cache
                    .source_id_in(directory_id, &file_name.to_string_lossy());
                directories.entry(directory_id).or_default().push(source_id);
            }
        }

        for (directory_id, mut source_ids) in directories {
            source_ids.sort_unstable();
            source_ids.dedup();
            self.update_type_annotation_directory(directory_id, &source_ids, pass);
        }
    }

    fn update_type_annotation_directory(
        &mut self,
        directory_id: SourceContextId,
        source_ids: &[SourceId],
        pass: &mut PassState,
    ) {
        let directory_state = self.file_state(SourceId::for_directory(directory_id), pass);

        if directory_state != FileState::Unchanged {
            let stored = self.storage.type_annotation_source_ids(directory_id);
            set_greedy_difference(
                stored,
                source_ids,
                |stored, found| stored.cmp(found),
                |vanished| {
                    pass.package.updated_type_annotation_source_ids.push(vanished);
                    pass.package.updated_file_status_source_ids.push(vanished);
                },
            );
        }

        let Ok(directory_path) = self.path_cache.source_context_path(directory_id) else {
            return;
        };

        for source_id in source_ids {
            self.update_type_annotation(*source_id, directory_id, &directory_path, pass);
        }
    }

    fn update_type_annotation(
        &mut self,
        source_id: SourceId,
        directory_id: SourceContextId,
        directory_path: &Path,
        pass: &mut PassState,
    ) {
        if !self.file_state(source_id, pass).is_changed_or_added() {
            return;
        }

        pass.package.updated_type_annotation_source_ids.push(source_id);

        let path = match self.path_cache.source_path(source_id) {
            Ok(path) => path,
            Err(err) => {
                warn!("cannot resolve annotation file {source_id}: {err}");
                return;
            }
        };

        let parsed = self
            .file_system
            .content_as_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|content| {
                self.type_annotation_reader
                    .parse(
                        &content,
                        directory_path,
                        source_id,
                        directory_id,
                        self.storage.as_ref(),
                    )
                    .map_err(|err| err.to_string())
            });

        match parsed {
            Ok(annotations) => {
                pass.stats.parsed_annotations += 1;
                pass.package.type_annotations.extend(annotations);
            }
            Err(err) => warn!("skipping type annotations in {}: {err}", path.display()),
        }
    }

    /// Collects `*Pane.qml` and `*Specifics.qml` documents below `root` for
    /// every directory that changed since the last pass.
    pub(super) fn update_property_editor_paths(&mut self, root: &Path, pass: &mut PassState) {
        let directories =
            std::iter::once(root.to_path_buf()).chain(self.file_system.directory_tree(root));

        for directory in directories {
            let directory_id = self.path_cache.source_context_id(&directory);
            let state = self.file_state(SourceId::for_directory(directory_id), pass);

            if state.is_changed() {
                self.update_property_editor_path(root, &directory, directory_id, pass);
            }
        }
    }

    fn update_property_editor_path(
        &mut self,
        root: &Path,
        directory: &Path,
        directory_id: SourceContextId,
        pass: &mut PassState,
    ) {
        pass.package
            .updated_property_editor_qml_path_directory_ids
            .push(directory_id);

        let Some(module_name) = property_editor_module_name(root, directory) else {
            return;
        };
        let module_id = self.storage.module_id(&module_name, ModuleKind::QmlLibrary);

        for file_name in self
            .file_system
            .file_names(directory, &self.config.property_editor_patterns)
        {
            let Some(type_name) = property_editor_type_name(&file_name) else {
                continue;
            };
            debug!("property editor for {module_name}.{type_name} in {file_name}");

            pass.package
                .property_editor_qml_paths
                .push(PropertyEditorQmlPath {
                    module_id,
                    type_name: type_name.to_string(),
                    path_id: self.path_cache.source_id_in(directory_id, &file_name),
                    directory_id,
                });
        }
    }
}

/// `QtQuick/Controls` below the resources root becomes `QtQuick.Controls`.
fn property_editor_module_name(root: &Path, directory: &Path) -> Option<String> {
    let relative = directory.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// `ButtonPane.qml` and `ButtonSpecifics.qml` both describe `Button`.
fn property_editor_type_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".qml")?;
    stem.strip_suffix("Pane")
        .or_else(|| stem.strip_suffix("Specifics"))
        .filter(|type_name| !type_name.is_empty())
}
