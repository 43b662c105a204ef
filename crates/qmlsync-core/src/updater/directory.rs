use super::components::ComponentScope;
use super::file_state::{combine_state, FileState};
use super::{PassState, ProjectStorageUpdater};
use crate::error::UpdateError;
use crate::ids::{ModuleId, SourceContextId, SourceId};
use crate::manifest::Manifest;
use crate::model::{DirectoryInfo, FileType, Import, ModuleExportedImport, ModuleKind};
use crate::parser::ParseError;
use crate::set_algebra::{set_greedy_difference, set_union, sort_unique};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Module ids a manifest `module` line stands for.
#[derive(Debug, Clone, Copy)]
pub(super) struct ManifestModules {
    pub qml: ModuleId,
    pub cpp: ModuleId,
}

/// What `update_directory` learned about one directory.
struct DirectoryStates {
    directory: FileState,
    manifest: FileState,
    annotations: FileState,
}

impl ProjectStorageUpdater {
    pub(super) fn update_directory(
        &mut self,
        directory_path: &Path,
        ignored: &[SourceContextId],
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        let directory_id = self.path_cache.source_context_id(directory_path);
        let directory_source_id = SourceId::for_directory(directory_id);
        let manifest_source_id = self
            .path_cache
            .source_id_in(directory_id, &self.config.manifest_file_name);
        let annotation_path = directory_path.join(&self.config.annotation_directory_name);
        let annotation_directory_id = self.path_cache.source_context_id(&annotation_path);

        let states = DirectoryStates {
            directory: self.file_state(directory_source_id, pass),
            manifest: self.file_state(manifest_source_id, pass),
            annotations: self.file_state(SourceId::for_directory(annotation_directory_id), pass),
        };
        debug!(
            "directory {} is {:?}, manifest {:?}, annotations {:?}",
            directory_path.display(),
            states.directory,
            states.manifest,
            states.annotations
        );

        pass.stats.directories += 1;
        pass.watched.directory_ids.push(directory_source_id);
        pass.watched.qmldir_source_ids.push(manifest_source_id);

        let mut rows_replaced = false;
        match states.directory {
            FileState::Removed => {
                self.update_directory_removed(directory_id, manifest_source_id, &annotation_path, pass);
                rows_replaced = true;
            }
            FileState::NotExists | FileState::NotExistsUnchanged => return Ok(()),
            _ => match combine_state(&[states.directory, states.manifest, states.annotations]) {
                FileState::Added | FileState::Changed => {
                    self.update_directory_changed(
                        directory_path,
                        directory_id,
                        manifest_source_id,
                        &states,
                        pass,
                    )?;
                    if states.annotations.is_changed() {
                        self.update_type_annotations(&[annotation_path], pass);
                    }
                    rows_replaced = true;
                }
                FileState::Unchanged => self.update_directory_unchanged(directory_id, pass)?,
                _ => {}
            },
        }

        self.update_subdirectories(directory_path, directory_id, rows_replaced, ignored, pass)
    }

    /// Re-reads the statuses a directory pass classifies besides the files
    /// the watcher reports: the directory, its manifest and its annotation
    /// directory. The latter is never watched on its own.
    pub(super) fn refresh_directory_entities(
        &mut self,
        directory_ids: &[SourceContextId],
    ) -> Result<(), UpdateError> {
        let mut source_ids = Vec::with_capacity(directory_ids.len() * 3);

        for directory_id in directory_ids {
            let directory_path = self.path_cache.source_context_path(*directory_id)?;
            let annotation_directory_id = self
                .path_cache
                .source_context_id(&directory_path.join(&self.config.annotation_directory_name));

            source_ids.push(SourceId::for_directory(*directory_id));
            source_ids.push(
                self.path_cache
                    .source_id_in(*directory_id, &self.config.manifest_file_name),
            );
            source_ids.push(SourceId::for_directory(annotation_directory_id));
        }

        sort_unique(&mut source_ids);
        self.file_status_cache.update(&source_ids);
        Ok(())
    }

    fn update_directory_changed(
        &mut self,
        directory_path: &Path,
        directory_id: SourceContextId,
        manifest_source_id: SourceId,
        states: &DirectoryStates,
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        let manifest = if states.manifest.is_existing() {
            self.read_manifest(&directory_path.join(&self.config.manifest_file_name))
        } else {
            Manifest::default()
        };

        let modules = manifest.module_name.as_deref().map(|name| ManifestModules {
            qml: self.storage.module_id(name, ModuleKind::QmlLibrary),
            cpp: self.storage.module_id(name, ModuleKind::CppLibrary),
        });
        let path_module_id = self
            .storage
            .module_id(&directory_path.to_string_lossy(), ModuleKind::PathLibrary);

        if states.manifest.is_changed() {
            self.update_manifest_imports(&manifest, modules, manifest_source_id, pass);
        }

        let mut rows = Vec::new();

        for type_info in &manifest.type_infos {
            let source_id = self.path_cache.source_id_in(directory_id, type_info);
            let module_id = modules.map(|modules| modules.cpp);
            let directory_info =
                DirectoryInfo::new(directory_id, source_id, module_id, FileType::QmlTypes);
            pass.watched.qmltypes_source_ids.push(source_id);
            self.parse_type_info(directory_info, &directory_path.join(type_info), pass)?;
            rows.push(directory_info);
        }

        let scope = ComponentScope {
            directory_path,
            directory_id,
            manifest: &manifest,
            modules,
            path_module_id,
            manifest_source_id,
            manifest_state: states.manifest,
        };
        rows.extend(self.update_components(&scope, pass)?);

        rows.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        rows.dedup_by_key(|row| row.source_id);
        self.remove_stale_rows(directory_id, &rows, pass);

        pass.package.directory_infos.extend(rows);
        pass.package.updated_directory_info_directory_ids.push(directory_id);

        Ok(())
    }

    /// Re-emits the stored rows and only looks at the files behind them.
    fn update_directory_unchanged(
        &mut self,
        directory_id: SourceContextId,
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        let rows = self.storage.fetch_directory_infos(directory_id);

        for row in &rows {
            match row.file_type {
                FileType::QmlTypes => {
                    pass.watched.qmltypes_source_ids.push(row.source_id);
                    let path = self.path_cache.source_path(row.source_id)?;
                    self.parse_type_info(*row, &path, pass)?;
                }
                FileType::QmlDocument => {
                    self.watch_document(row.source_id, pass);
                    self.parse_qml_file(row.source_id, pass)?;
                }
                FileType::Directory => {}
            }
        }

        pass.package.directory_infos.extend(rows);
        Ok(())
    }

    fn update_directory_removed(
        &mut self,
        directory_id: SourceContextId,
        manifest_source_id: SourceId,
        annotation_path: &Path,
        pass: &mut PassState,
    ) {
        debug!("directory {directory_id:?} was removed");

        for row in self.storage.fetch_directory_infos(directory_id) {
            if row.file_type != FileType::Directory {
                pass.package.updated_source_ids.push(row.source_id);
                pass.package.updated_file_status_source_ids.push(row.source_id);
            }
        }

        let package = &mut pass.package;
        package.updated_directory_info_directory_ids.push(directory_id);
        package.updated_module_dependency_source_ids.push(manifest_source_id);
        package.updated_module_exported_import_source_ids.push(manifest_source_id);

        self.update_type_annotations(&[annotation_path.to_path_buf()], pass);
        self.file_status_cache.remove_contexts(&[directory_id]);
    }

    fn update_subdirectories(
        &mut self,
        directory_path: &Path,
        directory_id: SourceContextId,
        rows_replaced: bool,
        ignored: &[SourceContextId],
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        let mut existing: Vec<(SourceContextId, PathBuf)> = self
            .file_system
            .subdirectories(directory_path)
            .into_iter()
            .map(|path| (self.path_cache.source_context_id(&path), path))
            .collect();
        existing.sort_by_key(|(id, _)| *id);

        let mut stored = Vec::new();
        for id in self.storage.fetch_subdirectory_ids(directory_id) {
            stored.push((id, self.path_cache.source_context_path(id)?));
        }

        if rows_replaced {
            for (id, path) in &existing {
                if !self.config.is_skipped_directory(path) {
                    pass.package.directory_infos.push(DirectoryInfo::new(
                        directory_id,
                        SourceId::for_directory(*id),
                        None,
                        FileType::Directory,
                    ));
                }
            }
        }

        let subdirectories = set_union(existing, stored, |a, b| a.0.cmp(&b.0));
        for (id, path) in subdirectories {
            if self.config.is_skipped_directory(&path) || ignored.binary_search(&id).is_ok() {
                continue;
            }
            self.update_directory(&path, ignored, pass)?;
        }

        Ok(())
    }

    fn update_manifest_imports(
        &self,
        manifest: &Manifest,
        modules: Option<ManifestModules>,
        manifest_source_id: SourceId,
        pass: &mut PassState,
    ) {
        let package = &mut pass.package;
        package.updated_module_dependency_source_ids.push(manifest_source_id);
        package.updated_module_exported_import_source_ids.push(manifest_source_id);

        let mut dependencies: Vec<Import> = manifest
            .dependencies
            .iter()
            .chain(&manifest.imports)
            .map(|dependency| Import {
                module_id: self.storage.module_id(&dependency.module, ModuleKind::CppLibrary),
                version: dependency.version.version(),
                source_id: manifest_source_id,
            })
            .collect();
        sort_unique(&mut dependencies);
        package.module_dependencies.extend(dependencies);

        let Some(modules) = modules else {
            return;
        };

        for import in &manifest.imports {
            let pairs = [
                (modules.qml, ModuleKind::QmlLibrary),
                (modules.cpp, ModuleKind::CppLibrary),
            ];
            for (module_id, kind) in pairs {
                package.module_exported_imports.push(ModuleExportedImport {
                    module_id,
                    exported_module_id: self.storage.module_id(&import.module, kind),
                    version: import.version.version(),
                    is_auto_version: import.version.is_auto(),
                    source_id: manifest_source_id,
                });
            }
        }
    }

    /// Drops stored rows of `directory_id` that the fresh `rows` (sorted by
    /// source id) no longer contain.
    fn remove_stale_rows(
        &mut self,
        directory_id: SourceContextId,
        rows: &[DirectoryInfo],
        pass: &mut PassState,
    ) {
        let stored: Vec<DirectoryInfo> = self
            .storage
            .fetch_directory_infos(directory_id)
            .into_iter()
            .filter(|row| row.file_type != FileType::Directory)
            .collect();

        let mut removed = Vec::new();
        set_greedy_difference(
            stored,
            rows,
            |stored, row| stored.source_id.cmp(&row.source_id),
            |stale| removed.push(stale.source_id),
        );

        if removed.is_empty() {
            return;
        }

        debug!("{} stale rows in directory {directory_id:?}", removed.len());
        pass.package.updated_source_ids.extend_from_slice(&removed);
        pass.package
            .updated_file_status_source_ids
            .extend_from_slice(&removed);
        self.file_status_cache.remove(&removed);
    }

    /// Classifies a type information file and parses it when it changed.
    pub(super) fn parse_type_info(
        &mut self,
        directory_info: DirectoryInfo,
        path: &Path,
        pass: &mut PassState,
    ) -> Result<FileState, UpdateError> {
        let source_id = directory_info.source_id;
        let state = self.file_state(source_id, pass);

        match state {
            FileState::Added | FileState::Changed => {
                pass.package.updated_source_ids.push(source_id);
                let content = self.file_system.content_as_string(path).map_err(|err| {
                    UpdateError::CannotParseQmlTypesFile {
                        path: path.to_path_buf(),
                        source: ParseError::new(format!("cannot read file: {err}")),
                    }
                })?;

                self.qml_types_parser
                    .parse(
                        &content,
                        &mut pass.package.imports,
                        &mut pass.package.types,
                        &directory_info,
                    )
                    .map_err(|source| UpdateError::CannotParseQmlTypesFile {
                        path: path.to_path_buf(),
                        source,
                    })?;
                pass.stats.parsed_qml_types += 1;
            }
            FileState::Unchanged => pass.not_updated.source_ids.push(source_id),
            FileState::Removed => {
                pass.package.updated_source_ids.push(source_id);
                self.error_notifier.qml_types_file_missing(path);
            }
            FileState::NotExists | FileState::NotExistsUnchanged => {
                self.error_notifier.qml_types_file_missing(path);
            }
        }

        Ok(state)
    }

    /// Type information files registered on their own. They belong to the
    /// builtin module and keep their row as long as they exist.
    pub(super) fn update_qml_types_files(
        &mut self,
        paths: &[PathBuf],
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        if paths.is_empty() {
            return Ok(());
        }

        let module_id = self
            .storage
            .module_id(&self.config.builtin_module_name, ModuleKind::CppLibrary);

        for path in paths {
            let source_id = self.path_cache.source_id(path);
            let directory_info = DirectoryInfo::new(
                source_id.context_id(),
                source_id,
                Some(module_id),
                FileType::QmlTypes,
            );
            pass.watched.qmltypes_source_ids.push(source_id);

            if self.parse_type_info(directory_info, path, pass)?.is_changed_or_added() {
                pass.package.directory_infos.push(directory_info);
            }
        }

        Ok(())
    }

    fn read_manifest(&self, path: &Path) -> Manifest {
        match self.file_system.content_as_string(path) {
            Ok(content) => Manifest::parse(&content),
            Err(err) => {
                warn!("cannot read manifest {}: {err}", path.display());
                Manifest::default()
            }
        }
    }
}
