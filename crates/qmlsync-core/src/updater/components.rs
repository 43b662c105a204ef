use super::directory::ManifestModules;
use super::file_state::FileState;
use super::{PassState, ProjectStorageUpdater};
use crate::error::UpdateError;
use crate::ids::{ModuleId, SourceContextId, SourceId};
use crate::manifest::{Manifest, ManifestComponent};
use crate::model::{ChangeLevel, DirectoryInfo, ExportedType, FileType, Type, Version};
use crate::parser::ParseError;
use std::collections::BTreeMap;
use std::path::Path;

/// The directory a set of documents is read in.
pub(super) struct ComponentScope<'a> {
    pub directory_path: &'a Path,
    pub directory_id: SourceContextId,
    pub manifest: &'a Manifest,
    pub modules: Option<ManifestModules>,
    pub path_module_id: ModuleId,
    pub manifest_source_id: SourceId,
    pub manifest_state: FileState,
}

impl ProjectStorageUpdater {
    /// Handles every document of a changed directory: the ones on disk and
    /// the ones the manifest names. Returns a row per existing document.
    pub(super) fn update_components(
        &mut self,
        scope: &ComponentScope<'_>,
        pass: &mut PassState,
    ) -> Result<Vec<DirectoryInfo>, UpdateError> {
        let mut documents: BTreeMap<String, Vec<&ManifestComponent>> = self
            .file_system
            .file_names(scope.directory_path, &self.config.document_patterns)
            .into_iter()
            .map(|file_name| (file_name, Vec::new()))
            .collect();

        for component in &scope.manifest.components {
            if component.file_name.contains('/') {
                continue;
            }
            documents
                .entry(component.file_name.clone())
                .or_default()
                .push(component);
        }

        let mut rows = Vec::new();
        for (file_name, components) in &documents {
            if let Some(row) = self.parse_qml_component(scope, file_name, components, pass)? {
                rows.push(row);
            }
        }

        Ok(rows)
    }

    fn parse_qml_component(
        &mut self,
        scope: &ComponentScope<'_>,
        file_name: &str,
        components: &[&ManifestComponent],
        pass: &mut PassState,
    ) -> Result<Option<DirectoryInfo>, UpdateError> {
        let source_id = self.path_cache.source_id_in(scope.directory_id, file_name);
        self.watch_document(source_id, pass);

        let state = self.file_state(source_id, pass);
        let type_name = document_type_name(file_name);

        let mut exported_types = vec![ExportedType::new(
            scope.path_module_id,
            type_name,
            Version::default(),
        )];
        if let Some(modules) = scope.modules {
            exported_types.extend(
                components
                    .iter()
                    .filter(|component| !component.is_internal)
                    .map(|component| {
                        ExportedType::new(modules.qml, component.type_name.as_str(), component.version)
                    }),
            );
        }
        exported_types.sort();
        exported_types.dedup();
        let is_singleton = components.iter().any(|component| component.is_singleton);

        match state {
            FileState::NotExists | FileState::NotExistsUnchanged | FileState::Removed => {
                if state == FileState::Removed {
                    pass.package.updated_source_ids.push(source_id);
                }
                for component in components {
                    self.error_notifier.qml_document_does_not_exist_for_manifest_entry(
                        &component.type_name,
                        component.version,
                        source_id,
                        scope.manifest_source_id,
                    );
                }
                return Ok(None);
            }
            FileState::Added | FileState::Changed => {
                pass.package.updated_source_ids.push(source_id);
                let path = scope.directory_path.join(file_name);
                let mut parsed = self.read_document(&path, source_id, pass)?;
                parsed.type_name = type_name.to_string();
                parsed.exported_types = exported_types;
                parsed.is_singleton |= is_singleton;
                parsed.change_level = ChangeLevel::Full;
                pass.package.types.push(parsed);
            }
            FileState::Unchanged => {
                pass.not_updated.source_ids.push(source_id);
                if scope.manifest_state.is_changed() {
                    let mut minimal = Type::new(type_name, source_id);
                    minimal.exported_types = exported_types;
                    minimal.is_singleton = is_singleton;
                    minimal.change_level = ChangeLevel::Minimal;
                    pass.package.types.push(minimal);
                }
            }
        }

        Ok(Some(DirectoryInfo::new(
            scope.directory_id,
            source_id,
            Some(scope.path_module_id),
            FileType::QmlDocument,
        )))
    }

    /// Re-parses one document without touching its directory. The stored
    /// exported types are kept.
    pub(super) fn parse_qml_file(
        &mut self,
        source_id: SourceId,
        pass: &mut PassState,
    ) -> Result<(), UpdateError> {
        match self.file_state(source_id, pass) {
            FileState::Added | FileState::Changed => {
                pass.package.updated_source_ids.push(source_id);
                let path = self.path_cache.source_path(source_id)?;
                let mut parsed = self.read_document(&path, source_id, pass)?;
                if let Some(file_name) = path.file_name() {
                    parsed.type_name = document_type_name(&file_name.to_string_lossy()).to_string();
                }
                parsed.change_level = ChangeLevel::ExcludeExportedTypes;
                pass.package.types.push(parsed);
            }
            FileState::Removed | FileState::NotExists => {
                pass.package.updated_source_ids.push(source_id)
            }
            FileState::Unchanged | FileState::NotExistsUnchanged => {
                pass.not_updated.source_ids.push(source_id)
            }
        }

        Ok(())
    }

    fn read_document(
        &self,
        path: &Path,
        source_id: SourceId,
        pass: &mut PassState,
    ) -> Result<Type, UpdateError> {
        let content = self.file_system.content_as_string(path).map_err(|err| {
            UpdateError::CannotParseQmlDocumentFile {
                path: path.to_path_buf(),
                source: ParseError::new(format!("cannot read file: {err}")),
            }
        })?;
        let directory_path = path.parent().unwrap_or(path);

        let mut parsed = self
            .qml_document_parser
            .parse(&content, &mut pass.package.imports, source_id, directory_path)
            .map_err(|source| UpdateError::CannotParseQmlDocumentFile {
                path: path.to_path_buf(),
                source,
            })?;
        parsed.source_id = source_id;
        pass.stats.parsed_documents += 1;

        Ok(parsed)
    }

    pub(super) fn watch_document(&self, source_id: SourceId, pass: &mut PassState) {
        let is_ui_document = self
            .path_cache
            .source_path(source_id)
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().ends_with(".ui.qml")))
            .unwrap_or(false);

        if is_ui_document {
            pass.watched.qml_ui_source_ids.push(source_id);
        } else {
            pass.watched.qml_source_ids.push(source_id);
        }
    }
}

/// `Button.qml` and `Button.ui.qml` both define `Button`.
fn document_type_name(file_name: &str) -> &str {
    file_name
        .split_once('.')
        .map_or(file_name, |(type_name, _)| type_name)
}
