use crate::ids::{SourceContextId, SourceId};
use crate::model::{
    DirectoryInfo, FileStatus, Import, ModuleExportedImport, PropertyEditorQmlPath, Type,
    TypeAnnotation,
};
use crate::set_algebra::{set_difference, sort_unique};
use serde::{Deserialize, Serialize};

/// One batch of changes handed to [`ProjectStorage::synchronize`].
///
/// Every `updated_*` list names the keys whose stored rows are replaced by
/// the rows in the matching data list; a key listed without rows removes
/// what was stored for it.
///
/// [`ProjectStorage::synchronize`]: crate::storage::ProjectStorage::synchronize
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynchronizationPackage {
    pub imports: Vec<Import>,
    pub types: Vec<Type>,
    pub updated_source_ids: Vec<SourceId>,
    pub file_statuses: Vec<FileStatus>,
    pub updated_file_status_source_ids: Vec<SourceId>,
    pub directory_infos: Vec<DirectoryInfo>,
    pub updated_directory_info_directory_ids: Vec<SourceContextId>,
    pub module_dependencies: Vec<Import>,
    pub updated_module_dependency_source_ids: Vec<SourceId>,
    pub module_exported_imports: Vec<ModuleExportedImport>,
    pub updated_module_exported_import_source_ids: Vec<SourceId>,
    pub property_editor_qml_paths: Vec<PropertyEditorQmlPath>,
    pub updated_property_editor_qml_path_directory_ids: Vec<SourceContextId>,
    pub type_annotations: Vec<TypeAnnotation>,
    pub updated_type_annotation_source_ids: Vec<SourceId>,
}

impl SynchronizationPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fresh file status and marks its stored row for replacement.
    pub fn record_file_status(&mut self, status: FileStatus) {
        self.updated_file_status_source_ids.push(status.source_id);
        self.file_statuses.push(status);
    }

    /// Sorts every key list, removes duplicates and drops the ids that a later
    /// step of the same pass confirmed as unchanged.
    pub fn finish(&mut self, not_updated: NotUpdatedSourceIds) {
        let NotUpdatedSourceIds {
            mut source_ids,
            mut file_status_source_ids,
        } = not_updated;
        sort_unique(&mut source_ids);
        sort_unique(&mut file_status_source_ids);

        sort_unique(&mut self.updated_source_ids);
        self.updated_source_ids =
            set_difference(std::mem::take(&mut self.updated_source_ids), &source_ids);

        sort_unique(&mut self.updated_file_status_source_ids);
        self.updated_file_status_source_ids = set_difference(
            std::mem::take(&mut self.updated_file_status_source_ids),
            &file_status_source_ids,
        );

        self.file_statuses
            .sort_by(|a, b| a.source_id.cmp(&b.source_id));
        self.file_statuses.dedup_by_key(|status| status.source_id);

        sort_unique(&mut self.updated_directory_info_directory_ids);
        sort_unique(&mut self.updated_module_dependency_source_ids);
        sort_unique(&mut self.updated_module_exported_import_source_ids);
        sort_unique(&mut self.updated_property_editor_qml_path_directory_ids);
        sort_unique(&mut self.updated_type_annotation_source_ids);
    }

    /// True when nothing in the package would change stored state.
    pub fn is_empty(&self) -> bool {
        self.updated_source_ids.is_empty()
            && self.updated_file_status_source_ids.is_empty()
            && self.updated_directory_info_directory_ids.is_empty()
            && self.updated_module_dependency_source_ids.is_empty()
            && self.updated_module_exported_import_source_ids.is_empty()
            && self.updated_property_editor_qml_path_directory_ids.is_empty()
            && self.updated_type_annotation_source_ids.is_empty()
            && self.types.is_empty()
            && self.file_statuses.is_empty()
    }
}

/// Ids found unchanged during a pass. Subtracted from the package's updated
/// lists before the package is committed.
#[derive(Debug, Clone, Default)]
pub struct NotUpdatedSourceIds {
    pub source_ids: Vec<SourceId>,
    pub file_status_source_ids: Vec<SourceId>,
}

impl NotUpdatedSourceIds {
    pub fn push(&mut self, source_id: SourceId) {
        self.source_ids.push(source_id);
        self.file_status_source_ids.push(source_id);
    }
}
