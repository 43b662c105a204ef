use super::{ProjectStorage, StorageError};
use crate::ids::{ModuleId, SourceContextId, SourceId};
use crate::model::{
    ChangeLevel, DirectoryInfo, FileStatus, Import, ModuleExportedImport, ModuleKind,
    PropertyEditorQmlPath, Type, TypeAnnotation,
};
use crate::package::SynchronizationPackage;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    file_statuses: BTreeMap<SourceId, FileStatus>,
    directory_infos: BTreeMap<(SourceContextId, SourceId), DirectoryInfo>,
    types: BTreeMap<SourceId, Vec<Type>>,
    imports: BTreeMap<SourceId, Vec<Import>>,
    module_dependencies: BTreeMap<SourceId, Vec<Import>>,
    module_exported_imports: BTreeMap<SourceId, Vec<ModuleExportedImport>>,
    property_editor_paths: BTreeMap<SourceContextId, Vec<PropertyEditorQmlPath>>,
    type_annotations: BTreeMap<SourceId, Vec<TypeAnnotation>>,
    modules: Vec<(String, ModuleKind)>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    tables: Tables,
}

/// In-memory project model with snapshot persistence.
#[derive(Debug, Default)]
pub struct MemoryProjectStorage {
    tables: RwLock<Tables>,
}

impl MemoryProjectStorage {
    pub const SNAPSHOT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let buffer = std::fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&buffer)?;

        if snapshot.version != Self::SNAPSHOT_VERSION {
            return Err(StorageError::IncompatibleSnapshotVersion {
                found: snapshot.version,
                expected: Self::SNAPSHOT_VERSION,
            });
        }

        Ok(Self {
            tables: RwLock::new(snapshot.tables),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let snapshot = Snapshot {
            version: Self::SNAPSHOT_VERSION,
            tables: self.tables.read().clone(),
        };
        let buffer = bincode::serialize(&snapshot)?;
        std::fs::write(path, buffer)?;
        Ok(())
    }

    pub fn types(&self, source_id: SourceId) -> Vec<Type> {
        self.tables
            .read()
            .types
            .get(&source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn imports(&self, source_id: SourceId) -> Vec<Import> {
        self.tables
            .read()
            .imports
            .get(&source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn module_dependencies(&self, manifest_source_id: SourceId) -> Vec<Import> {
        self.tables
            .read()
            .module_dependencies
            .get(&manifest_source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn module_exported_imports(&self, manifest_source_id: SourceId) -> Vec<ModuleExportedImport> {
        self.tables
            .read()
            .module_exported_imports
            .get(&manifest_source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn property_editor_qml_paths(&self, directory_id: SourceContextId) -> Vec<PropertyEditorQmlPath> {
        self.tables
            .read()
            .property_editor_paths
            .get(&directory_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn type_annotations(&self, source_id: SourceId) -> Vec<TypeAnnotation> {
        self.tables
            .read()
            .type_annotations
            .get(&source_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn module_name(&self, module_id: ModuleId) -> Option<(String, ModuleKind)> {
        let index = usize::try_from(module_id.0).ok()?.checked_sub(1)?;
        self.tables.read().modules.get(index).cloned()
    }

    pub fn file_status_count(&self) -> usize {
        self.tables.read().file_statuses.len()
    }

    pub fn directory_info_count(&self) -> usize {
        self.tables.read().directory_infos.len()
    }
}

impl ProjectStorage for MemoryProjectStorage {
    fn fetch_file_status(&self, source_id: SourceId) -> Option<FileStatus> {
        self.tables.read().file_statuses.get(&source_id).copied()
    }

    fn fetch_directory_infos(&self, directory_id: SourceContextId) -> Vec<DirectoryInfo> {
        self.tables
            .read()
            .directory_infos
            .range((directory_id, SourceId::for_directory(SourceContextId(0)))..)
            .take_while(|((row_directory_id, _), _)| *row_directory_id == directory_id)
            .map(|(_, info)| *info)
            .collect()
    }

    fn fetch_directory_info(&self, source_id: SourceId) -> Option<DirectoryInfo> {
        self.tables
            .read()
            .directory_infos
            .values()
            .find(|info| info.source_id == source_id)
            .copied()
    }

    fn module_id(&self, name: &str, kind: ModuleKind) -> ModuleId {
        let position = |tables: &Tables| {
            tables
                .modules
                .iter()
                .position(|(module_name, module_kind)| module_name == name && *module_kind == kind)
        };

        if let Some(index) = position(&self.tables.read()) {
            return module_id_at(index);
        }

        let mut tables = self.tables.write();
        if let Some(index) = position(&tables) {
            return module_id_at(index);
        }

        tables.modules.push((name.to_string(), kind));
        module_id_at(tables.modules.len() - 1)
    }

    fn type_annotation_directory_ids(&self) -> Vec<SourceContextId> {
        let directory_ids: BTreeSet<SourceContextId> = self
            .tables
            .read()
            .type_annotations
            .values()
            .flatten()
            .map(|annotation| annotation.directory_id)
            .collect();
        directory_ids.into_iter().collect()
    }

    fn type_annotation_source_ids(&self, directory_id: SourceContextId) -> Vec<SourceId> {
        self.tables
            .read()
            .type_annotations
            .iter()
            .filter(|(_, annotations)| {
                annotations
                    .iter()
                    .any(|annotation| annotation.directory_id == directory_id)
            })
            .map(|(source_id, _)| *source_id)
            .collect()
    }

    fn synchronize(&self, package: SynchronizationPackage) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        let mut next = tables.clone();

        apply(&mut next, package);
        validate(&next)?;

        *tables = next;
        Ok(())
    }
}

fn module_id_at(index: usize) -> ModuleId {
    ModuleId(u32::try_from(index + 1).unwrap_or(u32::MAX))
}

fn apply(tables: &mut Tables, package: SynchronizationPackage) {
    debug!(
        "synchronizing {} types, {} file statuses, {} directory infos",
        package.types.len(),
        package.file_statuses.len(),
        package.directory_infos.len()
    );

    for source_id in &package.updated_file_status_source_ids {
        tables.file_statuses.remove(source_id);
    }
    for status in package.file_statuses {
        tables.file_statuses.insert(status.source_id, status);
    }

    for directory_id in &package.updated_directory_info_directory_ids {
        tables
            .directory_infos
            .retain(|(row_directory_id, _), _| row_directory_id != directory_id);
    }
    for info in package.directory_infos {
        tables
            .directory_infos
            .insert((info.directory_id, info.source_id), info);
    }

    let mut previous_types = BTreeMap::new();
    for source_id in &package.updated_source_ids {
        tables.imports.remove(source_id);
        if let Some(types) = tables.types.remove(source_id) {
            previous_types.insert(*source_id, types);
        }
    }
    for (source_id, imports) in group_by(package.imports, |import| import.source_id) {
        tables.imports.insert(source_id, imports);
    }
    for new_type in package.types {
        synchronize_type(tables, &previous_types, new_type);
    }

    for source_id in &package.updated_module_dependency_source_ids {
        tables.module_dependencies.remove(source_id);
    }
    for (source_id, dependencies) in group_by(package.module_dependencies, |import| import.source_id) {
        tables.module_dependencies.insert(source_id, dependencies);
    }

    for source_id in &package.updated_module_exported_import_source_ids {
        tables.module_exported_imports.remove(source_id);
    }
    for (source_id, exported) in group_by(package.module_exported_imports, |import| import.source_id) {
        tables.module_exported_imports.insert(source_id, exported);
    }

    for directory_id in &package.updated_property_editor_qml_path_directory_ids {
        tables.property_editor_paths.remove(directory_id);
    }
    for (directory_id, paths) in group_by(package.property_editor_qml_paths, |path| path.directory_id) {
        tables.property_editor_paths.insert(directory_id, paths);
    }

    for source_id in &package.updated_type_annotation_source_ids {
        tables.type_annotations.remove(source_id);
    }
    for (source_id, annotations) in group_by(package.type_annotations, |annotation| annotation.source_id) {
        tables.type_annotations.insert(source_id, annotations);
    }
}

fn synchronize_type(
    tables: &mut Tables,
    previous_types: &BTreeMap<SourceId, Vec<Type>>,
    mut new_type: Type,
) {
    let stored = tables
        .types
        .get(&new_type.source_id)
        .into_iter()
        .chain(previous_types.get(&new_type.source_id))
        .flatten()
        .find(|stored| stored.type_name == new_type.type_name)
        .cloned();

    match (new_type.change_level, stored) {
        (ChangeLevel::Minimal, Some(mut stored)) => {
            stored.exported_types = std::mem::take(&mut new_type.exported_types);
            new_type = stored;
        }
        (ChangeLevel::ExcludeExportedTypes, Some(stored)) => {
            new_type.exported_types = stored.exported_types;
        }
        _ => {}
    }
    new_type.change_level = ChangeLevel::Full;

    let types = tables.types.entry(new_type.source_id).or_default();
    match types
        .iter_mut()
        .find(|stored| stored.type_name == new_type.type_name)
    {
        Some(stored) => *stored = new_type,
        None => types.push(new_type),
    }
}

fn validate(tables: &Tables) -> Result<(), StorageError> {
    let type_names: BTreeSet<&str> = tables
        .types
        .values()
        .flatten()
        .map(|stored| stored.type_name.as_str())
        .collect();

    for stored in tables.types.values().flatten() {
        if let Some(prototype) = &stored.prototype {
            if !type_names.contains(prototype.as_str()) {
                return Err(StorageError::TypeNameDoesNotExist {
                    name: prototype.clone(),
                });
            }
        }

        for exported in &stored.exported_types {
            let known = usize::try_from(exported.module_id.0)
                .is_ok_and(|id| id >= 1 && id <= tables.modules.len());
            if !known {
                return Err(StorageError::ModuleDoesNotExist(exported.module_id));
            }
        }
    }

    Ok(())
}

fn group_by<T, K: Ord>(rows: Vec<T>, key: impl Fn(&T) -> K) -> BTreeMap<K, Vec<T>> {
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(&row)).or_default().push(row);
    }
    groups
}
