use super::*;
use crate::ids::ModuleId;
use crate::model::{
    ChangeLevel, DirectoryInfo, ExportedType, FileStatus, FileType, Import, ModuleKind, Type,
    TypeAnnotation, Version,
};
use crate::notifier::LoggingErrorNotifier;
use crate::parser::ParseError;
use crate::path_cache::SourcePathCache;
use crate::storage::{MemoryProjectStorage, StorageError};
use crate::vfs::PhysicalFileSystem;
use crate::watcher::{ProjectChunkId, SourceType, WatchRegistry};
use filetime::{set_file_mtime, FileTime};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PART: ProjectPartId = ProjectPartId(1);

#[derive(Default)]
struct FakeQmlTypesParser {
    parsed: Mutex<Vec<SourceId>>,
}

impl QmlTypesParser for FakeQmlTypesParser {
    fn parse(
        &self,
        content: &str,
        imports: &mut Vec<Import>,
        types: &mut Vec<Type>,
        directory_info: &DirectoryInfo,
    ) -> Result<(), ParseError> {
        self.parsed.lock().push(directory_info.source_id);
        if content.contains("broken") {
            return Err(ParseError::at_line(1, "unexpected token"));
        }

        for name in content.split_whitespace() {
            let mut parsed = Type::new(name, directory_info.source_id);
            if let Some(module_id) = directory_info.module_id {
                parsed
                    .exported_types
                    .push(ExportedType::new(module_id, name, Version::new(1, 0)));
            }
            types.push(parsed);
        }

        if let Some(module_id) = directory_info.module_id {
            imports.push(Import {
                module_id,
                version: Version::default(),
                source_id: directory_info.source_id,
            });
        }

        Ok(())
    }
}

#[derive(Default)]
struct FakeQmlDocumentParser {
    parsed: Mutex<Vec<SourceId>>,
}

impl FakeQmlDocumentParser {
    fn count(&self, source_id: SourceId) -> usize {
        self.parsed
            .lock()
            .iter()
            .filter(|parsed| **parsed == source_id)
            .count()
    }
}

impl QmlDocumentParser for FakeQmlDocumentParser {
    fn parse(
        &self,
        content: &str,
        _imports: &mut Vec<Import>,
        source_id: SourceId,
        _directory_path: &Path,
    ) -> Result<Type, ParseError> {
        self.parsed.lock().push(source_id);
        if content.contains("broken") {
            return Err(ParseError::new("broken document"));
        }

        let mut parsed = Type::new("", source_id);
        parsed.prototype = content
            .strip_prefix("prototype ")
            .map(|prototype| prototype.trim().to_string());
        Ok(parsed)
    }
}

struct FakeTypeAnnotationReader;

impl TypeAnnotationReader for FakeTypeAnnotationReader {
    fn parse(
        &self,
        content: &str,
        _directory_path: &Path,
        source_id: SourceId,
        directory_id: SourceContextId,
        storage: &dyn ProjectStorage,
    ) -> Result<Vec<TypeAnnotation>, ParseError> {
        if content.contains("broken") {
            return Err(ParseError::new("broken metainfo"));
        }

        let module_id = storage.module_id("QtQuick", ModuleKind::QmlLibrary);
        Ok(content
            .split_whitespace()
            .map(|type_name| TypeAnnotation {
                source_id,
                directory_id,
                type_name: type_name.to_string(),
                module_id,
                icon_path: String::new(),
                item_library_json: "[]".to_string(),
                hints_json: "{}".to_string(),
            })
            .collect())
    }
}

#[derive(Default)]
struct RecordingWatcher {
    id_paths: Mutex<Vec<Vec<IdPaths>>>,
    context_id_paths: Mutex<Vec<(Vec<IdPaths>, Vec<SourceContextId>)>>,
}

impl PathWatcher for RecordingWatcher {
    fn update_id_paths(&self, id_paths: Vec<IdPaths>) {
        self.id_paths.lock().push(id_paths);
    }

    fn update_context_id_paths(&self, id_paths: Vec<IdPaths>, directory_ids: &[SourceContextId]) {
        self.context_id_paths
            .lock()
            .push((id_paths, directory_ids.to_vec()));
    }
}

#[derive(Default)]
struct RecordingNotifier {
    missing_documents: Mutex<Vec<(String, SourceId)>>,
    missing_qml_types: Mutex<Vec<PathBuf>>,
}

impl ErrorNotifier for RecordingNotifier {
    fn qml_document_does_not_exist_for_manifest_entry(
        &self,
        type_name: &str,
        _version: Version,
        source_id: SourceId,
        _manifest_source_id: SourceId,
    ) {
        self.missing_documents
            .lock()
            .push((type_name.to_string(), source_id));
    }

    fn qml_types_file_missing(&self, path: &Path) {
        self.missing_qml_types.lock().push(path.to_path_buf());
    }
}

/// Memory storage that keeps a copy of every package it is asked to commit.
#[derive(Default)]
struct RecordingStorage {
    inner: MemoryProjectStorage,
    packages: Mutex<Vec<SynchronizationPackage>>,
}

impl ProjectStorage for RecordingStorage {
    fn fetch_file_status(&self, source_id: SourceId) -> Option<FileStatus> {
        self.inner.fetch_file_status(source_id)
    }

    fn fetch_directory_infos(&self, directory_id: SourceContextId) -> Vec<DirectoryInfo> {
        self.inner.fetch_directory_infos(directory_id)
    }

    fn fetch_directory_info(&self, source_id: SourceId) -> Option<DirectoryInfo> {
        self.inner.fetch_directory_info(source_id)
    }

    fn module_id(&self, name: &str, kind: ModuleKind) -> ModuleId {
        self.inner.module_id(name, kind)
    }

    fn type_annotation_directory_ids(&self) -> Vec<SourceContextId> {
        self.inner.type_annotation_directory_ids()
    }

    fn type_annotation_source_ids(&self, directory_id: SourceContextId) -> Vec<SourceId> {
        self.inner.type_annotation_source_ids(directory_id)
    }

    fn synchronize(&self, package: SynchronizationPackage) -> Result<(), StorageError> {
        self.packages.lock().push(package.clone());
        self.inner.synchronize(package)
    }
}

struct Fixture {
    temp_dir: TempDir,
    path_cache: Arc<SourcePathCache>,
    storage: Arc<RecordingStorage>,
    types_parser: Arc<FakeQmlTypesParser>,
    document_parser: Arc<FakeQmlDocumentParser>,
    watcher: Arc<RecordingWatcher>,
    notifier: Arc<RecordingNotifier>,
    collaborators: Collaborators,
    updater: ProjectStorageUpdater,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let temp_dir = TempDir::new().unwrap();
        let path_cache = Arc::new(SourcePathCache::new());
        let storage = Arc::new(RecordingStorage::default());
        let types_parser = Arc::new(FakeQmlTypesParser::default());
        let document_parser = Arc::new(FakeQmlDocumentParser::default());
        let watcher = Arc::new(RecordingWatcher::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let collaborators = Collaborators {
            file_system: Arc::new(PhysicalFileSystem::new(path_cache.clone())),
            path_cache: path_cache.clone(),
            storage: storage.clone(),
            qml_types_parser: types_parser.clone(),
            qml_document_parser: document_parser.clone(),
            type_annotation_reader: Arc::new(FakeTypeAnnotationReader),
            path_watcher: watcher.clone(),
            error_notifier: notifier.clone(),
        };
        let updater = ProjectStorageUpdater::new(collaborators.clone(), UpdaterConfig::default());

        Self {
            temp_dir,
            path_cache,
            storage,
            types_parser,
            document_parser,
            watcher,
            notifier,
            collaborators,
            updater,
        }
    }

    /// A new updater on the same storage, as after a restart.
    fn restart(&mut self) {
        self.updater =
            ProjectStorageUpdater::new(self.collaborators.clone(), UpdaterConfig::default());
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }

    fn set_mtime(&self, relative: &str, seconds: i64) {
        set_file_mtime(self.path(relative), FileTime::from_unix_time(seconds, 0)).unwrap();
    }

    fn source_id(&self, relative: &str) -> SourceId {
        self.path_cache.source_id(&self.path(relative))
    }

    fn directory_id(&self, relative: &str) -> SourceContextId {
        self.path_cache.source_context_id(&self.path(relative))
    }

    fn update_directories(&mut self, relative: &[&str]) -> Result<(), UpdateError> {
        let directories = relative.iter().map(|relative| self.path(relative)).collect();
        self.updater.update(Update {
            project_part_id: PART,
            directories,
            ..Default::default()
        })
    }

    fn last_package(&self) -> SynchronizationPackage {
        self.storage.packages.lock().last().cloned().unwrap()
    }

    fn package_count(&self) -> usize {
        self.storage.packages.lock().len()
    }

    fn create_example_module(&self, directory: &str) {
        self.write(
            &format!("{directory}/qmldir"),
            "module Example\ntypeinfo example.qmltypes\nButton 1.0 Button.qml\nLabel 1.0 Label.qml\n",
        );
        self.write(&format!("{directory}/Button.qml"), "Item {}");
        self.write(&format!("{directory}/Label.qml"), "prototype Rectangle");
        self.write(&format!("{directory}/example.qmltypes"), "Rectangle");
    }
}

fn rows_of_type(package: &SynchronizationPackage, file_type: FileType) -> Vec<DirectoryInfo> {
    package
        .directory_infos
        .iter()
        .filter(|info| info.file_type == file_type)
        .copied()
        .collect()
}

#[test]
fn test_added_directory_produces_rows_types_and_imports() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");

    fixture.update_directories(&["Example"]).unwrap();

    let package = fixture.last_package();
    let directory_id = fixture.directory_id("Example");
    assert_eq!(package.directory_infos.len(), 3);
    assert!(package
        .directory_infos
        .iter()
        .all(|info| info.directory_id == directory_id));
    assert_eq!(rows_of_type(&package, FileType::QmlDocument).len(), 2);
    assert_eq!(rows_of_type(&package, FileType::QmlTypes).len(), 1);
    assert!(!package.types.is_empty());
    assert!(!package.imports.is_empty());

    let button = fixture.source_id("Example/Button.qml");
    let example = fixture.storage.module_id("Example", ModuleKind::QmlLibrary);
    let stored = fixture.storage.inner.types(button);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].type_name, "Button");
    assert!(stored[0]
        .exported_types
        .contains(&ExportedType::new(example, "Button", Version::new(1, 0))));
    assert_eq!(fixture.types_parser.parsed.lock().len(), 1);
    assert_eq!(fixture.document_parser.parsed.lock().len(), 2);
}

#[test]
fn test_second_update_without_changes_is_empty() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();

    fixture.update_directories(&["Example"]).unwrap();

    let package = fixture.last_package();
    assert!(package.updated_source_ids.is_empty());
    assert!(package.updated_file_status_source_ids.is_empty());
    assert!(package.file_statuses.is_empty());
    assert!(package.types.is_empty());
    assert!(package.updated_directory_info_directory_ids.is_empty());
}

#[test]
fn test_unchanged_directory_reemits_rows_without_parsing() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let stored_rows = fixture
        .storage
        .fetch_directory_infos(fixture.directory_id("Example"));
    fixture.restart();

    fixture.update_directories(&["Example"]).unwrap();

    let mut emitted = fixture.last_package().directory_infos;
    emitted.sort_by_key(|info| info.source_id);
    assert_eq!(emitted, stored_rows);
    assert_eq!(fixture.types_parser.parsed.lock().len(), 1);
    assert_eq!(fixture.document_parser.parsed.lock().len(), 2);
}

#[test]
fn test_changed_document_in_unchanged_directory_is_reparsed_alone() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();

    fixture.write("Example/Button.qml", "Item { width: 10 }");
    fixture.set_mtime("Example/Button.qml", 1_000_000);
    fixture.update_directories(&["Example"]).unwrap();

    let button = fixture.source_id("Example/Button.qml");
    let label = fixture.source_id("Example/Label.qml");
    let package = fixture.last_package();
    assert_eq!(package.updated_source_ids, vec![button]);
    assert_eq!(package.types.len(), 1);
    assert_eq!(package.types[0].change_level, ChangeLevel::ExcludeExportedTypes);
    assert_eq!(fixture.document_parser.count(button), 2);
    assert_eq!(fixture.document_parser.count(label), 1);
    assert_eq!(fixture.storage.inner.types(button)[0].exported_types.len(), 2);
}

#[test]
fn test_removed_directory_is_dropped_from_storage() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("project/Example");
    fixture.update_directories(&["project"]).unwrap();
    let example_id = fixture.directory_id("project/Example");
    assert_eq!(
        fixture.storage.fetch_subdirectory_ids(fixture.directory_id("project")),
        vec![example_id]
    );

    fs::remove_dir_all(fixture.path("project/Example")).unwrap();
    fixture.set_mtime("project", 1_000_000);
    fixture.update_directories(&["project"]).unwrap();

    let button = fixture.source_id("project/Example/Button.qml");
    let label = fixture.source_id("project/Example/Label.qml");
    let qml_types = fixture.source_id("project/Example/example.qmltypes");
    let package = fixture.last_package();
    for source_id in [button, label, qml_types] {
        assert!(package.updated_source_ids.contains(&source_id));
        assert!(package.updated_file_status_source_ids.contains(&source_id));
    }
    assert!(package
        .updated_directory_info_directory_ids
        .contains(&example_id));
    assert!(package.types.is_empty());
    assert!(package.imports.is_empty());

    assert!(fixture.storage.fetch_directory_infos(example_id).is_empty());
    assert!(fixture
        .storage
        .fetch_subdirectory_ids(fixture.directory_id("project"))
        .is_empty());
    assert!(fixture.storage.inner.types(button).is_empty());
    assert_eq!(fixture.storage.fetch_file_status(button), None);
}

#[test]
fn test_manifest_change_refreshes_exported_types_without_parsing() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();

    fixture.write(
        "Example/qmldir",
        "module Example\ntypeinfo example.qmltypes\nButton 1.0 Button.qml\nButton 2.0 Button.qml\nLabel 1.0 Label.qml\n",
    );
    fixture.update_directories(&["Example"]).unwrap();

    let button = fixture.source_id("Example/Button.qml");
    let manifest = fixture.source_id("Example/qmldir");
    let package = fixture.last_package();
    let minimal = package
        .types
        .iter()
        .find(|parsed| parsed.source_id == button)
        .unwrap();
    assert_eq!(minimal.change_level, ChangeLevel::Minimal);
    assert_eq!(minimal.exported_types.len(), 3);
    assert!(!package.updated_source_ids.contains(&button));
    assert!(package
        .updated_module_dependency_source_ids
        .contains(&manifest));
    assert_eq!(fixture.document_parser.parsed.lock().len(), 2);
    assert_eq!(fixture.types_parser.parsed.lock().len(), 1);
    assert_eq!(fixture.storage.inner.types(button)[0].exported_types.len(), 3);
}

#[test]
fn test_manifest_imports_become_dependencies_and_exported_imports() {
    let mut fixture = Fixture::new();
    fixture.write(
        "Controls/qmldir",
        "module Controls\ndepends QtQuick 2.15\nimport QtQuick.Templates auto\n",
    );

    fixture.update_directories(&["Controls"]).unwrap();

    let manifest = fixture.source_id("Controls/qmldir");
    let dependencies = fixture.storage.inner.module_dependencies(manifest);
    assert_eq!(dependencies.len(), 2);
    assert!(dependencies.contains(&Import {
        module_id: fixture.storage.module_id("QtQuick", ModuleKind::CppLibrary),
        version: Version::new(2, 15),
        source_id: manifest,
    }));

    let exported = fixture.storage.inner.module_exported_imports(manifest);
    assert_eq!(exported.len(), 2);
    assert!(exported.iter().all(|import| import.is_auto_version));
    assert!(exported.iter().any(|import| {
        import.module_id == fixture.storage.module_id("Controls", ModuleKind::QmlLibrary)
            && import.exported_module_id
                == fixture
                    .storage
                    .module_id("QtQuick.Templates", ModuleKind::QmlLibrary)
    }));
}

#[test]
fn test_missing_manifest_entries_are_reported() {
    let mut fixture = Fixture::new();
    fixture.write(
        "Example/qmldir",
        "module Example\ntypeinfo missing.qmltypes\nMissing 1.0 Missing.qml\n",
    );

    fixture.update_directories(&["Example"]).unwrap();

    let missing = fixture.source_id("Example/Missing.qml");
    assert_eq!(
        *fixture.notifier.missing_documents.lock(),
        vec![("Missing".to_string(), missing)]
    );
    assert_eq!(
        *fixture.notifier.missing_qml_types.lock(),
        vec![fixture.path("Example/missing.qmltypes")]
    );
    let package = fixture.last_package();
    assert!(rows_of_type(&package, FileType::QmlDocument).is_empty());
    assert!(package.types.is_empty());
}

#[test]
fn test_document_removed_from_directory_is_dropped() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();

    fs::remove_file(fixture.path("Example/Label.qml")).unwrap();
    fixture.write(
        "Example/qmldir",
        "module Example\ntypeinfo example.qmltypes\nButton 1.0 Button.qml\n",
    );
    fixture.set_mtime("Example", 1_000_000);
    fixture.update_directories(&["Example"]).unwrap();

    let label = fixture.source_id("Example/Label.qml");
    let package = fixture.last_package();
    assert!(package.updated_source_ids.contains(&label));
    assert_eq!(fixture.storage.fetch_directory_info(label), None);
    assert!(fixture.storage.inner.types(label).is_empty());
    assert_eq!(
        fixture
            .storage
            .fetch_directory_infos(fixture.directory_id("Example"))
            .len(),
        2
    );
}

#[test]
fn test_targeted_update_reparses_only_the_document() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let button = fixture.source_id("Example/Button.qml");
    let label = fixture.source_id("Example/Label.qml");

    fixture.write("Example/Button.qml", "Item { height: 20 }");
    fixture.set_mtime("Example/Button.qml", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::Qml, vec![button])])
        .unwrap();

    let package = fixture.last_package();
    assert_eq!(package.updated_source_ids, vec![button]);
    assert!(package.directory_infos.is_empty());
    assert!(package.updated_directory_info_directory_ids.is_empty());
    assert_eq!(fixture.document_parser.count(button), 2);
    assert_eq!(fixture.document_parser.count(label), 1);
    assert_eq!(fixture.types_parser.parsed.lock().len(), 1);
    assert!(fixture.watcher.context_id_paths.lock().is_empty());
    assert!(fixture.updater.pending_id_paths().is_empty());
    assert_eq!(fixture.storage.inner.types(button)[0].exported_types.len(), 2);
}

#[test]
fn test_targeted_update_reparses_changed_qml_types_file() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let qml_types = fixture.source_id("Example/example.qmltypes");

    fixture.write("Example/example.qmltypes", "Rectangle Circle");
    fixture.set_mtime("Example/example.qmltypes", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::QmlTypes, vec![qml_types])])
        .unwrap();

    let package = fixture.last_package();
    assert_eq!(package.updated_source_ids, vec![qml_types]);
    assert!(package.directory_infos.is_empty());
    assert_eq!(package.types.len(), 2);
    assert_eq!(fixture.types_parser.parsed.lock().len(), 2);
    assert_eq!(fixture.document_parser.parsed.lock().len(), 2);
    assert_eq!(fixture.storage.inner.types(qml_types).len(), 2);
    assert!(fixture.updater.pending_id_paths().is_empty());
}

#[test]
fn test_targeted_update_skips_unregistered_qml_types_file() {
    let mut fixture = Fixture::new();
    fixture.write("loose/loose.qmltypes", "Loose");
    let loose = fixture.source_id("loose/loose.qmltypes");

    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::QmlTypes, vec![loose])])
        .unwrap();

    assert!(fixture.types_parser.parsed.lock().is_empty());
    assert!(fixture.storage.inner.types(loose).is_empty());
    assert!(fixture.last_package().updated_source_ids.is_empty());
    assert!(fixture.updater.pending_id_paths().is_empty());
}

#[test]
fn test_targeted_directory_update_reads_new_annotation_directory() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let directory_id = fixture.directory_id("Example");

    fixture.write("Example/designer/example.metainfo", "Button");
    fixture.set_mtime("Example", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(
            PART,
            SourceType::Directory,
            vec![SourceId::for_directory(directory_id)],
        )])
        .unwrap();

    let metainfo = fixture.source_id("Example/designer/example.metainfo");
    assert_eq!(fixture.storage.inner.type_annotations(metainfo).len(), 1);
}

#[test]
fn test_targeted_directory_update_refreshes_manifest() {
    let mut fixture = Fixture::new();
    fixture.write("Controls/qmldir", "module Controls\n");
    fixture.write("Controls/Button.qml", "Item {}");
    fixture.update_directories(&["Controls"]).unwrap();
    let directory_id = fixture.directory_id("Controls");
    let manifest = fixture.source_id("Controls/qmldir");
    assert!(fixture.storage.inner.module_dependencies(manifest).is_empty());

    let content = "module Controls\ndepends QtQuick 2.15\n";
    fixture.write("Controls/qmldir", content);
    fixture.write("Controls/Slider.qml", "Item {}");
    fixture.set_mtime("Controls", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(
            PART,
            SourceType::Directory,
            vec![SourceId::for_directory(directory_id)],
        )])
        .unwrap();

    assert_eq!(
        fixture.storage.inner.module_dependencies(manifest),
        vec![Import {
            module_id: fixture.storage.module_id("QtQuick", ModuleKind::CppLibrary),
            version: Version::new(2, 15),
            source_id: manifest,
        }]
    );
    let stored = fixture.storage.fetch_file_status(manifest).unwrap();
    assert_eq!(stored.stamp.unwrap().size, content.len() as u64);
}

#[test]
fn test_failing_notifications_are_merged_per_chunk() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let button = fixture.source_id("Example/Button.qml");
    let label = fixture.source_id("Example/Label.qml");

    fixture.write("Example/Button.qml", "broken {");
    fixture.set_mtime("Example/Button.qml", 1_000_000);
    for _ in 0..3 {
        fixture
            .updater
            .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::Qml, vec![button])])
            .unwrap();
    }
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::Qml, vec![label, button])])
        .unwrap();

    let mut expected = vec![button, label];
    expected.sort();
    assert_eq!(
        fixture.updater.pending_id_paths(),
        &[IdPaths::new(PART, SourceType::Qml, expected)]
    );
}

#[test]
fn test_targeted_update_of_directory() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let directory_id = fixture.directory_id("Example");

    fixture.write("Example/Slider.qml", "Item {}");
    fixture.set_mtime("Example", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(
            PART,
            SourceType::Directory,
            vec![SourceId::for_directory(directory_id)],
        )])
        .unwrap();

    let slider = fixture.source_id("Example/Slider.qml");
    assert_eq!(fixture.document_parser.count(slider), 1);
    assert_eq!(fixture.document_parser.parsed.lock().len(), 3);
    assert_eq!(fixture.storage.fetch_directory_infos(directory_id).len(), 4);

    let context_calls = fixture.watcher.context_id_paths.lock();
    assert_eq!(context_calls.len(), 1);
    assert_eq!(context_calls[0].1, vec![directory_id]);
    let qml = context_calls[0]
        .0
        .iter()
        .find(|id_paths| id_paths.id.source_type == SourceType::Qml)
        .unwrap();
    assert!(qml.source_ids.contains(&slider));
}

#[test]
fn test_parse_error_in_targeted_update_keeps_pending_paths() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.update_directories(&["Example"]).unwrap();
    let button = fixture.source_id("Example/Button.qml");
    let packages = fixture.package_count();

    fixture.write("Example/Button.qml", "broken {");
    fixture.set_mtime("Example/Button.qml", 1_000_000);
    fixture
        .updater
        .paths_with_ids_changed(&[IdPaths::new(PART, SourceType::Qml, vec![button])])
        .unwrap();

    assert_eq!(fixture.updater.pending_id_paths().len(), 1);
    assert_eq!(fixture.package_count(), packages);

    fixture.write("Example/Button.qml", "Item { fixed: true }");
    fixture.set_mtime("Example/Button.qml", 1_000_100);
    fixture.updater.paths_with_ids_changed(&[]).unwrap();

    assert!(fixture.updater.pending_id_paths().is_empty());
    assert_eq!(fixture.package_count(), packages + 1);
    assert_eq!(fixture.last_package().updated_source_ids, vec![button]);
}

#[test]
fn test_parse_error_aborts_full_update() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.write("Example/Button.qml", "broken {");

    let result = fixture.update_directories(&["Example"]);

    assert!(matches!(
        result,
        Err(UpdateError::CannotParseQmlDocumentFile { .. })
    ));
    assert!(result.unwrap_err().is_parse_failure());
    assert_eq!(fixture.package_count(), 0);
    assert_eq!(fixture.storage.inner.file_status_count(), 0);
    assert!(fixture.watcher.id_paths.lock().is_empty());
}

#[test]
fn test_synchronize_failure_skips_watcher() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.write("Example/Button.qml", "prototype DoesNotExist");

    let result = fixture.update_directories(&["Example"]);

    assert!(matches!(
        result,
        Err(UpdateError::Storage(StorageError::TypeNameDoesNotExist { ref name })) if name == "DoesNotExist"
    ));
    assert!(fixture.watcher.id_paths.lock().is_empty());
    assert_eq!(fixture.storage.inner.file_status_count(), 0);

    fixture.write("Example/Button.qml", "Item {}");
    fixture.update_directories(&["Example"]).unwrap();

    assert_eq!(fixture.watcher.id_paths.lock().len(), 1);
}

#[test]
fn test_watched_sources_are_grouped_by_role() {
    let mut fixture = Fixture::new();
    fixture.create_example_module("Example");
    fixture.write("Example/Form.ui.qml", "Item {}");

    fixture.update_directories(&["Example"]).unwrap();

    let calls = fixture.watcher.id_paths.lock();
    let id_paths = calls.last().unwrap();
    let source_ids = |source_type: SourceType| {
        id_paths
            .iter()
            .find(|id_paths| {
                id_paths.id
                    == ProjectChunkId {
                        part_id: PART,
                        source_type,
                    }
            })
            .map(|id_paths| id_paths.source_ids.clone())
            .unwrap_or_default()
    };

    let mut documents = vec![
        fixture.source_id("Example/Button.qml"),
        fixture.source_id("Example/Label.qml"),
    ];
    documents.sort();
    assert_eq!(source_ids(SourceType::Qml), documents);
    assert_eq!(
        source_ids(SourceType::QmlUi),
        vec![fixture.source_id("Example/Form.ui.qml")]
    );
    assert_eq!(
        source_ids(SourceType::QmlTypes),
        vec![fixture.source_id("Example/example.qmltypes")]
    );
    assert_eq!(
        source_ids(SourceType::QmlDir),
        vec![fixture.source_id("Example/qmldir")]
    );
    assert_eq!(
        source_ids(SourceType::Directory),
        vec![SourceId::for_directory(fixture.directory_id("Example"))]
    );
}

#[test]
fn test_subdirectories_are_recorded_and_skipped_ones_ignored() {
    let mut fixture = Fixture::new();
    fixture.write("Example/qmldir", "module Example\n");
    fixture.write("Example/Sub/qmldir", "module Example.Sub\nInner 1.0 Inner.qml\n");
    fixture.write("Example/Sub/Inner.qml", "Item {}");
    fixture.write("Example/designer/example.metainfo", "Inner");

    fixture.update_directories(&["Example"]).unwrap();

    let sub_id = fixture.directory_id("Example/Sub");
    assert_eq!(
        fixture
            .storage
            .fetch_subdirectory_ids(fixture.directory_id("Example")),
        vec![sub_id]
    );
    assert_eq!(
        fixture
            .storage
            .fetch_directory_infos_of_type(sub_id, FileType::QmlDocument)
            .len(),
        1
    );
    let metainfo = fixture.source_id("Example/designer/example.metainfo");
    assert_eq!(fixture.storage.inner.type_annotations(metainfo).len(), 1);
}

#[test]
fn test_flat_qml_types_files_use_the_builtin_module() {
    let mut fixture = Fixture::new();
    fixture.write("builtins.qmltypes", "QtObject");
    let update = Update {
        project_part_id: PART,
        qml_types_paths: vec![fixture.path("builtins.qmltypes")],
        ..Default::default()
    };

    fixture.updater.update(update.clone()).unwrap();

    let builtins = fixture.source_id("builtins.qmltypes");
    let module_id = fixture.storage.module_id("QML", ModuleKind::CppLibrary);
    let rows = rows_of_type(&fixture.last_package(), FileType::QmlTypes);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_id, builtins);
    assert_eq!(rows[0].module_id, Some(module_id));

    fixture.updater.update(update).unwrap();

    assert!(fixture.last_package().directory_infos.is_empty());
    assert_eq!(fixture.types_parser.parsed.lock().len(), 1);
    assert_eq!(fixture.storage.fetch_directory_info(builtins), Some(rows[0]));
}

#[test]
fn test_type_annotations_follow_the_files() {
    let mut fixture = Fixture::new();
    fixture.write("annotations/qtquick.metainfo", "Item Rectangle");
    let update = Update {
        project_part_id: PART,
        type_annotation_paths: vec![fixture.path("annotations")],
        ..Default::default()
    };

    fixture.updater.update(update.clone()).unwrap();

    let metainfo = fixture.source_id("annotations/qtquick.metainfo");
    assert_eq!(fixture.storage.inner.type_annotations(metainfo).len(), 2);

    fs::remove_file(fixture.path("annotations/qtquick.metainfo")).unwrap();
    fixture.set_mtime("annotations", 1_000_000);
    fixture.updater.update(update).unwrap();

    assert!(fixture
        .last_package()
        .updated_type_annotation_source_ids
        .contains(&metainfo));
    assert!(fixture.storage.inner.type_annotations(metainfo).is_empty());
}

#[test]
fn test_broken_type_annotation_file_is_skipped() {
    let mut fixture = Fixture::new();
    fixture.write("annotations/broken.metainfo", "broken");
    fixture.write("annotations/fine.metainfo", "Item");

    fixture
        .updater
        .update(Update {
            project_part_id: PART,
            type_annotation_paths: vec![fixture.path("annotations")],
            ..Default::default()
        })
        .unwrap();

    let broken = fixture.source_id("annotations/broken.metainfo");
    let fine = fixture.source_id("annotations/fine.metainfo");
    assert!(fixture.storage.inner.type_annotations(broken).is_empty());
    assert_eq!(fixture.storage.inner.type_annotations(fine).len(), 1);
}

#[test]
fn test_property_editor_paths() {
    let mut fixture = Fixture::new();
    fixture.write("propertyEditor/QtQuick/Controls/ButtonPane.qml", "Pane {}");
    fixture.write("propertyEditor/QtQuick/Controls/ButtonSpecifics.qml", "Item {}");
    fixture.write("propertyEditor/QtQuick/Controls/Helper.qml", "Item {}");

    fixture
        .updater
        .update(Update {
            project_part_id: PART,
            property_editor_resources_path: Some(fixture.path("propertyEditor")),
            ..Default::default()
        })
        .unwrap();

    let controls = fixture.directory_id("propertyEditor/QtQuick/Controls");
    let paths = fixture.storage.inner.property_editor_qml_paths(controls);
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|path| path.type_name == "Button"));
    assert_eq!(
        fixture.storage.inner.module_name(paths[0].module_id),
        Some(("QtQuick.Controls".to_string(), ModuleKind::QmlLibrary))
    );
}

#[test]
fn test_watch_registry_follows_full_and_targeted_updates() {
    let fixture = Fixture::new();
    fixture.create_example_module("Example");
    let registry = Arc::new(WatchRegistry::new());
    let mut collaborators = fixture.collaborators.clone();
    collaborators.path_watcher = registry.clone();
    collaborators.error_notifier = Arc::new(LoggingErrorNotifier);
    let mut updater = ProjectStorageUpdater::new(collaborators, UpdaterConfig::default());

    updater
        .update(Update {
            project_part_id: PART,
            directories: vec![fixture.path("Example")],
            ..Default::default()
        })
        .unwrap();

    let qml_chunk = ProjectChunkId {
        part_id: PART,
        source_type: SourceType::Qml,
    };
    let button = fixture.source_id("Example/Button.qml");
    assert_eq!(registry.chunks_watching(button), vec![qml_chunk]);

    let directory_id = fixture.directory_id("Example");
    fs::remove_file(fixture.path("Example/Button.qml")).unwrap();
    fixture.write(
        "Example/qmldir",
        "module Example\ntypeinfo example.qmltypes\nLabel 1.0 Label.qml\n",
    );
    fixture.set_mtime("Example", 1_000_000);
    updater
        .paths_with_ids_changed(&[IdPaths::new(
            PART,
            SourceType::Directory,
            vec![SourceId::for_directory(directory_id)],
        )])
        .unwrap();

    assert!(registry.chunks_watching(button).is_empty());
    assert_eq!(
        registry.source_ids(qml_chunk),
        vec![fixture.source_id("Example/Label.qml")]
    );
}
