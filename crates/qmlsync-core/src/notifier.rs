use crate::ids::SourceId;
use crate::model::Version;
use log::warn;
use std::path::Path;

/// Non-fatal problems found while reading a project.
pub trait ErrorNotifier: Send + Sync {
    /// A manifest names a component whose document does not exist.
    fn qml_document_does_not_exist_for_manifest_entry(
        &self,
        type_name: &str,
        version: Version,
        source_id: SourceId,
        manifest_source_id: SourceId,
    );

    /// A manifest names a type information file that does not exist.
    fn qml_types_file_missing(&self, path: &Path);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorNotifier;

impl ErrorNotifier for LoggingErrorNotifier {
    fn qml_document_does_not_exist_for_manifest_entry(
        &self,
        type_name: &str,
        version: Version,
        source_id: SourceId,
        manifest_source_id: SourceId,
    ) {
        warn!(
            "manifest {manifest_source_id} declares {type_name} {version} but document {source_id} does not exist"
        );
    }

    fn qml_types_file_missing(&self, path: &Path) {
        warn!("type information file {} does not exist", path.display());
    }
}
