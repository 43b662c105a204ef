use crate::ids::{ProjectPartId, SourceContextId, SourceId};
use crate::set_algebra::sort_unique;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Role of a watched source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceType {
    Directory,
    QmlDir,
    Qml,
    QmlUi,
    QmlTypes,
}

/// One watch registration group: a project part and a source role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectChunkId {
    pub part_id: ProjectPartId,
    pub source_type: SourceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPaths {
    pub id: ProjectChunkId,
    pub source_ids: Vec<SourceId>,
}

impl IdPaths {
    pub fn new(part_id: ProjectPartId, source_type: SourceType, source_ids: Vec<SourceId>) -> Self {
        Self {
            id: ProjectChunkId {
                part_id,
                source_type,
            },
            source_ids,
        }
    }
}

/// Sources collected during one update pass, grouped by role.
#[derive(Debug, Clone, Default)]
pub struct WatchedSourceIds {
    pub directory_ids: Vec<SourceId>,
    pub qmldir_source_ids: Vec<SourceId>,
    pub qml_source_ids: Vec<SourceId>,
    pub qml_ui_source_ids: Vec<SourceId>,
    pub qmltypes_source_ids: Vec<SourceId>,
}

impl WatchedSourceIds {
    pub fn into_id_paths(self, part_id: ProjectPartId) -> Vec<IdPaths> {
        [
            (SourceType::Directory, self.directory_ids),
            (SourceType::QmlDir, self.qmldir_source_ids),
            (SourceType::Qml, self.qml_source_ids),
            (SourceType::QmlUi, self.qml_ui_source_ids),
            (SourceType::QmlTypes, self.qmltypes_source_ids),
        ]
        .into_iter()
        .map(|(source_type, mut source_ids)| {
            sort_unique(&mut source_ids);
            IdPaths::new(part_id, source_type, source_ids)
        })
        .collect()
    }
}

/// Receives the set of sources the updater wants to be told about.
pub trait PathWatcher: Send + Sync {
    /// Replaces the registrations of every chunk named in `id_paths`.
    fn update_id_paths(&self, id_paths: Vec<IdPaths>);

    /// Replaces, for every chunk named in `id_paths`, only the registered
    /// sources that live in one of `directory_ids` (sorted).
    fn update_context_id_paths(&self, id_paths: Vec<IdPaths>, directory_ids: &[SourceContextId]);
}

/// Plain registry of watch registrations. A file system notification
/// backend queries it to decide which ids to report back.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    chunks: Mutex<BTreeMap<ProjectChunkId, Vec<SourceId>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_ids(&self, id: ProjectChunkId) -> Vec<SourceId> {
        self.chunks.lock().get(&id).cloned().unwrap_or_default()
    }

    /// Chunks that watch `source_id`.
    pub fn chunks_watching(&self, source_id: SourceId) -> Vec<ProjectChunkId> {
        self.chunks
            .lock()
            .iter()
            .filter(|(_, source_ids)| source_ids.binary_search(&source_id).is_ok())
            .map(|(id, _)| *id)
            .collect()
    }
}

impl PathWatcher for WatchRegistry {
    fn update_id_paths(&self, id_paths: Vec<IdPaths>) {
        let mut chunks = self.chunks.lock();
        for IdPaths { id, mut source_ids } in id_paths {
            sort_unique(&mut source_ids);
            chunks.insert(id, source_ids);
        }
    }

    fn update_context_id_paths(&self, id_paths: Vec<IdPaths>, directory_ids: &[SourceContextId]) {
        let mut chunks = self.chunks.lock();
        for IdPaths { id, source_ids } in id_paths {
            let registered = chunks.entry(id).or_default();
            registered.retain(|source_id| directory_ids.binary_search(&source_id.context_id()).is_err());
            registered.extend(source_ids);
            sort_unique(registered);
        }
    }
}
