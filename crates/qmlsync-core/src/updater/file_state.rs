use super::{PassState, ProjectStorageUpdater};
use crate::ids::SourceId;
use crate::model::FileStatus;

/// Change classification of one source during one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Absent on disk and never recorded.
    NotExists,
    /// Absent on disk and already recorded as absent.
    NotExistsUnchanged,
    Added,
    Changed,
    Unchanged,
    /// Absent on disk but recorded as present.
    Removed,
}

impl FileState {
    pub fn is_changed(self) -> bool {
        matches!(self, FileState::Changed | FileState::Added | FileState::Removed)
    }

    pub fn is_changed_or_added(self) -> bool {
        matches!(self, FileState::Changed | FileState::Added)
    }

    pub fn is_existing(self) -> bool {
        matches!(self, FileState::Changed | FileState::Added | FileState::Unchanged)
    }

    pub fn is_not_existing(self) -> bool {
        matches!(
            self,
            FileState::NotExists | FileState::NotExistsUnchanged | FileState::Removed
        )
    }
}

/// Compares the current status with the stored one.
pub fn classify(current: &FileStatus, stored: Option<&FileStatus>) -> FileState {
    match (current.exists(), stored) {
        (false, None) => FileState::NotExists,
        (false, Some(stored)) if !stored.exists() => FileState::NotExistsUnchanged,
        (false, Some(_)) => FileState::Removed,
        (true, None) => FileState::Added,
        (true, Some(stored)) if !stored.exists() => FileState::Added,
        (true, Some(stored)) if stored == current => FileState::Unchanged,
        (true, Some(_)) => FileState::Changed,
    }
}

/// Reduces the states of entities that are handled together. Removed only if
/// every state is Removed, otherwise the first of Added, Changed, Unchanged
/// found in any state, otherwise NotExists.
pub fn combine_state(states: &[FileState]) -> FileState {
    let any = |wanted: FileState| states.contains(&wanted);

    if !states.is_empty() && states.iter().all(|state| *state == FileState::Removed) {
        FileState::Removed
    } else if any(FileState::Added) {
        FileState::Added
    } else if any(FileState::Changed) {
        FileState::Changed
    } else if any(FileState::Unchanged) {
        FileState::Unchanged
    } else {
        FileState::NotExists
    }
}

impl ProjectStorageUpdater {
    /// Classifies `source_id` and queues its status row: changed statuses
    /// are written, unchanged ones are kept out of the package.
    pub(super) fn file_state(&mut self, source_id: SourceId, pass: &mut PassState) -> FileState {
        let current = self.file_status_cache.find(source_id);
        let stored = self.storage.fetch_file_status(source_id);
        let state = classify(&current, stored.as_ref());

        match state {
            FileState::NotExists | FileState::Added | FileState::Changed | FileState::Removed => {
                pass.package.record_file_status(current)
            }
            FileState::NotExistsUnchanged | FileState::Unchanged => {
                pass.not_updated.file_status_source_ids.push(source_id)
            }
        }

        state
    }
}
