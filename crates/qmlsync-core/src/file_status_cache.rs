use crate::ids::{SourceContextId, SourceId};
use crate::model::FileStatus;
use crate::set_algebra::{set_greedy_difference, set_greedy_intersection, set_union};
use crate::vfs::FileSystem;
use std::sync::Arc;
use std::time::SystemTime;

/// Last known on-disk status per source id.
///
/// Entries are kept sorted by source id at all times, so lookups are binary
/// searches and batch queries are single merge passes.
pub struct FileStatusCache {
    file_system: Arc<dyn FileSystem>,
    entries: Vec<FileStatus>,
}

impl FileStatusCache {
    pub fn new(file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            file_system,
            entries: Vec::new(),
        }
    }

    /// Cached status of `source_id`. The file system is only queried on the
    /// first lookup; later lookups never refresh.
    pub fn find(&mut self, source_id: SourceId) -> FileStatus {
        match self
            .entries
            .binary_search_by(|entry| entry.source_id.cmp(&source_id))
        {
            Ok(index) => self.entries[index],
            Err(index) => {
                let status = self.file_system.file_status(source_id);
                self.entries.insert(index, status);
                status
            }
        }
    }

    pub fn last_modified(&mut self, source_id: SourceId) -> Option<SystemTime> {
        self.find(source_id).last_modified()
    }

    /// Returns the ids whose status differs from the cached one and stores the
    /// fresh status. Ids seen for the first time are always reported.
    ///
    /// `source_ids` must be sorted and free of duplicates.
    pub fn modified(&mut self, source_ids: &[SourceId]) -> Vec<SourceId> {
        let file_system = &self.file_system;
        let mut modified = Vec::new();
        let mut added = Vec::new();

        set_greedy_intersection(
            self.entries.iter_mut(),
            source_ids,
            |entry, source_id| entry.source_id.cmp(source_id),
            |entry| {
                let current = file_system.file_status(entry.source_id);
                if current != *entry {
                    *entry = current;
                    modified.push(current.source_id);
                }
            },
        );

        set_greedy_difference(
            source_ids.iter().copied(),
            &self.entries,
            |source_id, entry| source_id.cmp(&entry.source_id),
            |source_id| {
                added.push(file_system.file_status(source_id));
                modified.push(source_id);
            },
        );

        if !added.is_empty() {
            added.dedup_by_key(|status| status.source_id);
            let entries = std::mem::take(&mut self.entries);
            self.entries = set_union(entries, added, |a, b| a.source_id.cmp(&b.source_id));
        }

        modified.sort_unstable();
        modified.dedup();
        modified
    }

    /// Refreshes the entries already cached for `source_ids` (sorted). Unknown
    /// ids are not added.
    pub fn update(&mut self, source_ids: &[SourceId]) {
        let file_system = &self.file_system;

        set_greedy_intersection(
            self.entries.iter_mut(),
            source_ids,
            |entry, source_id| entry.source_id.cmp(source_id),
            |entry| *entry = file_system.file_status(entry.source_id),
        );
    }

    /// Drops the entries for `source_ids` (sorted).
    pub fn remove(&mut self, source_ids: &[SourceId]) {
        let mut kept = Vec::with_capacity(self.entries.len());

        set_greedy_difference(
            std::mem::take(&mut self.entries),
            source_ids,
            |entry, source_id| entry.source_id.cmp(source_id),
            |entry| kept.push(entry),
        );

        self.entries = kept;
    }

    /// Drops every entry living in one of the directories `directory_ids`
    /// (sorted), including the directory entries themselves.
    pub fn remove_contexts(&mut self, directory_ids: &[SourceContextId]) {
        let mut kept = Vec::with_capacity(self.entries.len());

        set_greedy_difference(
            std::mem::take(&mut self.entries),
            directory_ids,
            |entry, directory_id| entry.source_id.context_id().cmp(directory_id),
            |entry| kept.push(entry),
        );

        self.entries = kept;
    }

    /// Forgets every cached status.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}
