use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::PageId;

/// Handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file tracked by the table, together with its page-number counter
#[derive(Debug)]
pub(crate) struct OpenFile {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    next_page_no: AtomicUsize,
}

impl OpenFile {
    /// Hand out the next page number. Concurrent callers never see the same value.
    pub(crate) fn allocate_page(&self) -> PageId {
        self.next_page_no.fetch_add(1, Ordering::Relaxed)
    }
}

/// Bidirectional `path <-> handle` mapping.
///
/// Both directions are only ever changed together by `insert` and `remove`,
/// so `by_path[p] == h` holds exactly when `by_handle[h].path == p`.
/// The counter lives inside the entry, which means a closed handle takes its
/// counter with it and a freshly opened file always starts from the value it
/// was seeded with.
#[derive(Debug, Default)]
pub(crate) struct FdTable {
    by_path: HashMap<PathBuf, FileHandle>,
    by_handle: HashMap<FileHandle, OpenFile>,
    /// Handles are never reused within one table
    next_handle: usize,
}

impl FdTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `path`, seeding its counter with `first_free_page`.
    ///
    /// The caller must have checked that `path` is not already tracked.
    pub(crate) fn insert(&mut self, path: PathBuf, file: File, first_free_page: PageId) -> FileHandle {
        debug_assert!(!self.by_path.contains_key(&path));

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        self.by_path.insert(path.clone(), handle);
        self.by_handle.insert(
            handle,
            OpenFile {
                file,
                path,
                next_page_no: AtomicUsize::new(first_free_page),
            },
        );
        handle
    }

    /// Drop both directions of the mapping for `handle`, returning the entry.
    pub(crate) fn remove(&mut self, handle: FileHandle) -> Option<OpenFile> {
        let entry = self.by_handle.remove(&handle)?;
        self.by_path.remove(&entry.path);
        Some(entry)
    }

    pub(crate) fn get(&self, handle: FileHandle) -> Option<&OpenFile> {
        self.by_handle.get(&handle)
    }

    pub(crate) fn handle_of(&self, path: &Path) -> Option<FileHandle> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub(crate) fn files(&self) -> impl Iterator<Item = &OpenFile> {
        self.by_handle.values()
    }

    /// Remove every entry, leaving the table empty.
    pub(crate) fn drain(&mut self) -> Vec<OpenFile> {
        self.by_path.clear();
        self.by_handle.drain().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_file(dir: &TempDir, name: &str) -> (PathBuf, File) {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        (path, file)
    }

    #[test]
    fn test_insert_updates_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FdTable::new();
        let (path, file) = temp_file(&dir, "a.db");

        let handle = table.insert(path.clone(), file, 0);

        assert_eq!(table.handle_of(&path), Some(handle));
        assert_eq!(table.get(handle).unwrap().path, path);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_clears_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FdTable::new();
        let (path, file) = temp_file(&dir, "a.db");

        let handle = table.insert(path.clone(), file, 0);
        let entry = table.remove(handle).unwrap();

        assert_eq!(entry.path, path);
        assert!(table.handle_of(&path).is_none());
        assert!(table.get(handle).is_none());
        assert!(!table.contains_path(&path));
        assert!(table.remove(handle).is_none());
    }

    #[test]
    fn test_handles_are_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FdTable::new();

        let (path, file) = temp_file(&dir, "a.db");
        let first = table.insert(path.clone(), file, 0);
        table.remove(first);

        let file = File::open(&path).unwrap();
        let second = table.insert(path, file, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_counter_starts_at_seed() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FdTable::new();
        let (path, file) = temp_file(&dir, "a.db");

        let handle = table.insert(path, file, 7);
        let entry = table.get(handle).unwrap();
        assert_eq!(entry.allocate_page(), 7);
        assert_eq!(entry.allocate_page(), 8);
        assert_eq!(entry.allocate_page(), 9);
    }

    #[test]
    fn test_drain_empties_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = FdTable::new();
        let (a, fa) = temp_file(&dir, "a.db");
        let (b, fb) = temp_file(&dir, "b.db");
        table.insert(a.clone(), fa, 0);
        table.insert(b.clone(), fb, 0);

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(table.len(), 0);
        assert!(!table.contains_path(&a));
        assert!(!table.contains_path(&b));
    }
}
