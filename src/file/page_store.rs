use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

use tracing::{debug, trace, warn};

use super::error::{FileError, FileResult};
use super::fd_table::{FdTable, FileHandle};
use super::log_file::LogFile;
use super::{PAGE_SIZE, PageId};
use crate::config::StoreConfig;

/// Page-level disk access and file lifecycle management.
///
/// A `PageStore` owns every file it opens. Open files are tracked in a
/// `path <-> handle` table guarded by a single lock, so both directions
/// always change together. Page reads and writes take the lock shared and
/// use positional I/O, which lets callers on different pages (or different
/// files) proceed in parallel. Mutual exclusion on a single page is left to
/// the caller.
#[derive(Debug)]
pub struct PageStore {
    table: RwLock<FdTable>,
    log: LogFile,
    max_open_files: usize,
}

impl PageStore {
    /// Create a page store with the default configuration
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create a page store from a loaded configuration
    pub fn with_config(config: &StoreConfig) -> Self {
        Self {
            table: RwLock::new(FdTable::new()),
            log: LogFile::new(config.log_path()),
            max_open_files: config.max_open_files,
        }
    }

    // Every table mutation is applied whole, so a poisoned lock still guards
    // a consistent table.
    fn read_table(&self) -> RwLockReadGuard<'_, FdTable> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, FdTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `buffer` at the start of page `page_no`.
    ///
    /// `buffer` may be shorter than a page (e.g. a file header) but never longer.
    pub fn write_page(&self, handle: FileHandle, page_no: PageId, buffer: &[u8]) -> FileResult<()> {
        check_buffer_len(buffer.len())?;

        let table = self.read_table();
        let entry = table.get(handle).ok_or(FileError::FileNotOpen(handle))?;
        write_all_at(&entry.file, buffer, page_offset(page_no)?)?;

        trace!(%handle, page_no, len = buffer.len(), "wrote page");
        Ok(())
    }

    /// Read `buffer.len()` bytes from the start of page `page_no`.
    ///
    /// Reading past the end of the file is a short read and fails; nothing is
    /// zero-filled.
    pub fn read_page(&self, handle: FileHandle, page_no: PageId, buffer: &mut [u8]) -> FileResult<()> {
        check_buffer_len(buffer.len())?;

        let table = self.read_table();
        let entry = table.get(handle).ok_or(FileError::FileNotOpen(handle))?;
        read_exact_at(&entry.file, buffer, page_offset(page_no)?)?;

        trace!(%handle, page_no, len = buffer.len(), "read page");
        Ok(())
    }

    /// Hand out the next page number of the file.
    ///
    /// The file is not extended here; that happens on the first write to the
    /// returned page.
    pub fn allocate_page(&self, handle: FileHandle) -> FileResult<PageId> {
        let table = self.read_table();
        let entry = table.get(handle).ok_or(FileError::FileNotOpen(handle))?;
        let page_no = entry.allocate_page();

        trace!(%handle, page_no, "allocated page");
        Ok(page_no)
    }

    /// Page numbers are never recycled, so there is nothing to release.
    pub fn deallocate_page(&self, _page_no: PageId) {}

    /// Check whether `path` is a regular file
    pub fn is_file<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    /// Check whether `path` is a directory
    pub fn is_dir<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Create a directory, including missing parents
    pub fn create_dir<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        fs::create_dir_all(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "created directory");
        Ok(())
    }

    /// Remove a directory and everything below it
    pub fn destroy_dir<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        fs::remove_dir_all(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "destroyed directory");
        Ok(())
    }

    /// Create a new, empty file and leave it closed
    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if Self::is_file(path) {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // create_new fails if someone else created the path in the meantime
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    FileError::FileAlreadyExists(path.display().to_string())
                }
                _ => FileError::Io(e),
            })?;

        debug!(path = %path.display(), "created file");
        Ok(())
    }

    /// Delete a file. Files that are currently open cannot be deleted.
    ///
    /// `path` itself is unlinked; when it is a symlink its target survives.
    pub fn destroy_file<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if !Self::is_file(path) {
            return Err(FileError::FileNotFound(path.display().to_string()));
        }
        let canonical = canonical_path(path)?;

        // Hold the table so nobody can open the file between check and unlink
        let table = self.write_table();
        if table.contains_path(&canonical) {
            return Err(FileError::FileStillOpen(path.display().to_string()));
        }
        fs::remove_file(path)?;
        drop(table);

        debug!(path = %path.display(), "destroyed file");
        Ok(())
    }

    /// Open an existing file for reading and writing
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> FileResult<FileHandle> {
        let mut table = self.write_table();
        self.open_locked(&mut table, path.as_ref())
    }

    fn open_locked(&self, table: &mut FdTable, path: &Path) -> FileResult<FileHandle> {
        if !Self::is_file(path) {
            return Err(FileError::FileNotFound(path.display().to_string()));
        }
        let canonical = canonical_path(path)?;

        if table.contains_path(&canonical) {
            return Err(FileError::FileAlreadyOpen(path.display().to_string()));
        }

        // Check if we've reached the max open files limit
        if table.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        let file = OpenOptions::new().read(true).write(true).open(&canonical)?;

        // Continue numbering after the pages that already exist on disk
        let first_free_page = pages_for_len(file.metadata()?.len());
        let handle = table.insert(canonical, file, first_free_page);

        debug!(path = %path.display(), %handle, first_free_page, "opened file");
        Ok(handle)
    }

    /// Close a file, forgetting both directions of its mapping before the
    /// OS handle is released
    pub fn close_file(&self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .write_table()
            .remove(handle)
            .ok_or(FileError::FileNotOpen(handle))?;

        debug!(path = %entry.path.display(), %handle, "closed file");
        drop(entry);
        Ok(())
    }

    /// Size of the file at `path` in bytes
    pub fn get_file_size<P: AsRef<Path>>(&self, path: P) -> FileResult<u64> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileError::FileNotFound(path.display().to_string()),
            _ => FileError::Io(e),
        })?;
        Ok(metadata.len())
    }

    /// Path of the file tracked under `handle`
    pub fn get_path(&self, handle: FileHandle) -> FileResult<PathBuf> {
        self.read_table()
            .get(handle)
            .map(|entry| entry.path.clone())
            .ok_or(FileError::HandleNotFound(handle))
    }

    /// Handle of the file at `path`, opening it if it is not open yet
    pub fn get_or_open<P: AsRef<Path>>(&self, path: P) -> FileResult<FileHandle> {
        let path = path.as_ref();
        let mut table = self.write_table();

        if let Ok(canonical) = path.canonicalize()
            && let Some(handle) = table.handle_of(&canonical)
        {
            return Ok(handle);
        }
        self.open_locked(&mut table, path)
    }

    /// Number of whole or partial pages currently on disk
    pub fn page_count(&self, handle: FileHandle) -> FileResult<usize> {
        let table = self.read_table();
        let entry = table.get(handle).ok_or(FileError::FileNotOpen(handle))?;
        Ok(pages_for_len(entry.file.metadata()?.len()))
    }

    /// Sync a file to disk (flush all OS buffers)
    pub fn sync_file(&self, handle: FileHandle) -> FileResult<()> {
        let table = self.read_table();
        let entry = table.get(handle).ok_or(FileError::FileNotOpen(handle))?;
        entry.file.sync_data()?;
        Ok(())
    }

    /// Sync all open files to disk
    pub fn sync_all(&self) -> FileResult<()> {
        for entry in self.read_table().files() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.read_table().get(handle).is_some()
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.read_table().len()
    }

    /// Append `buffer` to the end of the log file
    pub fn append_log(&self, buffer: &[u8]) -> FileResult<()> {
        self.log.append(buffer)
    }

    /// Read from the log file at `offset`.
    ///
    /// `Ok(None)` means `offset` is past the end of the log, i.e. the caller
    /// has consumed everything written so far. Otherwise returns how many
    /// bytes were read, which is `buffer.len()` clamped to the end of the log.
    pub fn read_log(&self, buffer: &mut [u8], offset: u64) -> FileResult<Option<usize>> {
        self.log.read(buffer, offset)
    }

    /// Current size of the log file in bytes
    pub fn log_size(&self) -> FileResult<u64> {
        self.log.size()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}

impl Default for PageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageStore {
    fn drop(&mut self) {
        let table = self.table.get_mut().unwrap_or_else(PoisonError::into_inner);
        let remaining = table.drain();
        if !remaining.is_empty() {
            warn!(count = remaining.len(), "closing files left open");
        }
        for entry in remaining {
            debug!(path = %entry.path.display(), "closed file on drop");
        }
    }
}

/// Byte offset of `page_no`. The whole page must be addressable.
fn page_offset(page_no: PageId) -> FileResult<u64> {
    let page_size = PAGE_SIZE as u64;
    u64::try_from(page_no)
        .ok()
        .and_then(|page_no| page_no.checked_mul(page_size))
        .filter(|offset| offset.checked_add(page_size).is_some())
        .ok_or(FileError::PageOutOfRange(page_no))
}

fn pages_for_len(len: u64) -> PageId {
    len.div_ceil(PAGE_SIZE as u64) as PageId
}

fn check_buffer_len(len: usize) -> FileResult<()> {
    if len > PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            max: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

fn canonical_path(path: &Path) -> FileResult<PathBuf> {
    path.canonicalize()
        .map_err(|_| FileError::FileNotFound(path.display().to_string()))
}

#[inline]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    #[cfg(unix)]
    {
        file.read_at(buf, offset)
    }

    #[cfg(windows)]
    {
        file.seek_read(buf, offset)
    }
}

#[inline]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    #[cfg(unix)]
    {
        file.write_at(buf, offset)
    }

    #[cfg(windows)]
    {
        file.seek_write(buf, offset)
    }
}

/// Fill `buf` from `offset`, failing with `ShortRead` if end-of-file comes first.
pub(super) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> FileResult<()> {
    let mut read = 0;
    while read < buf.len() {
        match read_at(file, &mut buf[read..], offset + read as u64) {
            Ok(0) => {
                return Err(FileError::ShortRead {
                    expected: buf.len(),
                    actual: read,
                });
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Write all of `buf` at `offset`, failing with `ShortWrite` if the OS stops accepting bytes.
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> FileResult<()> {
    let mut written = 0;
    while written < buf.len() {
        match write_at(file, &buf[written..], offset + written as u64) {
            Ok(0) => {
                return Err(FileError::ShortWrite {
                    expected: buf.len(),
                    actual: written,
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
