use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use super::error::{FileError, FileResult};
use super::page_store::read_exact_at;

/// The write-ahead log file, opened lazily on first access.
///
/// Writes always land at the current end of the file. Reads are positional.
/// No record framing is imposed here.
#[derive(Debug)]
pub(crate) struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run `f` against the log file, opening (and creating) it first if needed.
    fn with_file<T>(&self, f: impl FnOnce(&File) -> FileResult<T>) -> FileResult<T> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let file = match guard.take() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create(true)
                    .open(&self.path)?;
                debug!(path = %self.path.display(), "opened log file");
                file
            }
        };
        let file = guard.insert(file);
        f(file)
    }

    /// Append `buf` at the end of the log.
    pub(crate) fn append(&self, buf: &[u8]) -> FileResult<()> {
        self.with_file(|mut file| {
            let mut written = 0;
            while written < buf.len() {
                let n = file.write(&buf[written..])?;
                if n == 0 {
                    return Err(FileError::ShortWrite {
                        expected: buf.len(),
                        actual: written,
                    });
                }
                written += n;
            }
            trace!(len = buf.len(), "appended to log");
            Ok(())
        })
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns `None` when `offset` lies past the end of the log, otherwise the
    /// number of bytes read, clamped so the read never crosses end-of-file.
    pub(crate) fn read(&self, buf: &mut [u8], offset: u64) -> FileResult<Option<usize>> {
        self.with_file(|file| {
            let file_size = file.metadata()?.len();
            if offset > file_size {
                return Ok(None);
            }

            let available = usize::try_from(file_size - offset).unwrap_or(usize::MAX);
            let size = buf.len().min(available);
            if size == 0 {
                return Ok(Some(0));
            }

            read_exact_at(file, &mut buf[..size], offset)?;
            Ok(Some(size))
        })
    }

    /// Current size of the log in bytes.
    pub(crate) fn size(&self) -> FileResult<u64> {
        self.with_file(|file| Ok(file.metadata()?.len()))
    }
}
