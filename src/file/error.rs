use std::io;
use thiserror::Error;

use super::{FileHandle, PageId};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite { expected: usize, actual: usize },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No file is mapped to handle {0}")]
    HandleNotFound(FileHandle),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("File already open: {0}")]
    FileAlreadyOpen(String),

    #[error("File still open: {0}")]
    FileStillOpen(String),

    #[error("File not open: handle {0}")]
    FileNotOpen(FileHandle),

    #[error("Invalid page size: at most {max} bytes, got {actual}")]
    InvalidPageSize { max: usize, actual: usize },

    #[error("Page {0} lies beyond the largest addressable file offset")]
    PageOutOfRange(PageId),

    #[error("File handle limit reached")]
    TooManyOpenFiles,
}

impl FileError {
    /// Whether this error came from the operating system or a truncated transfer.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            FileError::Io(_) | FileError::ShortRead { .. } | FileError::ShortWrite { .. }
        )
    }
}

pub type FileResult<T> = Result<T, FileError>;
