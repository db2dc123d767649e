use crate::file::FileError;
use thiserror::Error;

use super::rid::Rid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Invalid record size {size}: must be between 1 and {max} bytes")]
    InvalidRecordSize { size: usize, max: usize },

    #[error("Record not found: {0}")]
    RecordNotFound(Rid),

    #[error("Invalid slot {slot_no}: page has {records_per_page} slots")]
    InvalidSlot { slot_no: usize, records_per_page: usize },

    #[error("Slot {0} is empty")]
    EmptySlot(usize),

    #[error("Page not found: page_no={0}")]
    PageNotFound(usize),

    #[error("Record length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Corrupted heap file: {0}")]
    Corrupted(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
