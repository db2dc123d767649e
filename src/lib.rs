//! Lowest layer of a disk-based relational storage engine.
//!
//! - [`file`]: the [`PageStore`], which maps files to handles, hands out page
//!   numbers and performs exact-offset page and log I/O.
//! - [`record`]: heap files of fixed-size records and the [`HeapScan`] that
//!   walks their occupancy bitmaps.

pub mod config;
pub mod file;
pub mod record;

pub use config::{ConfigError, StoreConfig};
pub use file::{FileError, FileHandle, FileResult, PAGE_SIZE, PageId, PageStore};
pub use record::{
    FileHeader, HeapFile, HeapScan, PageSource, RecordError, RecordPage, RecordResult, Rid,
    SlotId,
};
