mod error;
mod fd_table;
mod log_file;
mod page_store;

pub use error::{FileError, FileResult};
pub use fd_table::FileHandle;
pub use page_store::PageStore;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Page ID type
pub type PageId = usize;
