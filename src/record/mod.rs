mod bitmap;
mod error;
mod file_header;
mod heap_file;
mod page;
mod rid;
mod scan;


pub use bitmap::{Bitmap, BitmapMut};
pub use error::{RecordError, RecordResult};
pub use file_header::FileHeader;
pub use heap_file::HeapFile;
pub use page::{FIRST_RECORD_SLOT, PageHeader, RecordPage};
pub use rid::{NO_PAGE, NO_SLOT, Rid, SlotId};
pub use scan::{FIRST_DATA_PAGE, HeapScan, PageSource, Rids};
