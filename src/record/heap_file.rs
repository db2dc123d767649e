use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::error::{RecordError, RecordResult};
use super::file_header::FileHeader;
use super::page::{FIRST_RECORD_SLOT, RecordPage};
use super::rid::Rid;
use super::scan::{FIRST_DATA_PAGE, HeapScan, PageSource};
use crate::file::{FileHandle, PAGE_SIZE, PageId, PageStore};

/// A heap file of fixed-size records, read and written straight through a
/// `PageStore`.
///
/// Page 0 holds the [`FileHeader`]; every other page is a [`RecordPage`].
/// Pages with at least one free slot are chained into a free list starting
/// at `FileHeader::first_free_page`.
#[derive(Debug)]
pub struct HeapFile {
    store: Arc<PageStore>,
    handle: FileHandle,
    header: FileHeader,
    open: bool,
}

impl HeapFile {
    /// Create an empty heap file for records of `record_size` bytes.
    /// The file is left closed.
    pub fn create<P: AsRef<Path>>(store: &PageStore, path: P, record_size: usize) -> RecordResult<()> {
        let path = path.as_ref();
        let header = FileHeader::new(record_size)?;

        store.create_file(path)?;
        let handle = store.open_file(path)?;

        let mut page = vec![0u8; PAGE_SIZE];
        page[..FileHeader::SIZE].copy_from_slice(&header.serialize());
        let written = store
            .allocate_page(handle)
            .and_then(|page_no| store.write_page(handle, page_no, &page));
        store.close_file(handle)?;
        written?;

        debug!(path = %path.display(), record_size, records_per_page = header.records_per_page, "created heap file");
        Ok(())
    }

    /// Open an existing heap file
    pub fn open<P: AsRef<Path>>(store: Arc<PageStore>, path: P) -> RecordResult<Self> {
        let path = path.as_ref();
        let handle = store.open_file(path)?;

        let header = match Self::read_header(&store, handle) {
            Ok(header) => header,
            Err(e) => {
                store.close_file(handle)?;
                return Err(e);
            }
        };

        debug!(path = %path.display(), %handle, num_pages = header.num_pages, "opened heap file");
        Ok(Self {
            store,
            handle,
            header,
            open: true,
        })
    }

    fn read_header(store: &PageStore, handle: FileHandle) -> RecordResult<FileHeader> {
        let mut buffer = [0u8; FileHeader::SIZE];
        store.read_page(handle, 0, &mut buffer)?;
        FileHeader::deserialize(&buffer)
    }

    /// Persist the header and close the file
    pub fn close(mut self) -> RecordResult<()> {
        self.release()
    }

    fn release(&mut self) -> RecordResult<()> {
        self.open = false;
        let flushed = self.write_header();
        self.store.close_file(self.handle)?;
        flushed?;

        debug!(handle = %self.handle, "closed heap file");
        Ok(())
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn record_size(&self) -> usize {
        self.header.record_size
    }

    /// Scan the record ids of this file
    pub fn scan(&self) -> RecordResult<HeapScan<'_, Self>> {
        HeapScan::start(self)
    }

    /// Insert a record, returning where it was placed
    pub fn insert_record(&mut self, data: &[u8]) -> RecordResult<Rid> {
        self.check_len(data)?;

        let (page_no, mut page) = self.free_page()?;
        let slot_no = page.find_free_slot().ok_or_else(|| {
            RecordError::Corrupted(format!("page {page_no} is on the free list but full"))
        })?;

        page.set_record(slot_no, data)?;
        page.mark_slot_used(slot_no)?;

        // A full page leaves the free list
        if page.is_full() {
            self.header.first_free_page = page.next_free_page();
            page.set_next_free_page(None);
        }

        self.write_data_page(page_no, &page)?;
        self.write_header()?;

        let rid = Rid::new(page_no, slot_no);
        trace!(%rid, "inserted record");
        Ok(rid)
    }

    /// Delete the record at `rid`
    pub fn delete_record(&mut self, rid: Rid) -> RecordResult<()> {
        let mut page = self.record_page(rid)?;

        let was_full = page.is_full();
        page.mark_slot_free(rid.slot_no)?;

        // A page that regains a free slot rejoins the free list
        if was_full {
            page.set_next_free_page(self.header.first_free_page);
            self.header.first_free_page = Some(rid.page_no);
        }

        self.write_data_page(rid.page_no, &page)?;
        self.write_header()?;

        trace!(%rid, "deleted record");
        Ok(())
    }

    /// Read the record at `rid`
    pub fn get_record(&self, rid: Rid) -> RecordResult<Vec<u8>> {
        let page = self.record_page(rid)?;
        Ok(page.get_record(rid.slot_no)?.to_vec())
    }

    /// Overwrite the record at `rid` in place
    pub fn update_record(&mut self, rid: Rid, data: &[u8]) -> RecordResult<()> {
        self.check_len(data)?;

        let mut page = self.record_page(rid)?;
        page.set_record(rid.slot_no, data)?;
        self.write_data_page(rid.page_no, &page)?;

        trace!(%rid, "updated record");
        Ok(())
    }

    /// Whether `rid` points at an occupied slot
    pub fn is_record(&self, rid: Rid) -> RecordResult<bool> {
        if !self.rid_in_range(rid) {
            return Ok(false);
        }
        Ok(self.fetch_page(rid.page_no)?.is_slot_used(rid.slot_no))
    }

    /// Persist the header and sync the file to disk
    pub fn sync(&self) -> RecordResult<()> {
        self.write_header()?;
        self.store.sync_file(self.handle)?;
        Ok(())
    }

    fn check_len(&self, data: &[u8]) -> RecordResult<()> {
        if data.len() != self.header.record_size {
            return Err(RecordError::LengthMismatch {
                expected: self.header.record_size,
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn rid_in_range(&self, rid: Rid) -> bool {
        (FIRST_DATA_PAGE..self.header.num_pages).contains(&rid.page_no)
            && (FIRST_RECORD_SLOT..self.header.records_per_page).contains(&rid.slot_no)
    }

    /// The page holding the occupied slot `rid`
    fn record_page(&self, rid: Rid) -> RecordResult<RecordPage> {
        if !self.rid_in_range(rid) {
            return Err(RecordError::RecordNotFound(rid));
        }
        let page = self.fetch_page(rid.page_no)?;
        if !page.is_slot_used(rid.slot_no) {
            return Err(RecordError::RecordNotFound(rid));
        }
        Ok(page)
    }

    /// Head of the free list, or a freshly allocated page pushed onto it
    fn free_page(&mut self) -> RecordResult<(PageId, RecordPage)> {
        if let Some(page_no) = self.header.first_free_page {
            return Ok((page_no, self.fetch_page(page_no)?));
        }

        let page_no = self.store.allocate_page(self.handle)?;
        let page = RecordPage::new(self.header.records_per_page, self.header.record_size);
        self.write_data_page(page_no, &page)?;

        self.header.num_pages = self.header.num_pages.max(page_no + 1);
        self.header.first_free_page = Some(page_no);
        debug!(handle = %self.handle, page_no, "added page to heap file");
        Ok((page_no, page))
    }

    fn write_data_page(&self, page_no: PageId, page: &RecordPage) -> RecordResult<()> {
        self.store.write_page(self.handle, page_no, page.as_bytes())?;
        Ok(())
    }

    fn write_header(&self) -> RecordResult<()> {
        self.store
            .write_page(self.handle, 0, &self.header.serialize())?;
        Ok(())
    }
}

impl PageSource for HeapFile {
    fn page_count(&self) -> PageId {
        self.header.num_pages
    }

    fn records_per_page(&self) -> usize {
        self.header.records_per_page
    }

    fn fetch_page(&self, page_no: PageId) -> RecordResult<RecordPage> {
        if page_no < FIRST_DATA_PAGE || page_no >= self.header.num_pages {
            return Err(RecordError::PageNotFound(page_no));
        }

        let mut buffer = vec![0u8; PAGE_SIZE];
        self.store.read_page(self.handle, page_no, &mut buffer)?;
        RecordPage::from_buffer(buffer, self.header.records_per_page, self.header.record_size)
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        if self.open
            && let Err(e) = self.release()
        {
            warn!(handle = %self.handle, error = %e, "failed to close heap file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::file::FileError;
    use tempfile::TempDir;

    // 4 slots per page, 3 usable
    const RECORD_SIZE: usize = 1000;

    fn setup() -> (TempDir, Arc<PageStore>) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..StoreConfig::default()
        };
        (temp_dir, Arc::new(PageStore::with_config(&config)))
    }

    fn record(byte: u8) -> Vec<u8> {
        vec![byte; RECORD_SIZE]
    }

    fn scan_all(file: &HeapFile) -> Vec<Rid> {
        file.scan()
            .unwrap()
            .rids()
            .collect::<RecordResult<_>>()
            .unwrap()
    }

    #[test]
    fn test_create_and_open() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");

        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        assert_eq!(store.open_file_count(), 0);
        assert_eq!(store.get_file_size(&path).unwrap(), PAGE_SIZE as u64);

        let file = HeapFile::open(Arc::clone(&store), &path).unwrap();
        assert_eq!(file.record_size(), RECORD_SIZE);
        assert_eq!(file.page_count(), 1);
        assert_eq!(file.records_per_page(), 4);
        assert!(file.scan().unwrap().is_end());
    }

    #[test]
    fn test_create_rejects_bad_record_size() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");

        let result = HeapFile::create(&store, &path, 0);
        assert!(matches!(result, Err(RecordError::InvalidRecordSize { .. })));
        assert!(!PageStore::is_file(&path));
    }

    #[test]
    fn test_create_existing_file() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");

        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let result = HeapFile::create(&store, &path, RECORD_SIZE);
        assert!(matches!(
            result,
            Err(RecordError::File(FileError::FileAlreadyExists(_)))
        ));
    }

    #[test]
    fn test_open_foreign_file() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        store.create_file(&path).unwrap();

        let result = HeapFile::open(Arc::clone(&store), &path);
        assert!(matches!(
            result,
            Err(RecordError::File(FileError::ShortRead { .. }))
        ));
        // The failed open does not leak a tracked handle
        assert_eq!(store.open_file_count(), 0);
    }

    #[test]
    fn test_insert_and_get() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        let rid = file.insert_record(&record(7)).unwrap();
        assert_eq!(rid, Rid::new(1, FIRST_RECORD_SLOT));
        assert_eq!(file.get_record(rid).unwrap(), record(7));
        assert!(file.is_record(rid).unwrap());
        assert!(!file.is_record(Rid::new(1, 2)).unwrap());
    }

    #[test]
    fn test_insert_wrong_length() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        let result = file.insert_record(&[1, 2, 3]);
        assert!(matches!(result, Err(RecordError::LengthMismatch { .. })));
    }

    #[test]
    fn test_insert_spills_to_new_pages() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        let rids: Vec<Rid> = (0..7u8)
            .map(|i| file.insert_record(&record(i)).unwrap())
            .collect();

        assert_eq!(
            rids,
            vec![
                Rid::new(1, 1),
                Rid::new(1, 2),
                Rid::new(1, 3),
                Rid::new(2, 1),
                Rid::new(2, 2),
                Rid::new(2, 3),
                Rid::new(3, 1),
            ]
        );
        assert_eq!(file.page_count(), 4);
        assert_eq!(file.header().first_free_page, Some(3));
        assert_eq!(scan_all(&file), rids);
    }

    #[test]
    fn test_delete_reuses_slot() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        for i in 0..6u8 {
            file.insert_record(&record(i)).unwrap();
        }
        assert_eq!(file.header().first_free_page, None);

        file.delete_record(Rid::new(1, 2)).unwrap();
        assert_eq!(file.header().first_free_page, Some(1));
        assert!(matches!(
            file.get_record(Rid::new(1, 2)),
            Err(RecordError::RecordNotFound(_))
        ));

        let rid = file.insert_record(&record(42)).unwrap();
        assert_eq!(rid, Rid::new(1, 2));
        assert_eq!(file.get_record(rid).unwrap(), record(42));
        assert_eq!(file.page_count(), 3);
    }

    #[test]
    fn test_delete_missing_record() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();
        file.insert_record(&record(1)).unwrap();

        for rid in [Rid::new(1, 2), Rid::new(1, 0), Rid::new(9, 1), Rid::NONE] {
            assert!(matches!(
                file.delete_record(rid),
                Err(RecordError::RecordNotFound(_))
            ));
        }
    }

    #[test]
    fn test_update_record() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        let rid = file.insert_record(&record(1)).unwrap();
        file.update_record(rid, &record(2)).unwrap();
        assert_eq!(file.get_record(rid).unwrap(), record(2));

        let result = file.update_record(Rid::new(1, 3), &record(3));
        assert!(matches!(result, Err(RecordError::RecordNotFound(_))));
    }

    #[test]
    fn test_scan_after_deletes() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();
        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();

        let rids: Vec<Rid> = (0..9u8)
            .map(|i| file.insert_record(&record(i)).unwrap())
            .collect();

        // Empty out page 2 entirely and punch a hole in page 1
        for rid in &rids[3..6] {
            file.delete_record(*rid).unwrap();
        }
        file.delete_record(rids[1]).unwrap();

        let expected: Vec<Rid> = vec![rids[0], rids[2], rids[6], rids[7], rids[8]];
        assert_eq!(scan_all(&file), expected);
    }

    #[test]
    fn test_reopen_persists_records() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();

        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();
        let rids: Vec<Rid> = (0..5u8)
            .map(|i| file.insert_record(&record(i)).unwrap())
            .collect();
        file.close().unwrap();
        assert_eq!(store.open_file_count(), 0);

        let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();
        assert_eq!(scan_all(&file), rids);
        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(file.get_record(*rid).unwrap(), record(i as u8));
        }

        // New pages continue after the existing ones
        file.insert_record(&record(5)).unwrap();
        let rid = file.insert_record(&record(6)).unwrap();
        assert_eq!(rid, Rid::new(3, 1));
    }

    #[test]
    fn test_drop_closes_file() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();

        {
            let mut file = HeapFile::open(Arc::clone(&store), &path).unwrap();
            file.insert_record(&record(1)).unwrap();
        }
        assert_eq!(store.open_file_count(), 0);

        store.destroy_file(&path).unwrap();
    }

    #[test]
    fn test_open_twice_fails() {
        let (temp_dir, store) = setup();
        let path = temp_dir.path().join("t.heap");
        HeapFile::create(&store, &path, RECORD_SIZE).unwrap();

        let _file = HeapFile::open(Arc::clone(&store), &path).unwrap();
        let result = HeapFile::open(Arc::clone(&store), &path);
        assert!(matches!(
            result,
            Err(RecordError::File(FileError::FileAlreadyOpen(_)))
        ));
    }
}
