//! Sequential scan over the occupied slots of a heap file.

use super::error::RecordResult;
use super::page::{FIRST_RECORD_SLOT, RecordPage};
use super::rid::{Rid, SlotId};
use crate::file::PageId;

/// Page 0 holds the file header and is never scanned
pub const FIRST_DATA_PAGE: PageId = 1;

/// Something that can hand out the data pages of a heap file.
pub trait PageSource {
    /// Total pages, header page included
    fn page_count(&self) -> PageId;

    /// Slots per page, uniform across the file
    fn records_per_page(&self) -> usize;

    /// Fetch page `page_no` (header and occupancy bitmap)
    fn fetch_page(&self, page_no: PageId) -> RecordResult<RecordPage>;
}

/// Cursor over the record ids of a heap file, in page then slot order.
///
/// The cursor is [`Rid::NONE`] once the scan is exhausted. A scan assumes no
/// pages or slots are allocated or freed underneath it while it runs.
#[derive(Debug)]
pub struct HeapScan<'a, S: PageSource + ?Sized> {
    source: &'a S,
    rid: Rid,
}

impl<'a, S: PageSource + ?Sized> HeapScan<'a, S> {
    /// Position a new scan on the first record of the file.
    ///
    /// The first page with a non-zero record count is searched from
    /// [`FIRST_RECORD_SLOT`] on, never from slot 0.
    pub fn start(source: &'a S) -> RecordResult<Self> {
        let mut scan = Self {
            source,
            rid: Rid::NONE,
        };

        for page_no in FIRST_DATA_PAGE..source.page_count() {
            let page = source.fetch_page(page_no)?;
            if page.num_records() > 0 {
                scan.rid = scan.seek(page_no, page, FIRST_RECORD_SLOT)?;
                break;
            }
        }
        Ok(scan)
    }

    /// Move the cursor to the next occupied slot, or to [`Rid::NONE`].
    pub fn next(&mut self) -> RecordResult<()> {
        if self.is_end() {
            return Ok(());
        }
        if self.rid.page_no >= self.source.page_count() {
            self.rid = Rid::NONE;
            return Ok(());
        }

        let page = self.source.fetch_page(self.rid.page_no)?;
        self.rid = self.seek(self.rid.page_no, page, self.rid.slot_no + 1)?;
        Ok(())
    }

    pub fn is_end(&self) -> bool {
        self.rid.page_no == Rid::NONE.page_no
    }

    /// Current record id; [`Rid::NONE`] once exhausted
    pub fn current(&self) -> Rid {
        self.rid
    }

    /// Turn the scan into an iterator of record ids
    pub fn rids(self) -> Rids<'a, S> {
        Rids {
            scan: self,
            failed: false,
        }
    }

    /// Lowest set bit at or after `(page_no, from)`, among the first
    /// `records_per_page` bits of each page.
    ///
    /// A page searched to the end hands over to the next page with the search
    /// restarting at slot 0.
    fn seek(&self, mut page_no: PageId, mut page: RecordPage, mut from: SlotId) -> RecordResult<Rid> {
        let page_count = self.source.page_count();
        let records_per_page = self.source.records_per_page();
        loop {
            if let Some(slot_no) = page
                .bitmap()
                .find_first_set_from(from)
                .filter(|&slot_no| slot_no < records_per_page)
            {
                return Ok(Rid::new(page_no, slot_no));
            }

            page_no += 1;
            if page_no >= page_count {
                return Ok(Rid::NONE);
            }
            page = self.source.fetch_page(page_no)?;
            from = 0;
        }
    }
}

/// Iterator adapter over a [`HeapScan`]; stops after the first error
#[derive(Debug)]
pub struct Rids<'a, S: PageSource + ?Sized> {
    scan: HeapScan<'a, S>,
    failed: bool,
}

impl<S: PageSource + ?Sized> Iterator for Rids<'_, S> {
    type Item = RecordResult<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.scan.is_end() {
            return None;
        }

        let rid = self.scan.current();
        match self.scan.next() {
            Ok(()) => Some(Ok(rid)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
