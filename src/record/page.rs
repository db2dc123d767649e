use super::bitmap::{Bitmap, BitmapMut};
use super::error::{RecordError, RecordResult};
use super::rid::SlotId;
use crate::file::{PAGE_SIZE, PageId};

/// Slot 0 of every data page is a reserved marker bit; records start here.
pub const FIRST_RECORD_SLOT: SlotId = 1;

/// On-disk encoding of "no next free page"
const NO_FREE_PAGE: u32 = u32::MAX;

/// Page header stored at the beginning of each data page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Next page in the free-page list, if this page is on it
    pub next_free_page: Option<PageId>,
    /// Number of occupied slots
    pub num_records: usize,
}

impl PageHeader {
    pub const SIZE: usize = 8;

    pub fn new() -> Self {
        Self {
            next_free_page: None,
            num_records: 0,
        }
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let next = self.next_free_page.map_or(NO_FREE_PAGE, |p| p as u32);
        let mut result = [0u8; Self::SIZE];
        result[0..4].copy_from_slice(&next.to_le_bytes());
        result[4..8].copy_from_slice(&(self.num_records as u32).to_le_bytes());
        result
    }

    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE {
            return Err(RecordError::Corrupted(format!(
                "Not enough data for page header: {} bytes",
                data.len()
            )));
        }

        let next = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let num_records = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        Ok(Self {
            next_free_page: (next != NO_FREE_PAGE).then_some(next as PageId),
            num_records: num_records as usize,
        })
    }
}

impl Default for PageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// A data page of a heap file: header, occupancy bitmap, then fixed-size slots
#[derive(Debug, Clone)]
pub struct RecordPage {
    buffer: Vec<u8>,
    header: PageHeader, // Cached header for fast access
    records_per_page: usize,
    record_size: usize,
}

impl RecordPage {
    /// Calculate maximum number of slots for a given record size
    pub fn calculate_slot_count(record_size: usize) -> usize {
        if record_size == 0 || record_size > PAGE_SIZE {
            return 0;
        }

        let available = PAGE_SIZE - PageHeader::SIZE;

        // bitmap_size + slot_count * record_size <= available
        // with bitmap_size = ⌈slot_count / 8⌉
        (available * 8) / (1 + record_size * 8)
    }

    /// Largest record size that still leaves one usable slot next to the marker slot
    pub fn max_record_size() -> usize {
        let available = PAGE_SIZE - PageHeader::SIZE;
        (available * 8 - 2) / 16
    }

    /// Create a new empty page
    pub fn new(records_per_page: usize, record_size: usize) -> Self {
        let mut page = Self {
            buffer: vec![0u8; PAGE_SIZE],
            header: PageHeader::new(),
            records_per_page,
            record_size,
        };
        page.write_header();
        page
    }

    /// Wrap a page read from disk
    pub fn from_buffer(
        buffer: Vec<u8>,
        records_per_page: usize,
        record_size: usize,
    ) -> RecordResult<Self> {
        if buffer.len() != PAGE_SIZE {
            return Err(RecordError::Corrupted(format!(
                "Invalid page size: {} bytes",
                buffer.len()
            )));
        }

        let data_end = Self::slots_offset(records_per_page) + records_per_page * record_size;
        if data_end > PAGE_SIZE {
            return Err(RecordError::Corrupted(
                "Page layout exceeds page size".to_string(),
            ));
        }

        let header = PageHeader::deserialize(&buffer[..PageHeader::SIZE])?;
        if header.num_records > records_per_page {
            return Err(RecordError::Corrupted(format!(
                "Page claims {} records but has {} slots",
                header.num_records, records_per_page
            )));
        }

        Ok(Self {
            buffer,
            header,
            records_per_page,
            record_size,
        })
    }

    fn slots_offset(records_per_page: usize) -> usize {
        PageHeader::SIZE + Bitmap::bytes_for(records_per_page)
    }

    fn write_header(&mut self) {
        self.buffer[..PageHeader::SIZE].copy_from_slice(&self.header.serialize());
    }

    /// Raw page bytes, ready to be written to disk
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// Occupancy bitmap with one bit per slot
    pub fn bitmap(&self) -> Bitmap<'_> {
        let end = Self::slots_offset(self.records_per_page);
        Bitmap::new(&self.buffer[PageHeader::SIZE..end], self.records_per_page)
    }

    fn bitmap_mut(&mut self) -> BitmapMut<'_> {
        let end = Self::slots_offset(self.records_per_page);
        BitmapMut::new(&mut self.buffer[PageHeader::SIZE..end], self.records_per_page)
    }

    fn check_slot(&self, slot_no: SlotId) -> RecordResult<()> {
        if slot_no >= self.records_per_page {
            return Err(RecordError::InvalidSlot {
                slot_no,
                records_per_page: self.records_per_page,
            });
        }
        Ok(())
    }

    fn slot_range(&self, slot_no: SlotId) -> std::ops::Range<usize> {
        let start = Self::slots_offset(self.records_per_page) + slot_no * self.record_size;
        start..start + self.record_size
    }

    /// Number of slots that can hold records (the marker slot excluded)
    pub fn capacity(&self) -> usize {
        self.records_per_page.saturating_sub(FIRST_RECORD_SLOT)
    }

    pub fn num_records(&self) -> usize {
        self.header.num_records
    }

    /// Find a free slot, returns None if page is full
    pub fn find_free_slot(&self) -> Option<SlotId> {
        if self.is_full() {
            return None;
        }
        self.bitmap().find_first_clear_from(FIRST_RECORD_SLOT)
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot_no: SlotId) -> bool {
        self.bitmap().is_set(slot_no)
    }

    /// Mark a slot as used
    pub fn mark_slot_used(&mut self, slot_no: SlotId) -> RecordResult<()> {
        self.check_slot(slot_no)?;

        if !self.is_slot_used(slot_no) {
            self.bitmap_mut().set(slot_no);
            self.header.num_records += 1;
            self.write_header();
        }
        Ok(())
    }

    /// Mark a slot as free
    pub fn mark_slot_free(&mut self, slot_no: SlotId) -> RecordResult<()> {
        self.check_slot(slot_no)?;

        if self.is_slot_used(slot_no) {
            self.bitmap_mut().clear(slot_no);
            self.header.num_records = self.header.num_records.saturating_sub(1);
            self.write_header();
        }
        Ok(())
    }

    /// Get record data from a slot
    pub fn get_record(&self, slot_no: SlotId) -> RecordResult<&[u8]> {
        self.check_slot(slot_no)?;
        if !self.is_slot_used(slot_no) {
            return Err(RecordError::EmptySlot(slot_no));
        }
        Ok(&self.buffer[self.slot_range(slot_no)])
    }

    /// Set record data in a slot
    pub fn set_record(&mut self, slot_no: SlotId, data: &[u8]) -> RecordResult<()> {
        self.check_slot(slot_no)?;
        if data.len() != self.record_size {
            return Err(RecordError::LengthMismatch {
                expected: self.record_size,
                actual: data.len(),
            });
        }

        let range = self.slot_range(slot_no);
        self.buffer[range].copy_from_slice(data);
        Ok(())
    }

    pub fn next_free_page(&self) -> Option<PageId> {
        self.header.next_free_page
    }

    pub fn set_next_free_page(&mut self, page_no: Option<PageId>) {
        self.header.next_free_page = page_no;
        self.write_header();
    }

    /// Check if page is full
    pub fn is_full(&self) -> bool {
        self.header.num_records >= self.capacity()
    }

    /// Check if page is empty
    pub fn is_empty(&self) -> bool {
        self.header.num_records == 0
    }
}
