use serde::Serialize;

use super::bitmap::Bitmap;
use super::error::{RecordError, RecordResult};
use super::page::{FIRST_RECORD_SLOT, RecordPage};
use crate::file::PageId;

/// Identifies page 0 of a heap file
const MAGIC: u32 = 0x4850_4631; // "HPF1"

/// On-disk encoding of "free list is empty"
const NO_FREE_PAGE: u32 = u32::MAX;

/// File header stored in page 0 of every heap file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    /// Size of each record in bytes
    pub record_size: usize,
    /// Total pages, header page included
    pub num_pages: usize,
    /// Slots per data page, the marker slot included
    pub records_per_page: usize,
    /// Head of the list of pages with at least one free slot
    pub first_free_page: Option<PageId>,
    /// Bytes of occupancy bitmap per page
    pub bitmap_size: usize,
}

impl FileHeader {
    pub const SIZE: usize = 24;

    /// Header for an empty heap file holding `record_size`-byte records
    pub fn new(record_size: usize) -> RecordResult<Self> {
        let records_per_page = RecordPage::calculate_slot_count(record_size);
        if records_per_page <= FIRST_RECORD_SLOT {
            return Err(RecordError::InvalidRecordSize {
                size: record_size,
                max: RecordPage::max_record_size(),
            });
        }

        Ok(Self {
            record_size,
            num_pages: 1,
            records_per_page,
            first_free_page: None,
            bitmap_size: Bitmap::bytes_for(records_per_page),
        })
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let first_free = self.first_free_page.map_or(NO_FREE_PAGE, |p| p as u32);
        let mut result = [0u8; Self::SIZE];
        result[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        result[4..8].copy_from_slice(&(self.record_size as u32).to_le_bytes());
        result[8..12].copy_from_slice(&(self.num_pages as u32).to_le_bytes());
        result[12..16].copy_from_slice(&(self.records_per_page as u32).to_le_bytes());
        result[16..20].copy_from_slice(&first_free.to_le_bytes());
        result[20..24].copy_from_slice(&(self.bitmap_size as u32).to_le_bytes());
        result
    }

    pub fn deserialize(data: &[u8]) -> RecordResult<Self> {
        if data.len() < Self::SIZE {
            return Err(RecordError::Corrupted(format!(
                "Not enough data for file header: {} bytes",
                data.len()
            )));
        }

        let field = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

        if field(0) != MAGIC {
            return Err(RecordError::Corrupted("Bad file header magic".to_string()));
        }

        let header = Self {
            record_size: field(4) as usize,
            num_pages: field(8) as usize,
            records_per_page: field(12) as usize,
            first_free_page: match field(16) {
                NO_FREE_PAGE => None,
                page_no => Some(page_no as PageId),
            },
            bitmap_size: field(20) as usize,
        };

        if header.num_pages == 0
            || header.records_per_page != RecordPage::calculate_slot_count(header.record_size)
            || header.bitmap_size != Bitmap::bytes_for(header.records_per_page)
        {
            return Err(RecordError::Corrupted(format!(
                "Inconsistent file header: {:?}",
                header
            )));
        }

        Ok(header)
    }
}
