use std::fmt;

use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Page component of an exhausted / absent record id
pub const NO_PAGE: PageId = PageId::MAX;

/// Slot component of an exhausted / absent record id
pub const NO_SLOT: SlotId = SlotId::MAX;

/// Physical identifier for a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_no: PageId,
    pub slot_no: SlotId,
}

impl Rid {
    /// "No record": also marks the end of a scan
    pub const NONE: Rid = Rid {
        page_no: NO_PAGE,
        slot_no: NO_SLOT,
    };

    pub fn new(page_no: PageId, slot_no: SlotId) -> Self {
        Self { page_no, slot_no }
    }

    pub fn is_none(&self) -> bool {
        self.page_no == NO_PAGE
    }
}

impl Default for Rid {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "(-1, -1)")
        } else {
            write!(f, "({}, {})", self.page_no, self.slot_no)
        }
    }
}
