//! Slot occupancy bitmaps.
//!
//! Bit `i` lives in byte `i / 8` at position `i % 8` (least significant bit
//! first). A set bit means the slot is occupied.

/// Read-only view of an occupancy bitmap holding `len` bits
#[derive(Debug, Clone, Copy)]
pub struct Bitmap<'a> {
    bytes: &'a [u8],
    len: usize,
}

impl<'a> Bitmap<'a> {
    /// Number of bytes needed to hold `len` bits
    pub fn bytes_for(len: usize) -> usize {
        len.div_ceil(8)
    }

    /// Wrap `bytes`, which must hold at least `len` bits
    pub fn new(bytes: &'a [u8], len: usize) -> Self {
        debug_assert!(bytes.len() >= Self::bytes_for(len));
        Self { bytes, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_set(&self, pos: usize) -> bool {
        pos < self.len && (self.bytes[pos / 8] & (1 << (pos % 8))) != 0
    }

    /// Lowest set bit at or after `start`, or `None` if there is none below `len`.
    pub fn find_first_set_from(&self, start: usize) -> Option<usize> {
        self.find_from(start, true)
    }

    /// Lowest clear bit at or after `start`
    pub fn find_first_clear_from(&self, start: usize) -> Option<usize> {
        self.find_from(start, false)
    }

    fn find_from(&self, start: usize, value: bool) -> Option<usize> {
        let mut pos = start;
        while pos < self.len {
            let byte = self.bytes[pos / 8];
            // Skip whole bytes that cannot contain a match
            if pos % 8 == 0 && ((value && byte == 0) || (!value && byte == 0xFF)) {
                pos += 8;
                continue;
            }
            if ((byte & (1 << (pos % 8))) != 0) == value {
                return Some(pos);
            }
            pos += 1;
        }
        None
    }

    /// Number of set bits
    pub fn count_set(&self) -> usize {
        (0..self.len).filter(|&pos| self.is_set(pos)).count()
    }
}

/// Mutable view of an occupancy bitmap
#[derive(Debug)]
pub struct BitmapMut<'a> {
    bytes: &'a mut [u8],
    len: usize,
}

impl<'a> BitmapMut<'a> {
    pub fn new(bytes: &'a mut [u8], len: usize) -> Self {
        debug_assert!(bytes.len() >= Bitmap::bytes_for(len));
        Self { bytes, len }
    }

    pub fn as_bitmap(&self) -> Bitmap<'_> {
        Bitmap::new(&*self.bytes, self.len)
    }

    pub fn set(&mut self, pos: usize) {
        debug_assert!(pos < self.len);
        self.bytes[pos / 8] |= 1 << (pos % 8);
    }

    pub fn clear(&mut self, pos: usize) {
        debug_assert!(pos < self.len);
        self.bytes[pos / 8] &= !(1 << (pos % 8));
    }

    pub fn clear_all(&mut self) {
        let n = Bitmap::bytes_for(self.len);
        self.bytes[..n].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_with(len: usize, set: &[usize]) -> Vec<u8> {
        let mut bytes = vec![0u8; Bitmap::bytes_for(len)];
        let mut bitmap = BitmapMut::new(&mut bytes, len);
        for &pos in set {
            bitmap.set(pos);
        }
        bytes
    }

    #[test]
    fn test_bytes_for() {
        assert_eq!(Bitmap::bytes_for(0), 0);
        assert_eq!(Bitmap::bytes_for(1), 1);
        assert_eq!(Bitmap::bytes_for(8), 1);
        assert_eq!(Bitmap::bytes_for(9), 2);
    }

    #[test]
    fn test_set_and_clear() {
        let mut bytes = vec![0u8; 2];
        let mut bitmap = BitmapMut::new(&mut bytes, 12);
        bitmap.set(0);
        bitmap.set(11);
        assert!(bitmap.as_bitmap().is_set(0));
        assert!(bitmap.as_bitmap().is_set(11));
        assert!(!bitmap.as_bitmap().is_set(5));

        bitmap.clear(0);
        assert!(!bitmap.as_bitmap().is_set(0));
        assert_eq!(bitmap.as_bitmap().count_set(), 1);

        bitmap.clear_all();
        assert_eq!(bitmap.as_bitmap().count_set(), 0);
    }

    #[test]
    fn test_find_first_set_from() {
        let bytes = bitmap_with(20, &[1, 3, 17]);
        let bitmap = Bitmap::new(&bytes, 20);

        assert_eq!(bitmap.find_first_set_from(0), Some(1));
        assert_eq!(bitmap.find_first_set_from(1), Some(1));
        assert_eq!(bitmap.find_first_set_from(2), Some(3));
        assert_eq!(bitmap.find_first_set_from(4), Some(17));
        assert_eq!(bitmap.find_first_set_from(18), None);
        assert_eq!(bitmap.find_first_set_from(20), None);
        assert_eq!(bitmap.find_first_set_from(usize::MAX), None);
    }

    #[test]
    fn test_bits_past_len_are_ignored() {
        // Bit 5 is set in the byte but lies outside a 4-bit bitmap
        let bytes = [0b0010_0000u8];
        let bitmap = Bitmap::new(&bytes, 4);
        assert_eq!(bitmap.find_first_set_from(0), None);
        assert!(!bitmap.is_set(5));
        assert_eq!(bitmap.find_first_clear_from(3), Some(3));
        assert_eq!(bitmap.find_first_clear_from(4), None);
    }

    #[test]
    fn test_find_first_clear_from() {
        let bytes = [0xFFu8, 0b0000_0101];
        let bitmap = Bitmap::new(&bytes, 16);
        assert_eq!(bitmap.find_first_clear_from(0), Some(9));
        assert_eq!(bitmap.find_first_clear_from(10), Some(11));
    }
}
