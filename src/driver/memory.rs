//! Addressable reads into the shared music-data image
//!
//! The envelope interpreters walk byte-coded programs stored in the same ROM
//! image the sound CPU sees. The image is supplied by the host; the
//! interpreters only need random-access byte/word reads. Bounds handling is
//! the image's job: reads wrap, they never fault.

use std::path::Path;

use crate::Result;

/// Random-access reads into the music-data image.
pub trait SoundData {
    /// Read one byte.
    fn read_byte(&self, offset: u32) -> u8;
    /// Read one 16-bit word in the image's native order.
    fn read_word(&self, offset: u32) -> u16;
}

/// Word order of the ROM image.
///
/// The M37710-family driver stores words little-endian; the older 6809-era
/// driver big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    /// Low byte first
    LittleEndian,
    /// High byte first
    BigEndian,
}

/// Owned ROM image with wrapping reads.
#[derive(Debug, Clone)]
pub struct RomImage {
    data: Vec<u8>,
    order: WordOrder,
}

impl RomImage {
    /// Wrap a byte image with the given word order.
    pub fn new(data: Vec<u8>, order: WordOrder) -> Self {
        Self { data, order }
    }

    /// Load an image from disk.
    pub fn from_file<P: AsRef<Path>>(path: P, order: WordOrder) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?, order))
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the image holds no data (all reads return 0).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl SoundData for RomImage {
    fn read_byte(&self, offset: u32) -> u8 {
        if self.data.is_empty() {
            return 0;
        }
        self.data[offset as usize % self.data.len()]
    }

    fn read_word(&self, offset: u32) -> u16 {
        let (a, b) = (self.read_byte(offset), self.read_byte(offset.wrapping_add(1)));
        match self.order {
            WordOrder::LittleEndian => u16::from_le_bytes([a, b]),
            WordOrder::BigEndian => u16::from_be_bytes([a, b]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_order_is_selectable() {
        let le = RomImage::new(vec![0x34, 0x12], WordOrder::LittleEndian);
        let be = RomImage::new(vec![0x34, 0x12], WordOrder::BigEndian);
        assert_eq!(le.read_word(0), 0x1234);
        assert_eq!(be.read_word(0), 0x3412);
    }

    #[test]
    fn reads_wrap_instead_of_faulting() {
        let img = RomImage::new(vec![1, 2, 3], WordOrder::LittleEndian);
        assert_eq!(img.read_byte(3), 1);
        assert_eq!(img.read_byte(0xffff_ffff), img.read_byte(0xffff_ffff % 3));
        // Word read spanning the wrap point.
        assert_eq!(img.read_word(2), u16::from_le_bytes([3, 1]));
    }

    #[test]
    fn empty_image_reads_zero() {
        let img = RomImage::new(Vec::new(), WordOrder::LittleEndian);
        assert_eq!(img.read_byte(123), 0);
        assert_eq!(img.read_word(123), 0);
    }
}
