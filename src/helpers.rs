//! Utility functions for address ranges and checksums.
//!
//! These helpers are shared by the register file and the persistence layer,
//! and are public so that custom storage backends can validate their own
//! ranges the same way.

use crate::RegisterError;

/// Calculates the byte offset range for an address and length.
///
/// Returns `(start_offset, end_offset)` where end is exclusive,
/// or an error if the range is invalid.
///
/// # Type Parameters
/// * `TS` - Total size of the addressed region
///
/// # Errors
/// * [`RegisterError::ZeroLength`] - if `len` is 0
/// * [`RegisterError::OutOfBounds`] - if the range exceeds `TS`
///
/// # Example
/// ```
/// use sensor_regfile::helpers::range_span;
///
/// assert_eq!(range_span::<36>(17, 4), Ok((17, 21)));
/// assert!(range_span::<36>(34, 4).is_err());
/// ```
pub fn range_span<const TS: usize>(addr: u16, len: usize) -> Result<(usize, usize), RegisterError> {
    if len == 0 {
        return Err(RegisterError::ZeroLength);
    }

    let offset = addr as usize;
    let end = offset.checked_add(len).ok_or(RegisterError::OutOfBounds)?;

    if end > TS {
        return Err(RegisterError::OutOfBounds);
    }

    Ok((offset, end))
}

const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;
const CRC32_TABLE: [u32; 256] = crc32_table();

/// Builds the reflected CRC-32 (IEEE 802.3) lookup table at compile time.
const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC32_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Running CRC-32 state, for checksums over bytes that are not contiguous
/// in memory (e.g. read one at a time from EEPROM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Starts a new checksum seeded with `0xFFFFFFFF`.
    pub const fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Feeds one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        let index = ((self.state ^ byte as u32) & 0xFF) as usize;
        self.state = (self.state >> 8) ^ CRC32_TABLE[index];
    }

    /// Feeds a run of bytes.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.push(byte);
        }
    }

    /// Returns the complemented checksum.
    #[inline]
    pub fn finish(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32 (IEEE 802.3) of a contiguous buffer.
///
/// ```
/// use sensor_regfile::helpers::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(data);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_span_edge_cases() {
        // Zero length
        assert_eq!(range_span::<16>(0, 0), Err(RegisterError::ZeroLength));

        // Out of bounds
        assert_eq!(range_span::<16>(15, 2), Err(RegisterError::OutOfBounds));
        assert_eq!(range_span::<16>(16, 1), Err(RegisterError::OutOfBounds));

        // Last byte
        assert_eq!(range_span::<16>(15, 1), Ok((15, 16)));

        // Whole region
        assert_eq!(range_span::<16>(0, 16), Ok((0, 16)));
    }

    #[test]
    fn crc32_known_vectors() {
        assert_eq!(crc32(&[]), 0);
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b"The quick brown fox jumps over the lazy dog"), 0x414F_A339);
    }

    #[test]
    fn incremental_crc_matches_contiguous() {
        let data = [0x88, 0x13, 0x00, 0x00, 0x00, 0x00, 0xC8, 0x42, 0x03];

        let mut crc = Crc32::new();
        for &b in &data[..4] {
            crc.push(b);
        }
        crc.update(&data[4..]);

        assert_eq!(crc.finish(), crc32(&data));
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let data = [0x11u8, 0x22, 0x33, 0x44];
        let reference = crc32(&data);

        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[byte] ^= 1 << bit;
                assert_ne!(crc32(&flipped), reference);
            }
        }
    }
}
