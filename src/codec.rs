//! Little-endian byte reading and writing shared by every wire format.
//!
//! [`ByteReader`] runs in one of two modes. A budgeted reader checks every
//! read against the bytes that remain and reports
//! [`DeserializeError::OutOfBytes`] instead of reading past the end; it also
//! asks the format decoders to validate structure. A trusted reader skips
//! structural validation and panics if a declared size overruns the buffer.

use crate::error::DeserializeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadMode {
    Trusted,
    Budgeted,
}

/// Cursor over a borrowed byte buffer.
#[derive(Clone, Debug)]
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
    mode: ReadMode,
}

impl<'a> ByteReader<'a> {
    /// A reader that trusts its input completely.
    pub(crate) const fn trusted(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            mode: ReadMode::Trusted,
        }
    }

    /// A reader bounded by the length of `bytes`.
    pub(crate) const fn budgeted(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            mode: ReadMode::Budgeted,
        }
    }

    /// Returns `true` if decoders should check structural invariants.
    #[inline]
    pub(crate) fn validates(&self) -> bool {
        self.mode == ReadMode::Budgeted
    }

    /// Offset of the next read from the start of the buffer.
    #[inline]
    pub(crate) const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub(crate) const fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Consumes the next `count` bytes.
    ///
    /// # Panics
    ///
    /// A trusted reader panics when fewer than `count` bytes remain.
    pub(crate) fn take(&mut self, count: usize) -> Result<&'a [u8], DeserializeError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            match self.mode {
                ReadMode::Budgeted => {
                    return Err(DeserializeError::OutOfBytes {
                        needed: count,
                        remaining: self.remaining(),
                    });
                }
                ReadMode::Trusted => panic!(
                    "trusted read of {count} bytes overruns the buffer ({} remaining)",
                    self.remaining()
                ),
            }
        };
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Skips `count` bytes.
    #[inline]
    pub(crate) fn skip(&mut self, count: usize) -> Result<(), DeserializeError> {
        self.take(count).map(|_| ())
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    #[inline]
    pub(crate) fn read_u8(&mut self) -> Result<u8, DeserializeError> {
        self.take_array::<1>().map(|[byte]| byte)
    }

    #[inline]
    pub(crate) fn read_u16(&mut self) -> Result<u16, DeserializeError> {
        self.take_array().map(u16::from_le_bytes)
    }

    #[inline]
    pub(crate) fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        self.take_array().map(u32::from_le_bytes)
    }

    #[inline]
    pub(crate) fn read_u64(&mut self) -> Result<u64, DeserializeError> {
        self.take_array().map(u64::from_le_bytes)
    }
}

/// Decodes the `index`-th little-endian `u16` of `bytes`.
#[inline]
pub(crate) fn u16_at(bytes: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([bytes[2 * index], bytes[2 * index + 1]])
}

/// Decodes the `index`-th little-endian `u64` of `bytes`.
#[inline]
pub(crate) fn u64_at(bytes: &[u8], index: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[8 * index..8 * index + 8]);
    u64::from_le_bytes(raw)
}

/// Little-endian appends onto a byte vector.
pub(crate) trait PutLe {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
    fn put_u64(&mut self, value: u64);
}

impl PutLe for Vec<u8> {
    #[inline]
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    #[inline]
    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn put_u64(&mut self, value: u64) {
        self.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_reads_little_endian_integers() {
        let mut bytes = Vec::new();
        bytes.put_u8(7);
        bytes.put_u16(0x0102);
        bytes.put_u32(0x0304_0506);
        bytes.put_u64(0x0708_090a_0b0c_0d0e);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]);

        let mut reader = ByteReader::budgeted(&bytes);
        assert_eq!(reader.read_u8(), Ok(7));
        assert_eq!(reader.read_u16(), Ok(0x0102));
        assert_eq!(reader.read_u32(), Ok(0x0304_0506));
        assert_eq!(reader.read_u64(), Ok(0x0708_090a_0b0c_0d0e));
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), 15);
    }

    #[rstest]
    fn test_budgeted_reader_reports_overrun() {
        let bytes = [1u8, 2, 3];
        let mut reader = ByteReader::budgeted(&bytes);
        assert_eq!(reader.read_u16(), Ok(0x0201));
        assert_eq!(
            reader.read_u32(),
            Err(DeserializeError::OutOfBytes {
                needed: 4,
                remaining: 1
            })
        );
        assert!(reader.validates());
    }

    #[rstest]
    #[should_panic(expected = "overruns the buffer")]
    fn test_trusted_reader_panics_on_overrun() {
        let bytes = [1u8];
        let mut reader = ByteReader::trusted(&bytes);
        assert!(!reader.validates());
        let _ = reader.read_u32();
    }

    #[rstest]
    fn test_positional_decoders() {
        let bytes = [1u8, 0, 2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(u16_at(&bytes, 1), 2);
        assert_eq!(u64_at(&bytes[2..], 0), 2);
    }
}
