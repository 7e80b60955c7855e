//! Byte format of a [`RoaringTreemap`].
//!
//! ```text
//! count     u64 number of inner bitmaps
//! entries   per inner bitmap: u32 high key, then the inner bitmap's bytes
//! ```
//!
//! Inner bitmaps are written in the 32-bit [`Format`] passed to the writer,
//! and the reader must be given the same one. Empty inner bitmaps are never
//! written. A reader that meets the same key twice keeps the first entry.

use std::collections::btree_map::Entry;

use super::RoaringTreemap;
use crate::bitmap::{Format, RoaringBitmap};
use crate::codec::{ByteReader, PutLe};
use crate::error::DeserializeError;

/// Smallest possible entry: a key and an empty native value list.
const MIN_ENTRY_SIZE: usize = 4 + 5;

impl RoaringTreemap {
    /// Exact number of bytes [`RoaringTreemap::serialize`] produces.
    #[must_use]
    pub fn serialized_size(&self, format: Format) -> usize {
        8 + self
            .stored()
            .map(|(_, inner)| 4 + inner.serialized_size(format))
            .sum::<usize>()
    }

    /// Serializes into a new buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::{Format, RoaringTreemap};
    ///
    /// let treemap = RoaringTreemap::of(&[5, 4_000_000_005, 8_000_000_010]);
    /// for format in [Format::Portable, Format::Native] {
    ///     let bytes = treemap.serialize(format);
    ///     assert_eq!(RoaringTreemap::deserialize(&bytes, format), treemap);
    /// }
    /// ```
    #[must_use]
    pub fn serialize(&self, format: Format) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.serialized_size(format));
        self.serialize_into(format, &mut bytes);
        bytes
    }

    /// Appends the serialized bytes to `out`.
    pub fn serialize_into(&self, format: Format, out: &mut Vec<u8>) {
        out.put_u64(self.stored().count() as u64);
        for (key, inner) in self.stored() {
            out.put_u32(key);
            inner.serialize_into(format, out);
        }
    }

    /// Rebuilds a treemap from trusted bytes.
    ///
    /// # Panics
    ///
    /// Panics if the bytes are truncated or carry an unknown cookie or tag.
    #[must_use]
    pub fn deserialize(bytes: &[u8], format: Format) -> Self {
        let mut reader = ByteReader::trusted(bytes);
        match Self::read(&mut reader, format) {
            Ok(treemap) => treemap,
            Err(error) => panic!("trusted deserialization failed: {error}"),
        }
    }

    /// Rebuilds a treemap from untrusted bytes, reading at most `bytes.len()`
    /// of them.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializeError`] if any read would leave the buffer, the
    /// declared count cannot fit, keys are not strictly ascending, or an inner
    /// bitmap is invalid.
    pub fn deserialize_safe(bytes: &[u8], format: Format) -> Result<Self, DeserializeError> {
        let mut reader = ByteReader::budgeted(bytes);
        Self::read(&mut reader, format).inspect_err(|error| {
            log::warn!("rejected {} serialized treemap bytes: {error}", bytes.len());
        })
    }

    fn read(reader: &mut ByteReader<'_>, format: Format) -> Result<Self, DeserializeError> {
        let count = reader.read_u64()?;
        if reader.validates() && count > (reader.remaining() / MIN_ENTRY_SIZE) as u64 {
            return Err(DeserializeError::InvalidContainerCount(count));
        }
        let mut treemap = Self::new();
        let mut previous: Option<u32> = None;
        for _ in 0..count {
            let key = reader.read_u32()?;
            if reader.validates() {
                if let Some(previous) = previous.filter(|&previous| previous >= key) {
                    return Err(DeserializeError::UnsortedKeys {
                        previous: previous.into(),
                        next: key.into(),
                    });
                }
            }
            previous = Some(key);
            let inner = RoaringBitmap::read(reader, format)?;
            if inner.is_empty() {
                continue;
            }
            if let Entry::Vacant(entry) = treemap.map.entry(key) {
                entry.insert(inner);
            }
        }
        Ok(treemap)
    }
}

// =============================================================================
// serde
// =============================================================================

#[cfg(feature = "serde")]
mod serde_impls {
    use std::fmt;

    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Format, RoaringTreemap};

    impl Serialize for RoaringTreemap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_bytes(&self.serialize(Format::Portable))
        }
    }

    struct TreemapVisitor;

    impl<'de> Visitor<'de> for TreemapVisitor {
        type Value = RoaringTreemap;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a portable roaring treemap byte string")
        }

        fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<RoaringTreemap, E> {
            RoaringTreemap::deserialize_safe(bytes, Format::Portable).map_err(E::custom)
        }

        fn visit_seq<A: SeqAccess<'de>>(
            self,
            mut sequence: A,
        ) -> Result<RoaringTreemap, A::Error> {
            let mut bytes = Vec::with_capacity(sequence.size_hint().unwrap_or(0));
            while let Some(byte) = sequence.next_element::<u8>()? {
                bytes.push(byte);
            }
            self.visit_bytes(&bytes)
        }
    }

    impl<'de> Deserialize<'de> for RoaringTreemap {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_bytes(TreemapVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn entry(key: u32, inner: &RoaringBitmap) -> Vec<u8> {
        let mut bytes = key.to_le_bytes().to_vec();
        inner.serialize_into(Format::Portable, &mut bytes);
        bytes
    }

    #[rstest]
    fn test_layout_is_count_then_keyed_entries() {
        let treemap = RoaringTreemap::of(&[5, (3 << 32) + 1]);
        let bytes = treemap.serialize(Format::Portable);
        let expected = [
            2u64.to_le_bytes().to_vec(),
            entry(0, &RoaringBitmap::of(&[5])),
            entry(3, &RoaringBitmap::of(&[1])),
        ]
        .concat();
        assert_eq!(bytes, expected);
        assert_eq!(bytes.len(), treemap.serialized_size(Format::Portable));
    }

    #[rstest]
    fn test_empty_inner_bitmaps_are_not_written() {
        let mut treemap = RoaringTreemap::of(&[1]);
        treemap.map.insert(4, RoaringBitmap::new());
        let bytes = treemap.serialize(Format::Native);
        assert_eq!(u64::from_le_bytes(bytes[..8].try_into().unwrap()), 1);
        assert_eq!(RoaringTreemap::deserialize_safe(&bytes, Format::Native), Ok(treemap));
    }

    #[rstest]
    fn test_trusted_read_keeps_first_duplicate() {
        let bytes = [
            2u64.to_le_bytes().to_vec(),
            entry(1, &RoaringBitmap::of(&[10])),
            entry(1, &RoaringBitmap::of(&[20])),
        ]
        .concat();
        let treemap = RoaringTreemap::deserialize(&bytes, Format::Portable);
        assert_eq!(treemap.to_vec(), vec![(1 << 32) + 10]);
        assert_eq!(
            RoaringTreemap::deserialize_safe(&bytes, Format::Portable),
            Err(DeserializeError::UnsortedKeys {
                previous: 1,
                next: 1
            })
        );
    }

    #[rstest]
    fn test_safe_read_rejects_impossible_count() {
        let bytes = u64::MAX.to_le_bytes();
        assert_eq!(
            RoaringTreemap::deserialize_safe(&bytes, Format::Portable),
            Err(DeserializeError::InvalidContainerCount(u64::MAX))
        );
    }

    #[rstest]
    fn test_safe_read_rejects_every_truncation() {
        let treemap = RoaringTreemap::of(&[1, 2, 1 << 40, u64::MAX]);
        let bytes = treemap.serialize(Format::Portable);
        for length in 0..bytes.len() {
            assert!(RoaringTreemap::deserialize_safe(&bytes[..length], Format::Portable).is_err());
        }
    }
}
