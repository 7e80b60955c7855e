//! Frozen layout of a [`RoaringTreemap`].
//!
//! ```text
//! count     u64 number of inner bitmaps
//! entries   per inner bitmap:
//!             zero padding until (offset + 12) is a multiple of 32
//!             u64 byte length of the frozen inner bitmap
//!             u32 high key
//!             frozen inner bitmap
//! ```
//!
//! Offsets are measured from the first byte of the count, so every inner
//! payload starts 32-byte aligned relative to it.

use std::iter::FusedIterator;

use super::{RoaringTreemap, high, join, low};
use crate::bitmap::{FrozenBitmapView, FrozenIter, RoaringBitmap};
use crate::codec::{ByteReader, PutLe};
use crate::error::{CardinalityOverflow, DeserializeError};

/// Alignment of every frozen inner bitmap, relative to the buffer start.
pub const FROZEN_ALIGNMENT: usize = 32;

/// Bytes between the padding and the inner payload: a length and a key.
const ENTRY_HEADER_SIZE: usize = 8 + 4;

#[inline]
const fn padding_at(offset: usize) -> usize {
    (FROZEN_ALIGNMENT - (offset + ENTRY_HEADER_SIZE) % FROZEN_ALIGNMENT) % FROZEN_ALIGNMENT
}

impl RoaringTreemap {
    /// Exact number of bytes [`RoaringTreemap::serialize_frozen`] produces.
    #[must_use]
    pub fn frozen_size_in_bytes(&self) -> usize {
        self.stored().fold(8, |offset, (_, inner)| {
            offset + padding_at(offset) + ENTRY_HEADER_SIZE + inner.frozen_size_in_bytes()
        })
    }

    /// Serializes into the frozen layout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringTreemap;
    ///
    /// let treemap = RoaringTreemap::of(&[5, 4_000_000_005, 8_000_000_010]);
    /// let bytes = treemap.serialize_frozen();
    /// let view = RoaringTreemap::frozen_view(&bytes).unwrap();
    /// assert!(view.contains(8_000_000_010));
    /// assert_eq!(view.to_treemap().unwrap(), treemap);
    /// ```
    #[must_use]
    pub fn serialize_frozen(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frozen_size_in_bytes());
        self.serialize_frozen_into(&mut bytes);
        bytes
    }

    /// Appends the frozen layout to `out`.
    pub fn serialize_frozen_into(&self, out: &mut Vec<u8>) {
        let base = out.len();
        out.put_u64(self.stored().count() as u64);
        for (key, inner) in self.stored() {
            let padding = padding_at(out.len() - base);
            out.resize(out.len() + padding, 0);
            out.put_u64(inner.frozen_size_in_bytes() as u64);
            out.put_u32(key);
            inner.serialize_frozen_into(out);
        }
    }

    /// A read-only view over frozen bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializeError`] if an entry runs past the buffer, keys
    /// are not strictly ascending, or an inner frozen bitmap is invalid.
    pub fn frozen_view(bytes: &[u8]) -> Result<FrozenTreemapView<'_>, DeserializeError> {
        FrozenTreemapView::new(bytes).inspect_err(|error| {
            log::warn!("rejected {} frozen treemap bytes: {error}", bytes.len());
        })
    }

    /// Rebuilds an owned treemap from frozen bytes, validating every
    /// container.
    ///
    /// # Errors
    ///
    /// Same as [`RoaringTreemap::frozen_view`] and
    /// [`FrozenTreemapView::to_treemap`].
    pub fn deserialize_frozen(bytes: &[u8]) -> Result<Self, DeserializeError> {
        Self::frozen_view(bytes)?.to_treemap()
    }
}

// =============================================================================
// FrozenTreemapView
// =============================================================================

/// A treemap read in place from frozen bytes.
#[derive(Clone, Debug)]
pub struct FrozenTreemapView<'a> {
    entries: Vec<(u32, FrozenBitmapView<'a>)>,
}

impl<'a> FrozenTreemapView<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, DeserializeError> {
        let mut reader = ByteReader::budgeted(bytes);
        let count = reader.read_u64()?;
        if count > (reader.remaining() / (ENTRY_HEADER_SIZE + 4)) as u64 {
            return Err(DeserializeError::InvalidContainerCount(count));
        }
        let mut entries: Vec<(u32, FrozenBitmapView<'a>)> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            reader.skip(padding_at(reader.position()))?;
            let length = usize::try_from(reader.read_u64()?).map_err(|_| {
                DeserializeError::OutOfBytes {
                    needed: usize::MAX,
                    remaining: reader.remaining(),
                }
            })?;
            let key = reader.read_u32()?;
            if let Some(&(previous, _)) = entries.last().filter(|(previous, _)| *previous >= key) {
                return Err(DeserializeError::UnsortedKeys {
                    previous: previous.into(),
                    next: key.into(),
                });
            }
            let view = FrozenBitmapView::new(reader.take(length)?)?;
            if !view.is_empty() {
                entries.push((key, view));
            }
        }
        Ok(Self { entries })
    }

    fn find(&self, key: u32) -> Option<&FrozenBitmapView<'a>> {
        self.entries
            .binary_search_by_key(&key, |(key, _)| *key)
            .ok()
            .map(|index| &self.entries[index].1)
    }

    /// Number of non-empty inner bitmaps.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the view holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `value` is present.
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        self.find(high(value))
            .is_some_and(|view| view.contains(low(value)))
    }

    /// Number of values, or [`CardinalityOverflow`] when all 2^64 are
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`CardinalityOverflow`] if the view is full.
    pub fn try_cardinality(&self) -> Result<u64, CardinalityOverflow> {
        self.entries
            .iter()
            .try_fold(0u64, |total, (_, view)| total.checked_add(view.cardinality()))
            .ok_or(CardinalityOverflow)
    }

    /// Smallest value, or `None` when empty.
    #[must_use]
    pub fn min(&self) -> Option<u64> {
        let (key, view) = self.entries.first()?;
        view.min().map(|low| join(*key, low))
    }

    /// Largest value, or `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        let (key, view) = self.entries.last()?;
        view.max().map(|low| join(*key, low))
    }

    /// Iterates over the values in ascending order.
    #[must_use]
    pub fn iter(&self) -> FrozenTreemapIter<'_> {
        FrozenTreemapIter {
            entries: self.entries.iter(),
            current: None,
        }
    }

    /// Copies the view into an owned treemap, validating each container.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError::MalformedContainer`] if a payload breaks
    /// its representation's invariants.
    pub fn to_treemap(&self) -> Result<RoaringTreemap, DeserializeError> {
        let mut treemap = RoaringTreemap::new();
        for (key, view) in &self.entries {
            let inner: RoaringBitmap = view.to_bitmap()?;
            treemap.map.insert(*key, inner);
        }
        Ok(treemap)
    }
}

/// Ascending iterator over a [`FrozenTreemapView`].
#[derive(Clone, Debug)]
pub struct FrozenTreemapIter<'a> {
    entries: std::slice::Iter<'a, (u32, FrozenBitmapView<'a>)>,
    current: Option<(u32, FrozenIter<'a>)>,
}

impl Iterator for FrozenTreemapIter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if let Some((key, inner)) = &mut self.current {
                if let Some(low) = inner.next() {
                    return Some(join(*key, low));
                }
            }
            let (key, view) = self.entries.next()?;
            self.current = Some((*key, view.iter()));
        }
    }
}

impl FusedIterator for FrozenTreemapIter<'_> {}

impl<'a> IntoIterator for &'a FrozenTreemapView<'_> {
    type Item = u64;
    type IntoIter = FrozenTreemapIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> RoaringTreemap {
        let mut treemap = RoaringTreemap::of(&[5, 4_000_000_005, 8_000_000_010, u64::MAX]);
        treemap.insert_range((7 << 32)..(7 << 32) + 50_000);
        treemap.run_optimize();
        treemap
    }

    #[rstest]
    #[case(0, 20)]
    #[case(20, 0)]
    #[case(21, 31)]
    #[case(52, 0)]
    fn test_padding(#[case] offset: usize, #[case] expected: usize) {
        assert_eq!(padding_at(offset), expected);
        assert_eq!((offset + expected + ENTRY_HEADER_SIZE) % FROZEN_ALIGNMENT, 0);
    }

    #[rstest]
    fn test_payloads_are_aligned() {
        let treemap = sample();
        let bytes = treemap.serialize_frozen();
        assert_eq!(bytes.len(), treemap.frozen_size_in_bytes());

        let mut offset = 8;
        for (key, inner) in treemap.stored() {
            offset += padding_at(offset);
            let length = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
            let stored_key = u32::from_le_bytes(bytes[offset + 8..offset + 12].try_into().unwrap());
            assert_eq!(stored_key, key);
            assert_eq!(length as usize, inner.frozen_size_in_bytes());
            offset += ENTRY_HEADER_SIZE;
            assert_eq!(offset % FROZEN_ALIGNMENT, 0);
            offset += length as usize;
        }
        assert_eq!(offset, bytes.len());
    }

    #[rstest]
    fn test_view_queries() {
        let treemap = sample();
        let bytes = treemap.serialize_frozen();
        let view = RoaringTreemap::frozen_view(&bytes).unwrap();
        assert_eq!(view.container_count(), 4);
        assert_eq!(view.try_cardinality(), Ok(treemap.cardinality()));
        assert_eq!(view.min(), Some(5));
        assert_eq!(view.max(), Some(u64::MAX));
        assert!(view.contains((7 << 32) + 49_999));
        assert!(!view.contains((7 << 32) + 50_000));
        assert!(view.iter().eq(treemap.iter()));
        assert_eq!(view.to_treemap().unwrap(), treemap);
    }

    #[rstest]
    fn test_empty_treemap() {
        let bytes = RoaringTreemap::new().serialize_frozen();
        assert_eq!(bytes, 0u64.to_le_bytes().to_vec());
        let view = RoaringTreemap::frozen_view(&bytes).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.max(), None);
    }

    #[rstest]
    fn test_rejects_truncation_and_bad_inner() {
        let bytes = sample().serialize_frozen();
        assert!(RoaringTreemap::frozen_view(&bytes[..bytes.len() - 1]).is_err());

        let mut corrupted = bytes;
        let cookie_byte = corrupted.len() - 4;
        corrupted[cookie_byte] ^= 0xFF;
        assert!(matches!(
            RoaringTreemap::frozen_view(&corrupted),
            Err(DeserializeError::InvalidCookie(_))
        ));
    }
}
