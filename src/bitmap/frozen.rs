//! Frozen layout of a [`RoaringBitmap`] and the view that queries it in place.
//!
//! ```text
//! bitset zone   1024 u64 words per bitset container
//! run zone      u16 start, u16 length - 1 per run, container after container
//! array zone    u16 values, container after container
//! keys          u16 per container
//! counts        u16 per container: cardinality - 1, or run count - 1 for runs
//! typecodes     u8 per container: 1 bitset, 2 array, 3 run
//! header        u32 (container count << 15) | 13766
//! ```
//!
//! The header sits at the end, so a reader locates everything from the
//! buffer length alone.

use std::iter::FusedIterator;

use super::{Chunk, RoaringBitmap, high, join, low};
use crate::codec::{PutLe, u16_at, u64_at};
use crate::container::{
    ARRAY_MAX_CARDINALITY, ArrayContainer, BitsetContainer, Container, Run, RunContainer,
};
use crate::error::DeserializeError;
use crate::words::BITSET_WORDS;

/// Low 15 bits of every frozen header.
pub const FROZEN_COOKIE: u32 = 13766;

const TYPECODE_BITSET: u8 = 1;
const TYPECODE_ARRAY: u8 = 2;
const TYPECODE_RUN: u8 = 3;

const BITSET_BYTES: usize = BITSET_WORDS * 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Bitset,
    Array,
    Run,
}

impl Kind {
    fn of(container: &Container) -> Self {
        if container.is_run() {
            Self::Run
        } else if container.cardinality() as usize > ARRAY_MAX_CARDINALITY {
            Self::Bitset
        } else {
            Self::Array
        }
    }

    const fn typecode(self) -> u8 {
        match self {
            Self::Bitset => TYPECODE_BITSET,
            Self::Array => TYPECODE_ARRAY,
            Self::Run => TYPECODE_RUN,
        }
    }

    const fn payload_size(self, count: u16) -> usize {
        let count = count as usize + 1;
        match self {
            Self::Bitset => BITSET_BYTES,
            Self::Array => 2 * count,
            Self::Run => 4 * count,
        }
    }

    /// The value stored in the counts table.
    fn count_of(self, container: &Container) -> u16 {
        match self {
            Self::Run => (container.num_runs() - 1) as u16,
            Self::Bitset | Self::Array => (container.cardinality() - 1) as u16,
        }
    }
}

impl RoaringBitmap {
    /// Exact number of bytes [`RoaringBitmap::serialize_frozen`] produces.
    #[must_use]
    pub fn frozen_size_in_bytes(&self) -> usize {
        self.stored_chunks()
            .map(|chunk| {
                let kind = Kind::of(&chunk.container);
                kind.payload_size(kind.count_of(&chunk.container)) + 5
            })
            .sum::<usize>()
            + 4
    }

    /// Serializes into the frozen layout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let bitmap = RoaringBitmap::from_range(100..=200_000);
    /// let bytes = bitmap.serialize_frozen();
    /// let view = RoaringBitmap::frozen_view(&bytes).unwrap();
    /// assert!(view.contains(150_000));
    /// assert_eq!(view.cardinality(), bitmap.cardinality());
    /// ```
    #[must_use]
    pub fn serialize_frozen(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frozen_size_in_bytes());
        self.serialize_frozen_into(&mut bytes);
        bytes
    }

    /// Appends the frozen layout to `out`.
    pub fn serialize_frozen_into(&self, out: &mut Vec<u8>) {
        let chunks: Vec<(&Chunk, Kind)> = self
            .stored_chunks()
            .map(|chunk| (chunk, Kind::of(&chunk.container)))
            .collect();

        for (chunk, _) in chunks.iter().filter(|(_, kind)| *kind == Kind::Bitset) {
            if let Container::Bitset(bitset) = &*chunk.container {
                for &word in bitset.words() {
                    out.put_u64(word);
                }
            }
        }
        for (chunk, _) in chunks.iter().filter(|(_, kind)| *kind == Kind::Run) {
            if let Container::Run(runs) = &*chunk.container {
                for run in runs.runs() {
                    out.put_u16(run.start);
                    out.put_u16(run.length);
                }
            }
        }
        for (chunk, _) in chunks.iter().filter(|(_, kind)| *kind == Kind::Array) {
            for value in &*chunk.container {
                out.put_u16(value);
            }
        }
        for (chunk, _) in &chunks {
            out.put_u16(chunk.key);
        }
        for (chunk, kind) in &chunks {
            out.put_u16(kind.count_of(&chunk.container));
        }
        for (_, kind) in &chunks {
            out.put_u8(kind.typecode());
        }
        out.put_u32(((chunks.len() as u32) << 15) | FROZEN_COOKIE);
    }

    /// A read-only view over frozen bytes.
    ///
    /// The header, keys and zone sizes are checked up front; container
    /// payloads are decoded on demand.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializeError`] if the header is missing or invalid,
    /// keys are not ascending, a typecode is unknown, or the buffer length
    /// differs from the size the header implies.
    pub fn frozen_view(bytes: &[u8]) -> Result<FrozenBitmapView<'_>, DeserializeError> {
        FrozenBitmapView::new(bytes).inspect_err(|error| {
            log::warn!("rejected {} frozen bytes: {error}", bytes.len());
        })
    }

    /// Rebuilds an owned bitmap from frozen bytes, validating every container.
    ///
    /// # Errors
    ///
    /// Same as [`RoaringBitmap::frozen_view`] and [`FrozenBitmapView::to_bitmap`].
    pub fn deserialize_frozen(bytes: &[u8]) -> Result<Self, DeserializeError> {
        Self::frozen_view(bytes)?.to_bitmap()
    }
}

// =============================================================================
// FrozenBitmapView
// =============================================================================

#[derive(Clone, Copy, Debug)]
struct FrozenContainer<'a> {
    key: u16,
    kind: Kind,
    count: u16,
    payload: &'a [u8],
}

impl FrozenContainer<'_> {
    fn cardinality(&self) -> u32 {
        match self.kind {
            Kind::Bitset | Kind::Array => u32::from(self.count) + 1,
            Kind::Run => (0..self.run_count())
                .map(|index| u32::from(u16_at(self.payload, 2 * index + 1)) + 1)
                .sum(),
        }
    }

    fn run_count(&self) -> usize {
        usize::from(self.count) + 1
    }

    fn run(&self, index: usize) -> Run {
        Run {
            start: u16_at(self.payload, 2 * index),
            length: u16_at(self.payload, 2 * index + 1),
        }
    }

    fn contains(&self, value: u16) -> bool {
        match self.kind {
            Kind::Bitset => u64_at(self.payload, usize::from(value >> 6)) & (1u64 << (value & 63)) != 0,
            Kind::Array => {
                let count = usize::from(self.count) + 1;
                let position = partition_point(count, |index| u16_at(self.payload, index) < value);
                position < count && u16_at(self.payload, position) == value
            }
            Kind::Run => {
                let position = partition_point(self.run_count(), |index| {
                    u16_at(self.payload, 2 * index) <= value
                });
                position > 0 && self.run(position - 1).contains(value)
            }
        }
    }

    fn min(&self) -> Option<u16> {
        match self.kind {
            Kind::Bitset => (0..BITSET_WORDS).find_map(|index| {
                let word = u64_at(self.payload, index);
                (word != 0).then(|| (index * 64) as u16 + word.trailing_zeros() as u16)
            }),
            Kind::Array | Kind::Run => Some(u16_at(self.payload, 0)),
        }
    }

    fn max(&self) -> Option<u16> {
        match self.kind {
            Kind::Bitset => (0..BITSET_WORDS).rev().find_map(|index| {
                let word = u64_at(self.payload, index);
                (word != 0).then(|| (index * 64) as u16 + 63 - word.leading_zeros() as u16)
            }),
            Kind::Array => Some(u16_at(self.payload, usize::from(self.count))),
            Kind::Run => Some(self.run(self.run_count() - 1).end()),
        }
    }

    fn decode(&self) -> Result<Container, DeserializeError> {
        let malformed = |reason| DeserializeError::MalformedContainer {
            key: self.key,
            reason,
        };
        match self.kind {
            Kind::Bitset => {
                let bitset = BitsetContainer::try_from_le_bytes(self.payload)?;
                if bitset.cardinality() != u32::from(self.count) + 1 {
                    return Err(malformed("bitset cardinality disagrees with header"));
                }
                Ok(Container::Bitset(bitset))
            }
            Kind::Array => {
                let values: Vec<u16> = (0..usize::from(self.count) + 1)
                    .map(|index| u16_at(self.payload, index))
                    .collect();
                if values.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(malformed("array values not strictly ascending"));
                }
                Ok(Container::Array(ArrayContainer::from_sorted_vec(values)))
            }
            Kind::Run => {
                let runs: Vec<Run> = (0..self.run_count()).map(|index| self.run(index)).collect();
                if runs
                    .iter()
                    .any(|run| u32::from(run.start) + u32::from(run.length) > u32::from(u16::MAX))
                {
                    return Err(malformed("run extends past the container"));
                }
                if runs
                    .windows(2)
                    .any(|pair| pair[0].end_exclusive() >= u32::from(pair[1].start))
                {
                    return Err(malformed("runs overlap or are out of order"));
                }
                Ok(Container::Run(RunContainer::from_runs(runs)))
            }
        }
    }

    fn values(&self) -> FrozenValues<'_> {
        match self.kind {
            Kind::Array => FrozenValues::Array {
                payload: self.payload,
                index: 0,
                count: usize::from(self.count) + 1,
            },
            Kind::Bitset => FrozenValues::Bitset {
                payload: self.payload,
                word_index: 0,
                word: u64_at(self.payload, 0),
            },
            Kind::Run => FrozenValues::Run {
                payload: self.payload,
                index: 0,
                count: self.run_count(),
                offset: 0,
            },
        }
    }
}

/// First index in `0..count` for which `below` is false.
fn partition_point(count: usize, below: impl Fn(usize) -> bool) -> usize {
    let (mut low, mut high) = (0, count);
    while low < high {
        let middle = low + (high - low) / 2;
        if below(middle) {
            low = middle + 1;
        } else {
            high = middle;
        }
    }
    low
}

/// A bitmap read in place from frozen bytes.
///
/// Obtained from [`RoaringBitmap::frozen_view`]. The view borrows the buffer
/// and never copies container payloads.
#[derive(Clone, Debug)]
pub struct FrozenBitmapView<'a> {
    containers: Vec<FrozenContainer<'a>>,
}

impl<'a> FrozenBitmapView<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Result<Self, DeserializeError> {
        let Some(header_start) = bytes.len().checked_sub(4) else {
            return Err(DeserializeError::OutOfBytes {
                needed: 4,
                remaining: bytes.len(),
            });
        };
        let header = u32::from_le_bytes([
            bytes[header_start],
            bytes[header_start + 1],
            bytes[header_start + 2],
            bytes[header_start + 3],
        ]);
        if header & 0x7FFF != FROZEN_COOKIE {
            return Err(DeserializeError::InvalidCookie(header));
        }
        let count = (header >> 15) as usize;
        if count > 1 << 16 {
            return Err(DeserializeError::InvalidContainerCount(count as u64));
        }
        let Some(tables_start) = header_start.checked_sub(5 * count) else {
            return Err(DeserializeError::OutOfBytes {
                needed: 5 * count + 4,
                remaining: bytes.len(),
            });
        };
        let keys = &bytes[tables_start..tables_start + 2 * count];
        let counts = &bytes[tables_start + 2 * count..tables_start + 4 * count];
        let typecodes = &bytes[tables_start + 4 * count..header_start];

        let mut kinds = Vec::with_capacity(count);
        let mut zones = [0usize; 3];
        for (index, &typecode) in typecodes.iter().enumerate() {
            let kind = match typecode {
                TYPECODE_BITSET => Kind::Bitset,
                TYPECODE_ARRAY => Kind::Array,
                TYPECODE_RUN => Kind::Run,
                other => return Err(DeserializeError::InvalidTypecode(other)),
            };
            if index > 0 && u16_at(keys, index - 1) >= u16_at(keys, index) {
                return Err(DeserializeError::UnsortedKeys {
                    previous: u16_at(keys, index - 1).into(),
                    next: u16_at(keys, index).into(),
                });
            }
            zones[zone(kind)] += kind.payload_size(u16_at(counts, index));
            kinds.push(kind);
        }
        let expected = zones.iter().sum::<usize>() + 5 * count + 4;
        if expected != bytes.len() {
            return Err(DeserializeError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut cursors = [0, zones[0], zones[0] + zones[1]];
        let containers = kinds
            .into_iter()
            .enumerate()
            .map(|(index, kind)| {
                let count = u16_at(counts, index);
                let start = cursors[zone(kind)];
                let end = start + kind.payload_size(count);
                cursors[zone(kind)] = end;
                FrozenContainer {
                    key: u16_at(keys, index),
                    kind,
                    count,
                    payload: &bytes[start..end],
                }
            })
            .collect();
        Ok(Self { containers })
    }

    fn find(&self, key: u16) -> Option<&FrozenContainer<'a>> {
        self.containers
            .binary_search_by_key(&key, |container| container.key)
            .ok()
            .map(|index| &self.containers[index])
    }

    /// Number of containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Returns `true` if the view holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Number of values.
    #[must_use]
    pub fn cardinality(&self) -> u64 {
        self.containers
            .iter()
            .map(|container| u64::from(container.cardinality()))
            .sum()
    }

    /// Returns `true` if `value` is present.
    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        self.find(high(value))
            .is_some_and(|container| container.contains(low(value)))
    }

    /// Smallest value, or `None` when empty.
    #[must_use]
    pub fn min(&self) -> Option<u32> {
        let first = self.containers.first()?;
        first.min().map(|low| join(first.key, low))
    }

    /// Largest value, or `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        let last = self.containers.last()?;
        last.max().map(|low| join(last.key, low))
    }

    /// Iterates over the values in ascending order.
    #[must_use]
    pub fn iter(&self) -> FrozenIter<'_> {
        FrozenIter {
            containers: self.containers.iter(),
            current: None,
        }
    }

    /// Copies the view into an owned bitmap, validating each container.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError::MalformedContainer`] if a payload breaks
    /// its representation's invariants.
    pub fn to_bitmap(&self) -> Result<RoaringBitmap, DeserializeError> {
        let chunks = self
            .containers
            .iter()
            .map(|container| Ok(Chunk::new(container.key, container.decode()?)))
            .collect::<Result<Vec<_>, DeserializeError>>()?;
        Ok(RoaringBitmap::from_chunks(chunks))
    }
}

const fn zone(kind: Kind) -> usize {
    match kind {
        Kind::Bitset => 0,
        Kind::Run => 1,
        Kind::Array => 2,
    }
}

// =============================================================================
// FrozenIter
// =============================================================================

#[derive(Clone, Debug)]
enum FrozenValues<'a> {
    Array {
        payload: &'a [u8],
        index: usize,
        count: usize,
    },
    Bitset {
        payload: &'a [u8],
        word_index: usize,
        word: u64,
    },
    Run {
        payload: &'a [u8],
        index: usize,
        count: usize,
        offset: u32,
    },
}

impl Iterator for FrozenValues<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        match self {
            Self::Array {
                payload,
                index,
                count,
            } => {
                if *index >= *count {
                    return None;
                }
                *index += 1;
                Some(u16_at(payload, *index - 1))
            }
            Self::Bitset {
                payload,
                word_index,
                word,
            } => {
                while *word == 0 {
                    *word_index += 1;
                    if *word_index >= BITSET_WORDS {
                        return None;
                    }
                    *word = u64_at(payload, *word_index);
                }
                let bit = word.trailing_zeros();
                *word &= *word - 1;
                Some((*word_index * 64) as u16 + bit as u16)
            }
            Self::Run {
                payload,
                index,
                count,
                offset,
            } => {
                if *index >= *count {
                    return None;
                }
                let start = u32::from(u16_at(payload, 2 * *index));
                let length = u32::from(u16_at(payload, 2 * *index + 1));
                let value = start + *offset;
                if *offset >= length {
                    *index += 1;
                    *offset = 0;
                } else {
                    *offset += 1;
                }
                Some(value as u16)
            }
        }
    }
}

/// Ascending iterator over a [`FrozenBitmapView`].
#[derive(Clone, Debug)]
pub struct FrozenIter<'a> {
    containers: std::slice::Iter<'a, FrozenContainer<'a>>,
    current: Option<(u16, FrozenValues<'a>)>,
}

impl Iterator for FrozenIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((key, values)) = &mut self.current {
                if let Some(low) = values.next() {
                    return Some(join(*key, low));
                }
            }
            let container = self.containers.next()?;
            self.current = Some((container.key, container.values()));
        }
    }
}

impl FusedIterator for FrozenIter<'_> {}

impl<'a> IntoIterator for &'a FrozenBitmapView<'_> {
    type Item = u32;
    type IntoIter = FrozenIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mixed() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::of(&[2, 4, 6]);
        bitmap.insert_range(65_536..=75_535);
        bitmap.add_many(&(0..6_000).map(|value| 131_072 + 2 * value).collect::<Vec<_>>());
        bitmap.insert(u32::MAX);
        bitmap.run_optimize();
        bitmap
    }

    #[rstest]
    fn test_empty_bitmap_is_a_bare_header() {
        let bytes = RoaringBitmap::new().serialize_frozen();
        assert_eq!(bytes, FROZEN_COOKIE.to_le_bytes().to_vec());
        let view = RoaringBitmap::frozen_view(&bytes).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.min(), None);
    }

    #[rstest]
    fn test_layout_orders_zones_and_tables() {
        let bitmap = mixed();
        let bytes = bitmap.serialize_frozen();
        assert_eq!(bytes.len(), bitmap.frozen_size_in_bytes());
        // one bitset, one run, two arrays of 3 and 1 values
        assert_eq!(bytes.len(), 8192 + 4 + 2 * 4 + 5 * 4 + 4);

        let tail = &bytes[bytes.len() - 4 - 4..bytes.len() - 4];
        assert_eq!(tail, &[TYPECODE_ARRAY, TYPECODE_RUN, TYPECODE_BITSET, TYPECODE_ARRAY]);
        let header = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        assert_eq!(header, (4 << 15) | FROZEN_COOKIE);
    }

    #[rstest]
    fn test_view_answers_queries_in_place() {
        let bitmap = mixed();
        let bytes = bitmap.serialize_frozen();
        let view = RoaringBitmap::frozen_view(&bytes).unwrap();

        assert_eq!(view.container_count(), 4);
        assert_eq!(view.cardinality(), bitmap.cardinality());
        assert_eq!(view.min(), Some(2));
        assert_eq!(view.max(), Some(u32::MAX));
        for value in [2, 4, 6, 65_536, 70_000, 75_535, 131_072, 143_070, u32::MAX] {
            assert!(view.contains(value), "{value} missing");
        }
        for value in [3, 75_536, 131_073, u32::MAX - 1] {
            assert!(!view.contains(value), "{value} present");
        }
        assert!(view.iter().eq(bitmap.iter()));
        assert_eq!(view.to_bitmap().unwrap(), bitmap);
    }

    #[rstest]
    fn test_rejects_length_mismatch() {
        let mut bytes = vec![0u8];
        bytes.extend(mixed().serialize_frozen());
        assert!(matches!(
            RoaringBitmap::frozen_view(&bytes),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }

    #[rstest]
    fn test_rejects_bad_cookie_and_typecode() {
        assert!(matches!(
            RoaringBitmap::frozen_view(&[1, 2, 3, 4]),
            Err(DeserializeError::InvalidCookie(_))
        ));
        let mut bytes = RoaringBitmap::of(&[9]).serialize_frozen();
        let typecode = bytes.len() - 5;
        bytes[typecode] = 7;
        assert_eq!(
            RoaringBitmap::frozen_view(&bytes).err(),
            Some(DeserializeError::InvalidTypecode(7))
        );
        assert!(matches!(
            RoaringBitmap::frozen_view(&[]),
            Err(DeserializeError::OutOfBytes { .. })
        ));
    }

    #[rstest]
    fn test_to_bitmap_validates_payloads() {
        let mut bytes = RoaringBitmap::of(&[1, 2]).serialize_frozen();
        bytes.swap(0, 2);
        let view = RoaringBitmap::frozen_view(&bytes).unwrap();
        assert!(matches!(
            view.to_bitmap(),
            Err(DeserializeError::MalformedContainer { key: 0, .. })
        ));
    }
}
