//! Fixed 65536-bit bitset container.
//!
//! The words live behind a `Box<[u64; 1024]>` and the population count is
//! cached. A cached count of `None` means "unknown": it is what the `_nocard`
//! kernels leave behind, and [`BitsetContainer::repair_cardinality`] restores
//! it from [`BitsetContainer::compute_cardinality`], which is always
//! authoritative.

use std::fmt;

use crate::error::AllocationFailure;
use crate::words::{self, BITSET_WORDS};

use super::array::ArrayContainer;
use super::run::RunContainer;

/// A dense 65536-bit container.
#[derive(Clone)]
pub struct BitsetContainer {
    words: Box<[u64; BITSET_WORDS]>,
    cardinality: Option<u32>,
}

impl BitsetContainer {
    /// Creates an empty bitset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: Box::new([0; BITSET_WORDS]),
            cardinality: Some(0),
        }
    }

    /// Creates an empty bitset, reporting allocation failure instead of
    /// aborting.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationFailure`] when the 8 KiB of word storage cannot be
    /// reserved.
    pub fn try_new() -> Result<Self, AllocationFailure> {
        Ok(Self {
            words: try_allocate_words()?,
            cardinality: Some(0),
        })
    }

    /// Creates a bitset with every bit set.
    #[must_use]
    pub fn full() -> Self {
        Self {
            words: Box::new([u64::MAX; BITSET_WORDS]),
            cardinality: Some(1 << 16),
        }
    }

    /// Builds a bitset from little-endian word bytes (exactly 8192 of them).
    ///
    /// # Errors
    ///
    /// Returns [`AllocationFailure`] when the word storage cannot be reserved.
    pub fn try_from_le_bytes(bytes: &[u8]) -> Result<Self, AllocationFailure> {
        debug_assert_eq!(bytes.len(), BITSET_WORDS * 8);
        let mut words = try_allocate_words()?;
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        let cardinality = words::popcount(&words[..]);
        Ok(Self {
            words,
            cardinality: Some(cardinality),
        })
    }

    /// Builds a bitset holding the values of an array container.
    #[must_use]
    pub fn from_array(array: &ArrayContainer) -> Self {
        let mut bitset = Self::new();
        for &value in array.as_slice() {
            bitset.words[usize::from(value >> 6)] |= 1u64 << (value & 63);
        }
        bitset.cardinality = Some(array.cardinality());
        bitset
    }

    /// Builds a bitset holding the values of a run container.
    #[must_use]
    pub fn from_runs(runs: &RunContainer) -> Self {
        let mut bitset = Self::new();
        for run in runs.runs() {
            words::set_range(&mut bitset.words[..], run.start.into(), run.end_exclusive());
        }
        bitset.cardinality = Some(runs.cardinality());
        bitset
    }

    /// Read access to the 1024 words.
    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u64; BITSET_WORDS] {
        &self.words
    }

    /// Write access to the words. The cached cardinality becomes unknown.
    #[inline]
    pub(crate) fn words_mut(&mut self) -> &mut [u64; BITSET_WORDS] {
        self.cardinality = None;
        &mut self.words
    }

    /// Exact population count of the words, ignoring the cache.
    #[inline]
    #[must_use]
    pub fn compute_cardinality(&self) -> u32 {
        words::popcount(&self.words[..])
    }

    /// Cached cardinality, computed on the fly when unknown.
    #[inline]
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        self.cardinality
            .unwrap_or_else(|| self.compute_cardinality())
    }

    /// Returns `true` when the cached cardinality is current.
    #[inline]
    #[must_use]
    pub const fn is_cardinality_known(&self) -> bool {
        self.cardinality.is_some()
    }

    /// Recomputes and caches the cardinality.
    pub fn repair_cardinality(&mut self) -> u32 {
        let cardinality = self.compute_cardinality();
        self.cardinality = Some(cardinality);
        cardinality
    }

    /// Returns `true` if no bit is set. Scans the words when the cardinality is unknown.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.cardinality {
            Some(cardinality) => cardinality == 0,
            None => self.words.iter().all(|&word| word == 0),
        }
    }

    /// Returns `true` if `value` is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u16) -> bool {
        self.words[usize::from(value >> 6)] & (1u64 << (value & 63)) != 0
    }

    /// Sets `value`, returning `true` if it was unset.
    #[inline]
    pub fn insert(&mut self, value: u16) -> bool {
        let word = &mut self.words[usize::from(value >> 6)];
        let mask = 1u64 << (value & 63);
        let added = *word & mask == 0;
        *word |= mask;
        if added {
            if let Some(cardinality) = &mut self.cardinality {
                *cardinality += 1;
            }
        }
        added
    }

    /// Clears `value`, returning `true` if it was set.
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let word = &mut self.words[usize::from(value >> 6)];
        let mask = 1u64 << (value & 63);
        let removed = *word & mask != 0;
        *word &= !mask;
        if removed {
            if let Some(cardinality) = &mut self.cardinality {
                *cardinality -= 1;
            }
        }
        removed
    }

    /// Toggles `value`.
    #[inline]
    pub fn flip(&mut self, value: u16) {
        if !self.remove(value) {
            self.insert(value);
        }
    }

    /// Number of set bits inside `[start, end]`.
    #[must_use]
    pub fn range_cardinality(&self, start: u16, end: u16) -> u32 {
        words::count_range(&self.words[..], start.into(), u32::from(end) + 1)
    }

    /// Sets every bit in `[start, end]`, returning how many were newly set.
    pub fn insert_range(&mut self, start: u16, end: u16) -> u32 {
        let (start, end) = (u32::from(start), u32::from(end) + 1);
        let before = words::count_range(&self.words[..], start, end);
        words::set_range(&mut self.words[..], start, end);
        let added = (end - start) - before;
        if let Some(cardinality) = &mut self.cardinality {
            *cardinality += added;
        }
        added
    }

    /// Clears every bit in `[start, end]`, returning how many were set.
    pub fn remove_range(&mut self, start: u16, end: u16) -> u32 {
        let (start, end) = (u32::from(start), u32::from(end) + 1);
        let removed = words::count_range(&self.words[..], start, end);
        words::clear_range(&mut self.words[..], start, end);
        if let Some(cardinality) = &mut self.cardinality {
            *cardinality -= removed;
        }
        removed
    }

    /// Toggles every bit in `[start, end]`.
    pub fn flip_range(&mut self, start: u16, end: u16) {
        let (start, end) = (u32::from(start), u32::from(end) + 1);
        let before = words::count_range(&self.words[..], start, end);
        words::flip_range(&mut self.words[..], start, end);
        if let Some(cardinality) = &mut self.cardinality {
            *cardinality = *cardinality - before + (end - start - before);
        }
    }

    /// Lowest set bit.
    #[must_use]
    pub fn min(&self) -> Option<u16> {
        self.words
            .iter()
            .position(|&word| word != 0)
            .map(|index| (index * 64) as u16 + self.words[index].trailing_zeros() as u16)
    }

    /// Highest set bit.
    #[must_use]
    pub fn max(&self) -> Option<u16> {
        self.words
            .iter()
            .rposition(|&word| word != 0)
            .map(|index| (index * 64) as u16 + (63 - self.words[index].leading_zeros()) as u16)
    }

    /// Number of set bits at or below `value`.
    #[must_use]
    pub fn rank(&self, value: u16) -> u32 {
        let index = usize::from(value >> 6);
        let mask = u64::MAX >> (63 - (value & 63));
        words::popcount(&self.words[..index]) + (self.words[index] & mask).count_ones()
    }

    /// The set bit at 0-based position `rank`.
    #[must_use]
    pub fn select(&self, rank: u32) -> Option<u16> {
        let mut remaining = rank;
        for (index, &word) in self.words.iter().enumerate() {
            let count = word.count_ones();
            if remaining < count {
                let mut word = word;
                for _ in 0..remaining {
                    word &= word - 1;
                }
                return Some((index * 64) as u16 + word.trailing_zeros() as u16);
            }
            remaining -= count;
        }
        None
    }

    /// Smallest set bit that is `>= value`.
    #[must_use]
    pub fn next_at_or_after(&self, value: u16) -> Option<u16> {
        let mut index = usize::from(value >> 6);
        let mut word = self.words[index] & (u64::MAX << (value & 63));
        loop {
            if word != 0 {
                return Some((index * 64) as u16 + word.trailing_zeros() as u16);
            }
            index += 1;
            if index == BITSET_WORDS {
                return None;
            }
            word = self.words[index];
        }
    }

    /// Largest set bit that is `<= value`.
    #[must_use]
    pub fn prev_at_or_before(&self, value: u16) -> Option<u16> {
        let mut index = usize::from(value >> 6);
        let mut word = self.words[index] & (u64::MAX >> (63 - (value & 63)));
        loop {
            if word != 0 {
                return Some((index * 64) as u16 + (63 - word.leading_zeros()) as u16);
            }
            if index == 0 {
                return None;
            }
            index -= 1;
            word = self.words[index];
        }
    }

    /// Number of maximal runs of set bits.
    #[must_use]
    pub fn num_runs(&self) -> usize {
        let mut runs = 0u32;
        for pair in self.words.windows(2) {
            let (word, next) = (pair[0], pair[1]);
            runs += ((word << 1) & !word).count_ones() + ((word >> 63) & !next & 1) as u32;
        }
        let last = self.words[BITSET_WORDS - 1];
        runs += ((last << 1) & !last).count_ones() + (last >> 63) as u32;
        runs as usize
    }

    /// Returns `true` if every set bit of `self` is also set in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(&left, &right)| left & !right == 0)
    }

    /// Copies the set bits into an array container.
    #[must_use]
    pub fn to_array(&self) -> ArrayContainer {
        let mut values = Vec::with_capacity(self.cardinality() as usize);
        values.extend(self.iter());
        ArrayContainer::from_sorted_vec(values)
    }

    /// Ascending iterator over the set bits.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> BitsetIter<'_> {
        BitsetIter::new(&self.words)
    }

    /// Serialized payload size; always 8192 bytes.
    #[inline]
    #[must_use]
    pub const fn serialized_size() -> usize {
        BITSET_WORDS * 8
    }
}

macro_rules! bitset_operations {
    ($($name:ident),* $(,)?) => {
        paste::paste! {
            impl BitsetContainer {
                $(
                    #[doc = concat!("Returns `self ", stringify!($name), " other` with an exact cardinality.")]
                    #[must_use]
                    pub fn $name(&self, other: &Self) -> Self {
                        let mut words = Box::new([0; BITSET_WORDS]);
                        let cardinality =
                            words::[<$name _into>](&self.words[..], &other.words[..], &mut words[..]);
                        Self { words, cardinality: Some(cardinality) }
                    }

                    #[doc = concat!("Returns `self ", stringify!($name), " other` with an unknown cardinality.")]
                    #[must_use]
                    pub fn [<$name _nocard>](&self, other: &Self) -> Self {
                        let mut words = Box::new([0; BITSET_WORDS]);
                        words::[<$name _into_nocard>](&self.words[..], &other.words[..], &mut words[..]);
                        Self { words, cardinality: None }
                    }

                    #[doc = concat!("Replaces `self` with `self ", stringify!($name), " other`, tracking cardinality.")]
                    pub fn [<$name _assign>](&mut self, other: &Self) {
                        let cardinality = words::[<$name _assign>](&mut self.words[..], &other.words[..]);
                        self.cardinality = Some(cardinality);
                    }

                    #[doc = concat!("Replaces `self` with `self ", stringify!($name), " other`; cardinality becomes unknown.")]
                    pub fn [<$name _assign_nocard>](&mut self, other: &Self) {
                        words::[<$name _assign_nocard>](&mut self.words[..], &other.words[..]);
                        self.cardinality = None;
                    }

                    #[doc = concat!("Population count of `self ", stringify!($name), " other`.")]
                    #[must_use]
                    pub fn [<$name _cardinality>](&self, other: &Self) -> u32 {
                        words::[<$name _cardinality>](&self.words[..], &other.words[..])
                    }
                )*
            }
        }
    };
}

bitset_operations!(and, or, xor, and_not);

fn try_allocate_words() -> Result<Box<[u64; BITSET_WORDS]>, AllocationFailure> {
    let mut storage: Vec<u64> = Vec::new();
    storage
        .try_reserve_exact(BITSET_WORDS)
        .map_err(|_| AllocationFailure)?;
    storage.resize(BITSET_WORDS, 0);
    storage
        .into_boxed_slice()
        .try_into()
        .map_err(|_| AllocationFailure)
}

impl Default for BitsetContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for BitsetContainer {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for BitsetContainer {}

impl fmt::Debug for BitsetContainer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BitsetContainer")
            .field("cardinality", &self.cardinality)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// Double-ended iterator over the set bits of a bitset container.
///
/// When both ends reach the same word, the remaining bits are the
/// intersection of the two partially consumed copies of that word.
#[derive(Clone, Debug)]
pub struct BitsetIter<'a> {
    words: &'a [u64; BITSET_WORDS],
    front: usize,
    front_word: u64,
    back: usize,
    back_word: u64,
}

impl<'a> BitsetIter<'a> {
    fn new(words: &'a [u64; BITSET_WORDS]) -> Self {
        Self {
            words,
            front: 0,
            front_word: words[0],
            back: BITSET_WORDS - 1,
            back_word: words[BITSET_WORDS - 1],
        }
    }
}

impl Iterator for BitsetIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            if self.front == self.back {
                let shared = self.front_word & self.back_word;
                if shared == 0 {
                    return None;
                }
                let bit = shared.trailing_zeros();
                self.front_word &= !(1u64 << bit);
                self.back_word &= !(1u64 << bit);
                return Some((self.front * 64) as u16 + bit as u16);
            }
            if self.front_word == 0 {
                self.front += 1;
                self.front_word = self.words[self.front];
                continue;
            }
            let bit = self.front_word.trailing_zeros();
            self.front_word &= self.front_word - 1;
            return Some((self.front * 64) as u16 + bit as u16);
        }
    }
}

impl DoubleEndedIterator for BitsetIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        loop {
            if self.front == self.back {
                let shared = self.front_word & self.back_word;
                if shared == 0 {
                    return None;
                }
                let bit = 63 - shared.leading_zeros();
                self.front_word &= !(1u64 << bit);
                self.back_word &= !(1u64 << bit);
                return Some((self.back * 64) as u16 + bit as u16);
            }
            if self.back_word == 0 {
                self.back -= 1;
                self.back_word = self.words[self.back];
                continue;
            }
            let bit = 63 - self.back_word.leading_zeros();
            self.back_word &= !(1u64 << bit);
            return Some((self.back * 64) as u16 + bit as u16);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bitset(values: &[u16]) -> BitsetContainer {
        let mut bitset = BitsetContainer::new();
        for &value in values {
            bitset.insert(value);
        }
        bitset
    }

    #[rstest]
    fn test_insert_and_remove_track_cardinality() {
        let mut container = bitset(&[1, 64, 65_535]);
        assert_eq!(container.cardinality(), 3);
        assert!(!container.insert(64));
        assert!(container.remove(64));
        assert!(!container.remove(64));
        assert_eq!(container.cardinality(), 2);
        assert_eq!(container.compute_cardinality(), 2);
    }

    #[rstest]
    fn test_nocard_leaves_cardinality_unknown_until_repaired() {
        let left = bitset(&[1, 2, 3]);
        let right = bitset(&[3, 4]);
        let mut union = left.or_nocard(&right);
        assert!(!union.is_cardinality_known());
        assert_eq!(union.cardinality(), 4);
        assert_eq!(union.repair_cardinality(), 4);
        assert!(union.is_cardinality_known());
    }

    #[rstest]
    fn test_tracking_operations() {
        let left = bitset(&[1, 2, 3, 1000]);
        let right = bitset(&[3, 1000, 2000]);
        assert_eq!(left.and(&right).cardinality(), 2);
        assert_eq!(left.or(&right).cardinality(), 5);
        assert_eq!(left.xor(&right).cardinality(), 3);
        assert_eq!(left.and_not(&right).cardinality(), 2);
        assert_eq!(left.and_cardinality(&right), 2);

        let mut target = left.clone();
        target.xor_assign(&right);
        assert_eq!(target.iter().collect::<Vec<_>>(), vec![1, 2, 2000]);
    }

    #[rstest]
    fn test_range_operations_update_cached_cardinality() {
        let mut container = bitset(&[5]);
        assert_eq!(container.insert_range(0, 99), 99);
        assert_eq!(container.cardinality(), 100);
        assert_eq!(container.remove_range(50, 200), 50);
        assert_eq!(container.cardinality(), 50);
        container.flip_range(40, 59);
        assert_eq!(container.cardinality(), 50);
        assert_eq!(container.compute_cardinality(), 50);
        assert!(container.contains(55));
        assert!(!container.contains(45));
    }

    #[rstest]
    fn test_min_max_rank_select() {
        let container = bitset(&[70, 129, 4000]);
        assert_eq!(container.min(), Some(70));
        assert_eq!(container.max(), Some(4000));
        assert_eq!(container.rank(69), 0);
        assert_eq!(container.rank(129), 2);
        assert_eq!(container.rank(65_535), 3);
        assert_eq!(container.select(1), Some(129));
        assert_eq!(container.select(3), None);
        assert_eq!(BitsetContainer::new().min(), None);
    }

    #[rstest]
    fn test_neighbour_queries_cross_words() {
        let container = bitset(&[3, 200, 65_535]);
        assert_eq!(container.next_at_or_after(4), Some(200));
        assert_eq!(container.next_at_or_after(201), Some(65_535));
        assert_eq!(container.prev_at_or_before(199), Some(3));
        assert_eq!(container.prev_at_or_before(2), None);
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&[0, 1, 2], 1)]
    #[case(&[63, 64], 1)]
    #[case(&[1, 3, 5], 3)]
    #[case(&[65_534, 65_535], 1)]
    fn test_num_runs(#[case] values: &[u16], #[case] expected: usize) {
        assert_eq!(bitset(values).num_runs(), expected);
    }

    #[rstest]
    fn test_iterator_meets_in_the_middle() {
        let container = bitset(&[1, 2, 3, 4, 5]);
        let mut iterator = container.iter();
        assert_eq!(iterator.next(), Some(1));
        assert_eq!(iterator.next_back(), Some(5));
        assert_eq!(iterator.next(), Some(2));
        assert_eq!(iterator.next_back(), Some(4));
        assert_eq!(iterator.next(), Some(3));
        assert_eq!(iterator.next(), None);
        assert_eq!(iterator.next_back(), None);
    }

    #[rstest]
    fn test_full_iterates_everything_in_reverse() {
        let full = BitsetContainer::full();
        assert_eq!(full.iter().rev().count(), 65_536);
        assert_eq!(full.iter().next_back(), Some(65_535));
    }

    #[rstest]
    fn test_try_new_and_from_le_bytes() {
        let empty = BitsetContainer::try_new().unwrap();
        assert!(empty.is_empty());

        let mut bytes = vec![0u8; BitsetContainer::serialized_size()];
        bytes[0] = 0b101;
        let decoded = BitsetContainer::try_from_le_bytes(&bytes).unwrap();
        assert_eq!(decoded.iter().collect::<Vec<_>>(), vec![0, 2]);
    }
}
