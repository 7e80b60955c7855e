//! Chunk containers.
//!
//! A container holds the low 16 bits of every value that shares one high key.
//! It is one of three interchangeable representations:
//!
//! - [`ArrayContainer`]: sorted `u16` list, for at most
//!   [`ARRAY_MAX_CARDINALITY`] values.
//! - [`BitsetContainer`]: 65536-bit vector with a cached cardinality.
//! - [`RunContainer`]: sorted list of maximal runs.
//!
//! [`Container`] dispatches on the tag and converts between representations
//! as values come and go. Arrays grow into bitsets past 4096 values; bitsets
//! shrink back into arrays at 4096 values or fewer; results of operations that
//! involve a run container are normalised to whichever representation
//! serializes smallest.
//!
//! # Examples
//!
//! ```rust
//! use roaringbit::container::Container;
//!
//! let mut container = Container::new();
//! container.insert_range(0..=9999);
//! assert!(container.is_bitset());
//! assert!(container.run_optimize());
//! assert_eq!(container.num_runs(), 1);
//! assert_eq!(container.cardinality(), 10_000);
//! ```

mod array;
mod bitset;
mod ops;
mod run;

use std::fmt;
use std::ops::RangeInclusive;

pub use array::ArrayContainer;
pub use bitset::{BitsetContainer, BitsetIter};
pub use run::{Run, RunContainer, RunIter};

/// Largest cardinality stored as an array; above it a bitset is used.
pub const ARRAY_MAX_CARDINALITY: usize = 4096;

/// Lazy unions of two arrays switch to a bitset above this combined size.
pub const ARRAY_LAZY_LOWERBOUND: usize = 1024;

/// Initial capacity reserved by run containers built from scratch.
pub const RUN_DEFAULT_INIT_SIZE: usize = 4;

/// Initial capacity reserved by an array container on first insertion.
pub const ARRAY_DEFAULT_INIT_SIZE: usize = 16;

/// Number of values a single container can hold.
pub const CONTAINER_CAPACITY: u32 = 1 << 16;

const BITSET_SERIALIZED_SIZE: usize = BitsetContainer::serialized_size();

/// One chunk of a bitmap, in whichever representation currently fits best.
#[derive(Clone)]
pub enum Container {
    /// Sorted array of values.
    Array(ArrayContainer),
    /// Dense bitset.
    Bitset(BitsetContainer),
    /// Run-length encoding.
    Run(RunContainer),
}

impl Container {
    /// Creates an empty container (an empty array).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::Array(ArrayContainer::new())
    }

    /// A container holding all 65536 values, stored as one run.
    #[inline]
    #[must_use]
    pub fn full() -> Self {
        Self::Run(RunContainer::full())
    }

    /// A container holding exactly `range`.
    #[must_use]
    pub fn from_range(range: RangeInclusive<u16>) -> Self {
        let (start, end) = range.into_inner();
        if start > end {
            return Self::new();
        }
        Self::from_runs(RunContainer::from_range(start, end))
    }

    /// Wraps an array, promoting it to a bitset when it is too large.
    #[must_use]
    pub fn from_array(array: ArrayContainer) -> Self {
        if array.cardinality() as usize > ARRAY_MAX_CARDINALITY {
            Self::Bitset(BitsetContainer::from_array(&array))
        } else {
            Self::Array(array)
        }
    }

    /// Wraps a bitset, demoting it to an array when it is sparse enough.
    #[must_use]
    pub fn from_bitset(bitset: BitsetContainer) -> Self {
        if bitset.cardinality() as usize <= ARRAY_MAX_CARDINALITY {
            Self::Array(bitset.to_array())
        } else {
            Self::Bitset(bitset)
        }
    }

    /// Wraps runs, keeping the run encoding only while it is no larger than
    /// the array or bitset encoding of the same values.
    #[must_use]
    pub fn from_runs(runs: RunContainer) -> Self {
        let cardinality = runs.cardinality();
        if runs.serialized_size() <= non_run_size(cardinality) {
            Self::Run(runs)
        } else {
            Self::from_bitset_or_array(&runs, cardinality)
        }
    }

    fn from_bitset_or_array(runs: &RunContainer, cardinality: u32) -> Self {
        if cardinality as usize <= ARRAY_MAX_CARDINALITY {
            Self::Array(ArrayContainer::from_sorted_vec(runs.to_values()))
        } else {
            Self::Bitset(BitsetContainer::from_runs(runs))
        }
    }

    /// Returns `true` for the array representation.
    #[inline]
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns `true` for the bitset representation.
    #[inline]
    #[must_use]
    pub const fn is_bitset(&self) -> bool {
        matches!(self, Self::Bitset(_))
    }

    /// Returns `true` for the run representation.
    #[inline]
    #[must_use]
    pub const fn is_run(&self) -> bool {
        matches!(self, Self::Run(_))
    }

    /// Number of values stored.
    #[inline]
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        match self {
            Self::Array(array) => array.cardinality(),
            Self::Bitset(bitset) => bitset.cardinality(),
            Self::Run(runs) => runs.cardinality(),
        }
    }

    /// Returns `true` if no value is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Array(array) => array.is_empty(),
            Self::Bitset(bitset) => bitset.is_empty(),
            Self::Run(runs) => runs.is_empty(),
        }
    }

    /// Returns `true` if all 65536 values are present.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        match self {
            Self::Array(_) => false,
            Self::Bitset(bitset) => bitset.cardinality() == CONTAINER_CAPACITY,
            Self::Run(runs) => runs.is_full(),
        }
    }

    /// Returns `true` if `value` is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Self::Array(array) => array.contains(value),
            Self::Bitset(bitset) => bitset.contains(value),
            Self::Run(runs) => runs.contains(value),
        }
    }

    /// Inserts `value`, returning `true` if it was absent.
    pub fn insert(&mut self, value: u16) -> bool {
        match self {
            Self::Array(array) => {
                if array.cardinality() as usize >= ARRAY_MAX_CARDINALITY && !array.contains(value)
                {
                    let mut bitset = BitsetContainer::from_array(array);
                    bitset.insert(value);
                    *self = Self::Bitset(bitset);
                    true
                } else {
                    array.insert(value)
                }
            }
            Self::Bitset(bitset) => bitset.insert(value),
            Self::Run(runs) => runs.insert(value),
        }
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self {
            Self::Array(array) => array.remove(value),
            Self::Bitset(bitset) => {
                let removed = bitset.remove(value);
                if removed {
                    self.demote_sparse_bitset();
                }
                removed
            }
            Self::Run(runs) => runs.remove(value),
        }
    }

    /// Replaces a bitset holding 4096 or fewer values with an array.
    fn demote_sparse_bitset(&mut self) {
        if let Self::Bitset(bitset) = self {
            if bitset.cardinality() as usize <= ARRAY_MAX_CARDINALITY {
                let array = bitset.to_array();
                *self = Self::Array(array);
            }
        }
    }

    /// Inserts every value in `range`, returning how many were new.
    pub fn insert_range(&mut self, range: RangeInclusive<u16>) -> u32 {
        let (start, end) = range.into_inner();
        if start > end {
            return 0;
        }
        if start == 0 && end == u16::MAX {
            let added = CONTAINER_CAPACITY - self.cardinality();
            *self = Self::full();
            return added;
        }
        match self {
            Self::Array(array) => {
                let present = array.range_cardinality(start, end);
                let total = u32::from(end) - u32::from(start) + 1;
                let resulting = array.cardinality() + total - present;
                if resulting as usize > ARRAY_MAX_CARDINALITY {
                    let mut bitset = BitsetContainer::from_array(array);
                    let added = bitset.insert_range(start, end);
                    *self = Self::Bitset(bitset);
                    added
                } else {
                    array.insert_range(start, end)
                }
            }
            Self::Bitset(bitset) => bitset.insert_range(start, end),
            Self::Run(runs) => runs.insert_range(start, end),
        }
    }

    /// Removes every value in `range`, returning how many were removed.
    pub fn remove_range(&mut self, range: RangeInclusive<u16>) -> u32 {
        let (start, end) = range.into_inner();
        if start > end {
            return 0;
        }
        match self {
            Self::Array(array) => array.remove_range(start, end),
            Self::Bitset(bitset) => {
                let removed = bitset.remove_range(start, end);
                self.demote_sparse_bitset();
                removed
            }
            Self::Run(runs) => runs.remove_range(start, end),
        }
    }

    /// Complements the values in `range`.
    pub fn flip_range(&mut self, range: RangeInclusive<u16>) {
        let (start, end) = range.into_inner();
        if start > end {
            return;
        }
        match self {
            Self::Array(array) => {
                let present = array.range_cardinality(start, end);
                let total = u32::from(end) - u32::from(start) + 1;
                let resulting = array.cardinality() + total - 2 * present;
                if resulting as usize > ARRAY_MAX_CARDINALITY {
                    let mut bitset = BitsetContainer::from_array(array);
                    bitset.flip_range(start, end);
                    *self = Self::Bitset(bitset);
                } else {
                    array.flip_range(start, end);
                }
            }
            Self::Bitset(bitset) => {
                bitset.flip_range(start, end);
                self.demote_sparse_bitset();
            }
            Self::Run(runs) => {
                runs.flip_range(start, end);
                let runs = std::mem::take(runs);
                *self = Self::from_runs(runs);
            }
        }
    }

    /// Number of values inside `range`.
    #[must_use]
    pub fn range_cardinality(&self, range: RangeInclusive<u16>) -> u32 {
        let (start, end) = range.into_inner();
        if start > end {
            return 0;
        }
        match self {
            Self::Array(array) => array.range_cardinality(start, end),
            Self::Bitset(bitset) => bitset.range_cardinality(start, end),
            Self::Run(runs) => runs.range_cardinality(start, end),
        }
    }

    /// Returns `true` if every value of `range` is present.
    #[must_use]
    pub fn contains_range(&self, range: RangeInclusive<u16>) -> bool {
        let (start, end) = range.into_inner();
        start > end || self.range_cardinality(start..=end) == u32::from(end) - u32::from(start) + 1
    }

    /// Smallest value, or `None` when empty.
    #[must_use]
    pub fn min(&self) -> Option<u16> {
        match self {
            Self::Array(array) => array.min(),
            Self::Bitset(bitset) => bitset.min(),
            Self::Run(runs) => runs.min(),
        }
    }

    /// Largest value, or `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<u16> {
        match self {
            Self::Array(array) => array.max(),
            Self::Bitset(bitset) => bitset.max(),
            Self::Run(runs) => runs.max(),
        }
    }

    /// Number of values less than or equal to `value`.
    #[must_use]
    pub fn rank(&self, value: u16) -> u32 {
        match self {
            Self::Array(array) => array.rank(value),
            Self::Bitset(bitset) => bitset.rank(value),
            Self::Run(runs) => runs.rank(value),
        }
    }

    /// The value at 0-based position `rank`.
    #[must_use]
    pub fn select(&self, rank: u32) -> Option<u16> {
        match self {
            Self::Array(array) => array.select(rank),
            Self::Bitset(bitset) => bitset.select(rank),
            Self::Run(runs) => runs.select(rank),
        }
    }

    /// Smallest stored value that is `>= value`.
    #[must_use]
    pub fn next_at_or_after(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(array) => array.next_at_or_after(value),
            Self::Bitset(bitset) => bitset.next_at_or_after(value),
            Self::Run(runs) => runs.next_at_or_after(value),
        }
    }

    /// Largest stored value that is `<= value`.
    #[must_use]
    pub fn prev_at_or_before(&self, value: u16) -> Option<u16> {
        match self {
            Self::Array(array) => array.prev_at_or_before(value),
            Self::Bitset(bitset) => bitset.prev_at_or_before(value),
            Self::Run(runs) => runs.prev_at_or_before(value),
        }
    }

    /// Number of maximal runs of consecutive values.
    #[must_use]
    pub fn num_runs(&self) -> usize {
        match self {
            Self::Array(array) => array.num_runs(),
            Self::Bitset(bitset) => bitset.num_runs(),
            Self::Run(runs) => runs.num_runs(),
        }
    }

    /// Portable-format payload size of the current representation.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        match self {
            Self::Array(array) => 2 * array.cardinality() as usize,
            Self::Bitset(_) => BITSET_SERIALIZED_SIZE,
            Self::Run(runs) => runs.serialized_size(),
        }
    }

    /// The representation `run_optimize` would switch to, if any.
    ///
    /// Non-run containers become runs when that is strictly smaller; run
    /// containers fall back to an array or bitset when they are larger.
    #[must_use]
    pub fn run_optimized(&self) -> Option<Self> {
        let cardinality = self.cardinality();
        let run_size = run::serialized_size_for(self.num_runs());
        let other_size = non_run_size(cardinality);
        match self {
            Self::Run(runs) if run_size > other_size => {
                Some(Self::from_bitset_or_array(runs, cardinality))
            }
            Self::Run(_) => None,
            Self::Array(array) if run_size < other_size => {
                Some(Self::Run(RunContainer::from_sorted_values(array.as_slice())))
            }
            Self::Bitset(bitset) if run_size < other_size => {
                Some(Self::Run(RunContainer::from_words(bitset.words())))
            }
            Self::Array(_) | Self::Bitset(_) => None,
        }
    }

    /// Converts to the run encoding where it is smaller, and away from it
    /// where it is not. Returns `true` if the container ends up as runs.
    pub fn run_optimize(&mut self) -> bool {
        if let Some(converted) = self.run_optimized() {
            *self = converted;
        }
        self.is_run()
    }

    /// The array or bitset equivalent of a run container.
    #[must_use]
    pub fn without_runs(&self) -> Option<Self> {
        match self {
            Self::Run(runs) => Some(Self::from_bitset_or_array(runs, runs.cardinality())),
            Self::Array(_) | Self::Bitset(_) => None,
        }
    }

    /// Replaces a run container by its array or bitset equivalent. Returns
    /// `true` if a conversion happened.
    pub fn remove_run_compression(&mut self) -> bool {
        match self.without_runs() {
            Some(converted) => {
                *self = converted;
                true
            }
            None => false,
        }
    }

    /// Releases spare capacity, returning the bytes reclaimed.
    pub fn shrink_to_fit(&mut self) -> usize {
        match self {
            Self::Array(array) => array.shrink_to_fit(),
            Self::Bitset(_) => 0,
            Self::Run(runs) => runs.shrink_to_fit(),
        }
    }

    /// Ascending, double-ended iterator over the values.
    #[must_use]
    pub fn iter(&self) -> ContainerIter<'_> {
        match self {
            Self::Array(array) => ContainerIter::Array(array.as_slice().iter()),
            Self::Bitset(bitset) => ContainerIter::Bitset(bitset.iter()),
            Self::Run(runs) => ContainerIter::Run(runs.iter()),
        }
    }
}

/// Size of the cheaper non-run encoding for `cardinality` values.
#[inline]
const fn non_run_size(cardinality: u32) -> usize {
    if cardinality as usize <= ARRAY_MAX_CARDINALITY {
        2 * cardinality as usize
    } else {
        BITSET_SERIALIZED_SIZE
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(left), Self::Array(right)) => left == right,
            (Self::Bitset(left), Self::Bitset(right)) => left == right,
            (Self::Run(left), Self::Run(right)) => left == right,
            _ => self.cardinality() == other.cardinality() && self.iter().eq(other.iter()),
        }
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Array(_) => "Array",
            Self::Bitset(_) => "Bitset",
            Self::Run(_) => "Run",
        };
        write!(formatter, "{kind}[{}]", self.cardinality())
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = u16;
    type IntoIter = ContainerIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of any container.
#[derive(Clone, Debug)]
pub enum ContainerIter<'a> {
    #[doc(hidden)]
    Array(std::slice::Iter<'a, u16>),
    #[doc(hidden)]
    Bitset(BitsetIter<'a>),
    #[doc(hidden)]
    Run(RunIter<'a>),
}

impl Iterator for ContainerIter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        match self {
            Self::Array(inner) => inner.next().copied(),
            Self::Bitset(inner) => inner.next(),
            Self::Run(inner) => inner.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Array(inner) => inner.size_hint(),
            Self::Bitset(_) => (0, Some(CONTAINER_CAPACITY as usize)),
            Self::Run(inner) => inner.size_hint(),
        }
    }
}

impl DoubleEndedIterator for ContainerIter<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u16> {
        match self {
            Self::Array(inner) => inner.next_back().copied(),
            Self::Bitset(inner) => inner.next_back(),
            Self::Run(inner) => inner.next_back(),
        }
    }
}
