//! 64-bit compressed bitmap.
//!
//! [`RoaringTreemap`] stores `u64` values as an ordered map from the high 32
//! bits of each value to a [`RoaringBitmap`] holding the low 32 bits. Inner
//! bitmaps are created on first insertion under their key and dropped once a
//! mutation leaves them empty. Readers still skip empty inner bitmaps, so a
//! map that was assembled some other way compares and reports correctly.
//!
//! # Examples
//!
//! ```rust
//! use roaringbit::RoaringTreemap;
//!
//! let mut treemap = RoaringTreemap::new();
//! treemap.add_many(&[5, 4_000_000_005, 8_000_000_010]);
//!
//! assert_eq!(treemap.cardinality(), 3);
//! assert_eq!(treemap.minimum(), 5);
//! assert_eq!(treemap.maximum(), 8_000_000_010);
//! assert!(treemap.contains(4_000_000_005));
//! assert!(!treemap.contains(6));
//! ```

mod algebra;
mod frozen;
mod iter;
mod serialization;

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Bound, RangeBounds};

use crate::bitmap::RoaringBitmap;
use crate::error::CardinalityOverflow;

pub use frozen::{FROZEN_ALIGNMENT, FrozenTreemapIter, FrozenTreemapView};
pub use iter::{TreemapCursor, TreemapIter};

#[inline]
pub(crate) const fn high(value: u64) -> u32 {
    (value >> 32) as u32
}

#[inline]
pub(crate) const fn low(value: u64) -> u32 {
    value as u32
}

#[inline]
pub(crate) const fn join(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

fn closed_bounds(range: &impl RangeBounds<u64>) -> Option<(u64, u64)> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end,
        Bound::Excluded(&end) => end.checked_sub(1)?,
        Bound::Unbounded => u64::MAX,
    };
    (start <= end).then_some((start, end))
}

/// The part of `[start, end]` that falls in the inner bitmap with `key`.
#[inline]
fn span_in(key: u32, start: u64, end: u64) -> (u32, u32) {
    let first = if key == high(start) { low(start) } else { 0 };
    let last = if key == high(end) { low(end) } else { u32::MAX };
    (first, last)
}

/// A compressed set of `u64` values.
///
/// # Examples
///
/// ```rust
/// use roaringbit::RoaringTreemap;
///
/// let mut treemap = RoaringTreemap::new();
/// treemap.insert_range(u64::from(u32::MAX) - 1..=u64::from(u32::MAX) + 2);
/// assert_eq!(treemap.cardinality(), 4);
/// assert_eq!(treemap.rank(u64::from(u32::MAX)), 2);
/// assert_eq!(treemap.select(3), Some(u64::from(u32::MAX) + 2));
/// ```
#[derive(Clone, Default)]
pub struct RoaringTreemap {
    map: BTreeMap<u32, RoaringBitmap>,
    copy_on_write: bool,
}

impl RoaringTreemap {
    /// Creates an empty treemap.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            copy_on_write: false,
        }
    }

    /// Creates a treemap holding `values`.
    #[must_use]
    pub fn of(values: &[u64]) -> Self {
        let mut treemap = Self::new();
        treemap.add_many(values);
        treemap
    }

    /// Creates a treemap holding every value of `range`.
    #[must_use]
    pub fn from_range(range: impl RangeBounds<u64>) -> Self {
        let mut treemap = Self::new();
        treemap.insert_range(range);
        treemap
    }

    /// Inner bitmaps that hold at least one value, with their keys.
    #[inline]
    pub(crate) fn stored(&self) -> impl DoubleEndedIterator<Item = (u32, &RoaringBitmap)> + '_ {
        self.map
            .iter()
            .filter(|(_, inner)| !inner.is_empty())
            .map(|(&key, inner)| (key, inner))
    }

    /// The inner bitmap for `key`, created empty if needed.
    fn inner_mut(&mut self, key: u32) -> &mut RoaringBitmap {
        let copy_on_write = self.copy_on_write;
        self.map.entry(key).or_insert_with(|| {
            let mut inner = RoaringBitmap::new();
            inner.set_copy_on_write(copy_on_write);
            inner
        })
    }

    /// Copy of an inner bitmap taken from another treemap.
    pub(crate) fn adopt(&self, inner: &RoaringBitmap) -> RoaringBitmap {
        let mut copy = inner.clone();
        copy.set_copy_on_write(self.copy_on_write);
        copy
    }

    fn drop_if_empty(&mut self, key: u32) {
        if self.map.get(&key).is_some_and(RoaringBitmap::is_empty) {
            self.map.remove(&key);
        }
    }

    // =========================================================================
    // Copy-on-write
    // =========================================================================

    /// Enables or disables container sharing between copies, for every inner
    /// bitmap.
    pub fn set_copy_on_write(&mut self, enabled: bool) {
        self.copy_on_write = enabled;
        for inner in self.map.values_mut() {
            inner.set_copy_on_write(enabled);
        }
    }

    /// Returns `true` if copies share containers until they are mutated.
    #[inline]
    #[must_use]
    pub const fn copy_on_write(&self) -> bool {
        self.copy_on_write
    }

    // =========================================================================
    // Single values
    // =========================================================================

    /// Adds `value`, returning `true` if it was not already present.
    pub fn insert(&mut self, value: u64) -> bool {
        self.inner_mut(high(value)).insert(low(value))
    }

    /// Adds every value of `values`.
    ///
    /// Consecutive values under the same high key are inserted into one inner
    /// bitmap without looking it up again.
    pub fn add_many(&mut self, values: &[u64]) {
        let mut values = values.iter().copied().peekable();
        while let Some(first) = values.next() {
            let key = high(first);
            let inner = self.inner_mut(key);
            inner.insert(low(first));
            while let Some(value) = values.next_if(|&value| high(value) == key) {
                inner.insert(low(value));
            }
        }
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: u64) -> bool {
        let key = high(value);
        let removed = self
            .map
            .get_mut(&key)
            .is_some_and(|inner| inner.remove(low(value)));
        if removed {
            self.drop_if_empty(key);
        }
        removed
    }

    /// Adds `value` if it is absent and removes it otherwise.
    pub fn flip(&mut self, value: u64) {
        if !self.remove(value) {
            self.insert(value);
        }
    }

    /// Returns `true` if `value` is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        self.map
            .get(&high(value))
            .is_some_and(|inner| inner.contains(low(value)))
    }

    // =========================================================================
    // Values below 2^32
    // =========================================================================

    /// Adds a 32-bit value, returning `true` if it was not already present.
    pub fn insert_u32(&mut self, value: u32) -> bool {
        self.insert(u64::from(value))
    }

    /// Removes a 32-bit value, returning `true` if it was present.
    pub fn remove_u32(&mut self, value: u32) -> bool {
        self.remove(u64::from(value))
    }

    /// Returns `true` if the 32-bit value is present.
    #[must_use]
    pub fn contains_u32(&self, value: u32) -> bool {
        self.contains(u64::from(value))
    }

    /// Adds every 32-bit value of `values`.
    pub fn add_many_u32(&mut self, values: &[u32]) {
        self.inner_mut(0).add_many(values);
        self.drop_if_empty(0);
    }

    /// Adds a range of 32-bit values, returning how many were new.
    pub fn insert_range_u32(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let added = self.inner_mut(0).insert_range(range);
        self.drop_if_empty(0);
        added
    }

    /// Removes a range of 32-bit values, returning how many were removed.
    pub fn remove_range_u32(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let Some(inner) = self.map.get_mut(&0) else {
            return 0;
        };
        let removed = inner.remove_range(range);
        self.drop_if_empty(0);
        removed
    }

    // =========================================================================
    // Ranges
    // =========================================================================

    /// Adds every value of `range`, returning how many were new.
    ///
    /// The count saturates at `u64::MAX` when the whole universe is inserted
    /// into an empty treemap.
    pub fn insert_range(&mut self, range: impl RangeBounds<u64>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        let mut added = 0u64;
        for key in high(start)..=high(end) {
            let (first, last) = span_in(key, start, end);
            added = added.saturating_add(self.inner_mut(key).insert_range(first..=last));
        }
        added
    }

    /// Removes every value of `range`, returning how many were removed.
    ///
    /// Returns at once when the treemap is empty or the range lies entirely
    /// outside the stored keys.
    pub fn remove_range(&mut self, range: impl RangeBounds<u64>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        let (Some(&first_key), Some(&last_key)) = (self.map.keys().next(), self.map.keys().next_back())
        else {
            return 0;
        };
        if high(end) < first_key || high(start) > last_key {
            return 0;
        }
        let mut removed = 0u64;
        let mut emptied = Vec::new();
        for (&key, inner) in self.map.range_mut(high(start)..=high(end)) {
            let (first, last) = span_in(key, start, end);
            removed += inner.remove_range(first..=last);
            if inner.is_empty() {
                emptied.push(key);
            }
        }
        for key in emptied {
            self.map.remove(&key);
        }
        removed
    }

    /// Complements every value of `range`.
    pub fn flip_range(&mut self, range: impl RangeBounds<u64>) {
        let Some((start, end)) = closed_bounds(&range) else {
            return;
        };
        for key in high(start)..=high(end) {
            let (first, last) = span_in(key, start, end);
            self.inner_mut(key).flip_range(first..=last);
            self.drop_if_empty(key);
        }
    }

    /// Returns `true` if every value of `range` is present.
    #[must_use]
    pub fn contains_range(&self, range: impl RangeBounds<u64>) -> bool {
        let Some((start, end)) = closed_bounds(&range) else {
            return true;
        };
        (high(start)..=high(end)).all(|key| {
            let (first, last) = span_in(key, start, end);
            self.map
                .get(&key)
                .is_some_and(|inner| inner.contains_range(first..=last))
        })
    }

    /// Number of values inside `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range covers all 2^64 values and all of them are
    /// present.
    #[must_use]
    pub fn range_cardinality(&self, range: impl RangeBounds<u64>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        self.map
            .range(high(start)..=high(end))
            .map(|(&key, inner)| {
                let (first, last) = span_in(key, start, end);
                inner.range_cardinality(first..=last)
            })
            .fold(0u64, |total, count| {
                total.checked_add(count).unwrap_or_else(|| panic!("{CardinalityOverflow}"))
            })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of values, or [`CardinalityOverflow`] when all 2^64 values are
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`CardinalityOverflow`] if the treemap is full.
    pub fn try_cardinality(&self) -> Result<u64, CardinalityOverflow> {
        self.map
            .values()
            .try_fold(0u64, |total, inner| total.checked_add(inner.cardinality()))
            .ok_or(CardinalityOverflow)
    }

    /// Number of values.
    ///
    /// # Panics
    ///
    /// Panics if the treemap holds all 2^64 values. Use
    /// [`RoaringTreemap::try_cardinality`] or [`RoaringTreemap::is_full`] when
    /// that can happen.
    #[must_use]
    pub fn cardinality(&self) -> u64 {
        match self.try_cardinality() {
            Ok(cardinality) => cardinality,
            Err(error) => panic!("{error}"),
        }
    }

    /// Returns `true` if the treemap holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.values().all(RoaringBitmap::is_empty)
    }

    /// Returns `true` if the treemap holds all 2^64 values.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.map.len() as u64 == 1 << 32 && self.map.values().all(RoaringBitmap::is_full)
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Smallest value, or `None` when empty.
    #[must_use]
    pub fn min(&self) -> Option<u64> {
        self.map
            .iter()
            .find_map(|(&key, inner)| inner.min().map(|low| join(key, low)))
    }

    /// Largest value, or `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.map
            .iter()
            .rev()
            .find_map(|(&key, inner)| inner.max().map(|low| join(key, low)))
    }

    /// Smallest value, or `u64::MAX` when empty.
    #[must_use]
    pub fn minimum(&self) -> u64 {
        self.min().unwrap_or(u64::MAX)
    }

    /// Largest value, or `0` when empty.
    ///
    /// Use [`RoaringTreemap::is_empty`] to tell an empty treemap from one
    /// holding only `0`.
    #[must_use]
    pub fn maximum(&self) -> u64 {
        self.max().unwrap_or(0)
    }

    /// Number of values less than or equal to `value`.
    #[must_use]
    pub fn rank(&self, value: u64) -> u64 {
        let key = high(value);
        let before: u64 = self
            .map
            .range(..key)
            .map(|(_, inner)| inner.cardinality())
            .sum();
        before + self.map.get(&key).map_or(0, |inner| inner.rank(low(value)))
    }

    /// The value at 0-based position `rank`, or `None` when
    /// `rank >= cardinality()`.
    #[must_use]
    pub fn select(&self, rank: u64) -> Option<u64> {
        let mut remaining = rank;
        for (&key, inner) in &self.map {
            let cardinality = inner.cardinality();
            if remaining < cardinality {
                return inner.select(remaining).map(|low| join(key, low));
            }
            remaining -= cardinality;
        }
        None
    }

    /// Copies the values into an ascending vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Run-optimizes every inner bitmap. Returns `true` if any run container
    /// remains afterwards.
    pub fn run_optimize(&mut self) -> bool {
        let mut any_run = false;
        for inner in self.map.values_mut() {
            any_run |= inner.run_optimize();
        }
        any_run
    }

    /// Removes run compression from every inner bitmap. Returns `true` if any
    /// container was converted.
    pub fn remove_run_compression(&mut self) -> bool {
        let mut converted = false;
        for inner in self.map.values_mut() {
            converted |= inner.remove_run_compression();
        }
        converted
    }

    /// Returns `true` if any inner bitmap holds a run container.
    #[must_use]
    pub fn has_run_containers(&self) -> bool {
        self.map.values().any(RoaringBitmap::has_run_containers)
    }

    /// Drops empty inner bitmaps and shrinks the rest, returning an estimate
    /// of the bytes reclaimed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, inner| !inner.is_empty());
        let mut saved = (before - self.map.len())
            * (std::mem::size_of::<u32>() + std::mem::size_of::<RoaringBitmap>());
        for inner in self.map.values_mut() {
            saved += inner.shrink_to_fit();
        }
        log::debug!("treemap shrink_to_fit reclaimed {saved} bytes");
        saved
    }
}

impl PartialEq for RoaringTreemap {
    fn eq(&self, other: &Self) -> bool {
        self.stored().eq(other.stored())
    }
}

impl Eq for RoaringTreemap {}

impl fmt::Display for RoaringTreemap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("{")?;
        for (position, value) in self.iter().enumerate() {
            if position > 0 {
                formatter.write_str(",")?;
            }
            write!(formatter, "{value}")?;
        }
        formatter.write_str("}")
    }
}

impl fmt::Debug for RoaringTreemap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.map.iter()).finish()
    }
}

impl From<RoaringBitmap> for RoaringTreemap {
    /// Stores the 32-bit bitmap under high key 0.
    fn from(bitmap: RoaringBitmap) -> Self {
        let mut treemap = Self::new();
        if !bitmap.is_empty() {
            treemap.map.insert(0, bitmap);
        }
        treemap
    }
}

impl FromIterator<u64> for RoaringTreemap {
    fn from_iter<I: IntoIterator<Item = u64>>(iterator: I) -> Self {
        let mut treemap = Self::new();
        treemap.extend(iterator);
        treemap
    }
}

impl<'a> FromIterator<&'a u64> for RoaringTreemap {
    fn from_iter<I: IntoIterator<Item = &'a u64>>(iterator: I) -> Self {
        iterator.into_iter().copied().collect()
    }
}

impl Extend<u64> for RoaringTreemap {
    fn extend<I: IntoIterator<Item = u64>>(&mut self, iterator: I) {
        for value in iterator {
            self.insert(value);
        }
    }
}
