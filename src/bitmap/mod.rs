//! 32-bit compressed bitmap.
//!
//! This module provides [`RoaringBitmap`], a set of `u32` values. A value is
//! split into a 16-bit key (its high half) and a 16-bit low half; all values
//! sharing a key live in one [`Container`], and the containers are kept in a
//! vector sorted by key.
//!
//! # Invariants
//!
//! - Keys are unique and strictly ascending.
//! - No container is empty once a mutating operation has returned.
//!
//! # Copy-on-write
//!
//! Containers are held through a reference counter. With copy-on-write
//! enabled, [`Clone`] shares every container with the copy and the first
//! mutation of a shared container copies it. With it disabled (the default),
//! [`Clone`] copies every container up front.
//!
//! # Examples
//!
//! ```rust
//! use roaringbit::RoaringBitmap;
//!
//! let mut bitmap: RoaringBitmap = [1, 2, 3, 1_000_000].into_iter().collect();
//! assert!(bitmap.contains(1_000_000));
//! assert_eq!(bitmap.cardinality(), 4);
//!
//! bitmap.remove(2);
//! assert_eq!(bitmap.to_string(), "{1,3,1000000}");
//! ```

mod algebra;
mod frozen;
mod iter;
mod serialization;

use std::fmt;
use std::ops::{Bound, Range, RangeBounds};

use crate::ReferenceCounter;
use crate::container::Container;

pub use frozen::{FROZEN_COOKIE, FrozenBitmapView, FrozenIter};
pub use iter::{Cursor, Iter};
pub use serialization::Format;

/// Key of the container holding `value`.
#[inline]
pub(crate) const fn high(value: u32) -> u16 {
    (value >> 16) as u16
}

/// Position of `value` inside its container.
#[inline]
pub(crate) const fn low(value: u32) -> u16 {
    value as u16
}

/// Reassembles a value from its key and low half.
#[inline]
pub(crate) const fn join(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

/// Converts any `u32` range into closed bounds, or `None` when it is empty.
pub(crate) fn closed_bounds(range: &impl RangeBounds<u32>) -> Option<(u32, u32)> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end,
        Bound::Excluded(&end) => end.checked_sub(1)?,
        Bound::Unbounded => u32::MAX,
    };
    (start <= end).then_some((start, end))
}

/// The part of `[start, end]` that falls in the container with `key`.
#[inline]
fn span_in(key: u16, start: u32, end: u32) -> (u16, u16) {
    let first = if key == high(start) { low(start) } else { 0 };
    let last = if key == high(end) { low(end) } else { u16::MAX };
    (first, last)
}

// =============================================================================
// Chunk
// =============================================================================

/// A key and the container holding the low halves of its values.
#[derive(Clone, Debug)]
pub(crate) struct Chunk {
    pub(crate) key: u16,
    pub(crate) container: ReferenceCounter<Container>,
}

impl Chunk {
    #[inline]
    pub(crate) fn new(key: u16, container: Container) -> Self {
        Self {
            key,
            container: ReferenceCounter::new(container),
        }
    }

    /// Mutable access, copying the container first if it is shared.
    #[inline]
    pub(crate) fn container_mut(&mut self) -> &mut Container {
        ReferenceCounter::make_mut(&mut self.container)
    }

    /// A copy that shares the container when `share` is set.
    #[inline]
    pub(crate) fn adopt(&self, share: bool) -> Self {
        if share {
            self.clone()
        } else {
            Self::new(self.key, Container::clone(&self.container))
        }
    }
}

// =============================================================================
// RoaringBitmap
// =============================================================================

/// A compressed set of `u32` values.
///
/// # Examples
///
/// ```rust
/// use roaringbit::RoaringBitmap;
///
/// let mut bitmap = RoaringBitmap::new();
/// assert!(bitmap.insert(42));
/// assert!(!bitmap.insert(42));
/// bitmap.insert_range(100..200);
///
/// assert_eq!(bitmap.cardinality(), 101);
/// assert_eq!(bitmap.min(), Some(42));
/// assert_eq!(bitmap.max(), Some(199));
/// assert_eq!(bitmap.rank(150), 52);
/// assert_eq!(bitmap.select(1), Some(100));
/// ```
pub struct RoaringBitmap {
    chunks: Vec<Chunk>,
    copy_on_write: bool,
}

impl RoaringBitmap {
    /// Creates an empty bitmap.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunks: Vec::new(),
            copy_on_write: false,
        }
    }

    /// Creates a bitmap holding `values`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let bitmap = RoaringBitmap::of(&[7, 3, 7, 65_536]);
    /// assert_eq!(bitmap.to_vec(), vec![3, 7, 65_536]);
    /// ```
    #[must_use]
    pub fn of(values: &[u32]) -> Self {
        let mut bitmap = Self::new();
        bitmap.add_many(values);
        bitmap
    }

    /// Creates a bitmap holding every value of `range`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let bitmap = RoaringBitmap::from_range(10..=20);
    /// assert_eq!(bitmap.cardinality(), 11);
    /// ```
    #[must_use]
    pub fn from_range(range: impl RangeBounds<u32>) -> Self {
        let mut bitmap = Self::new();
        bitmap.insert_range(range);
        bitmap
    }

    pub(crate) const fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            copy_on_write: false,
        }
    }

    #[inline]
    pub(crate) fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunks that hold at least one value.
    #[inline]
    pub(crate) fn stored_chunks(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.iter().filter(|chunk| !chunk.container.is_empty())
    }

    #[inline]
    fn find(&self, key: u16) -> Result<usize, usize> {
        self.chunks.binary_search_by_key(&key, |chunk| chunk.key)
    }

    /// Index of the first chunk whose key is `>= key`.
    #[inline]
    fn lower_bound(&self, key: u16) -> usize {
        self.chunks.partition_point(|chunk| chunk.key < key)
    }

    /// Index of the chunk for `key`, inserting an empty one if needed.
    fn chunk_index_or_insert(&mut self, key: u16) -> usize {
        match self.find(key) {
            Ok(index) => index,
            Err(index) => {
                self.chunks.insert(index, Chunk::new(key, Container::new()));
                index
            }
        }
    }

    /// Drops the empty chunks inside `range`.
    fn prune(&mut self, range: Range<usize>) {
        let mut write = range.start;
        for read in range.clone() {
            if !self.chunks[read].container.is_empty() {
                self.chunks.swap(write, read);
                write += 1;
            }
        }
        self.chunks.drain(write..range.end);
    }

    // =========================================================================
    // Copy-on-write
    // =========================================================================

    /// Enables or disables container sharing between copies.
    #[inline]
    pub fn set_copy_on_write(&mut self, enabled: bool) {
        self.copy_on_write = enabled;
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
    ///
    /// # Complexity
    ///
    /// O(log n) to find the container, plus the container insertion.
    pub fn insert(&mut self, value: u32) -> bool {
        let (key, low) = (high(value), low(value));
        if let Ok(index) = self.find(key) {
            if self.chunks[index].container.contains(low) {
                return false;
            }
        }
        let index = self.chunk_index_or_insert(key);
        self.chunks[index].container_mut().insert(low)
    }

    /// Adds every value of `values`.
    ///
    /// Consecutive values that share a container reuse the previous lookup.
    pub fn add_many(&mut self, values: &[u32]) {
        let mut previous: Option<(u16, usize)> = None;
        for &value in values {
            let key = high(value);
            let index = match previous {
                Some((previous_key, index)) if previous_key == key => index,
                _ => self.chunk_index_or_insert(key),
            };
            self.chunks[index].container_mut().insert(low(value));
            previous = Some((key, index));
        }
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: u32) -> bool {
        let Ok(index) = self.find(high(value)) else {
            return false;
        };
        let chunk = &mut self.chunks[index];
        if !chunk.container.contains(low(value)) {
            return false;
        }
        chunk.container_mut().remove(low(value));
        if chunk.container.is_empty() {
            self.chunks.remove(index);
        }
        true
    }

    /// Adds `value` if it is absent and removes it otherwise.
    pub fn flip(&mut self, value: u32) {
        if !self.remove(value) {
            self.insert(value);
        }
    }

    /// Returns `true` if `value` is present.
    ///
    /// # Complexity
    ///
    /// O(log n) plus the container lookup: O(1) for bitsets, O(log k) for
    /// arrays and runs.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u32) -> bool {
        self.find(high(value))
            .is_ok_and(|index| self.chunks[index].container.contains(low(value)))
    }

    // =========================================================================
    // Ranges
    // =========================================================================

    /// Adds every value of `range`, returning how many were new.
    ///
    /// The range is handled container by container: a partial first
    /// container, full containers in between (each replaced by a single run),
    /// and a partial last container.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let mut bitmap = RoaringBitmap::new();
    /// assert_eq!(bitmap.insert_range(10..=70_000), 69_991);
    /// assert!(bitmap.contains(65_536));
    /// assert!(!bitmap.contains(70_001));
    /// ```
    pub fn insert_range(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        let mut added = 0u64;
        let mut index = self.lower_bound(high(start));
        for key in high(start)..=high(end) {
            let (first, last) = span_in(key, start, end);
            if self.chunks.get(index).is_some_and(|chunk| chunk.key == key) {
                let chunk = &mut self.chunks[index];
                if !chunk.container.is_full() {
                    added += u64::from(chunk.container_mut().insert_range(first..=last));
                }
            } else {
                self.chunks
                    .insert(index, Chunk::new(key, Container::from_range(first..=last)));
                added += u64::from(last - first) + 1;
            }
            index += 1;
        }
        added
    }

    /// Removes every value of `range`, returning how many were removed.
    pub fn remove_range(&mut self, range: impl RangeBounds<u32>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        let first_index = self.lower_bound(high(start));
        let last_index = self.chunks.partition_point(|chunk| chunk.key <= high(end));
        let mut removed = 0u64;
        for chunk in &mut self.chunks[first_index..last_index] {
            let (first, last) = span_in(chunk.key, start, end);
            if first == 0 && last == u16::MAX {
                removed += u64::from(chunk.container.cardinality());
                chunk.container = ReferenceCounter::new(Container::new());
            } else if chunk.container.range_cardinality(first..=last) > 0 {
                removed += u64::from(chunk.container_mut().remove_range(first..=last));
            }
        }
        self.prune(first_index..last_index);
        removed
    }

    /// Complements every value of `range`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let mut bitmap = RoaringBitmap::of(&[1, 2, 3]);
    /// bitmap.flip_range(2..=5);
    /// assert_eq!(bitmap.to_vec(), vec![1, 4, 5]);
    /// ```
    pub fn flip_range(&mut self, range: impl RangeBounds<u32>) {
        let Some((start, end)) = closed_bounds(&range) else {
            return;
        };
        let mut index = self.lower_bound(high(start));
        for key in high(start)..=high(end) {
            let (first, last) = span_in(key, start, end);
            if self.chunks.get(index).is_some_and(|chunk| chunk.key == key) {
                let chunk = &mut self.chunks[index];
                chunk.container_mut().flip_range(first..=last);
                if chunk.container.is_empty() {
                    self.chunks.remove(index);
                    continue;
                }
            } else {
                self.chunks
                    .insert(index, Chunk::new(key, Container::from_range(first..=last)));
            }
            index += 1;
        }
    }

    /// Returns `true` if every value of `range` is present. An empty range is
    /// always contained.
    #[must_use]
    pub fn contains_range(&self, range: impl RangeBounds<u32>) -> bool {
        let Some((start, end)) = closed_bounds(&range) else {
            return true;
        };
        let first_index = self.lower_bound(high(start));
        let expected = usize::from(high(end) - high(start)) + 1;
        let chunks = &self.chunks[first_index..];
        chunks.len() >= expected
            && chunks[..expected].iter().enumerate().all(|(offset, chunk)| {
                let (first, last) = span_in(chunk.key, start, end);
                usize::from(chunk.key - high(start)) == offset
                    && chunk.container.contains_range(first..=last)
            })
    }

    /// Number of values inside `range`.
    #[must_use]
    pub fn range_cardinality(&self, range: impl RangeBounds<u32>) -> u64 {
        let Some((start, end)) = closed_bounds(&range) else {
            return 0;
        };
        let first_index = self.lower_bound(high(start));
        self.chunks[first_index..]
            .iter()
            .take_while(|chunk| chunk.key <= high(end))
            .map(|chunk| {
                let (first, last) = span_in(chunk.key, start, end);
                u64::from(chunk.container.range_cardinality(first..=last))
            })
            .sum()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of values in the bitmap.
    ///
    /// # Complexity
    ///
    /// O(n) in the number of containers.
    #[must_use]
    pub fn cardinality(&self) -> u64 {
        self.chunks
            .iter()
            .map(|chunk| u64::from(chunk.container.cardinality()))
            .sum()
    }

    /// Returns `true` if the bitmap holds no value.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.container.is_empty())
    }

    /// Returns `true` if the bitmap holds all 2^32 values.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.chunks.len() == 1 << 16 && self.chunks.iter().all(|chunk| chunk.container.is_full())
    }

    /// Removes every value.
    #[inline]
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Smallest value, or `None` when empty.
    #[must_use]
    pub fn min(&self) -> Option<u32> {
        self.chunks
            .iter()
            .find_map(|chunk| chunk.container.min().map(|low| join(chunk.key, low)))
    }

    /// Largest value, or `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        self.chunks
            .iter()
            .rev()
            .find_map(|chunk| chunk.container.max().map(|low| join(chunk.key, low)))
    }

    /// Smallest value, or `u32::MAX` when empty.
    ///
    /// Use [`RoaringBitmap::is_empty`] to tell an empty bitmap from one whose
    /// minimum really is `u32::MAX`.
    #[inline]
    #[must_use]
    pub fn minimum(&self) -> u32 {
        self.min().unwrap_or(u32::MAX)
    }

    /// Largest value, or `0` when empty.
    ///
    /// Use [`RoaringBitmap::is_empty`] to tell an empty bitmap from one whose
    /// maximum really is `0`.
    #[inline]
    #[must_use]
    pub fn maximum(&self) -> u32 {
        self.max().unwrap_or(0)
    }

    /// Number of values less than or equal to `value`.
    ///
    /// # Complexity
    ///
    /// O(n) in the number of containers before `value`.
    #[must_use]
    pub fn rank(&self, value: u32) -> u64 {
        let key = high(value);
        let mut rank = 0;
        for chunk in &self.chunks {
            if chunk.key > key {
                break;
            }
            if chunk.key == key {
                rank += u64::from(chunk.container.rank(low(value)));
                break;
            }
            rank += u64::from(chunk.container.cardinality());
        }
        rank
    }

    /// The value at 0-based position `rank`, or `None` when
    /// `rank >= cardinality()`.
    #[must_use]
    pub fn select(&self, rank: u64) -> Option<u32> {
        let mut remaining = rank;
        for chunk in &self.chunks {
            let cardinality = u64::from(chunk.container.cardinality());
            if remaining < cardinality {
                return chunk
                    .container
                    .select(remaining as u32)
                    .map(|low| join(chunk.key, low));
            }
            remaining -= cardinality;
        }
        None
    }

    /// Copies the values into an ascending vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        let mut values = Vec::with_capacity(self.cardinality() as usize);
        values.extend(self.iter());
        values
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Switches each container to the run encoding where that is smaller, and
    /// away from it where it is not.
    ///
    /// Returns `true` if at least one container is a run container afterwards.
    /// Applying it twice leaves the same representation as applying it once.
    pub fn run_optimize(&mut self) -> bool {
        let mut converted = 0usize;
        let mut any_run = false;
        for chunk in &mut self.chunks {
            if let Some(optimized) = chunk.container.run_optimized() {
                chunk.container = ReferenceCounter::new(optimized);
                converted += 1;
            }
            any_run |= chunk.container.is_run();
        }
        log::debug!(
            "run_optimize converted {converted} of {} containers",
            self.chunks.len()
        );
        any_run
    }

    /// Replaces every run container by its array or bitset equivalent.
    ///
    /// Returns `true` if at least one container was converted.
    pub fn remove_run_compression(&mut self) -> bool {
        let mut converted = 0usize;
        for chunk in &mut self.chunks {
            if let Some(plain) = chunk.container.without_runs() {
                chunk.container = ReferenceCounter::new(plain);
                converted += 1;
            }
        }
        log::debug!("remove_run_compression converted {converted} containers");
        converted > 0
    }

    /// Returns `true` if any container uses the run encoding.
    #[must_use]
    pub fn has_run_containers(&self) -> bool {
        self.chunks.iter().any(|chunk| chunk.container.is_run())
    }

    /// Drops empty containers and releases spare capacity, returning an
    /// estimate of the bytes reclaimed. Shared containers are left alone.
    pub fn shrink_to_fit(&mut self) -> usize {
        let chunk_count = self.chunks.len();
        self.prune(0..chunk_count);
        let mut saved = (chunk_count - self.chunks.len())
            * (std::mem::size_of::<Chunk>() + std::mem::size_of::<Container>());
        for chunk in &mut self.chunks {
            if let Some(container) = ReferenceCounter::get_mut(&mut chunk.container) {
                saved += container.shrink_to_fit();
            }
        }
        let capacity = self.chunks.capacity();
        self.chunks.shrink_to_fit();
        saved += (capacity - self.chunks.capacity()) * std::mem::size_of::<Chunk>();
        log::debug!("shrink_to_fit reclaimed {saved} bytes");
        saved
    }
}

impl Default for RoaringBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RoaringBitmap {
    fn clone(&self) -> Self {
        Self {
            chunks: self
                .chunks
                .iter()
                .map(|chunk| chunk.adopt(self.copy_on_write))
                .collect(),
            copy_on_write: self.copy_on_write,
        }
    }
}

impl PartialEq for RoaringBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.stored_chunks()
            .map(|chunk| (chunk.key, &*chunk.container))
            .eq(other
                .stored_chunks()
                .map(|chunk| (chunk.key, &*chunk.container)))
    }
}

impl Eq for RoaringBitmap {}

impl fmt::Display for RoaringBitmap {
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

impl fmt::Debug for RoaringBitmap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RoaringBitmap")
            .field("cardinality", &self.cardinality())
            .field(
                "containers",
                &DebugChunks(&self.chunks),
            )
            .finish()
    }
}

struct DebugChunks<'a>(&'a [Chunk]);

impl fmt::Debug for DebugChunks<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_map()
            .entries(self.0.iter().map(|chunk| (chunk.key, &*chunk.container)))
            .finish()
    }
}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iterator: I) -> Self {
        let mut bitmap = Self::new();
        bitmap.extend(iterator);
        bitmap
    }
}

impl<'a> FromIterator<&'a u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = &'a u32>>(iterator: I) -> Self {
        iterator.into_iter().copied().collect()
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iterator: I) {
        for value in iterator {
            self.insert(value);
        }
    }
}

impl From<&[u32]> for RoaringBitmap {
    fn from(values: &[u32]) -> Self {
        Self::of(values)
    }
}
