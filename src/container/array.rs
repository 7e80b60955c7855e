//! Sorted array container.
//!
//! Stores the low 16 bits of each value in a strictly ascending `Vec<u16>`.
//! Used for sparse chunks of at most [`ARRAY_MAX_CARDINALITY`] values.
//!
//! [`ARRAY_MAX_CARDINALITY`]: super::ARRAY_MAX_CARDINALITY

use std::cmp::Ordering;

use super::ARRAY_DEFAULT_INIT_SIZE;

/// A sorted, deduplicated list of 16-bit values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArrayContainer {
    values: Vec<u16>,
}

impl ArrayContainer {
    /// Creates an empty array container.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Creates an empty array container with room for `capacity` values.
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Wraps a strictly ascending vector.
    ///
    /// In debug builds the ordering precondition is checked.
    #[inline]
    #[must_use]
    pub fn from_sorted_vec(values: Vec<u16>) -> Self {
        debug_assert!(
            values.windows(2).all(|pair| pair[0] < pair[1]),
            "array container values must be strictly ascending"
        );
        Self { values }
    }

    /// Returns the values as a sorted slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }

    /// Consumes the container and returns its sorted values.
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<u16> {
        self.values
    }

    /// Number of values stored.
    #[inline]
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        self.values.len() as u32
    }

    /// Returns `true` if no value is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Membership test by binary search.
    #[inline]
    #[must_use]
    pub fn contains(&self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Inserts `value`, returning `true` if it was not already present.
    ///
    /// The container never converts itself; the caller decides when the array
    /// has grown too large.
    pub fn insert(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(position) => {
                if self.values.capacity() == 0 {
                    self.values.reserve(ARRAY_DEFAULT_INIT_SIZE);
                }
                self.values.insert(position, value);
                true
            }
        }
    }

    /// Removes `value`, returning `true` if it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(position) => {
                self.values.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    /// Index range of the values inside `[start, end]`.
    #[inline]
    fn span(&self, start: u16, end: u16) -> (usize, usize) {
        let first = self.values.partition_point(|&value| value < start);
        let last = self.values.partition_point(|&value| value <= end);
        (first, last.max(first))
    }

    /// Number of values inside `[start, end]`.
    #[must_use]
    pub fn range_cardinality(&self, start: u16, end: u16) -> u32 {
        let (first, last) = self.span(start, end);
        (last - first) as u32
    }

    /// Inserts every value in `[start, end]`, returning how many were new.
    pub fn insert_range(&mut self, start: u16, end: u16) -> u32 {
        let (first, last) = self.span(start, end);
        let present = (last - first) as u32;
        let total = u32::from(end) - u32::from(start) + 1;
        self.values.splice(first..last, start..=end);
        total - present
    }

    /// Removes every value in `[start, end]`, returning how many were removed.
    pub fn remove_range(&mut self, start: u16, end: u16) -> u32 {
        let (first, last) = self.span(start, end);
        self.values.drain(first..last);
        (last - first) as u32
    }

    /// Complements the values inside `[start, end]`.
    pub fn flip_range(&mut self, start: u16, end: u16) {
        let (first, last) = self.span(start, end);
        let present = &self.values[first..last];
        let mut flipped = Vec::with_capacity(
            (u32::from(end) - u32::from(start) + 1) as usize - present.len(),
        );
        let mut existing = present.iter().copied().peekable();
        for value in start..=end {
            if existing.peek() == Some(&value) {
                existing.next();
            } else {
                flipped.push(value);
            }
        }
        self.values.splice(first..last, flipped);
    }

    /// Smallest value.
    #[inline]
    #[must_use]
    pub fn min(&self) -> Option<u16> {
        self.values.first().copied()
    }

    /// Largest value.
    #[inline]
    #[must_use]
    pub fn max(&self) -> Option<u16> {
        self.values.last().copied()
    }

    /// Number of values less than or equal to `value`.
    #[inline]
    #[must_use]
    pub fn rank(&self, value: u16) -> u32 {
        self.values.partition_point(|&stored| stored <= value) as u32
    }

    /// The value at 0-based position `rank`.
    #[inline]
    #[must_use]
    pub fn select(&self, rank: u32) -> Option<u16> {
        self.values.get(rank as usize).copied()
    }

    /// Smallest stored value that is `>= value`.
    #[inline]
    #[must_use]
    pub fn next_at_or_after(&self, value: u16) -> Option<u16> {
        let position = self.values.partition_point(|&stored| stored < value);
        self.values.get(position).copied()
    }

    /// Largest stored value that is `<= value`.
    #[inline]
    #[must_use]
    pub fn prev_at_or_before(&self, value: u16) -> Option<u16> {
        let position = self.values.partition_point(|&stored| stored <= value);
        position
            .checked_sub(1)
            .map(|index| self.values[index])
    }

    /// Number of maximal runs of consecutive values.
    #[must_use]
    pub fn num_runs(&self) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        1 + self
            .values
            .windows(2)
            .filter(|pair| u32::from(pair[0]) + 1 != u32::from(pair[1]))
            .count()
    }

    /// Keeps only the values for which `keep` returns `true`.
    #[inline]
    pub fn retain(&mut self, mut keep: impl FnMut(u16) -> bool) {
        self.values.retain(|&value| keep(value));
    }

    /// Copies the values for which `keep` returns `true`.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(u16) -> bool) -> Self {
        Self {
            values: self.values.iter().copied().filter(|&value| keep(value)).collect(),
        }
    }

    /// Sorted intersection.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let (small, large) = if self.values.len() <= other.values.len() {
            (&self.values, &other.values)
        } else {
            (&other.values, &self.values)
        };
        // Galloping pays off when one side is much smaller.
        if small.len() * 64 < large.len() {
            return Self {
                values: small
                    .iter()
                    .copied()
                    .filter(|value| large.binary_search(value).is_ok())
                    .collect(),
            };
        }
        let mut values = Vec::with_capacity(small.len());
        let (mut left, mut right) = (0, 0);
        while left < small.len() && right < large.len() {
            match small[left].cmp(&large[right]) {
                Ordering::Less => left += 1,
                Ordering::Greater => right += 1,
                Ordering::Equal => {
                    values.push(small[left]);
                    left += 1;
                    right += 1;
                }
            }
        }
        Self { values }
    }

    /// Sorted union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (a, b) = (&self.values, &other.values);
        let mut values = Vec::with_capacity(a.len() + b.len());
        let (mut left, mut right) = (0, 0);
        while left < a.len() && right < b.len() {
            match a[left].cmp(&b[right]) {
                Ordering::Less => {
                    values.push(a[left]);
                    left += 1;
                }
                Ordering::Greater => {
                    values.push(b[right]);
                    right += 1;
                }
                Ordering::Equal => {
                    values.push(a[left]);
                    left += 1;
                    right += 1;
                }
            }
        }
        values.extend_from_slice(&a[left..]);
        values.extend_from_slice(&b[right..]);
        Self { values }
    }

    /// Values of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let (a, b) = (&self.values, &other.values);
        let mut values = Vec::with_capacity(a.len());
        let (mut left, mut right) = (0, 0);
        while left < a.len() && right < b.len() {
            match a[left].cmp(&b[right]) {
                Ordering::Less => {
                    values.push(a[left]);
                    left += 1;
                }
                Ordering::Greater => right += 1,
                Ordering::Equal => {
                    left += 1;
                    right += 1;
                }
            }
        }
        values.extend_from_slice(&a[left..]);
        Self { values }
    }

    /// Values in exactly one of the two containers.
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let (a, b) = (&self.values, &other.values);
        let mut values = Vec::with_capacity(a.len() + b.len());
        let (mut left, mut right) = (0, 0);
        while left < a.len() && right < b.len() {
            match a[left].cmp(&b[right]) {
                Ordering::Less => {
                    values.push(a[left]);
                    left += 1;
                }
                Ordering::Greater => {
                    values.push(b[right]);
                    right += 1;
                }
                Ordering::Equal => {
                    left += 1;
                    right += 1;
                }
            }
        }
        values.extend_from_slice(&a[left..]);
        values.extend_from_slice(&b[right..]);
        Self { values }
    }

    /// Releases spare capacity, returning the bytes reclaimed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let before = self.values.capacity();
        self.values.shrink_to_fit();
        (before - self.values.capacity()) * std::mem::size_of::<u16>()
    }
}
