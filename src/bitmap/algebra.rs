//! Set algebra between 32-bit bitmaps.
//!
//! Every operation walks both chunk vectors in key order. Where a key exists
//! on both sides the container operation decides the result; where it exists
//! on one side only, the operation's identity decides whether the chunk is
//! kept, shared, or dropped. No result ever keeps an empty container.

use std::iter::Peekable;
use std::slice;

use super::{Chunk, RoaringBitmap};
use crate::container::Container;

/// Advances `right` past every chunk keyed below `key` and returns the chunk
/// keyed exactly `key`, if any.
#[inline]
fn matching<'a>(right: &mut Peekable<slice::Iter<'a, Chunk>>, key: u16) -> Option<&'a Chunk> {
    while right.next_if(|chunk| chunk.key < key).is_some() {}
    right.next_if(|chunk| chunk.key == key)
}

impl RoaringBitmap {
    // =========================================================================
    // In place
    // =========================================================================

    /// Keeps only the values also present in `other`.
    pub fn and_assign(&mut self, other: &Self) {
        let mut right = other.chunks.iter().peekable();
        self.chunks.retain_mut(|chunk| match matching(&mut right, chunk.key) {
            Some(matched) if matched.container.is_full() => true,
            Some(matched) => {
                chunk.container_mut().and_assign(&matched.container);
                !chunk.container.is_empty()
            }
            None => false,
        });
    }

    /// Adds every value of `other`.
    pub fn or_assign(&mut self, other: &Self) {
        let share = self.copy_on_write;
        let mut merged = Vec::with_capacity(self.chunks.len().max(other.chunks.len()));
        let mut right = other.chunks.iter().peekable();
        for mut chunk in std::mem::take(&mut self.chunks) {
            while let Some(only_right) = right.next_if(|next| next.key < chunk.key) {
                merged.push(only_right.adopt(share));
            }
            if let Some(matched) = right.next_if(|next| next.key == chunk.key) {
                if !chunk.container.is_full() {
                    chunk.container_mut().or_assign(&matched.container);
                }
            }
            merged.push(chunk);
        }
        merged.extend(right.map(|only_right| only_right.adopt(share)));
        self.chunks = merged;
    }

    /// Keeps the values present in exactly one of `self` and `other`.
    pub fn xor_assign(&mut self, other: &Self) {
        let share = self.copy_on_write;
        let mut merged = Vec::with_capacity(self.chunks.len() + other.chunks.len());
        let mut right = other.chunks.iter().peekable();
        for mut chunk in std::mem::take(&mut self.chunks) {
            while let Some(only_right) = right.next_if(|next| next.key < chunk.key) {
                merged.push(only_right.adopt(share));
            }
            if let Some(matched) = right.next_if(|next| next.key == chunk.key) {
                chunk.container_mut().xor_assign(&matched.container);
                if chunk.container.is_empty() {
                    continue;
                }
            }
            merged.push(chunk);
        }
        merged.extend(right.map(|only_right| only_right.adopt(share)));
        self.chunks = merged;
    }

    /// Removes every value of `other`.
    pub fn and_not_assign(&mut self, other: &Self) {
        let mut right = other.chunks.iter().peekable();
        self.chunks.retain_mut(|chunk| match matching(&mut right, chunk.key) {
            Some(matched) if matched.container.is_full() => false,
            Some(matched) => {
                chunk.container_mut().and_not_assign(&matched.container);
                !chunk.container.is_empty()
            }
            None => true,
        });
    }

    // =========================================================================
    // Copying
    // =========================================================================

    /// Values present in both bitmaps.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let left = RoaringBitmap::of(&[1, 2, 3, 100_000]);
    /// let right = RoaringBitmap::of(&[2, 3, 4, 100_000]);
    /// assert_eq!((&left & &right).to_vec(), vec![2, 3, 100_000]);
    /// ```
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut right = other.chunks.iter().peekable();
        let chunks = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let matched = matching(&mut right, chunk.key)?;
                let container = chunk.container.and(&matched.container);
                (!container.is_empty()).then(|| Chunk::new(chunk.key, container))
            })
            .collect();
        let mut result = Self::from_chunks(chunks);
        result.copy_on_write = self.copy_on_write;
        result
    }

    /// Values present in either bitmap.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.or_assign(other);
        result
    }

    /// Values present in exactly one bitmap.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.xor_assign(other);
        result
    }

    /// Values of `self` absent from `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        let mut right = other.chunks.iter().peekable();
        let chunks = self
            .chunks
            .iter()
            .filter_map(|chunk| match matching(&mut right, chunk.key) {
                Some(matched) => {
                    let container = chunk.container.and_not(&matched.container);
                    (!container.is_empty()).then(|| Chunk::new(chunk.key, container))
                }
                None => Some(chunk.adopt(self.copy_on_write)),
            })
            .collect();
        let mut result = Self::from_chunks(chunks);
        result.copy_on_write = self.copy_on_write;
        result
    }

    // =========================================================================
    // Lazy union
    // =========================================================================

    /// Union that leaves bitset cardinalities unknown.
    ///
    /// Cheaper than [`RoaringBitmap::or_assign`] when many bitmaps are merged
    /// into one. The bitmap must go through
    /// [`RoaringBitmap::repair_after_lazy`] before any other operation.
    pub fn lazy_or_assign(&mut self, other: &Self) {
        let share = self.copy_on_write;
        let mut merged = Vec::with_capacity(self.chunks.len().max(other.chunks.len()));
        let mut right = other.chunks.iter().peekable();
        for mut chunk in std::mem::take(&mut self.chunks) {
            while let Some(only_right) = right.next_if(|next| next.key < chunk.key) {
                merged.push(only_right.adopt(share));
            }
            if let Some(matched) = right.next_if(|next| next.key == chunk.key) {
                chunk.container_mut().lazy_or_assign(&matched.container);
            }
            merged.push(chunk);
        }
        merged.extend(right.map(|only_right| only_right.adopt(share)));
        self.chunks = merged;
    }

    /// Restores every container after a sequence of lazy unions.
    pub fn repair_after_lazy(&mut self) {
        for chunk in &mut self.chunks {
            if chunk.container.is_bitset() {
                chunk.container_mut().repair_after_lazy();
            }
        }
    }

    /// Union of any number of bitmaps.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringBitmap;
    ///
    /// let parts = [
    ///     RoaringBitmap::of(&[1, 2]),
    ///     RoaringBitmap::of(&[2, 3]),
    ///     RoaringBitmap::of(&[70_000]),
    /// ];
    /// let union = RoaringBitmap::union_many(&parts);
    /// assert_eq!(union.to_vec(), vec![1, 2, 3, 70_000]);
    /// ```
    #[must_use]
    pub fn union_many<'a, I>(bitmaps: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut bitmaps = bitmaps.into_iter();
        let Some(first) = bitmaps.next() else {
            return Self::new();
        };
        let mut result = Self::from_chunks(
            first
                .chunks
                .iter()
                .map(|chunk| Chunk::new(chunk.key, Container::clone(&chunk.container)))
                .collect(),
        );
        for bitmap in bitmaps {
            result.lazy_or_assign(bitmap);
        }
        result.repair_after_lazy();
        result
    }

    // =========================================================================
    // Cardinalities and relations
    // =========================================================================

    /// Returns `true` if the bitmaps share at least one value.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let mut right = other.chunks.iter().peekable();
        self.chunks.iter().any(|chunk| {
            matching(&mut right, chunk.key)
                .is_some_and(|matched| chunk.container.intersects(&matched.container))
        })
    }

    /// Cardinality of `self & other`, without building it.
    #[must_use]
    pub fn and_cardinality(&self, other: &Self) -> u64 {
        let mut right = other.chunks.iter().peekable();
        self.chunks
            .iter()
            .filter_map(|chunk| {
                matching(&mut right, chunk.key)
                    .map(|matched| u64::from(chunk.container.and_cardinality(&matched.container)))
            })
            .sum()
    }

    /// Cardinality of `self | other`, without building it.
    #[must_use]
    pub fn or_cardinality(&self, other: &Self) -> u64 {
        self.cardinality() + other.cardinality() - self.and_cardinality(other)
    }

    /// Cardinality of `self ^ other`, without building it.
    #[must_use]
    pub fn xor_cardinality(&self, other: &Self) -> u64 {
        self.cardinality() + other.cardinality() - 2 * self.and_cardinality(other)
    }

    /// Cardinality of `self - other`, without building it.
    #[must_use]
    pub fn and_not_cardinality(&self, other: &Self) -> u64 {
        self.cardinality() - self.and_cardinality(other)
    }

    /// Jaccard similarity `|A ∩ B| / |A ∪ B|`; `NaN` when both are empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn jaccard_index(&self, other: &Self) -> f64 {
        let intersection = self.and_cardinality(other);
        let union = self.cardinality() + other.cardinality() - intersection;
        intersection as f64 / union as f64
    }

    /// Returns `true` if every value of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        let mut right = other.chunks.iter().peekable();
        self.stored_chunks().all(|chunk| {
            matching(&mut right, chunk.key)
                .is_some_and(|matched| chunk.container.is_subset(&matched.container))
        })
    }

    /// Returns `true` if `self` is a subset of `other` and `other` holds at
    /// least one value `self` does not.
    ///
    /// Either some shared key holds strictly fewer values on the left, or
    /// `other` has a non-empty container whose key `self` lacks or leaves
    /// empty.
    #[must_use]
    pub fn is_strict_subset(&self, other: &Self) -> bool {
        if !self.is_subset(other) {
            return false;
        }
        let mut left = self.stored_chunks().peekable();
        other.stored_chunks().any(|chunk| {
            while left.next_if(|next| next.key < chunk.key).is_some() {}
            match left.next_if(|next| next.key == chunk.key) {
                Some(matched) => matched.container.cardinality() < chunk.container.cardinality(),
                None => true,
            }
        })
    }
}

set_operators!(RoaringBitmap:
    BitAnd, bitand => and;
    BitOr, bitor => or;
    BitXor, bitxor => xor;
    Sub, sub => and_not;
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReferenceCounter;
    use rstest::{fixture, rstest};

    #[fixture]
    fn left() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::from_range(0..10_000);
        bitmap.add_many(&[200_000, 200_002, 400_000]);
        bitmap
    }

    #[fixture]
    fn right() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::from_range(5_000..80_000);
        bitmap.add_many(&[200_002, 300_000]);
        bitmap
    }

    fn reference(
        left: &RoaringBitmap,
        right: &RoaringBitmap,
        keep: impl Fn(bool, bool) -> bool,
    ) -> Vec<u32> {
        let mut values: Vec<u32> = left.iter().chain(right.iter()).collect();
        values.sort_unstable();
        values.dedup();
        values.retain(|&value| keep(left.contains(value), right.contains(value)));
        values
    }

    #[rstest]
    fn test_copying_operations_match_reference(left: RoaringBitmap, right: RoaringBitmap) {
        assert_eq!(left.and(&right).to_vec(), reference(&left, &right, |a, b| a && b));
        assert_eq!(left.or(&right).to_vec(), reference(&left, &right, |a, b| a || b));
        assert_eq!(left.xor(&right).to_vec(), reference(&left, &right, |a, b| a != b));
        assert_eq!(left.and_not(&right).to_vec(), reference(&left, &right, |a, b| a && !b));
    }

    #[rstest]
    fn test_in_place_operations_match_copying(left: RoaringBitmap, right: RoaringBitmap) {
        let mut and = left.clone();
        and &= &right;
        assert_eq!(and, &left & &right);

        let mut or = left.clone();
        or |= &right;
        assert_eq!(or, &left | &right);

        let mut xor = left.clone();
        xor ^= &right;
        assert_eq!(xor, &left ^ &right);

        let mut difference = left.clone();
        difference -= &right;
        assert_eq!(difference, &left - &right);
    }

    #[rstest]
    fn test_operations_never_keep_empty_containers(left: RoaringBitmap) {
        let xor = left.xor(&left);
        assert!(xor.chunks().is_empty());
        let difference = left.and_not(&left);
        assert!(difference.chunks().is_empty());
    }

    #[rstest]
    fn test_cardinalities_match_materialized(left: RoaringBitmap, right: RoaringBitmap) {
        assert_eq!(left.and_cardinality(&right), left.and(&right).cardinality());
        assert_eq!(left.or_cardinality(&right), left.or(&right).cardinality());
        assert_eq!(left.xor_cardinality(&right), left.xor(&right).cardinality());
        assert_eq!(left.and_not_cardinality(&right), left.and_not(&right).cardinality());
        assert!(left.intersects(&right));
        assert!(!left.intersects(&RoaringBitmap::of(&[500_000])));
    }

    #[rstest]
    fn test_jaccard_index() {
        let left = RoaringBitmap::of(&[1, 2, 3, 4]);
        let right = RoaringBitmap::of(&[3, 4, 5, 6]);
        assert!((left.jaccard_index(&right) - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[rstest]
    fn test_union_many_matches_sequential_union(left: RoaringBitmap, right: RoaringBitmap) {
        let third = RoaringBitmap::of(&[7, 65_536, 400_001]);
        let expected = &(&left | &right) | &third;
        let union = RoaringBitmap::union_many([&left, &right, &third]);
        assert_eq!(union, expected);
        for chunk in union.chunks().iter().filter(|chunk| chunk.container.is_bitset()) {
            assert!(chunk.container.cardinality() as usize > crate::container::ARRAY_MAX_CARDINALITY);
        }
        assert!(RoaringBitmap::union_many(std::iter::empty()).is_empty());
    }

    #[rstest]
    #[case(&[1, 2], &[1, 2, 3], true, true)]
    #[case(&[1, 2, 3], &[1, 2, 3], true, false)]
    #[case(&[1, 2], &[1, 2, 70_000], true, true)]
    #[case(&[1, 4], &[1, 2, 3], false, false)]
    #[case(&[], &[], true, false)]
    #[case(&[], &[9], true, true)]
    fn test_subset_relations(
        #[case] left: &[u32],
        #[case] right: &[u32],
        #[case] subset: bool,
        #[case] strict: bool,
    ) {
        let left = RoaringBitmap::of(left);
        let right = RoaringBitmap::of(right);
        assert_eq!(left.is_subset(&right), subset);
        assert_eq!(left.is_strict_subset(&right), strict);
    }

    #[rstest]
    fn test_or_shares_right_only_containers_under_copy_on_write() {
        let mut left = RoaringBitmap::of(&[1]);
        left.set_copy_on_write(true);
        let right = RoaringBitmap::of(&[70_000]);
        left |= &right;
        assert!(ReferenceCounter::ptr_eq(
            &left.chunks()[1].container,
            &right.chunks()[0].container
        ));
    }
}
