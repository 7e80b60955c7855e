//! Set algebra between 64-bit treemaps, and the k-way union.

use std::cmp::Reverse;
use std::collections::btree_map::Entry;
use std::collections::BinaryHeap;

use smallvec::SmallVec;

use super::RoaringTreemap;
use crate::bitmap::RoaringBitmap;

/// Inner bitmaps merged by one step of [`RoaringTreemap::fast_union`].
type Batch<'a> = SmallVec<[&'a RoaringBitmap; 8]>;

impl RoaringTreemap {
    // =========================================================================
    // In place
    // =========================================================================

    /// Keeps only the values also present in `other`.
    pub fn and_assign(&mut self, other: &Self) {
        self.map.retain(|key, inner| match other.map.get(key) {
            Some(matched) => {
                inner.and_assign(matched);
                !inner.is_empty()
            }
            None => false,
        });
    }

    /// Adds every value of `other`.
    pub fn or_assign(&mut self, other: &Self) {
        for (key, inner) in other.stored() {
            match self.map.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().or_assign(inner),
                Entry::Vacant(entry) => {
                    let mut copy = inner.clone();
                    copy.set_copy_on_write(self.copy_on_write);
                    entry.insert(copy);
                }
            }
        }
    }

    /// Keeps the values present in exactly one of `self` and `other`.
    pub fn xor_assign(&mut self, other: &Self) {
        for (key, inner) in other.stored() {
            match self.map.entry(key) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().xor_assign(inner);
                    if entry.get().is_empty() {
                        entry.remove();
                    }
                }
                Entry::Vacant(entry) => {
                    let mut copy = inner.clone();
                    copy.set_copy_on_write(self.copy_on_write);
                    entry.insert(copy);
                }
            }
        }
    }

    /// Removes every value of `other`.
    pub fn and_not_assign(&mut self, other: &Self) {
        self.map.retain(|key, inner| {
            if let Some(matched) = other.map.get(key) {
                inner.and_not_assign(matched);
            }
            !inner.is_empty()
        });
    }

    // =========================================================================
    // Copying
    // =========================================================================

    /// Values present in both treemaps.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let map = self
            .map
            .iter()
            .filter_map(|(&key, inner)| {
                let result = inner.and(other.map.get(&key)?);
                (!result.is_empty()).then_some((key, result))
            })
            .collect();
        Self {
            map,
            copy_on_write: self.copy_on_write,
        }
    }

    /// Values present in either treemap.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.or_assign(other);
        result
    }

    /// Values present in exactly one treemap.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.xor_assign(other);
        result
    }

    /// Values of `self` absent from `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        let map = self
            .stored()
            .filter_map(|(key, inner)| {
                let result = match other.map.get(&key) {
                    Some(matched) => inner.and_not(matched),
                    None => self.adopt(inner),
                };
                (!result.is_empty()).then_some((key, result))
            })
            .collect();
        Self {
            map,
            copy_on_write: self.copy_on_write,
        }
    }

    // =========================================================================
    // Cardinalities and relations
    // =========================================================================

    /// Returns `true` if the treemaps share at least one value.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.map.iter().any(|(key, inner)| {
            other
                .map
                .get(key)
                .is_some_and(|matched| inner.intersects(matched))
        })
    }

    /// Cardinality of `self & other`, without building it.
    #[must_use]
    pub fn and_cardinality(&self, other: &Self) -> u64 {
        self.map
            .iter()
            .filter_map(|(key, inner)| {
                other
                    .map
                    .get(key)
                    .map(|matched| inner.and_cardinality(matched))
            })
            .sum()
    }

    /// Cardinality of `self | other`, without building it.
    ///
    /// # Panics
    ///
    /// Panics if the union holds all 2^64 values.
    #[must_use]
    pub fn or_cardinality(&self, other: &Self) -> u64 {
        self.cardinality() - self.and_cardinality(other) + other.cardinality()
    }

    /// Cardinality of `self ^ other`, without building it.
    #[must_use]
    pub fn xor_cardinality(&self, other: &Self) -> u64 {
        let shared = self.and_cardinality(other);
        (self.cardinality() - shared) + (other.cardinality() - shared)
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
        intersection as f64 / self.or_cardinality(other) as f64
    }

    /// Returns `true` if every value of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.stored().all(|(key, inner)| {
            other
                .map
                .get(&key)
                .is_some_and(|matched| inner.is_subset(matched))
        })
    }

    /// Returns `true` if `self` is a subset of `other` and `other` holds at
    /// least one value `self` does not.
    #[must_use]
    pub fn is_strict_subset(&self, other: &Self) -> bool {
        self.is_subset(other)
            && other.stored().any(|(key, inner)| {
                self.map
                    .get(&key)
                    .is_none_or(|mine| mine.cardinality() < inner.cardinality())
            })
    }

    // =========================================================================
    // k-way union
    // =========================================================================

    /// Union of any number of treemaps.
    ///
    /// Walks every input's key order at once through a min-heap of current
    /// keys. All inner bitmaps under the smallest key are merged in one lazy
    /// union before the heap advances.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringTreemap;
    ///
    /// let a = RoaringTreemap::of(&[1, 1 << 40]);
    /// let b = RoaringTreemap::of(&[2, 1 << 33]);
    /// let c = RoaringTreemap::of(&[1 << 40, (1 << 40) + 1]);
    /// let union = RoaringTreemap::fast_union(&[&a, &b, &c]);
    /// assert_eq!(union, &(&a | &b) | &c);
    /// ```
    #[must_use]
    pub fn fast_union(inputs: &[&Self]) -> Self {
        let mut iterators: Vec<_> = inputs.iter().map(|input| input.map.iter()).collect();
        let mut heads: Vec<Option<&RoaringBitmap>> = vec![None; inputs.len()];
        let mut heap = BinaryHeap::with_capacity(inputs.len());
        for (index, iterator) in iterators.iter_mut().enumerate() {
            if let Some((&key, inner)) = iterator.next() {
                heads[index] = Some(inner);
                heap.push(Reverse((key, index)));
            }
        }

        let mut result = Self::new();
        while let Some(Reverse((key, index))) = heap.pop() {
            let mut members: SmallVec<[usize; 8]> = SmallVec::new();
            members.push(index);
            while let Some(&Reverse((next_key, next_index))) = heap.peek() {
                if next_key != key {
                    break;
                }
                heap.pop();
                members.push(next_index);
            }

            let batch: Batch<'_> = members.iter().filter_map(|&member| heads[member]).collect();
            for &member in &members {
                heads[member] = iterators[member].next().map(|(&next_key, inner)| {
                    heap.push(Reverse((next_key, member)));
                    inner
                });
            }

            let merged = RoaringBitmap::union_many(batch);
            if !merged.is_empty() {
                result.map.insert(key, merged);
            }
        }
        log::debug!(
            "fast_union merged {} treemaps into {} inner bitmaps",
            inputs.len(),
            result.map.len()
        );
        result
    }

    /// [`RoaringTreemap::fast_union`] with the per-key unions spread over the
    /// rayon thread pool.
    #[cfg(feature = "rayon")]
    #[must_use]
    pub fn par_fast_union(inputs: &[&Self]) -> Self {
        use rayon::prelude::*;
        use std::collections::BTreeMap;

        let mut groups: BTreeMap<u32, Batch<'_>> = BTreeMap::new();
        for input in inputs {
            for (key, inner) in input.stored() {
                groups.entry(key).or_default().push(inner);
            }
        }
        let merged: Vec<(u32, RoaringBitmap)> = groups
            .into_par_iter()
            .map(|(key, batch)| (key, RoaringBitmap::union_many(batch)))
            .collect();
        log::debug!(
            "par_fast_union merged {} treemaps into {} inner bitmaps",
            inputs.len(),
            merged.len()
        );
        Self {
            map: merged.into_iter().collect::<BTreeMap<_, _>>(),
            copy_on_write: false,
        }
    }
}

set_operators!(RoaringTreemap:
    BitAnd, bitand => and;
    BitOr, bitor => or;
    BitXor, bitxor => xor;
    Sub, sub => and_not;
);
