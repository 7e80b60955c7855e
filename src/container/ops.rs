//! Binary operations across container representations.
//!
//! Every pairing of {array, bitset, run} is dispatched explicitly. Symmetric
//! operations share an arm for both argument orders.

use super::{
    ARRAY_LAZY_LOWERBOUND, ARRAY_MAX_CARDINALITY, ArrayContainer, BitsetContainer, Container,
    RunContainer,
};
use crate::words;

use Container::{Array, Bitset, Run};

impl Container {
    // =========================================================================
    // Copying operations
    // =========================================================================

    /// Intersection.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        match (self, other) {
            (Array(left), Array(right)) => Array(left.intersect(right)),
            (Array(array), Bitset(bitset)) | (Bitset(bitset), Array(array)) => {
                Array(array.filtered(|value| bitset.contains(value)))
            }
            (Array(array), Run(runs)) | (Run(runs), Array(array)) => {
                Array(array.filtered(|value| runs.contains(value)))
            }
            (Bitset(left), Bitset(right)) => Self::from_bitset(left.and(right)),
            (Bitset(bitset), Run(runs)) | (Run(runs), Bitset(bitset)) => {
                if runs.is_full() {
                    return Self::from_bitset(bitset.clone());
                }
                if runs.cardinality() as usize <= ARRAY_MAX_CARDINALITY {
                    let values = runs.iter().filter(|&value| bitset.contains(value)).collect();
                    return Array(ArrayContainer::from_sorted_vec(values));
                }
                let mut result = bitset.clone();
                let mut gap_start = 0;
                for run in runs.runs() {
                    words::clear_range(&mut result.words_mut()[..], gap_start, run.start.into());
                    gap_start = run.end_exclusive();
                }
                words::clear_range(&mut result.words_mut()[..], gap_start, 1 << 16);
                result.repair_cardinality();
                Self::from_bitset(result)
            }
            (Run(left), Run(right)) => Self::from_runs(left.and(right)),
        }
    }

    /// Union.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        match (self, other) {
            (Array(left), Array(right)) => Self::from_array(left.union(right)),
            (Array(array), Bitset(bitset)) | (Bitset(bitset), Array(array)) => {
                let mut result = bitset.clone();
                for &value in array.as_slice() {
                    result.insert(value);
                }
                Bitset(result)
            }
            (Array(array), Run(runs)) | (Run(runs), Array(array)) => {
                if runs.is_full() {
                    return Self::full();
                }
                Self::from_runs(runs.or(&RunContainer::from_sorted_values(array.as_slice())))
            }
            (Bitset(left), Bitset(right)) => Bitset(left.or(right)),
            (Bitset(bitset), Run(runs)) | (Run(runs), Bitset(bitset)) => {
                if runs.is_full() {
                    return Self::full();
                }
                let mut result = bitset.clone();
                for run in runs.runs() {
                    result.insert_range(run.start, run.end());
                }
                Bitset(result)
            }
            (Run(left), Run(right)) => Self::from_runs(left.or(right)),
        }
    }

    /// Symmetric difference.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        match (self, other) {
            (Array(left), Array(right)) => Self::from_array(left.symmetric_difference(right)),
            (Array(array), Bitset(bitset)) | (Bitset(bitset), Array(array)) => {
                let mut result = bitset.clone();
                for &value in array.as_slice() {
                    result.flip(value);
                }
                Self::from_bitset(result)
            }
            (Array(array), Run(runs)) | (Run(runs), Array(array)) => {
                Self::from_runs(runs.xor(&RunContainer::from_sorted_values(array.as_slice())))
            }
            (Bitset(left), Bitset(right)) => Self::from_bitset(left.xor(right)),
            (Bitset(bitset), Run(runs)) | (Run(runs), Bitset(bitset)) => {
                let mut result = bitset.clone();
                for run in runs.runs() {
                    result.flip_range(run.start, run.end());
                }
                Self::from_bitset(result)
            }
            (Run(left), Run(right)) => Self::from_runs(left.xor(right)),
        }
    }

    /// Values of `self` that are not in `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        match (self, other) {
            (Array(left), Array(right)) => Array(left.difference(right)),
            (Array(array), Bitset(bitset)) => {
                Array(array.filtered(|value| !bitset.contains(value)))
            }
            (Array(array), Run(runs)) => Array(array.filtered(|value| !runs.contains(value))),
            (Bitset(bitset), Array(array)) => {
                let mut result = bitset.clone();
                for &value in array.as_slice() {
                    result.remove(value);
                }
                Self::from_bitset(result)
            }
            (Bitset(left), Bitset(right)) => Self::from_bitset(left.and_not(right)),
            (Bitset(bitset), Run(runs)) => {
                let mut result = bitset.clone();
                for run in runs.runs() {
                    result.remove_range(run.start, run.end());
                }
                Self::from_bitset(result)
            }
            (Run(runs), Array(array)) => {
                Self::from_runs(runs.and_not(&RunContainer::from_sorted_values(array.as_slice())))
            }
            (Run(runs), Bitset(bitset)) => {
                if runs.cardinality() as usize <= ARRAY_MAX_CARDINALITY {
                    let values = runs.iter().filter(|&value| !bitset.contains(value)).collect();
                    return Array(ArrayContainer::from_sorted_vec(values));
                }
                let mut result = BitsetContainer::from_runs(runs);
                result.and_not_assign(bitset);
                Self::from_bitset(result)
            }
            (Run(left), Run(right)) => Self::from_runs(left.and_not(right)),
        }
    }

    // =========================================================================
    // In-place operations
    // =========================================================================

    /// Replaces `self` with `self & other`.
    pub fn and_assign(&mut self, other: &Self) {
        if let Array(array) = self {
            array.retain(|value| other.contains(value));
            return;
        }
        if let (Bitset(left), Bitset(right)) = (&mut *self, other) {
            left.and_assign(right);
        } else {
            *self = self.and(other);
            return;
        }
        self.demote_sparse_bitset();
    }

    /// Replaces `self` with `self | other`.
    pub fn or_assign(&mut self, other: &Self) {
        if let Bitset(bitset) = self {
            match other {
                Bitset(right) => bitset.or_assign(right),
                Array(array) => {
                    for &value in array.as_slice() {
                        bitset.insert(value);
                    }
                }
                Run(runs) => {
                    for run in runs.runs() {
                        bitset.insert_range(run.start, run.end());
                    }
                }
            }
            return;
        }
        *self = self.or(other);
    }

    /// Replaces `self` with `self ^ other`.
    pub fn xor_assign(&mut self, other: &Self) {
        if let (Bitset(left), Bitset(right)) = (&mut *self, other) {
            left.xor_assign(right);
        } else {
            *self = self.xor(other);
            return;
        }
        self.demote_sparse_bitset();
    }

    /// Replaces `self` with `self - other`.
    pub fn and_not_assign(&mut self, other: &Self) {
        if let Array(array) = self {
            array.retain(|value| !other.contains(value));
            return;
        }
        if let (Bitset(left), Bitset(right)) = (&mut *self, other) {
            left.and_not_assign(right);
        } else {
            *self = self.and_not(other);
            return;
        }
        self.demote_sparse_bitset();
    }

    // =========================================================================
    // Lazy union
    // =========================================================================

    /// Union that skips cardinality bookkeeping on bitset results.
    ///
    /// A bitset produced or touched here has an unknown cardinality, and may
    /// hold 4096 values or fewer, until [`Container::repair_after_lazy`] runs.
    pub fn lazy_or_assign(&mut self, other: &Self) {
        match self {
            Bitset(bitset) => match other {
                Bitset(right) => bitset.or_assign_nocard(right),
                Array(array) => {
                    let bits = bitset.words_mut();
                    for &value in array.as_slice() {
                        bits[usize::from(value >> 6)] |= 1u64 << (value & 63);
                    }
                }
                Run(runs) => {
                    let bits = bitset.words_mut();
                    for run in runs.runs() {
                        words::set_range(&mut bits[..], run.start.into(), run.end_exclusive());
                    }
                }
            },
            Array(left) => match other {
                Array(right)
                    if (left.cardinality() + right.cardinality()) as usize
                        > ARRAY_LAZY_LOWERBOUND =>
                {
                    let mut bitset = BitsetContainer::from_array(left);
                    let bits = bitset.words_mut();
                    for &value in right.as_slice() {
                        bits[usize::from(value >> 6)] |= 1u64 << (value & 63);
                    }
                    *self = Bitset(bitset);
                }
                Bitset(right) => {
                    let mut bitset = right.clone();
                    let bits = bitset.words_mut();
                    for &value in left.as_slice() {
                        bits[usize::from(value >> 6)] |= 1u64 << (value & 63);
                    }
                    *self = Bitset(bitset);
                }
                Array(_) | Run(_) => *self = self.or(other),
            },
            Run(_) => *self = self.or(other),
        }
    }

    /// Restores the cached cardinality and the array/bitset threshold after
    /// a sequence of [`Container::lazy_or_assign`] calls.
    pub fn repair_after_lazy(&mut self) {
        if let Bitset(bitset) = self {
            if !bitset.is_cardinality_known() {
                bitset.repair_cardinality();
            }
            self.demote_sparse_bitset();
        }
    }

    // =========================================================================
    // Comparisons
    // =========================================================================

    /// Cardinality of the intersection, without building it where possible.
    #[must_use]
    pub fn and_cardinality(&self, other: &Self) -> u32 {
        match (self, other) {
            (Array(array), container) | (container, Array(array)) => array
                .as_slice()
                .iter()
                .filter(|&&value| container.contains(value))
                .count() as u32,
            (Bitset(left), Bitset(right)) => left.and_cardinality(right),
            (Bitset(bitset), Run(runs)) | (Run(runs), Bitset(bitset)) => runs
                .runs()
                .iter()
                .map(|run| {
                    words::count_range(&bitset.words()[..], run.start.into(), run.end_exclusive())
                })
                .sum(),
            (Run(left), Run(right)) => left.and(right).cardinality(),
        }
    }

    /// Returns `true` if the two containers share at least one value.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Array(array), container) | (container, Array(array)) => array
                .as_slice()
                .iter()
                .any(|&value| container.contains(value)),
            (Bitset(left), Bitset(right)) => left
                .words()
                .iter()
                .zip(right.words().iter())
                .any(|(&left, &right)| left & right != 0),
            _ => self.and_cardinality(other) != 0,
        }
    }

    /// Returns `true` if every value of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        let cardinality = self.cardinality();
        if cardinality > other.cardinality() {
            return false;
        }
        match (self, other) {
            (Array(array), _) => array.as_slice().iter().all(|&value| other.contains(value)),
            (Bitset(left), Bitset(right)) => left.is_subset(right),
            (Run(left), Run(right)) => left.is_subset(right),
            _ => self.and_cardinality(other) == cardinality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::CONTAINER_CAPACITY;
    use rstest::{fixture, rstest};
    use std::collections::BTreeSet;

    fn values_of(container: &Container) -> BTreeSet<u16> {
        container.iter().collect()
    }

    fn array(values: impl IntoIterator<Item = u16>) -> Container {
        let values: BTreeSet<u16> = values.into_iter().collect();
        Array(ArrayContainer::from_sorted_vec(values.into_iter().collect()))
    }

    fn bitset(values: impl IntoIterator<Item = u16>) -> Container {
        let mut bitset = BitsetContainer::new();
        for value in values {
            bitset.insert(value);
        }
        Bitset(bitset)
    }

    fn runs(values: impl IntoIterator<Item = u16>) -> Container {
        let values: BTreeSet<u16> = values.into_iter().collect();
        Run(RunContainer::from_sorted_values(
            &values.into_iter().collect::<Vec<_>>(),
        ))
    }

    /// Two overlapping value sets, each small enough to be a valid array:
    /// sparse multiples of seven plus a dense block.
    #[fixture]
    fn operands() -> (Vec<u16>, Vec<u16>) {
        let left = (0..3000u16).map(|value| value * 7).chain(30_000..31_000).collect();
        let right = (1000..4000u16).chain(30_500..31_500).collect();
        (left, right)
    }

    fn every_representation(values: &[u16]) -> Vec<Container> {
        vec![
            array(values.iter().copied()),
            bitset(values.iter().copied()),
            runs(values.iter().copied()),
        ]
    }

    #[rstest]
    fn test_binary_operations_agree_with_sets(operands: (Vec<u16>, Vec<u16>)) {
        let (left_values, right_values) = operands;
        let left_set: BTreeSet<u16> = left_values.iter().copied().collect();
        let right_set: BTreeSet<u16> = right_values.iter().copied().collect();
        let expected_and: BTreeSet<u16> = left_set.intersection(&right_set).copied().collect();
        let expected_or: BTreeSet<u16> = left_set.union(&right_set).copied().collect();
        let expected_xor: BTreeSet<u16> =
            left_set.symmetric_difference(&right_set).copied().collect();
        let expected_and_not: BTreeSet<u16> = left_set.difference(&right_set).copied().collect();

        for left in every_representation(&left_values) {
            for right in every_representation(&right_values) {
                assert_eq!(values_of(&left.and(&right)), expected_and);
                assert_eq!(values_of(&left.or(&right)), expected_or);
                assert_eq!(values_of(&left.xor(&right)), expected_xor);
                assert_eq!(values_of(&left.and_not(&right)), expected_and_not);
                assert_eq!(left.and_cardinality(&right) as usize, expected_and.len());
                assert!(left.intersects(&right));

                let mut target = left.clone();
                target.and_assign(&right);
                assert_eq!(values_of(&target), expected_and);
                let mut target = left.clone();
                target.or_assign(&right);
                assert_eq!(values_of(&target), expected_or);
                let mut target = left.clone();
                target.xor_assign(&right);
                assert_eq!(values_of(&target), expected_xor);
                let mut target = left.clone();
                target.and_not_assign(&right);
                assert_eq!(values_of(&target), expected_and_not);
            }
        }
    }

    #[rstest]
    fn test_results_respect_array_threshold(operands: (Vec<u16>, Vec<u16>)) {
        let (left_values, right_values) = operands;
        for left in every_representation(&left_values) {
            for right in every_representation(&right_values) {
                for result in [left.and(&right), left.xor(&right), left.and_not(&right)] {
                    if let Bitset(bitset) = &result {
                        assert!(bitset.cardinality() as usize > ARRAY_MAX_CARDINALITY);
                    }
                    if let Array(array) = &result {
                        assert!(array.cardinality() as usize <= ARRAY_MAX_CARDINALITY);
                    }
                }
            }
        }
    }

    #[rstest]
    fn test_lazy_union_matches_union_after_repair() {
        let inputs = [
            array((0..600).map(|value| value * 3)),
            array(500..1200),
            bitset(40_000..50_000),
            runs(60_000..=65_535),
        ];
        let mut lazy = Container::new();
        let mut eager = Container::new();
        for input in &inputs {
            lazy.lazy_or_assign(input);
            eager.or_assign(input);
        }
        lazy.repair_after_lazy();
        assert_eq!(lazy, eager);
        assert_eq!(lazy.cardinality(), eager.cardinality());
        if let Bitset(bitset) = &lazy {
            assert!(bitset.is_cardinality_known());
        }
    }

    #[rstest]
    fn test_repair_after_lazy_demotes_small_bitsets() {
        let mut container = array(0..700);
        container.lazy_or_assign(&array(700..1100));
        assert!(container.is_bitset());
        container.repair_after_lazy();
        assert!(container.is_array());
        assert_eq!(container.cardinality(), 1100);
    }

    #[rstest]
    fn test_full_run_short_circuits() {
        let full = Container::full();
        let sparse = array([1, 2, 3]);
        assert!(full.or(&sparse).is_full());
        assert_eq!(full.and(&sparse), sparse);
        assert_eq!(full.and_not(&sparse).cardinality(), CONTAINER_CAPACITY - 3);
    }

    #[rstest]
    fn test_subset_and_disjointness() {
        let small = array([5, 6, 7]);
        let block = runs(0..100);
        let dense = bitset(0..5000);
        assert!(small.is_subset(&block));
        assert!(small.is_subset(&dense));
        assert!(block.is_subset(&dense));
        assert!(!dense.is_subset(&block));
        assert!(!array([200]).intersects(&block));
        assert!(!bitset(6000..7000).intersects(&dense));
    }
}
