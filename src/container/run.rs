//! Run-length encoded container.
//!
//! Runs are kept ascending, non-overlapping and non-adjacent: two runs that
//! would touch are always merged into one.

use smallvec::SmallVec;

use crate::words::BITSET_WORDS;

use super::RUN_DEFAULT_INIT_SIZE;

/// A closed interval `[start, start + length]`.
///
/// `length` is the number of values minus one, so a single value has length 0
/// and the full chunk is `Run { start: 0, length: 65535 }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Run {
    /// First value of the run.
    pub start: u16,
    /// Number of values after `start`.
    pub length: u16,
}

impl Run {
    /// A run holding only `value`.
    #[inline]
    #[must_use]
    pub const fn single(value: u16) -> Self {
        Self {
            start: value,
            length: 0,
        }
    }

    /// The run `[start, end]`; `start <= end <= 65535`.
    #[inline]
    pub(crate) fn from_bounds(start: u32, end: u32) -> Self {
        debug_assert!(start <= end && end <= u32::from(u16::MAX));
        Self {
            start: start as u16,
            length: (end - start) as u16,
        }
    }

    /// Last value of the run.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u16 {
        self.start + self.length
    }

    /// One past the last value, widened so that it can reach 65536.
    #[inline]
    #[must_use]
    pub const fn end_exclusive(self) -> u32 {
        self.end() as u32 + 1
    }

    /// Number of values in the run.
    #[inline]
    #[must_use]
    pub const fn cardinality(self) -> u32 {
        self.length as u32 + 1
    }

    /// Returns `true` if `value` lies inside the run.
    #[inline]
    #[must_use]
    pub const fn contains(self, value: u16) -> bool {
        self.start <= value && value <= self.end()
    }
}

/// A sorted list of maximal runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RunContainer {
    runs: Vec<Run>,
}

impl RunContainer {
    /// Creates an empty run container.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// A container covering the whole chunk.
    #[inline]
    #[must_use]
    pub fn full() -> Self {
        Self {
            runs: vec![Run {
                start: 0,
                length: u16::MAX,
            }],
        }
    }

    /// A container holding exactly `[start, end]`.
    #[inline]
    #[must_use]
    pub fn from_range(start: u16, end: u16) -> Self {
        Self {
            runs: vec![Run::from_bounds(start.into(), end.into())],
        }
    }

    /// Wraps runs that are already sorted, non-overlapping and non-adjacent.
    #[must_use]
    pub fn from_runs(runs: Vec<Run>) -> Self {
        debug_assert!(
            runs.windows(2)
                .all(|pair| pair[0].end_exclusive() < u32::from(pair[1].start)),
            "runs must be sorted and separated by at least one value"
        );
        Self { runs }
    }

    /// Encodes a sorted value list as runs.
    #[must_use]
    pub fn from_sorted_values(values: &[u16]) -> Self {
        let mut runs = Vec::new();
        let mut values = values.iter().copied();
        if let Some(first) = values.next() {
            let (mut start, mut previous) = (first, first);
            for value in values {
                if u32::from(previous) + 1 != u32::from(value) {
                    runs.push(Run::from_bounds(start.into(), previous.into()));
                    start = value;
                }
                previous = value;
            }
            runs.push(Run::from_bounds(start.into(), previous.into()));
        }
        Self { runs }
    }

    /// Encodes bitset words as runs, one word at a time.
    #[must_use]
    pub fn from_words(words: &[u64; BITSET_WORDS]) -> Self {
        let mut runs = Vec::with_capacity(RUN_DEFAULT_INIT_SIZE);
        let mut index = 0usize;
        let mut word = words[0];
        loop {
            while word == 0 && index + 1 < BITSET_WORDS {
                index += 1;
                word = words[index];
            }
            if word == 0 {
                break;
            }
            let start = index as u32 * 64 + word.trailing_zeros();
            // Fill the bits below the lowest set bit; the first zero above is
            // then the end of the run.
            let mut filled = word | (word - 1);
            while filled == u64::MAX && index + 1 < BITSET_WORDS {
                index += 1;
                filled = words[index];
            }
            if filled == u64::MAX {
                runs.push(Run::from_bounds(start, index as u32 * 64 + 63));
                break;
            }
            let end = index as u32 * 64 + (!filled).trailing_zeros();
            runs.push(Run::from_bounds(start, end - 1));
            word = filled & (filled + 1);
        }
        Self { runs }
    }

    /// The runs, ascending and neither overlapping nor adjacent.
    #[inline]
    #[must_use]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs.
    #[inline]
    #[must_use]
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// Returns `true` if no value is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns `true` if the single run covers all 65536 values.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self.runs.as_slice(), [Run { start: 0, length: u16::MAX }])
    }

    /// Number of values covered by the runs.
    #[must_use]
    pub fn cardinality(&self) -> u32 {
        self.runs.iter().map(|run| run.cardinality()).sum()
    }

    /// Index of the first run whose end is `>= value`.
    #[inline]
    fn lower_bound(&self, value: u16) -> usize {
        self.runs.partition_point(|run| run.end() < value)
    }

    /// Returns `true` if `value` is present.
    #[must_use]
    pub fn contains(&self, value: u16) -> bool {
        self.runs
            .get(self.lower_bound(value))
            .is_some_and(|run| run.start <= value)
    }

    /// Inserts `value`, merging with neighbouring runs.
    pub fn insert(&mut self, value: u16) -> bool {
        let index = self.lower_bound(value);
        if self.runs.get(index).is_some_and(|run| run.start <= value) {
            return false;
        }
        let extends_previous =
            index > 0 && self.runs[index - 1].end_exclusive() == u32::from(value);
        let extends_next = index < self.runs.len()
            && u32::from(value) + 1 == u32::from(self.runs[index].start);
        match (extends_previous, extends_next) {
            (true, true) => {
                let next = self.runs.remove(index);
                let previous = &mut self.runs[index - 1];
                previous.length = next.end() - previous.start;
            }
            (true, false) => self.runs[index - 1].length += 1,
            (false, true) => {
                let run = &mut self.runs[index];
                run.start = value;
                run.length += 1;
            }
            (false, false) => self.runs.insert(index, Run::single(value)),
        }
        true
    }

    /// Removes `value`, splitting its run if needed.
    pub fn remove(&mut self, value: u16) -> bool {
        let index = self.lower_bound(value);
        let Some(&run) = self.runs.get(index) else {
            return false;
        };
        if run.start > value {
            return false;
        }
        if run.length == 0 {
            self.runs.remove(index);
        } else if value == run.start {
            self.runs[index].start += 1;
            self.runs[index].length -= 1;
        } else if value == run.end() {
            self.runs[index].length -= 1;
        } else {
            self.runs[index].length = value - run.start - 1;
            self.runs.insert(
                index + 1,
                Run::from_bounds(u32::from(value) + 1, run.end().into()),
            );
        }
        true
    }

    /// Adds `[start, end]`, returning how many values were new.
    pub fn insert_range(&mut self, start: u16, end: u16) -> u32 {
        let (start, end) = (u32::from(start), u32::from(end));
        let first = self.runs.partition_point(|run| run.end_exclusive() < start);
        let last = self
            .runs
            .partition_point(|run| u32::from(run.start) <= end + 1);
        let (mut merged_start, mut merged_end, mut covered) = (start, end, 0);
        for run in &self.runs[first..last] {
            merged_start = merged_start.min(run.start.into());
            merged_end = merged_end.max(run.end().into());
            covered += run.cardinality();
        }
        self.runs.splice(
            first..last,
            std::iter::once(Run::from_bounds(merged_start, merged_end)),
        );
        (merged_end - merged_start + 1) - covered
    }

    /// Removes `[start, end]`, returning how many values were removed.
    pub fn remove_range(&mut self, start: u16, end: u16) -> u32 {
        let first = self.lower_bound(start);
        let last = self.runs.partition_point(|run| run.start <= end);
        if first >= last {
            return 0;
        }
        let (head, tail) = (self.runs[first], self.runs[last - 1]);
        let covered: u32 = self.runs[first..last].iter().map(|run| run.cardinality()).sum();
        let mut kept: SmallVec<[Run; 2]> = SmallVec::new();
        if head.start < start {
            kept.push(Run::from_bounds(head.start.into(), u32::from(start) - 1));
        }
        if tail.end() > end {
            kept.push(Run::from_bounds(u32::from(end) + 1, tail.end().into()));
        }
        let kept_cardinality: u32 = kept.iter().map(|run| run.cardinality()).sum();
        self.runs.splice(first..last, kept);
        covered - kept_cardinality
    }

    /// Complements `[start, end]`.
    pub fn flip_range(&mut self, start: u16, end: u16) {
        *self = self.xor(&Self::from_range(start, end));
    }

    /// Number of values inside `[start, end]`.
    #[must_use]
    pub fn range_cardinality(&self, start: u16, end: u16) -> u32 {
        let (start, end) = (u32::from(start), u32::from(end));
        self.runs[self.lower_bound(start as u16)..]
            .iter()
            .take_while(|run| u32::from(run.start) <= end)
            .map(|run| {
                let low = start.max(run.start.into());
                let high = end.min(run.end().into());
                high - low + 1
            })
            .sum()
    }

    /// Smallest value, or `None` when empty.
    #[inline]
    #[must_use]
    pub fn min(&self) -> Option<u16> {
        self.runs.first().map(|run| run.start)
    }

    /// Largest value, or `None` when empty.
    #[inline]
    #[must_use]
    pub fn max(&self) -> Option<u16> {
        self.runs.last().map(|run| run.end())
    }

    /// Number of values at or below `value`.
    #[must_use]
    pub fn rank(&self, value: u16) -> u32 {
        let mut rank = 0;
        for run in &self.runs {
            if run.start > value {
                break;
            }
            if run.end() <= value {
                rank += run.cardinality();
            } else {
                rank += u32::from(value - run.start) + 1;
                break;
            }
        }
        rank
    }

    /// The value at 0-based position `rank`.
    #[must_use]
    pub fn select(&self, rank: u32) -> Option<u16> {
        let mut remaining = rank;
        for run in &self.runs {
            if remaining < run.cardinality() {
                return Some(run.start + remaining as u16);
            }
            remaining -= run.cardinality();
        }
        None
    }

    /// Smallest stored value that is `>= value`.
    #[must_use]
    pub fn next_at_or_after(&self, value: u16) -> Option<u16> {
        self.runs
            .get(self.lower_bound(value))
            .map(|run| run.start.max(value))
    }

    /// Largest stored value that is `<= value`.
    #[must_use]
    pub fn prev_at_or_before(&self, value: u16) -> Option<u16> {
        let index = self.runs.partition_point(|run| run.start <= value);
        index
            .checked_sub(1)
            .map(|index| self.runs[index].end().min(value))
    }

    /// Run starts and exclusive ends, in order.
    fn boundaries(&self) -> impl Iterator<Item = u32> + '_ {
        self.runs
            .iter()
            .flat_map(|run| [u32::from(run.start), run.end_exclusive()])
    }

    /// Sweeps the boundaries of both operands and emits a run wherever
    /// `keep(in_self, in_other)` holds. `keep(false, false)` must be false.
    fn combine(&self, other: &Self, keep: impl Fn(bool, bool) -> bool) -> Self {
        let mut left = self.boundaries().peekable();
        let mut right = other.boundaries().peekable();
        let (mut in_left, mut in_right, mut inside) = (false, false, false);
        let mut open = 0;
        let mut runs = Vec::with_capacity(RUN_DEFAULT_INIT_SIZE);
        loop {
            let point = match (left.peek(), right.peek()) {
                (None, None) => break,
                (Some(&point), None) | (None, Some(&point)) => point,
                (Some(&l), Some(&r)) => l.min(r),
            };
            if left.next_if_eq(&point).is_some() {
                in_left = !in_left;
            }
            if right.next_if_eq(&point).is_some() {
                in_right = !in_right;
            }
            let now = keep(in_left, in_right);
            if now != inside {
                if now {
                    open = point;
                } else {
                    runs.push(Run::from_bounds(open, point - 1));
                }
                inside = now;
            }
        }
        Self { runs }
    }

    /// Intersection.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, |left, right| left && right)
    }

    /// Union, merging touching runs.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        self.combine(other, |left, right| left || right)
    }

    /// Symmetric difference.
    #[must_use]
    pub fn xor(&self, other: &Self) -> Self {
        self.combine(other, |left, right| left != right)
    }

    /// Values of `self` absent from `other`.
    #[must_use]
    pub fn and_not(&self, other: &Self) -> Self {
        self.combine(other, |left, right| left && !right)
    }

    /// Returns `true` if every run of `self` lies inside a run of `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        let mut candidates = other.runs.iter().peekable();
        self.runs.iter().all(|run| {
            while candidates.next_if(|candidate| candidate.end() < run.start).is_some() {}
            candidates
                .peek()
                .is_some_and(|candidate| candidate.start <= run.start && run.end() <= candidate.end())
        })
    }

    /// Expands the runs into a sorted value list.
    #[must_use]
    pub fn to_values(&self) -> Vec<u16> {
        let mut values = Vec::with_capacity(self.cardinality() as usize);
        values.extend(self.iter());
        values
    }

    /// Iterates over the values in ascending order.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> RunIter<'_> {
        RunIter::new(&self.runs)
    }

    /// Serialized payload size: a run count plus four bytes per run.
    #[inline]
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        serialized_size_for(self.runs.len())
    }

    /// Releases spare capacity, returning the bytes reclaimed.
    pub fn shrink_to_fit(&mut self) -> usize {
        let before = self.runs.capacity();
        self.runs.shrink_to_fit();
        (before - self.runs.capacity()) * std::mem::size_of::<Run>()
    }
}

/// Serialized size of a run container holding `runs` runs.
#[inline]
#[must_use]
pub const fn serialized_size_for(runs: usize) -> usize {
    2 + 4 * runs
}

// =============================================================================
// Iteration
// =============================================================================

/// Double-ended iterator over the values of a run container.
#[derive(Clone, Debug)]
pub struct RunIter<'a> {
    runs: &'a [Run],
    front: usize,
    front_offset: u16,
    back: usize,
    back_offset: u16,
    remaining: u32,
}

impl<'a> RunIter<'a> {
    fn new(runs: &'a [Run]) -> Self {
        Self {
            runs,
            front: 0,
            front_offset: 0,
            back: runs.len().saturating_sub(1),
            back_offset: runs.last().map_or(0, |run| run.length),
            remaining: runs.iter().map(|run| run.cardinality()).sum(),
        }
    }
}

impl Iterator for RunIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let run = self.runs[self.front];
        let value = run.start + self.front_offset;
        if self.front_offset == run.length {
            self.front += 1;
            self.front_offset = 0;
        } else {
            self.front_offset += 1;
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl DoubleEndedIterator for RunIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let run = self.runs[self.back];
        let value = run.start + self.back_offset;
        if self.back_offset == 0 {
            if self.back > 0 {
                self.back -= 1;
                self.back_offset = self.runs[self.back].length;
            }
        } else {
            self.back_offset -= 1;
        }
        Some(value)
    }
}

impl ExactSizeIterator for RunIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn runs(bounds: &[(u16, u16)]) -> RunContainer {
        RunContainer::from_runs(
            bounds
                .iter()
                .map(|&(start, end)| Run::from_bounds(start.into(), end.into()))
                .collect(),
        )
    }

    fn bounds(container: &RunContainer) -> Vec<(u16, u16)> {
        container.runs().iter().map(|run| (run.start, run.end())).collect()
    }

    #[rstest]
    fn test_insert_merges_neighbours() {
        let mut container = runs(&[(1, 3), (5, 7)]);
        assert!(container.insert(4));
        assert_eq!(bounds(&container), vec![(1, 7)]);
        assert!(container.insert(0));
        assert!(container.insert(8));
        assert!(container.insert(10));
        assert!(!container.insert(10));
        assert_eq!(bounds(&container), vec![(0, 8), (10, 10)]);
    }

    #[rstest]
    fn test_remove_splits_and_shrinks() {
        let mut container = runs(&[(10, 20)]);
        assert!(container.remove(15));
        assert_eq!(bounds(&container), vec![(10, 14), (16, 20)]);
        assert!(container.remove(10));
        assert!(container.remove(20));
        assert_eq!(bounds(&container), vec![(11, 14), (16, 19)]);
        assert!(!container.remove(15));
    }

    #[rstest]
    fn test_insert_range_merges_touching_runs() {
        let mut container = runs(&[(0, 2), (10, 12), (30, 40)]);
        assert_eq!(container.insert_range(3, 9), 7);
        assert_eq!(bounds(&container), vec![(0, 12), (30, 40)]);
        assert_eq!(container.insert_range(20, 35), 10);
        assert_eq!(bounds(&container), vec![(0, 12), (20, 40)]);
    }

    #[rstest]
    fn test_remove_range_keeps_edges() {
        let mut container = runs(&[(0, 10), (20, 30)]);
        assert_eq!(container.remove_range(5, 25), 12);
        assert_eq!(bounds(&container), vec![(0, 4), (26, 30)]);
        assert_eq!(container.remove_range(11, 19), 0);
    }

    #[rstest]
    fn test_boolean_operations() {
        let left = runs(&[(0, 10), (20, 30)]);
        let right = runs(&[(5, 25)]);
        assert_eq!(bounds(&left.and(&right)), vec![(5, 10), (20, 25)]);
        assert_eq!(bounds(&left.or(&right)), vec![(0, 30)]);
        assert_eq!(bounds(&left.xor(&right)), vec![(0, 4), (11, 19), (26, 30)]);
        assert_eq!(bounds(&left.and_not(&right)), vec![(0, 4), (26, 30)]);
    }

    #[rstest]
    fn test_or_merges_adjacent_runs() {
        let left = runs(&[(0, 4)]);
        let right = runs(&[(5, 9)]);
        assert_eq!(bounds(&left.or(&right)), vec![(0, 9)]);
    }

    #[rstest]
    fn test_flip_range_over_full_chunk() {
        let mut container = RunContainer::full();
        container.flip_range(100, 200);
        assert_eq!(bounds(&container), vec![(0, 99), (201, 65_535)]);
        assert_eq!(container.cardinality(), 65_536 - 101);
    }

    #[rstest]
    fn test_from_words_matches_from_sorted_values() {
        let values: Vec<u16> = (60..70).chain(127..=129).chain(65_530..=65_535).collect();
        let mut words = [0u64; BITSET_WORDS];
        for &value in &values {
            words[usize::from(value >> 6)] |= 1u64 << (value & 63);
        }
        assert_eq!(
            RunContainer::from_words(&words),
            RunContainer::from_sorted_values(&values)
        );
        assert_eq!(RunContainer::from_words(&[u64::MAX; BITSET_WORDS]), RunContainer::full());
        assert!(RunContainer::from_words(&[0; BITSET_WORDS]).is_empty());
    }

    #[rstest]
    fn test_rank_select_and_neighbours() {
        let container = runs(&[(10, 12), (20, 21)]);
        assert_eq!(container.rank(9), 0);
        assert_eq!(container.rank(11), 2);
        assert_eq!(container.rank(100), 5);
        assert_eq!(container.select(3), Some(20));
        assert_eq!(container.select(5), None);
        assert_eq!(container.next_at_or_after(13), Some(20));
        assert_eq!(container.next_at_or_after(11), Some(11));
        assert_eq!(container.prev_at_or_before(15), Some(12));
        assert_eq!(container.prev_at_or_before(9), None);
        assert_eq!(container.range_cardinality(11, 20), 3);
    }

    #[rstest]
    fn test_is_subset() {
        let outer = runs(&[(0, 10), (20, 30)]);
        assert!(runs(&[(1, 2), (25, 30)]).is_subset(&outer));
        assert!(!runs(&[(8, 12)]).is_subset(&outer));
        assert!(RunContainer::new().is_subset(&outer));
    }

    #[rstest]
    fn test_iterator_is_double_ended() {
        let container = runs(&[(1, 2), (5, 5)]);
        assert_eq!(container.iter().collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(container.iter().rev().collect::<Vec<_>>(), vec![5, 2, 1]);
        let mut iterator = container.iter();
        assert_eq!(iterator.next_back(), Some(5));
        assert_eq!(iterator.next(), Some(1));
        assert_eq!(iterator.next_back(), Some(2));
        assert_eq!(iterator.next(), None);
        assert_eq!(RunContainer::full().iter().len(), 65_536);
    }
}
