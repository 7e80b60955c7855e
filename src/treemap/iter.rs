//! Iteration over a [`RoaringTreemap`].

use std::collections::btree_map;
use std::iter::FusedIterator;

use super::{RoaringTreemap, high, join, low};
use crate::bitmap::{Iter, RoaringBitmap};

// =============================================================================
// TreemapIter
// =============================================================================

/// Ascending, double-ended iterator over the values of a [`RoaringTreemap`].
#[derive(Clone, Debug)]
pub struct TreemapIter<'a> {
    outer: btree_map::Iter<'a, u32, RoaringBitmap>,
    front: Option<(u32, Iter<'a>)>,
    back: Option<(u32, Iter<'a>)>,
}

impl Iterator for TreemapIter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            if let Some((key, inner)) = &mut self.front {
                if let Some(low) = inner.next() {
                    return Some(join(*key, low));
                }
                self.front = None;
            }
            if let Some((&key, inner)) = self.outer.next() {
                self.front = Some((key, inner.iter()));
                continue;
            }
            let (key, inner) = self.back.as_mut()?;
            let value = inner.next().map(|low| join(*key, low));
            if value.is_none() {
                self.back = None;
            }
            return value;
        }
    }
}

impl DoubleEndedIterator for TreemapIter<'_> {
    fn next_back(&mut self) -> Option<u64> {
        loop {
            if let Some((key, inner)) = &mut self.back {
                if let Some(low) = inner.next_back() {
                    return Some(join(*key, low));
                }
                self.back = None;
            }
            if let Some((&key, inner)) = self.outer.next_back() {
                self.back = Some((key, inner.iter()));
                continue;
            }
            let (key, inner) = self.front.as_mut()?;
            let value = inner.next_back().map(|low| join(*key, low));
            if value.is_none() {
                self.front = None;
            }
            return value;
        }
    }
}

impl FusedIterator for TreemapIter<'_> {}

impl RoaringTreemap {
    /// Iterates over the values in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::RoaringTreemap;
    ///
    /// let treemap = RoaringTreemap::of(&[1 << 40, 3, 1 << 33]);
    /// assert_eq!(treemap.iter().collect::<Vec<_>>(), vec![3, 1 << 33, 1 << 40]);
    /// assert_eq!(treemap.iter().next_back(), Some(1 << 40));
    /// ```
    #[must_use]
    pub fn iter(&self) -> TreemapIter<'_> {
        TreemapIter {
            outer: self.map.iter(),
            front: None,
            back: None,
        }
    }

    /// A bidirectional cursor positioned before the first value.
    #[must_use]
    pub fn cursor(&self) -> TreemapCursor<'_> {
        TreemapCursor {
            treemap: self,
            position: Position::BeforeStart,
        }
    }
}

impl<'a> IntoIterator for &'a RoaringTreemap {
    type Item = u64;
    type IntoIter = TreemapIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// TreemapCursor
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    BeforeStart,
    At(u64),
    AfterEnd,
}

/// A movable position over the values of a [`RoaringTreemap`].
///
/// Moves and seeks search the inner bitmaps through their own cursors, so
/// each step costs a key lookup plus one inner seek.
///
/// # Examples
///
/// ```rust
/// use roaringbit::RoaringTreemap;
///
/// let treemap = RoaringTreemap::of(&[7, 1 << 32, 1 << 40]);
/// let mut cursor = treemap.cursor();
/// assert_eq!(cursor.seek(8), Some(1 << 32));
/// assert_eq!(cursor.move_next(), Some(1 << 40));
/// assert_eq!(cursor.move_next(), None);
/// assert_eq!(cursor.move_prev(), Some(1 << 40));
/// ```
#[derive(Clone, Debug)]
pub struct TreemapCursor<'a> {
    treemap: &'a RoaringTreemap,
    position: Position,
}

impl TreemapCursor<'_> {
    /// The value under the cursor, or `None` outside the treemap.
    #[must_use]
    pub const fn current(&self) -> Option<u64> {
        match self.position {
            Position::At(value) => Some(value),
            Position::BeforeStart | Position::AfterEnd => None,
        }
    }

    /// Smallest value `>= target`.
    fn at_or_after(&self, target: u64) -> Position {
        let key = high(target);
        self.treemap
            .map
            .range(key..)
            .find_map(|(&inner_key, inner)| {
                let start = if inner_key == key { low(target) } else { 0 };
                inner.cursor().seek(start).map(|low| join(inner_key, low))
            })
            .map_or(Position::AfterEnd, Position::At)
    }

    /// Largest value `<= target`.
    fn at_or_before(&self, target: u64) -> Position {
        let key = high(target);
        self.treemap
            .map
            .range(..=key)
            .rev()
            .find_map(|(&inner_key, inner)| {
                let mut cursor = inner.cursor();
                let bound = if inner_key == key { low(target) } else { u32::MAX };
                match bound.checked_add(1) {
                    Some(past) if cursor.seek(past).is_some() => {}
                    _ => cursor.seek_to_end(),
                }
                cursor.move_prev().map(|low| join(inner_key, low))
            })
            .map_or(Position::BeforeStart, Position::At)
    }

    /// Advances to the next value and returns it.
    pub fn move_next(&mut self) -> Option<u64> {
        self.position = match self.position {
            Position::BeforeStart => self.at_or_after(0),
            Position::At(value) => match value.checked_add(1) {
                Some(next) => self.at_or_after(next),
                None => Position::AfterEnd,
            },
            Position::AfterEnd => Position::AfterEnd,
        };
        self.current()
    }

    /// Steps back to the previous value and returns it.
    pub fn move_prev(&mut self) -> Option<u64> {
        self.position = match self.position {
            Position::BeforeStart => Position::BeforeStart,
            Position::At(value) => match value.checked_sub(1) {
                Some(previous) => self.at_or_before(previous),
                None => Position::BeforeStart,
            },
            Position::AfterEnd => self.at_or_before(u64::MAX),
        };
        self.current()
    }

    /// Moves to the smallest value `>= target` and returns it.
    pub fn seek(&mut self, target: u64) -> Option<u64> {
        self.position = self.at_or_after(target);
        self.current()
    }

    /// Parks the cursor before the first value.
    pub fn seek_to_start(&mut self) {
        self.position = Position::BeforeStart;
    }

    /// Parks the cursor after the last value.
    pub fn seek_to_end(&mut self) {
        self.position = Position::AfterEnd;
    }
}
