//! Iteration over a [`RoaringBitmap`].

use std::iter::FusedIterator;
use std::slice;

use super::{Chunk, RoaringBitmap, high, join, low};
use crate::container::ContainerIter;

// =============================================================================
// Iter
// =============================================================================

/// Ascending, double-ended iterator over the values of a [`RoaringBitmap`].
///
/// # Examples
///
/// ```rust
/// use roaringbit::RoaringBitmap;
///
/// let bitmap = RoaringBitmap::of(&[3, 1, 70_000]);
/// assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![1, 3, 70_000]);
/// assert_eq!(bitmap.iter().rev().collect::<Vec<_>>(), vec![70_000, 3, 1]);
/// ```
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    chunks: slice::Iter<'a, Chunk>,
    front: Option<(u16, ContainerIter<'a>)>,
    back: Option<(u16, ContainerIter<'a>)>,
}

impl<'a> Iter<'a> {
    fn new(chunks: &'a [Chunk]) -> Self {
        Self {
            chunks: chunks.iter(),
            front: None,
            back: None,
        }
    }
}

#[inline]
fn open(chunk: &Chunk) -> (u16, ContainerIter<'_>) {
    (chunk.key, chunk.container.iter())
}

impl Iterator for Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((key, inner)) = &mut self.front {
                if let Some(low) = inner.next() {
                    return Some(join(*key, low));
                }
                self.front = None;
            }
            if let Some(chunk) = self.chunks.next() {
                self.front = Some(open(chunk));
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

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = |side: &Option<(u16, ContainerIter<'_>)>| {
            side.as_ref().map_or(0, |(_, inner)| inner.size_hint().0)
        };
        (pending(&self.front) + pending(&self.back), None)
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<u32> {
        loop {
            if let Some((key, inner)) = &mut self.back {
                if let Some(low) = inner.next_back() {
                    return Some(join(*key, low));
                }
                self.back = None;
            }
            if let Some(chunk) = self.chunks.next_back() {
                self.back = Some(open(chunk));
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

impl FusedIterator for Iter<'_> {}

impl RoaringBitmap {
    /// Iterates over the values in ascending order.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.chunks)
    }

    /// A bidirectional cursor positioned before the first value.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            bitmap: self,
            position: Position::BeforeStart,
        }
    }
}

impl<'a> IntoIterator for &'a RoaringBitmap {
    type Item = u32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Cursor
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    BeforeStart,
    At { index: usize, low: u16 },
    AfterEnd,
}

/// A movable position over the values of a [`RoaringBitmap`].
///
/// A cursor starts before the first value. Moving past either end parks it
/// outside the bitmap, from where a move in the opposite direction lands on
/// the first or last value again.
///
/// # Examples
///
/// ```rust
/// use roaringbit::RoaringBitmap;
///
/// let bitmap = RoaringBitmap::of(&[10, 20, 70_000]);
/// let mut cursor = bitmap.cursor();
/// assert_eq!(cursor.current(), None);
/// assert_eq!(cursor.move_next(), Some(10));
/// assert_eq!(cursor.seek(15), Some(20));
/// assert_eq!(cursor.move_next(), Some(70_000));
/// assert_eq!(cursor.move_next(), None);
/// assert_eq!(cursor.move_prev(), Some(70_000));
/// ```
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    bitmap: &'a RoaringBitmap,
    position: Position,
}

impl Cursor<'_> {
    /// The value under the cursor, or `None` outside the bitmap.
    #[must_use]
    pub fn current(&self) -> Option<u32> {
        match self.position {
            Position::At { index, low } => Some(join(self.bitmap.chunks[index].key, low)),
            Position::BeforeStart | Position::AfterEnd => None,
        }
    }

    /// Returns `true` if the cursor sits on a value.
    #[inline]
    #[must_use]
    pub fn has_value(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    /// First position at or after `low` in the chunk at `index`, searching
    /// forward through later chunks.
    fn forward_from(&self, mut index: usize, mut low: Option<u16>) -> Position {
        let chunks = &self.bitmap.chunks;
        while index < chunks.len() {
            let found = match low {
                Some(low) => chunks[index].container.next_at_or_after(low),
                None => None,
            };
            if let Some(low) = found {
                return Position::At { index, low };
            }
            index += 1;
            low = Some(0);
        }
        Position::AfterEnd
    }

    /// Last position at or before `low` in the chunk at `index`, searching
    /// backward through earlier chunks.
    fn backward_from(&self, index: usize, mut low: Option<u16>) -> Position {
        let chunks = &self.bitmap.chunks;
        for index in (0..=index).rev() {
            if let Some(found) = low.and_then(|low| chunks[index].container.prev_at_or_before(low)) {
                return Position::At { index, low: found };
            }
            low = Some(u16::MAX);
        }
        Position::BeforeStart
    }

    /// Advances to the next value and returns it.
    pub fn move_next(&mut self) -> Option<u32> {
        self.position = match self.position {
            Position::BeforeStart => self.forward_from(0, Some(0)),
            Position::At { index, low } => self.forward_from(index, low.checked_add(1)),
            Position::AfterEnd => Position::AfterEnd,
        };
        self.current()
    }

    /// Steps back to the previous value and returns it.
    pub fn move_prev(&mut self) -> Option<u32> {
        self.position = match self.position {
            Position::BeforeStart | Position::At { index: 0, low: 0 } => Position::BeforeStart,
            Position::At { index, low: 0 } => self.backward_from(index - 1, Some(u16::MAX)),
            Position::At { index, low } => self.backward_from(index, Some(low - 1)),
            Position::AfterEnd => match self.bitmap.chunks.len() {
                0 => Position::BeforeStart,
                count => self.backward_from(count - 1, Some(u16::MAX)),
            },
        };
        self.current()
    }

    /// Moves to the smallest value `>= target` and returns it.
    pub fn seek(&mut self, target: u32) -> Option<u32> {
        let index = self
            .bitmap
            .chunks
            .partition_point(|chunk| chunk.key < high(target));
        let start = self
            .bitmap
            .chunks
            .get(index)
            .map(|chunk| if chunk.key == high(target) { low(target) } else { 0 });
        self.position = self.forward_from(index, start);
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
