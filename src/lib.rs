//! # roaringbit
//!
//! Compressed bitmaps for sets of unsigned integers.
//!
//! ## Overview
//!
//! Values are split by their high bits into chunks of 65536, and each chunk is
//! held by whichever of three container encodings is smallest for it:
//!
//! - **Array**: sorted list of up to 4096 16-bit values
//! - **Bitset**: 65536-bit vector, for dense chunks
//! - **Run**: sorted list of `[start, start + length]` intervals
//!
//! Two bitmap widths are provided:
//!
//! - [`RoaringBitmap`]: `u32` values, an ordered vector of containers
//! - [`RoaringTreemap`]: `u64` values, an ordered map from the high 32 bits
//!   to an inner [`RoaringBitmap`]
//!
//! Both support set algebra (in place and copying), rank and select, range
//! operations, double-ended iteration, bidirectional cursors, and three byte
//! formats: the interoperable portable format, a compact native format, and a
//! frozen format that can be queried in place through a view.
//!
//! ## Feature Flags
//!
//! - `arc`: share container storage through `Arc` instead of `Rc`, making
//!   bitmaps `Send + Sync`
//! - `serde`: `Serialize`/`Deserialize` through the portable format
//! - `rayon`: parallel k-way union of 64-bit bitmaps (implies `arc`)
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust
//! use roaringbit::prelude::*;
//!
//! let mut bitmap = RoaringBitmap::new();
//! bitmap.insert_range(10..=70_000);
//! assert_eq!(bitmap.cardinality(), 69_991);
//! assert!(!bitmap.contains(9));
//!
//! let mut treemap = RoaringTreemap::new();
//! treemap.add_many(&[5, 4_000_000_005, 8_000_000_010]);
//! assert_eq!(treemap.iter().collect::<Vec<_>>(), vec![5, 4_000_000_005, 8_000_000_010]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Splitting values into high and low halves is the core of every operation.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use roaringbit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bitmap::{Cursor, Format, FrozenBitmapView, Iter, RoaringBitmap};
    pub use crate::error::{CardinalityOverflow, DeserializeError};
    pub use crate::treemap::{FrozenTreemapView, RoaringTreemap, TreemapCursor, TreemapIter};
}

#[macro_use]
mod macros;

pub(crate) mod codec;
pub mod container;
pub mod error;
pub mod words;

pub mod bitmap;
pub mod treemap;

pub use bitmap::{Format, RoaringBitmap};
pub use error::{AllocationFailure, CardinalityOverflow, DeserializeError};
pub use treemap::RoaringTreemap;

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted pointer holding each container of a [`RoaringBitmap`].
///
/// `std::sync::Arc` with the `arc` feature, `std::rc::Rc` otherwise. Copies of
/// a bitmap with copy-on-write enabled share containers through it, and every
/// mutation goes through `make_mut`.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(RoaringBitmap: Send, Sync);
#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(RoaringTreemap: Send, Sync);
#[cfg(not(feature = "arc"))]
static_assertions::assert_not_impl_any!(RoaringBitmap: Send, Sync);
