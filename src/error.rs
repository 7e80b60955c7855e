//! Error types.
//!
//! Two failure families surface from this crate:
//!
//! - [`DeserializeError`]: a byte buffer handed to one of the safe readers is
//!   truncated or structurally invalid, or a container could not be allocated
//!   while decoding it.
//! - [`CardinalityOverflow`]: the exact cardinality of a completely full 64-bit
//!   universe (2^64 values) was requested, which does not fit in a `u64`.
//!
//! Allocation failure while building a bitset container is reported as
//! [`AllocationFailure`].

use std::fmt;

// =============================================================================
// AllocationFailure
// =============================================================================

/// A bitset container's word storage could not be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationFailure;

impl fmt::Display for AllocationFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "failed to allocate bitset container storage")
    }
}

impl std::error::Error for AllocationFailure {}

// =============================================================================
// CardinalityOverflow
// =============================================================================

/// The bitmap holds every 64-bit value, so its cardinality is 2^64.
///
/// Returned by [`RoaringTreemap::try_cardinality`](crate::RoaringTreemap::try_cardinality).
/// Callers that can meet a full universe should fall back to
/// [`RoaringTreemap::is_full`](crate::RoaringTreemap::is_full) or a wider
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityOverflow;

impl fmt::Display for CardinalityOverflow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "bitmap is full, cardinality is 2^64, unable to represent in a 64-bit integer"
        )
    }
}

impl std::error::Error for CardinalityOverflow {}

// =============================================================================
// DeserializeError
// =============================================================================

/// Error type for the budgeted (safe) readers.
///
/// Parsing stops at the first violation; no partially decoded bitmap is ever
/// handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeserializeError {
    /// A structurally declared size would read past the end of the budget.
    OutOfBytes {
        /// Bytes required by the next read.
        needed: usize,
        /// Bytes left in the budget.
        remaining: usize,
    },
    /// The leading cookie matches none of the known formats.
    InvalidCookie(u32),
    /// The declared number of containers or inner bitmaps is impossible.
    InvalidContainerCount(u64),
    /// A frozen container carries an unknown typecode.
    InvalidTypecode(u8),
    /// A native-format buffer starts with an unknown tag byte.
    InvalidFormatTag(u8),
    /// Keys are not strictly ascending.
    UnsortedKeys {
        /// The key read before `next`.
        previous: u64,
        /// The offending key.
        next: u64,
    },
    /// A container's payload violates its representation invariants.
    MalformedContainer {
        /// The 16-bit key of the container.
        key: u16,
        /// Which invariant was violated.
        reason: &'static str,
    },
    /// A frozen buffer's length disagrees with the sizes its header declares.
    LengthMismatch {
        /// Length implied by the header.
        expected: usize,
        /// Length of the buffer.
        actual: usize,
    },
    /// A container could not be allocated while decoding.
    AllocationFailure,
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBytes { needed, remaining } => write!(
                formatter,
                "ran out of bytes: needed {needed}, {remaining} remaining"
            ),
            Self::InvalidCookie(cookie) => write!(formatter, "invalid cookie: {cookie}"),
            Self::InvalidContainerCount(count) => {
                write!(formatter, "invalid container count: {count}")
            }
            Self::InvalidTypecode(typecode) => {
                write!(formatter, "invalid container typecode: {typecode}")
            }
            Self::InvalidFormatTag(tag) => write!(formatter, "invalid format tag: {tag}"),
            Self::UnsortedKeys { previous, next } => write!(
                formatter,
                "keys are not strictly ascending: {next} follows {previous}"
            ),
            Self::MalformedContainer { key, reason } => {
                write!(formatter, "malformed container at key {key}: {reason}")
            }
            Self::LengthMismatch { expected, actual } => write!(
                formatter,
                "frozen buffer is {actual} bytes but its header describes {expected}"
            ),
            Self::AllocationFailure => write!(formatter, "{AllocationFailure}"),
        }
    }
}

impl std::error::Error for DeserializeError {}

impl From<AllocationFailure> for DeserializeError {
    fn from(_: AllocationFailure) -> Self {
        Self::AllocationFailure
    }
}
