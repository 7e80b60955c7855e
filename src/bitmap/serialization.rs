//! Byte formats of a [`RoaringBitmap`].
//!
//! # Portable format
//!
//! The interoperable Roaring layout, all integers little-endian:
//!
//! ```text
//! cookie        u32   12346, followed by a u32 container count, or
//!                     12347 | (count - 1) << 16, followed by a run-flag bitset
//! descriptive   per container: u16 key, u16 cardinality - 1
//! offsets       per container: u32 byte offset (omitted when runs are present
//!                     and there are fewer than 4 containers)
//! payloads      array:  u16 values
//!               bitset: 1024 u64 words
//!               run:    u16 run count, then u16 start, u16 length - 1 per run
//! ```
//!
//! A reader decides the payload kind from the run flag and, for the others,
//! from the cardinality: above 4096 it is a bitset, otherwise an array.
//!
//! # Native format
//!
//! One tag byte, then either `1`: a `u32` cardinality and the `u32` values,
//! or `2`: the portable bytes. The writer picks whichever is smaller.

use super::{Chunk, RoaringBitmap};
use crate::codec::{ByteReader, PutLe, u16_at};
use crate::container::{
    ARRAY_MAX_CARDINALITY, ArrayContainer, BitsetContainer, Container, Run, RunContainer,
};
use crate::error::DeserializeError;

pub(crate) const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;
pub(crate) const SERIAL_COOKIE: u16 = 12347;
/// Containers below this count omit the offset header when runs are present.
pub(crate) const NO_OFFSET_THRESHOLD: usize = 4;

const NATIVE_VALUE_LIST: u8 = 1;
const NATIVE_PORTABLE: u8 = 2;

/// Byte layout used by the serialization methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// The interoperable Roaring format.
    #[default]
    Portable,
    /// A tag byte followed by either a raw value list or the portable bytes,
    /// whichever is smaller. Only readable by this crate.
    Native,
}

/// How a container's payload is laid out on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Payload {
    Array,
    Bitset,
    Run,
}

impl Payload {
    fn of(container: &Container) -> Self {
        if container.is_run() {
            Self::Run
        } else if container.cardinality() as usize > ARRAY_MAX_CARDINALITY {
            Self::Bitset
        } else {
            Self::Array
        }
    }

    fn size(self, container: &Container) -> usize {
        match self {
            Self::Array => 2 * container.cardinality() as usize,
            Self::Bitset => BitsetContainer::serialized_size(),
            Self::Run => 2 + 4 * container.num_runs(),
        }
    }
}

impl RoaringBitmap {
    // =========================================================================
    // Writing
    // =========================================================================

    /// Exact number of bytes [`RoaringBitmap::serialize`] produces.
    #[must_use]
    pub fn serialized_size(&self, format: Format) -> usize {
        match format {
            Format::Portable => self.portable_size(),
            Format::Native => {
                let portable = self.portable_size();
                1 + portable.min(self.value_list_size())
            }
        }
    }

    /// Serializes into a new buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use roaringbit::{Format, RoaringBitmap};
    ///
    /// let bitmap = RoaringBitmap::of(&[1, 2, 3, 1_000_000]);
    /// let bytes = bitmap.serialize(Format::Portable);
    /// assert_eq!(bytes.len(), bitmap.serialized_size(Format::Portable));
    /// assert_eq!(RoaringBitmap::deserialize_safe(&bytes, Format::Portable), Ok(bitmap));
    /// ```
    #[must_use]
    pub fn serialize(&self, format: Format) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.serialized_size(format));
        self.serialize_into(format, &mut bytes);
        bytes
    }

    /// Appends the serialized bytes to `out`.
    pub fn serialize_into(&self, format: Format, out: &mut Vec<u8>) {
        match format {
            Format::Portable => self.write_portable(out),
            Format::Native => {
                if self.value_list_size() <= self.portable_size() {
                    out.put_u8(NATIVE_VALUE_LIST);
                    out.put_u32(self.cardinality() as u32);
                    for value in self {
                        out.put_u32(value);
                    }
                } else {
                    out.put_u8(NATIVE_PORTABLE);
                    self.write_portable(out);
                }
            }
        }
    }

    fn value_list_size(&self) -> usize {
        4 + 4 * self.cardinality() as usize
    }

    fn portable_size(&self) -> usize {
        let count = self.stored_chunks().count();
        let has_run = self.stored_chunks().any(|chunk| chunk.container.is_run());
        let payloads: usize = self
            .stored_chunks()
            .map(|chunk| Payload::of(&chunk.container).size(&chunk.container))
            .sum();
        portable_header_size(count, has_run) + payloads
    }

    fn write_portable(&self, out: &mut Vec<u8>) {
        let base = out.len();
        let chunks: Vec<&Chunk> = self.stored_chunks().collect();
        let has_run = chunks.iter().any(|chunk| chunk.container.is_run());

        if has_run {
            out.put_u32(u32::from(SERIAL_COOKIE) | ((chunks.len() as u32 - 1) << 16));
            let mut flags = vec![0u8; chunks.len().div_ceil(8)];
            for (index, chunk) in chunks.iter().enumerate() {
                if chunk.container.is_run() {
                    flags[index / 8] |= 1 << (index % 8);
                }
            }
            out.extend_from_slice(&flags);
        } else {
            out.put_u32(SERIAL_COOKIE_NO_RUNCONTAINER);
            out.put_u32(chunks.len() as u32);
        }

        for chunk in &chunks {
            out.put_u16(chunk.key);
            out.put_u16((chunk.container.cardinality() - 1) as u16);
        }

        if !has_run || chunks.len() >= NO_OFFSET_THRESHOLD {
            let mut offset = portable_header_size(chunks.len(), has_run);
            for chunk in &chunks {
                out.put_u32(offset as u32);
                offset += Payload::of(&chunk.container).size(&chunk.container);
            }
        }

        for chunk in &chunks {
            write_payload(&chunk.container, out);
        }
        debug_assert_eq!(out.len() - base, self.portable_size());
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Rebuilds a bitmap from trusted bytes.
    ///
    /// No structural validation is performed. Use
    /// [`RoaringBitmap::deserialize_safe`] for bytes of unknown origin.
    ///
    /// # Panics
    ///
    /// Panics if the bytes are truncated or carry an unknown cookie or tag.
    #[must_use]
    pub fn deserialize(bytes: &[u8], format: Format) -> Self {
        let mut reader = ByteReader::trusted(bytes);
        match Self::read(&mut reader, format) {
            Ok(bitmap) => bitmap,
            Err(error) => panic!("trusted deserialization failed: {error}"),
        }
    }

    /// Rebuilds a bitmap from untrusted bytes, reading at most `bytes.len()`
    /// of them.
    ///
    /// # Errors
    ///
    /// Returns a [`DeserializeError`] if any read would leave the buffer or
    /// the decoded structure is invalid.
    pub fn deserialize_safe(bytes: &[u8], format: Format) -> Result<Self, DeserializeError> {
        let mut reader = ByteReader::budgeted(bytes);
        Self::read(&mut reader, format).inspect_err(|error| {
            log::warn!("rejected {} serialized bytes: {error}", bytes.len());
        })
    }

    pub(crate) fn read(
        reader: &mut ByteReader<'_>,
        format: Format,
    ) -> Result<Self, DeserializeError> {
        match format {
            Format::Portable => read_portable(reader),
            Format::Native => match reader.read_u8()? {
                NATIVE_VALUE_LIST => {
                    let cardinality = reader.read_u32()? as usize;
                    let values = reader.take(4 * cardinality)?;
                    let mut bitmap = Self::new();
                    for raw in values.chunks_exact(4) {
                        bitmap.insert(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
                    }
                    Ok(bitmap)
                }
                NATIVE_PORTABLE => read_portable(reader),
                tag => Err(DeserializeError::InvalidFormatTag(tag)),
            },
        }
    }
}

const fn portable_header_size(count: usize, has_run: bool) -> usize {
    if has_run {
        let offsets = if count >= NO_OFFSET_THRESHOLD { 4 * count } else { 0 };
        4 + count.div_ceil(8) + 4 * count + offsets
    } else {
        8 + 8 * count
    }
}

fn write_payload(container: &Container, out: &mut Vec<u8>) {
    match (Payload::of(container), container) {
        (Payload::Run, Container::Run(runs)) => {
            out.put_u16(runs.num_runs() as u16);
            for run in runs.runs() {
                out.put_u16(run.start);
                out.put_u16(run.length);
            }
        }
        (Payload::Bitset, Container::Bitset(bitset)) => {
            for &word in bitset.words() {
                out.put_u64(word);
            }
        }
        _ => {
            for value in container {
                out.put_u16(value);
            }
        }
    }
}

fn malformed(key: u16, reason: &'static str) -> DeserializeError {
    DeserializeError::MalformedContainer { key, reason }
}

fn read_portable(reader: &mut ByteReader<'_>) -> Result<RoaringBitmap, DeserializeError> {
    let cookie = reader.read_u32()?;
    let (count, run_flags) = if cookie & 0xFFFF == u32::from(SERIAL_COOKIE) {
        let count = (cookie >> 16) as usize + 1;
        (count, Some(reader.take(count.div_ceil(8))?))
    } else if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
        let count = reader.read_u32()?;
        if reader.validates() && count > 1 << 16 {
            return Err(DeserializeError::InvalidContainerCount(count.into()));
        }
        (count as usize, None)
    } else {
        return Err(DeserializeError::InvalidCookie(cookie));
    };

    let headers = reader.take(4 * count)?;
    if run_flags.is_none() || count >= NO_OFFSET_THRESHOLD {
        reader.skip(4 * count)?;
    }

    let mut chunks = Vec::with_capacity(count);
    let mut previous: Option<u16> = None;
    for index in 0..count {
        let key = u16_at(headers, 2 * index);
        let cardinality = u32::from(u16_at(headers, 2 * index + 1)) + 1;
        if reader.validates() {
            if let Some(previous) = previous.filter(|&previous| previous >= key) {
                return Err(DeserializeError::UnsortedKeys {
                    previous: previous.into(),
                    next: key.into(),
                });
            }
        }
        previous = Some(key);

        let is_run = run_flags.is_some_and(|flags| flags[index / 8] & (1 << (index % 8)) != 0);
        let container = if is_run {
            read_runs(reader, key, cardinality)?
        } else if cardinality as usize > ARRAY_MAX_CARDINALITY {
            let bitset = BitsetContainer::try_from_le_bytes(
                reader.take(BitsetContainer::serialized_size())?,
            )?;
            if reader.validates() && bitset.cardinality() != cardinality {
                return Err(malformed(key, "bitset cardinality disagrees with header"));
            }
            Container::Bitset(bitset)
        } else {
            let bytes = reader.take(2 * cardinality as usize)?;
            let values: Vec<u16> = (0..cardinality as usize)
                .map(|position| u16_at(bytes, position))
                .collect();
            if reader.validates() && values.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(malformed(key, "array values not strictly ascending"));
            }
            Container::Array(ArrayContainer::from_sorted_vec(values))
        };
        chunks.push(Chunk::new(key, container));
    }
    Ok(RoaringBitmap::from_chunks(chunks))
}

fn read_runs(
    reader: &mut ByteReader<'_>,
    key: u16,
    cardinality: u32,
) -> Result<Container, DeserializeError> {
    let run_count = usize::from(reader.read_u16()?);
    let bytes = reader.take(4 * run_count)?;
    let runs: Vec<Run> = (0..run_count)
        .map(|index| Run {
            start: u16_at(bytes, 2 * index),
            length: u16_at(bytes, 2 * index + 1),
        })
        .collect();
    if reader.validates() {
        if runs.is_empty() {
            return Err(malformed(key, "run container without runs"));
        }
        if runs
            .iter()
            .any(|run| u32::from(run.start) + u32::from(run.length) > u32::from(u16::MAX))
        {
            return Err(malformed(key, "run extends past the container"));
        }
        if runs
            .windows(2)
            .any(|pair| pair[0].end_exclusive() >= u32::from(pair[1].start))
        {
            return Err(malformed(key, "runs overlap or are out of order"));
        }
        if runs.iter().map(|run| run.cardinality()).sum::<u32>() != cardinality {
            return Err(malformed(key, "run cardinality disagrees with header"));
        }
    }
    Ok(Container::Run(RunContainer::from_runs(runs)))
}

// =============================================================================
// serde
// =============================================================================

#[cfg(feature = "serde")]
mod serde_impls {
    use std::fmt;

    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Format, RoaringBitmap};

    impl Serialize for RoaringBitmap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_bytes(&self.serialize(Format::Portable))
        }
    }

    struct BitmapVisitor;

    impl<'de> Visitor<'de> for BitmapVisitor {
        type Value = RoaringBitmap;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a portable roaring bitmap byte string")
        }

        fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<RoaringBitmap, E> {
            RoaringBitmap::deserialize_safe(bytes, Format::Portable).map_err(E::custom)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut sequence: A) -> Result<RoaringBitmap, A::Error> {
            let mut bytes = Vec::with_capacity(sequence.size_hint().unwrap_or(0));
            while let Some(byte) = sequence.next_element::<u8>()? {
                bytes.push(byte);
            }
            self.visit_bytes(&bytes)
        }
    }

    impl<'de> Deserialize<'de> for RoaringBitmap {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_bytes(BitmapVisitor)
        }
    }
}
