//! Integration tests for the byte formats of both bitmap widths.

use roaringbit::{DeserializeError, Format, RoaringBitmap, RoaringTreemap};
use rstest::rstest;

// =============================================================================
// Inputs
// =============================================================================

fn empty() -> RoaringBitmap {
    RoaringBitmap::new()
}

fn singleton() -> RoaringBitmap {
    RoaringBitmap::of(&[123_456])
}

fn sparse() -> RoaringBitmap {
    (0..2_000u32).map(|index| index * 7_919).collect()
}

fn dense() -> RoaringBitmap {
    (0..300_000u32).filter(|value| value % 3 != 0).collect()
}

fn full_range() -> RoaringBitmap {
    let mut bitmap = RoaringBitmap::from_range(..);
    bitmap.run_optimize();
    bitmap
}

// =============================================================================
// Portable byte layout
// =============================================================================

#[rstest]
fn test_portable_bytes_without_runs() {
    let bytes = RoaringBitmap::of(&[1, 2, 3]).serialize(Format::Portable);
    let expected: Vec<u8> = vec![
        0x3A, 0x30, 0x00, 0x00, // cookie 12346
        0x01, 0x00, 0x00, 0x00, // one container
        0x00, 0x00, 0x02, 0x00, // key 0, cardinality 3
        0x10, 0x00, 0x00, 0x00, // payload offset 16
        0x01, 0x00, 0x02, 0x00, 0x03, 0x00,
    ];
    assert_eq!(bytes, expected);
}

#[rstest]
fn test_portable_bytes_with_runs() {
    let mut bitmap = RoaringBitmap::from_range(0..100);
    bitmap.run_optimize();
    let bytes = bitmap.serialize(Format::Portable);
    let expected: Vec<u8> = vec![
        0x3B, 0x30, 0x00, 0x00, // cookie 12347, one container
        0x01, // run flags
        0x00, 0x00, 0x63, 0x00, // key 0, cardinality 100
        0x01, 0x00, // one run
        0x00, 0x00, 0x63, 0x00, // start 0, length 100
    ];
    assert_eq!(bytes, expected);
}

// =============================================================================
// Round trips
// =============================================================================

#[rstest]
#[case::empty(empty())]
#[case::singleton(singleton())]
#[case::sparse(sparse())]
#[case::dense(dense())]
#[case::full_range(full_range())]
fn test_bitmap_round_trips(#[case] bitmap: RoaringBitmap) {
    for format in [Format::Portable, Format::Native] {
        let bytes = bitmap.serialize(format);
        assert_eq!(bytes.len(), bitmap.serialized_size(format));
        assert_eq!(RoaringBitmap::deserialize(&bytes, format), bitmap);
        assert_eq!(RoaringBitmap::deserialize_safe(&bytes, format), Ok(bitmap.clone()));
    }

    let frozen = bitmap.serialize_frozen();
    assert_eq!(frozen.len(), bitmap.frozen_size_in_bytes());
    let view = RoaringBitmap::frozen_view(&frozen).unwrap();
    assert_eq!(view.cardinality(), bitmap.cardinality());
    assert_eq!(view.min(), bitmap.min());
    assert_eq!(view.max(), bitmap.max());
    assert_eq!(view.to_bitmap(), Ok(bitmap));
}

#[rstest]
#[case::empty(empty())]
#[case::singleton(singleton())]
#[case::sparse(sparse())]
#[case::dense(dense())]
#[case::full_range(full_range())]
fn test_treemap_round_trips(#[case] bitmap: RoaringBitmap) {
    let mut treemap = RoaringTreemap::new();
    for key in [0u64, 1, 40] {
        treemap.extend(bitmap.iter().take(50_000).map(|low| (key << 32) | u64::from(low)));
    }

    for format in [Format::Portable, Format::Native] {
        let bytes = treemap.serialize(format);
        assert_eq!(RoaringTreemap::deserialize(&bytes, format), treemap);
        assert_eq!(RoaringTreemap::deserialize_safe(&bytes, format), Ok(treemap.clone()));
    }

    let frozen = treemap.serialize_frozen();
    let view = RoaringTreemap::frozen_view(&frozen).unwrap();
    assert_eq!(view.try_cardinality(), treemap.try_cardinality());
    assert_eq!(view.max(), treemap.max());
    assert_eq!(RoaringTreemap::deserialize_frozen(&frozen), Ok(treemap));
}

#[rstest]
fn test_native_format_picks_the_smaller_encoding() {
    let sparse = RoaringBitmap::of(&[1, 1 << 20, 1 << 30]);
    assert_eq!(sparse.serialize(Format::Native)[0], 1);
    assert_eq!(sparse.serialized_size(Format::Native), 1 + 4 + 3 * 4);

    let dense = dense();
    assert_eq!(dense.serialize(Format::Native)[0], 2);
    assert_eq!(
        dense.serialized_size(Format::Native),
        1 + dense.serialized_size(Format::Portable)
    );
}

// =============================================================================
// Safe reads
// =============================================================================

#[rstest]
fn test_every_truncation_is_rejected() {
    let bitmap = sparse();
    let bytes = bitmap.serialize(Format::Portable);
    for length in (0..bytes.len()).step_by(13) {
        assert!(RoaringBitmap::deserialize_safe(&bytes[..length], Format::Portable).is_err());
    }
}

#[rstest]
#[case(vec![0x00, 0x00, 0x00, 0x00])]
#[case(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00])]
fn test_unknown_cookie_is_rejected(#[case] bytes: Vec<u8>) {
    assert!(matches!(
        RoaringBitmap::deserialize_safe(&bytes, Format::Portable),
        Err(DeserializeError::InvalidCookie(_))
    ));
}

#[rstest]
fn test_unknown_native_tag_is_rejected() {
    assert_eq!(
        RoaringBitmap::deserialize_safe(&[9, 0, 0, 0, 0], Format::Native),
        Err(DeserializeError::InvalidFormatTag(9))
    );
}

#[rstest]
fn test_frozen_length_must_match() {
    let mut frozen = singleton().serialize_frozen();
    frozen.insert(0, 0);
    assert!(matches!(
        RoaringBitmap::frozen_view(&frozen),
        Err(DeserializeError::LengthMismatch { .. })
    ));
}

#[rstest]
#[should_panic(expected = "trusted deserialization failed")]
fn test_trusted_read_panics_on_garbage() {
    let _ = RoaringBitmap::deserialize(&[0, 0, 0, 0], Format::Portable);
}
