//! Integration tests for RoaringBitmap.

use roaringbit::RoaringBitmap;
use rstest::{fixture, rstest};

// =============================================================================
// Fixtures
// =============================================================================

/// Values spread over an array chunk, a bitset chunk and a run chunk.
#[fixture]
fn mixed() -> RoaringBitmap {
    let mut bitmap = RoaringBitmap::of(&[1, 7, 300, 60_000]);
    bitmap.extend((1 << 16..(1 << 16) + 20_000).step_by(3));
    bitmap.insert_range(5 << 16..(5 << 16) + 40_000);
    bitmap.run_optimize();
    bitmap
}

// =============================================================================
// Construction and membership
// =============================================================================

#[rstest]
fn test_new_bitmap_is_empty() {
    let bitmap = RoaringBitmap::new();
    assert!(bitmap.is_empty());
    assert_eq!(bitmap.cardinality(), 0);
    assert_eq!(bitmap.min(), None);
    assert_eq!(bitmap.max(), None);
    assert_eq!(bitmap.iter().next(), None);
}

#[rstest]
fn test_closed_range_across_chunk_boundary() {
    let mut bitmap = RoaringBitmap::new();
    assert_eq!(bitmap.insert_range(10..=70_000), 69_991);
    assert_eq!(bitmap.cardinality(), 69_991);
    assert!((10..=70_000).all(|value| bitmap.contains(value)));
    assert!(!bitmap.contains(9));
    assert!(!bitmap.contains(70_001));
    assert!(bitmap.contains_range(10..=70_000));
    assert!(!bitmap.contains_range(9..=70_000));
}

#[rstest]
#[case(&[], 0)]
#[case(&[0], 1)]
#[case(&[3, 3, 3], 1)]
#[case(&[u32::MAX, 0, 65_536, 65_535], 4)]
fn test_of_deduplicates(#[case] values: &[u32], #[case] expected: u64) {
    assert_eq!(RoaringBitmap::of(values).cardinality(), expected);
}

#[rstest]
fn test_checked_insert_and_remove() {
    let mut bitmap = RoaringBitmap::new();
    assert!(bitmap.insert(42));
    assert!(!bitmap.insert(42));
    assert!(bitmap.remove(42));
    assert!(!bitmap.remove(42));
    assert!(bitmap.is_empty());
}

#[rstest]
fn test_flip_toggles_membership() {
    let mut bitmap = RoaringBitmap::of(&[4]);
    bitmap.flip(4);
    bitmap.flip(5);
    assert_eq!(bitmap.to_vec(), vec![5]);
}

#[rstest]
fn test_add_many_matches_individual_inserts() {
    let values = [9, 1, 70_000, 2, 70_001, 1 << 20, 3];
    let mut many = RoaringBitmap::new();
    many.add_many(&values);
    let single: RoaringBitmap = values.iter().collect();
    assert_eq!(many, single);
}

// =============================================================================
// Ranges
// =============================================================================

#[rstest]
#[case(0..0, 0)]
#[case(0..1, 1)]
#[case(65_530..65_542, 12)]
#[case(0..200_000, 200_000)]
fn test_from_range_cardinality(#[case] range: std::ops::Range<u32>, #[case] expected: u64) {
    assert_eq!(RoaringBitmap::from_range(range).cardinality(), expected);
}

#[rstest]
fn test_full_range() {
    let bitmap = RoaringBitmap::from_range(..);
    assert!(bitmap.is_full());
    assert_eq!(bitmap.cardinality(), 1 << 32);
    assert_eq!(bitmap.max(), Some(u32::MAX));
    assert_eq!(bitmap.select((1 << 32) - 1), Some(u32::MAX));
}

#[rstest]
fn test_remove_range_prunes_emptied_chunks(mixed: RoaringBitmap) {
    let mut bitmap = mixed;
    let before = bitmap.cardinality();
    let removed = bitmap.remove_range(1 << 16..6 << 16);
    assert_eq!(bitmap.cardinality(), before - removed);
    assert_eq!(bitmap.to_vec(), vec![1, 7, 300, 60_000]);
}

#[rstest]
fn test_flip_range_twice_restores(mixed: RoaringBitmap) {
    let mut bitmap = mixed.clone();
    bitmap.flip_range(200..(5 << 16) + 10);
    assert_ne!(bitmap, mixed);
    bitmap.flip_range(200..(5 << 16) + 10);
    assert_eq!(bitmap, mixed);
}

#[rstest]
fn test_range_cardinality_matches_filter(mixed: RoaringBitmap) {
    let range = 250..(5 << 16) + 17;
    let expected = mixed.iter().filter(|value| range.contains(value)).count() as u64;
    assert_eq!(mixed.range_cardinality(range), expected);
}

// =============================================================================
// Rank, select and extremes
// =============================================================================

#[rstest]
fn test_rank_and_select_boundaries(mixed: RoaringBitmap) {
    let cardinality = mixed.cardinality();
    assert_eq!(mixed.rank(0), 0);
    assert_eq!(mixed.rank(mixed.minimum()), 1);
    assert_eq!(mixed.rank(mixed.maximum()), cardinality);
    assert_eq!(mixed.rank(u32::MAX), cardinality);
    assert_eq!(mixed.select(cardinality), None);
    assert_eq!(mixed.select(cardinality - 1), Some(mixed.maximum()));
    assert_eq!(mixed.select(0), Some(1));
}

#[rstest]
fn test_select_inverts_rank(mixed: RoaringBitmap) {
    for (position, value) in mixed.iter().enumerate().step_by(97) {
        assert_eq!(mixed.select(position as u64), Some(value));
        assert_eq!(mixed.rank(value), position as u64 + 1);
    }
}

#[rstest]
fn test_emptiness_is_told_apart_from_zero() {
    let zero = RoaringBitmap::of(&[0]);
    let empty = RoaringBitmap::new();
    assert_eq!(zero.maximum(), 0);
    assert!(!zero.is_empty());
    assert_eq!(empty.maximum(), 0);
    assert!(empty.is_empty());
    assert_eq!(empty.minimum(), u32::MAX);
}

// =============================================================================
// Representation maintenance
// =============================================================================

#[rstest]
fn test_run_optimize_round_trip(mixed: RoaringBitmap) {
    let mut bitmap = mixed.clone();
    assert!(bitmap.has_run_containers());
    assert!(bitmap.remove_run_compression());
    assert!(!bitmap.has_run_containers());
    assert_eq!(bitmap, mixed);
    assert!(bitmap.run_optimize());
    assert!(bitmap.has_run_containers());
}

#[rstest]
fn test_shrink_to_fit_keeps_values(mixed: RoaringBitmap) {
    let mut bitmap = mixed.clone();
    bitmap.remove_range(0..1 << 16);
    bitmap.shrink_to_fit();
    assert_eq!(bitmap.cardinality(), mixed.cardinality() - 4);
}

// =============================================================================
// Copy-on-write
// =============================================================================

#[rstest]
fn test_copy_on_write_clones_stay_independent(mixed: RoaringBitmap) {
    let mut original = mixed;
    original.set_copy_on_write(true);
    let mut copy = original.clone();
    assert!(copy.copy_on_write());
    copy.insert(2);
    copy.remove(5 << 16);
    assert!(!original.contains(2));
    assert!(original.contains(5 << 16));
    assert!(copy.contains(2));
    assert!(!copy.contains(5 << 16));
}

// =============================================================================
// Iteration and formatting
// =============================================================================

#[rstest]
fn test_iter_is_sorted_and_reversible(mixed: RoaringBitmap) {
    let forward = mixed.to_vec();
    assert!(forward.windows(2).all(|pair| pair[0] < pair[1]));
    let mut backward: Vec<u32> = mixed.iter().rev().collect();
    backward.reverse();
    assert_eq!(forward, backward);
}

#[rstest]
fn test_cursor_seek_then_walk(mixed: RoaringBitmap) {
    let mut cursor = mixed.cursor();
    assert_eq!(cursor.seek(301), Some(60_000));
    assert_eq!(cursor.move_next(), Some(1 << 16));
    assert_eq!(cursor.move_prev(), Some(60_000));
    assert_eq!(cursor.seek((5 << 16) + 40_000), None);
    assert_eq!(cursor.move_prev(), Some((5 << 16) + 39_999));
}

#[rstest]
fn test_display() {
    assert_eq!(RoaringBitmap::of(&[3, 1, 2]).to_string(), "{1,2,3}");
    assert_eq!(RoaringBitmap::new().to_string(), "{}");
}
