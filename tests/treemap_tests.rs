//! Integration tests for RoaringTreemap.

use roaringbit::{CardinalityOverflow, RoaringBitmap, RoaringTreemap};
use rstest::{fixture, rstest};

// =============================================================================
// Fixtures
// =============================================================================

#[fixture]
fn spread() -> RoaringTreemap {
    RoaringTreemap::of(&[5, 4_000_000_005, 8_000_000_010])
}

/// Values under four high keys, one of them dense.
#[fixture]
fn layered() -> RoaringTreemap {
    let mut treemap = RoaringTreemap::of(&[0, 17, 1 << 33, (1 << 33) + 1, u64::MAX]);
    treemap.insert_range((9 << 32) + 1_000..(9 << 32) + 90_000);
    treemap
}

// =============================================================================
// Scenarios
// =============================================================================

#[rstest]
fn test_spread_values(spread: RoaringTreemap) {
    assert_eq!(spread.cardinality(), 3);
    assert_eq!(spread.minimum(), 5);
    assert_eq!(spread.maximum(), 8_000_000_010);
    assert_eq!(spread.to_vec(), vec![5, 4_000_000_005, 8_000_000_010]);
    assert!(spread.contains(4_000_000_005));
    assert!(!spread.contains(4_000_000_006));
}

#[rstest]
fn test_emptiness_is_told_apart_from_zero() {
    let zero = RoaringTreemap::of(&[0]);
    let empty = RoaringTreemap::new();
    assert_eq!(zero.maximum(), 0);
    assert!(!zero.is_empty());
    assert_eq!(empty.maximum(), 0);
    assert!(empty.is_empty());
    assert_eq!(empty.minimum(), u64::MAX);
}

#[rstest]
fn test_extremes_skip_emptied_inner_bitmaps(layered: RoaringTreemap) {
    let mut treemap = layered;
    treemap.remove(u64::MAX);
    treemap.remove(0);
    treemap.remove(17);
    assert_eq!(treemap.max(), Some((9 << 32) + 89_999));
    assert_eq!(treemap.min(), Some(1 << 33));
}

// =============================================================================
// Legacy 32-bit entry points
// =============================================================================

#[rstest]
fn test_u32_values_live_under_key_zero() {
    let mut treemap = RoaringTreemap::new();
    assert!(treemap.insert_u32(7));
    treemap.add_many_u32(&[1, 2, 3]);
    assert_eq!(treemap.insert_range_u32(100..110), 10);
    assert!(treemap.contains_u32(7));
    assert!(treemap.contains(105));
    assert_eq!(treemap.remove_range_u32(100..105), 5);
    assert!(treemap.remove_u32(1));
    assert_eq!(treemap.to_vec(), vec![2, 3, 7, 105, 106, 107, 108, 109]);
}

#[rstest]
fn test_from_bitmap_uses_key_zero() {
    let bitmap = RoaringBitmap::of(&[1, u32::MAX]);
    let treemap = RoaringTreemap::from(bitmap);
    assert_eq!(treemap.to_vec(), vec![1, u64::from(u32::MAX)]);
}

// =============================================================================
// Ranges
// =============================================================================

#[rstest]
fn test_range_across_high_keys() {
    let start = (3 << 32) - 10;
    let mut treemap = RoaringTreemap::new();
    assert_eq!(treemap.insert_range(start..start + 20), 20);
    assert_eq!(treemap.range_cardinality(start..start + 20), 20);
    assert!(treemap.contains_range(start..start + 20));
    assert_eq!(treemap.remove_range(start + 5..start + 15), 10);
    assert_eq!(treemap.cardinality(), 10);
    assert!(!treemap.contains(3 << 32));
}

#[rstest]
fn test_remove_range_outside_keys_is_noop(layered: RoaringTreemap) {
    let mut treemap = layered.clone();
    assert_eq!(treemap.remove_range((20 << 32)..(30 << 32)), 0);
    assert_eq!(treemap, layered);
    let mut empty = RoaringTreemap::new();
    assert_eq!(empty.remove_range(..), 0);
}

#[rstest]
fn test_remove_range_drops_whole_inner_bitmaps(layered: RoaringTreemap) {
    let mut treemap = layered;
    treemap.remove_range(1 << 32..10 << 32);
    assert_eq!(treemap.to_vec(), vec![0, 17, u64::MAX]);
}

#[rstest]
fn test_flip_range_on_empty_treemap_inserts() {
    let mut treemap = RoaringTreemap::new();
    treemap.flip_range((1 << 32) - 2..(1 << 32) + 2);
    assert_eq!(
        treemap.to_vec(),
        vec![(1 << 32) - 2, (1 << 32) - 1, 1 << 32, (1 << 32) + 1]
    );
    treemap.flip_range((1 << 32) - 2..(1 << 32) + 2);
    assert!(treemap.is_empty());
    assert_eq!(treemap, RoaringTreemap::new());
}

#[rstest]
fn test_flip_toggles_membership(spread: RoaringTreemap) {
    let mut treemap = spread;
    treemap.flip(5);
    treemap.flip(6);
    assert!(!treemap.contains(5));
    assert!(treemap.contains(6));
}

// =============================================================================
// Cardinality
// =============================================================================

#[rstest]
fn test_try_cardinality(layered: RoaringTreemap) {
    assert_eq!(layered.try_cardinality(), Ok(5 + 89_000));
}

#[rstest]
fn test_full_inner_bitmap_counts_exactly() {
    let treemap = RoaringTreemap::from(RoaringBitmap::from_range(..));
    assert_eq!(treemap.try_cardinality(), Ok(1 << 32));
    assert!(!treemap.is_full());
    assert!(CardinalityOverflow.to_string().contains("2^64"));
}

// =============================================================================
// Rank and select
// =============================================================================

#[rstest]
fn test_rank_and_select_boundaries(layered: RoaringTreemap) {
    let cardinality = layered.cardinality();
    assert_eq!(layered.rank(0), 1);
    assert_eq!(layered.rank(u64::MAX), cardinality);
    assert_eq!(layered.select(cardinality - 1), Some(u64::MAX));
    assert_eq!(layered.select(cardinality), None);
    assert_eq!(layered.select(2), Some(1 << 33));
    assert_eq!(layered.rank((9 << 32) + 1_000), 5);
}

// =============================================================================
// Equality and copy-on-write
// =============================================================================

#[rstest]
fn test_equality_ignores_emptied_inner_bitmaps(spread: RoaringTreemap) {
    let mut emptied = spread.clone();
    emptied.insert(77 << 32);
    emptied.remove(77 << 32);
    assert_eq!(emptied, spread);
}

#[rstest]
fn test_copy_on_write_propagates(layered: RoaringTreemap) {
    let mut original = layered;
    original.set_copy_on_write(true);
    let mut copy = original.clone();
    copy.insert((9 << 32) + 5);
    assert!(!original.contains((9 << 32) + 5));
    assert!(copy.copy_on_write());
}

// =============================================================================
// Iteration and formatting
// =============================================================================

#[rstest]
fn test_cursor_walks_both_ways(spread: RoaringTreemap) {
    let mut cursor = spread.cursor();
    assert_eq!(cursor.move_next(), Some(5));
    assert_eq!(cursor.move_next(), Some(4_000_000_005));
    assert_eq!(cursor.move_next(), Some(8_000_000_010));
    assert_eq!(cursor.move_next(), None);
    assert_eq!(cursor.move_prev(), Some(8_000_000_010));
    assert_eq!(cursor.seek(6), Some(4_000_000_005));
}

#[rstest]
fn test_display(spread: RoaringTreemap) {
    assert_eq!(spread.to_string(), "{5,4000000005,8000000010}");
}
