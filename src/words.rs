//! Word-level operation provider.
//!
//! Bitset containers delegate every bulk bit operation to this module. The
//! kernels walk their inputs in blocks of [`WORDS_PER_BLOCK`] 64-bit words
//! (256 bits, the width of one vector register) so that the compiler can
//! vectorize them; the result is always identical to applying the scalar
//! operator word by word.
//!
//! Every binary kernel comes in four shapes, generated by one macro:
//!
//! | Kernel                 | Writes to      | Returns                  |
//! |------------------------|----------------|--------------------------|
//! | `{op}_into`            | separate `out` | result population count  |
//! | `{op}_into_nocard`     | separate `out` | nothing                  |
//! | `{op}_assign`          | left operand   | result population count  |
//! | `{op}_assign_nocard`   | left operand   | nothing                  |
//!
//! plus `{op}_cardinality`, which only counts.

/// Number of 64-bit words in a bitset container (2^16 bits).
pub const BITSET_WORDS: usize = 1024;

/// Number of words processed per block.
pub const WORDS_PER_BLOCK: usize = 4;

/// Counts the set bits of `words`.
#[inline]
#[must_use]
pub fn popcount(words: &[u64]) -> u32 {
    let mut blocks = words.chunks_exact(WORDS_PER_BLOCK);
    let mut sum = 0u32;
    for block in &mut blocks {
        sum += block[0].count_ones()
            + block[1].count_ones()
            + block[2].count_ones()
            + block[3].count_ones();
    }
    sum + blocks.remainder().iter().map(|word| word.count_ones()).sum::<u32>()
}

macro_rules! block_kernels {
    ($($name:ident => |$left:ident, $right:ident| $body:expr;)*) => {
        paste::paste! {
            $(
                #[doc = concat!("Writes `left ", stringify!($name), " right` to `out` and returns its population count.")]
                #[inline]
                pub fn [<$name _into>](left: &[u64], right: &[u64], out: &mut [u64]) -> u32 {
                    debug_assert!(left.len() == right.len() && right.len() == out.len());
                    let mut sum = 0u32;
                    for ((out_block, left_block), right_block) in out
                        .chunks_exact_mut(WORDS_PER_BLOCK)
                        .zip(left.chunks_exact(WORDS_PER_BLOCK))
                        .zip(right.chunks_exact(WORDS_PER_BLOCK))
                    {
                        for index in 0..WORDS_PER_BLOCK {
                            let $left = left_block[index];
                            let $right = right_block[index];
                            let word = $body;
                            out_block[index] = word;
                            sum += word.count_ones();
                        }
                    }
                    sum
                }

                #[doc = concat!("Writes `left ", stringify!($name), " right` to `out` without counting.")]
                #[inline]
                pub fn [<$name _into_nocard>](left: &[u64], right: &[u64], out: &mut [u64]) {
                    debug_assert!(left.len() == right.len() && right.len() == out.len());
                    for ((out_block, left_block), right_block) in out
                        .chunks_exact_mut(WORDS_PER_BLOCK)
                        .zip(left.chunks_exact(WORDS_PER_BLOCK))
                        .zip(right.chunks_exact(WORDS_PER_BLOCK))
                    {
                        for index in 0..WORDS_PER_BLOCK {
                            let $left = left_block[index];
                            let $right = right_block[index];
                            out_block[index] = $body;
                        }
                    }
                }

                #[doc = concat!("Replaces `target` with `target ", stringify!($name), " other` and returns its population count.")]
                #[inline]
                pub fn [<$name _assign>](target: &mut [u64], other: &[u64]) -> u32 {
                    debug_assert_eq!(target.len(), other.len());
                    let mut sum = 0u32;
                    for (target_block, other_block) in target
                        .chunks_exact_mut(WORDS_PER_BLOCK)
                        .zip(other.chunks_exact(WORDS_PER_BLOCK))
                    {
                        for index in 0..WORDS_PER_BLOCK {
                            let $left = target_block[index];
                            let $right = other_block[index];
                            let word = $body;
                            target_block[index] = word;
                            sum += word.count_ones();
                        }
                    }
                    sum
                }

                #[doc = concat!("Replaces `target` with `target ", stringify!($name), " other` without counting.")]
                #[inline]
                pub fn [<$name _assign_nocard>](target: &mut [u64], other: &[u64]) {
                    debug_assert_eq!(target.len(), other.len());
                    for (target_block, other_block) in target
                        .chunks_exact_mut(WORDS_PER_BLOCK)
                        .zip(other.chunks_exact(WORDS_PER_BLOCK))
                    {
                        for index in 0..WORDS_PER_BLOCK {
                            let $left = target_block[index];
                            let $right = other_block[index];
                            target_block[index] = $body;
                        }
                    }
                }

                #[doc = concat!("Population count of `left ", stringify!($name), " right`.")]
                #[inline]
                #[must_use]
                pub fn [<$name _cardinality>](left: &[u64], right: &[u64]) -> u32 {
                    debug_assert_eq!(left.len(), right.len());
                    let mut sum = 0u32;
                    for (left_block, right_block) in left
                        .chunks_exact(WORDS_PER_BLOCK)
                        .zip(right.chunks_exact(WORDS_PER_BLOCK))
                    {
                        for index in 0..WORDS_PER_BLOCK {
                            let $left = left_block[index];
                            let $right = right_block[index];
                            sum += ($body).count_ones();
                        }
                    }
                    sum
                }
            )*
        }
    };
}

block_kernels! {
    and => |left, right| left & right;
    or => |left, right| left | right;
    xor => |left, right| left ^ right;
    and_not => |left, right| left & !right;
}

// =============================================================================
// Bit ranges
// =============================================================================

/// Applies `apply(word, mask)` to every word overlapping the half-open bit
/// range `[start, end)`.
#[inline]
fn for_each_range_word(
    words: &mut [u64],
    start: u32,
    end: u32,
    mut apply: impl FnMut(&mut u64, u64),
) {
    if start >= end {
        return;
    }
    let first = (start / 64) as usize;
    let last = ((end - 1) / 64) as usize;
    let first_mask = u64::MAX << (start % 64);
    let last_mask = u64::MAX >> (63 - (end - 1) % 64);
    if first == last {
        apply(&mut words[first], first_mask & last_mask);
        return;
    }
    apply(&mut words[first], first_mask);
    for word in &mut words[first + 1..last] {
        apply(word, u64::MAX);
    }
    apply(&mut words[last], last_mask);
}

/// Sets the bits in `[start, end)`.
#[inline]
pub fn set_range(words: &mut [u64], start: u32, end: u32) {
    for_each_range_word(words, start, end, |word, mask| *word |= mask);
}

/// Clears the bits in `[start, end)`.
#[inline]
pub fn clear_range(words: &mut [u64], start: u32, end: u32) {
    for_each_range_word(words, start, end, |word, mask| *word &= !mask);
}

/// Flips the bits in `[start, end)`.
#[inline]
pub fn flip_range(words: &mut [u64], start: u32, end: u32) {
    for_each_range_word(words, start, end, |word, mask| *word ^= mask);
}

/// Counts the set bits in `[start, end)`.
#[must_use]
pub fn count_range(words: &[u64], start: u32, end: u32) -> u32 {
    if start >= end {
        return 0;
    }
    let first = (start / 64) as usize;
    let last = ((end - 1) / 64) as usize;
    let first_mask = u64::MAX << (start % 64);
    let last_mask = u64::MAX >> (63 - (end - 1) % 64);
    if first == last {
        return (words[first] & first_mask & last_mask).count_ones();
    }
    (words[first] & first_mask).count_ones()
        + popcount(&words[first + 1..last])
        + (words[last] & last_mask).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn patterned(seed: u64) -> Vec<u64> {
        let mut state = seed;
        (0..BITSET_WORDS)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                state
            })
            .collect()
    }

    #[rstest]
    fn test_popcount_counts_every_block_and_remainder() {
        let words = [u64::MAX, 1, 0, 3, 7];
        assert_eq!(popcount(&words), 64 + 1 + 2 + 3);
    }

    #[rstest]
    #[case::and(0)]
    #[case::or(1)]
    #[case::xor(2)]
    #[case::and_not(3)]
    fn test_block_kernels_match_scalar_operator(#[case] operation: usize) {
        let left = patterned(1);
        let right = patterned(2);
        let scalar: Vec<u64> = left
            .iter()
            .zip(&right)
            .map(|(&l, &r)| match operation {
                0 => l & r,
                1 => l | r,
                2 => l ^ r,
                _ => l & !r,
            })
            .collect();
        let expected_cardinality = popcount(&scalar);

        let mut out = vec![0u64; BITSET_WORDS];
        let (counted, only_counted) = match operation {
            0 => (and_into(&left, &right, &mut out), and_cardinality(&left, &right)),
            1 => (or_into(&left, &right, &mut out), or_cardinality(&left, &right)),
            2 => (xor_into(&left, &right, &mut out), xor_cardinality(&left, &right)),
            _ => (
                and_not_into(&left, &right, &mut out),
                and_not_cardinality(&left, &right),
            ),
        };
        assert_eq!(out, scalar);
        assert_eq!(counted, expected_cardinality);
        assert_eq!(only_counted, expected_cardinality);

        let mut target = left.clone();
        let assigned = match operation {
            0 => and_assign(&mut target, &right),
            1 => or_assign(&mut target, &right),
            2 => xor_assign(&mut target, &right),
            _ => and_not_assign(&mut target, &right),
        };
        assert_eq!(target, scalar);
        assert_eq!(assigned, expected_cardinality);

        let mut nocard = left.clone();
        match operation {
            0 => and_assign_nocard(&mut nocard, &right),
            1 => or_assign_nocard(&mut nocard, &right),
            2 => xor_assign_nocard(&mut nocard, &right),
            _ => and_not_assign_nocard(&mut nocard, &right),
        }
        assert_eq!(nocard, scalar);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(3, 64)]
    #[case(63, 65)]
    #[case(10, 300)]
    #[case(0, 65_536)]
    fn test_range_helpers_agree_with_count(#[case] start: u32, #[case] end: u32) {
        let mut words = vec![0u64; BITSET_WORDS];
        set_range(&mut words, start, end);
        assert_eq!(popcount(&words), end - start);
        assert_eq!(count_range(&words, start, end), end - start);
        assert_eq!(count_range(&words, 0, start), 0);

        flip_range(&mut words, start, end);
        assert_eq!(popcount(&words), 0);

        set_range(&mut words, 0, 65_536);
        clear_range(&mut words, start, end);
        assert_eq!(popcount(&words), 65_536 - (end - start));
    }

    #[rstest]
    fn test_empty_range_is_a_no_op() {
        let mut words = vec![0u64; BITSET_WORDS];
        set_range(&mut words, 5, 5);
        assert_eq!(popcount(&words), 0);
        assert_eq!(count_range(&words, 9, 3), 0);
    }
}
