// Block/median amplitude fingerprints.
//
// Samples are split into `bits` contiguous blocks; each block contributes one
// bit, set when its rectified mean amplitude is strictly above the median of
// all block means. Block 0 maps to the most significant of the `bits` bits.
// Scaling every sample by a positive constant scales every block mean by the
// same factor, so the bit pattern is volume invariant.
//
// Means are compared as exact rationals (`sum / count`) rather than floats so
// that ties with the median are detected exactly and always produce a 0 bit.

use std::cmp::Ordering;
use std::fmt;

use crate::config::validate_bits;
use crate::error::ConfigError;

/// Fixed-width perceptual fingerprint. Only the low `bits` bits are used.
///
/// A zero fingerprint from empty input means "unknown", not "silence".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Hamming distance between two fingerprints (XOR + popcount).
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Render the low `bits` bits, most significant first.
    pub fn to_bit_string(&self, bits: usize) -> String {
        let bits = bits.min(64);
        (0..bits)
            .rev()
            .map(|pos| if self.0 >> pos & 1 == 1 { '1' } else { '0' })
            .collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Number of differing bits between `a` and `b`.
pub fn distance(a: Fingerprint, b: Fingerprint) -> u32 {
    a.hamming_distance(&b)
}

/// Compute the `bits`-wide fingerprint of `samples`.
///
/// Empty input yields `Fingerprint(0)`. `bits` outside 1..=64 is rejected.
pub fn fingerprint(samples: &[i16], bits: usize) -> Result<Fingerprint, ConfigError> {
    validate_bits(bits)?;
    if samples.is_empty() {
        return Ok(Fingerprint::default());
    }

    let means = block_means(samples, bits);

    let mut sorted = means.clone();
    sorted.sort();
    let median = Median::of_sorted(&sorted);

    let mask = means
        .iter()
        .enumerate()
        .filter(|(_, mean)| median.is_exceeded_by(mean))
        .fold(0u64, |mask, (i, _)| mask | 1u64 << (bits - 1 - i));

    Ok(Fingerprint(mask))
}

/// Rectified mean amplitude of one block, kept as an exact fraction.
#[derive(Debug, Clone, Copy)]
struct BlockMean {
    sum: u128,
    count: u128,
}

impl BlockMean {
    const ZERO: BlockMean = BlockMean { sum: 0, count: 1 };

    fn of(block: &[i16]) -> Self {
        if block.is_empty() {
            return Self::ZERO;
        }
        let sum: u64 = block.iter().map(|s| u64::from(s.unsigned_abs())).sum();
        Self {
            sum: u128::from(sum),
            count: block.len() as u128,
        }
    }
}

impl PartialEq for BlockMean {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BlockMean {}

impl PartialOrd for BlockMean {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockMean {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sum * other.count).cmp(&(other.sum * self.count))
    }
}

enum Median {
    Single(BlockMean),
    Pair(BlockMean, BlockMean),
}

impl Median {
    fn of_sorted(sorted: &[BlockMean]) -> Self {
        let n = sorted.len();
        if n % 2 == 0 {
            Median::Pair(sorted[n / 2 - 1], sorted[n / 2])
        } else {
            Median::Single(sorted[n / 2])
        }
    }

    /// True when `mean` is strictly greater than the median.
    fn is_exceeded_by(&self, mean: &BlockMean) -> bool {
        match self {
            Median::Single(m) => mean > m,
            // mean > (a + b) / 2  <=>  2 * mean.sum * a.count * b.count
            //                          > mean.count * (a.sum * b.count + b.sum * a.count)
            Median::Pair(a, b) => {
                let lhs = 2 * mean.sum * a.count * b.count;
                let rhs = mean.count * (a.sum * b.count + b.sum * a.count);
                lhs > rhs
            }
        }
    }
}

fn block_means(samples: &[i16], bits: usize) -> Vec<BlockMean> {
    let block_size = samples.len().div_ceil(bits);
    (0..bits)
        .map(|i| {
            let start = (i * block_size).min(samples.len());
            let end = (start + block_size).min(samples.len());
            BlockMean::of(&samples[start..end])
        })
        .collect()
}
