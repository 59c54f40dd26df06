//! Deterministic utilities for reproducible training
//!
//! A seeded LCG drives bootstrap sampling, feature subsampling and the
//! stratified split; `xxhash64_i64` derives independent per-tree and
//! per-class seeds from the run seed; `SplitTieBreaker` orders equal-gain
//! split candidates. Nothing here depends on platform or thread scheduling.

use std::num::Wrapping;

/// 64-bit linear congruential generator (Knuth MMIX constants)
///
/// Only the high 31 bits of the state are handed out; the low bits of a
/// power-of-two LCG have short periods.
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;
    const OUTPUT_BITS: u32 = 31;

    pub fn new(seed: i64) -> Self {
        let mut rng = Self {
            state: Wrapping(seed as u64),
        };
        // Decorrelate nearby seeds before the first draw.
        rng.step();
        rng
    }

    fn step(&mut self) {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
    }

    /// Generate next random value in range [0, 2^31)
    pub fn next_i64(&mut self) -> i64 {
        self.step();
        (self.state.0 >> (64 - Self::OUTPUT_BITS)) as i64
    }

    /// Generate random value in range [0, max)
    pub fn next_range(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        // Multiply-shift maps [0, 2^31) onto [0, max) without a modulo.
        ((self.next_i64() as u64 * max as u64) >> Self::OUTPUT_BITS) as usize
    }

    /// Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_range(i + 1);
            items.swap(i, j);
        }
    }

    /// `count` distinct values from `0..n`, in draw order
    pub fn sample_indices(&mut self, n: usize, count: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..n).collect();
        let count = count.min(n);
        for i in 0..count {
            let j = i + self.next_range(n - i);
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}

/// XXH64-style hash of a slice of integers, used to derive child seeds
///
/// Each value is consumed as one 8-byte lane followed by the XXH64
/// avalanche, so seeds that differ in a single bit give unrelated outputs.
pub fn xxhash64_i64(data: &[i64], seed: i64) -> i64 {
    const PRIME1: u64 = 0x9E3779B185EBCA87;
    const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
    const PRIME3: u64 = 0x165667B19E3779F9;
    const PRIME4: u64 = 0x85EBCA77C2B2AE63;
    const PRIME5: u64 = 0x27D4EB2F165667C5;

    let mut h = (seed as u64)
        .wrapping_add(PRIME5)
        .wrapping_add(8 * data.len() as u64);

    for &val in data {
        let lane = (val as u64)
            .wrapping_mul(PRIME2)
            .rotate_left(31)
            .wrapping_mul(PRIME1);
        h = (h ^ lane).rotate_left(27).wrapping_mul(PRIME1).wrapping_add(PRIME4);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME3);
    h ^= h >> 32;

    h as i64
}

/// Orders split candidates with equal gain: lowest feature, then lowest
/// threshold, then lowest node id wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            node_id,
        }
    }
}
