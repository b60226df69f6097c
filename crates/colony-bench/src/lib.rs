//! Benchmark profiles for the Colony container.
//!
//! - [`populated`]: a colony filled densely from index 0
//! - [`fragmented`]: a populated colony with a seeded share of holes
//! - [`hollowed`]: a populated colony whose every other block is vacant

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use colony_core::SlotIndex;
use colony_engine::{Colony, ColonyConfig};
use colony_pool::{Pool, PoolConfig};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Pool limits roomy enough for every profile.
pub fn bench_pool() -> Pool {
    Pool::volatile(PoolConfig::default().with_capacity_bytes(1 << 30))
}

/// A colony holding `0..n` at indices `0..n`.
pub fn populated(block_capacity: u64, n: u64) -> Colony<i32, Pool> {
    let mut colony = Colony::create(bench_pool(), ColonyConfig::new(block_capacity))
        .expect("bench colony");
    for v in 0..n {
        colony.insert(v as i32).expect("populate");
    }
    colony
}

/// [`populated`] with roughly `hole_percent`% of slots removed at
/// seeded positions. Returns the colony and the indices still live.
pub fn fragmented(
    block_capacity: u64,
    n: u64,
    hole_percent: u64,
    seed: u64,
) -> (Colony<i32, Pool>, Vec<SlotIndex>) {
    let mut colony = populated(block_capacity, n);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut live = Vec::with_capacity(n as usize);
    for i in 0..n {
        let index = SlotIndex(i);
        if rng.next_u64() % 100 < hole_percent {
            colony.remove(index).expect("punch hole");
        } else {
            live.push(index);
        }
    }
    (colony, live)
}

/// [`populated`] with every odd-numbered block emptied.
pub fn hollowed(block_capacity: u64, blocks: u64) -> Colony<i32, Pool> {
    let mut colony = populated(block_capacity, block_capacity * blocks);
    for ordinal in (1..blocks).step_by(2) {
        for local in 0..block_capacity {
            colony
                .remove(SlotIndex::join(ordinal, local, block_capacity))
                .expect("hollow block");
        }
    }
    colony
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_have_expected_shape() {
        let c = populated(8, 20);
        assert_eq!(c.stats().unwrap().block_count, 3);

        let (c, live) = fragmented(8, 200, 30, 5);
        assert_eq!(c.len().unwrap(), live.len() as u64);
        c.verify().unwrap();

        let c = hollowed(4, 6);
        assert_eq!(c.stats().unwrap().free_block_count, 3);
        c.verify().unwrap();
    }
}
