//! Point-in-time colony counters.

use colony_core::ElementKind;

/// A snapshot of a colony's bookkeeping, read from its root record.
///
/// Vacant slots are split three ways: individually freed slots
/// (`free_idx_count`), wholly vacant blocks (`free_block_count` blocks
/// of `block_capacity` each), and the never-used tail of the last block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColonyStats {
    /// Element representation.
    pub kind: ElementKind,
    /// Live elements.
    pub size: u64,
    /// Total slots across all blocks.
    pub capacity: u64,
    /// Blocks in the chain.
    pub block_count: u64,
    /// Slots per block.
    pub block_capacity: u64,
    /// Entries on the free-index list.
    pub free_idx_count: u64,
    /// Entries on the free-block list.
    pub free_block_count: u64,
    /// Slots of the tail block never handed out.
    pub untouched_tail_slots: u64,
}

impl ColonyStats {
    /// Vacant slots, however they are tracked.
    pub fn vacant(&self) -> u64 {
        self.capacity - self.size
    }

    /// Whether every vacant slot is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.free_idx_count + self.free_block_count * self.block_capacity + self.untouched_tail_slots
            == self.vacant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance() {
        let mut stats = ColonyStats {
            kind: ElementKind::Scalar,
            size: 3,
            capacity: 8,
            block_count: 2,
            block_capacity: 4,
            free_idx_count: 1,
            free_block_count: 0,
            untouched_tail_slots: 4,
        };
        assert_eq!(stats.vacant(), 5);
        assert!(stats.is_balanced());
        stats.free_idx_count = 2;
        assert!(!stats.is_balanced());
    }
}
