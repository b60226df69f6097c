//! Index relocation after blocks are retired.

use colony_core::SlotIndex;
use smallvec::SmallVec;

/// Maps slot indices from before a retire or shrink to after it.
///
/// Retiring block `k` moves every later block down one position, so
/// each of their indices drops by `block_capacity`. Indices inside a
/// retired block have no image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRemap {
    block_capacity: u64,
    /// Retired ordinals, as numbered before the operation, ascending.
    retired: SmallVec<[u64; 4]>,
}

impl IndexRemap {
    pub(crate) fn new(block_capacity: u64, mut retired: SmallVec<[u64; 4]>) -> Self {
        retired.sort_unstable();
        retired.dedup();
        Self {
            block_capacity,
            retired,
        }
    }

    /// The identity mapping.
    pub fn identity(block_capacity: u64) -> Self {
        Self::new(block_capacity, SmallVec::new())
    }

    /// Whether no block was retired.
    pub fn is_identity(&self) -> bool {
        self.retired.is_empty()
    }

    /// Ordinals retired, as numbered before the operation.
    pub fn retired_blocks(&self) -> &[u64] {
        &self.retired
    }

    /// Where `old` lives now, or `None` if its block was retired.
    pub fn remap(&self, old: SlotIndex) -> Option<SlotIndex> {
        let (ordinal, local) = old.split(self.block_capacity);
        if self.retired.binary_search(&ordinal).is_ok() {
            return None;
        }
        let shift = self.retired.partition_point(|&r| r < ordinal) as u64;
        Some(SlotIndex::join(ordinal - shift, local, self.block_capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn identity_maps_everything_to_itself() {
        let remap = IndexRemap::identity(4);
        assert!(remap.is_identity());
        assert_eq!(remap.remap(SlotIndex(13)), Some(SlotIndex(13)));
    }

    #[test]
    fn later_blocks_shift_down() {
        let remap = IndexRemap::new(4, smallvec![3, 1]);
        assert_eq!(remap.retired_blocks(), &[1, 3]);
        assert_eq!(remap.remap(SlotIndex(2)), Some(SlotIndex(2)));
        assert_eq!(remap.remap(SlotIndex(5)), None);
        assert_eq!(remap.remap(SlotIndex(9)), Some(SlotIndex(5)));
        assert_eq!(remap.remap(SlotIndex(14)), None);
        assert_eq!(remap.remap(SlotIndex(17)), Some(SlotIndex(9)));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn surviving_indices_stay_distinct_and_ordered(
                cap in 1u64..16,
                retired in proptest::collection::vec(0u64..8, 0..4),
                a in 0u64..128,
                b in 0u64..128,
            ) {
                let remap = IndexRemap::new(cap, retired.into_iter().collect());
                if let (Some(x), Some(y)) = (remap.remap(SlotIndex(a)), remap.remap(SlotIndex(b))) {
                    prop_assert_eq!(a.cmp(&b), x.cmp(&y));
                    prop_assert_eq!(a % cap, x.0 % cap);
                }
            }
        }
    }
}
