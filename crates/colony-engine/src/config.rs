//! Colony construction parameters.

use colony_core::{ConfigError, Element, TransactionalStore};

use crate::table;

/// Configuration for [`Colony::create`](crate::Colony::create).
///
/// Only the block capacity is configurable; it is fixed for the life of
/// the colony and persisted with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColonyConfig {
    /// Slots per block. Must be non-zero, and a block's element table
    /// must fit within the store's maximum allocation.
    pub block_capacity: u64,
}

impl ColonyConfig {
    /// Default slots per block.
    pub const DEFAULT_BLOCK_CAPACITY: u64 = 64;

    /// Create a config with the given block capacity.
    pub fn new(block_capacity: u64) -> Self {
        Self { block_capacity }
    }

    /// Check this config against a store for element type `E`.
    ///
    /// Table size counts each slot's liveness tag as well as the element.
    pub fn validate<E: Element, S: TransactionalStore>(&self, store: &S) -> Result<(), ConfigError> {
        if self.block_capacity == 0 {
            return Err(ConfigError::ZeroBlockCapacity);
        }
        let max = store.max_alloc_size();
        let requested = table::table_bytes::<E>(self.block_capacity).unwrap_or(usize::MAX);
        if requested > max {
            return Err(ConfigError::TableTooLarge { requested, max });
        }
        Ok(())
    }
}

impl Default for ColonyConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCK_CAPACITY)
    }
}
