//! The free-index list: individually vacated slots awaiting reuse.
//!
//! Entries are pushed and popped at the tail, so the most recently
//! vacated slot is reused first. A slot is on this list only while its
//! block is not wholly vacant; once every slot of a block is free the
//! block moves to the free-block list and its entries leave this one.

use colony_core::{ColonyError, Oid, SlotIndex, TransactionalStore};

use crate::chain;
use crate::free_block;
use crate::list;
use crate::record::{self, BlockRecord, ColonyRecord, FreeIndexNode};

/// Record global slot `index` of `block` as reusable.
///
/// When this vacates the block's last slot the block is promoted to the
/// free-block list instead. The caller persists `block`.
pub(crate) fn push<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
    index: SlotIndex,
    block_oid: Oid,
    block: &mut BlockRecord,
) -> Result<(), ColonyError> {
    block.free_slots += 1;
    if block.free_slots == root.block_capacity {
        return free_block::push(store, root, block_oid, block);
    }
    let node = FreeIndexNode {
        index: index.0,
        prev: Oid::NULL,
        next: Oid::NULL,
    };
    list::push_tail(store, &mut root.free_idx_tail, node)?;
    root.free_idx_count += 1;
    Ok(())
}

/// Take the most recently freed slot, with its (updated) block.
///
/// The caller fills the slot and persists the block.
pub(crate) fn pop<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
) -> Result<Option<(SlotIndex, Oid, BlockRecord)>, ColonyError> {
    let Some(tail) = root.free_idx_tail.non_null() else {
        return Ok(None);
    };
    let node: FreeIndexNode = list::unlink(store, &mut root.free_idx_tail, tail)?;
    root.free_idx_count -= 1;

    let index = SlotIndex(node.index);
    let (block_oid, mut block) = chain::by_index(store, root, index)?;
    block.free_slots = block
        .free_slots
        .checked_sub(1)
        .ok_or_else(|| ColonyError::Corrupt {
            detail: format!("free slot {index} in block {} with no free slots", block.ordinal),
        })?;
    Ok(Some((index, block_oid, block)))
}

/// Remove every entry pointing into block `ordinal`.
pub(crate) fn unlink_block<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
    ordinal: u64,
) -> Result<u64, ColonyError> {
    let cap = root.block_capacity;
    let entries: Vec<(Oid, FreeIndexNode)> =
        list::collect(store, root.free_idx_tail, root.free_idx_count)?;
    let mut removed = 0;
    for (oid, node) in entries {
        if node.index / cap == ordinal {
            list::unlink::<FreeIndexNode, _>(store, &mut root.free_idx_tail, oid)?;
            removed += 1;
        }
    }
    root.free_idx_count -= removed;
    Ok(removed)
}

/// Shift entries of blocks after `ordinal` down by one block.
pub(crate) fn rebase_after<S: TransactionalStore>(
    store: &mut S,
    root: &ColonyRecord,
    ordinal: u64,
) -> Result<(), ColonyError> {
    let cap = root.block_capacity;
    let threshold = (ordinal + 1) * cap;
    let entries: Vec<(Oid, FreeIndexNode)> =
        list::collect(store, root.free_idx_tail, root.free_idx_count)?;
    for (oid, mut node) in entries {
        if node.index >= threshold {
            node.index -= cap;
            record::save(store, oid, &node)?;
        }
    }
    Ok(())
}

/// Every free slot, most recently freed first.
pub(crate) fn entries<S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
) -> Result<Vec<SlotIndex>, ColonyError> {
    let nodes: Vec<(Oid, FreeIndexNode)> =
        list::collect(store, root.free_idx_tail, root.free_idx_count)?;
    Ok(nodes.into_iter().map(|(_, n)| SlotIndex(n.index)).collect())
}

/// Free every entry.
pub(crate) fn clear<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
) -> Result<(), ColonyError> {
    list::clear::<FreeIndexNode, _>(store, &mut root.free_idx_tail)?;
    root.free_idx_count = 0;
    Ok(())
}
