//! The free-block list: blocks whose every slot is vacant.
//!
//! A listed block keeps `free_slots == block_capacity` and has no
//! entries on the free-index list. Reusing one hands out its slot 0
//! and donates the rest back to the free-index list.

use colony_core::{ColonyError, Oid, SlotIndex, TransactionalStore};

use crate::free_index;
use crate::list;
use crate::record::{self, BlockRecord, ColonyRecord, FreeBlockNode};

/// Promote a wholly vacant block.
pub(crate) fn push<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
    block_oid: Oid,
    block: &BlockRecord,
) -> Result<(), ColonyError> {
    let withdrawn = free_index::unlink_block(store, root, block.ordinal)?;
    let node = FreeBlockNode {
        block: block_oid,
        prev: Oid::NULL,
        next: Oid::NULL,
    };
    list::push_tail(store, &mut root.free_block_tail, node)?;
    root.free_block_count += 1;
    tracing::trace!(ordinal = block.ordinal, withdrawn, "block promoted to free list");
    Ok(())
}

/// Reuse the most recently freed block.
///
/// Returns slot 0 of that block for the caller to fill; slots
/// `1..block_capacity` go back on the free-index list. The caller
/// persists the returned block.
pub(crate) fn pop<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
) -> Result<Option<(SlotIndex, Oid, BlockRecord)>, ColonyError> {
    let Some(tail) = root.free_block_tail.non_null() else {
        return Ok(None);
    };
    let node: FreeBlockNode = list::unlink(store, &mut root.free_block_tail, tail)?;
    root.free_block_count -= 1;

    let block_oid = node.block;
    let mut block: BlockRecord = record::load(store, block_oid)?;
    let cap = root.block_capacity;
    if block.free_slots != cap {
        return Err(ColonyError::Corrupt {
            detail: format!(
                "listed free block {} has {} of {cap} slots free",
                block.ordinal, block.free_slots
            ),
        });
    }
    block.free_slots = 0;
    for local in 1..cap {
        let index = SlotIndex::join(block.ordinal, local, cap);
        free_index::push(store, root, index, block_oid, &mut block)?;
    }
    tracing::trace!(ordinal = block.ordinal, "free block reused");
    Ok(Some((
        SlotIndex::join(block.ordinal, 0, cap),
        block_oid,
        block,
    )))
}

/// Drop `block_oid` from the list, wherever it sits.
pub(crate) fn remove<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
    block_oid: Oid,
) -> Result<(), ColonyError> {
    let nodes: Vec<(Oid, FreeBlockNode)> =
        list::collect(store, root.free_block_tail, root.free_block_count)?;
    let (oid, _) = nodes
        .into_iter()
        .find(|(_, n)| n.block == block_oid)
        .ok_or_else(|| ColonyError::Corrupt {
            detail: format!("vacant block {block_oid} missing from the free-block list"),
        })?;
    list::unlink::<FreeBlockNode, _>(store, &mut root.free_block_tail, oid)?;
    root.free_block_count -= 1;
    Ok(())
}

/// Every listed block, most recently freed first.
pub(crate) fn entries<S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
) -> Result<Vec<Oid>, ColonyError> {
    let nodes: Vec<(Oid, FreeBlockNode)> =
        list::collect(store, root.free_block_tail, root.free_block_count)?;
    Ok(nodes.into_iter().map(|(_, n)| n.block).collect())
}

/// Free every entry. The blocks themselves are untouched.
pub(crate) fn clear<S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
) -> Result<(), ColonyError> {
    list::clear::<FreeBlockNode, _>(store, &mut root.free_block_tail)?;
    root.free_block_count = 0;
    Ok(())
}
