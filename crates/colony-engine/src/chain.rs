//! The block chain: an ordered, doubly-linked list of blocks.
//!
//! Block `k` of the chain holds global slots
//! `k * block_capacity .. (k + 1) * block_capacity`. The chain only grows
//! at the tail; [`retire`] is the single way to remove a block, and it
//! shifts every later block (and every free-index entry pointing into
//! them) down by one block.

use colony_core::{ColonyError, Element, Oid, SlotIndex, TransactionalStore};

use crate::free_block;
use crate::free_index;
use crate::record::{self, BlockRecord, ColonyRecord};
use crate::table::ElementTable;

/// Append a fresh, untouched block at the tail.
pub(crate) fn append<E: Element, S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
) -> Result<(Oid, BlockRecord), ColonyError> {
    let table = ElementTable::<E>::alloc(store, root.block_capacity)?;
    let block = BlockRecord {
        table: table.oid(),
        occupied: 0,
        ordinal: root.block_count,
        last_used: None,
        free_slots: 0,
        prev: root.block_tail,
        next: Oid::NULL,
    };
    let oid = record::create(store, &block)?;

    match root.block_tail.non_null() {
        Some(tail_oid) => {
            let mut tail: BlockRecord = record::load(store, tail_oid)?;
            tail.next = oid;
            record::save(store, tail_oid, &tail)?;
        }
        None => root.block_head = oid,
    }
    root.block_tail = oid;
    root.block_count += 1;
    root.capacity += root.block_capacity;

    tracing::debug!(ordinal = block.ordinal, block = %oid, "block appended");
    Ok((oid, block))
}

/// The block at chain position `ordinal`.
pub(crate) fn by_ordinal<S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
    ordinal: u64,
) -> Result<(Oid, BlockRecord), ColonyError> {
    if ordinal >= root.block_count {
        return Err(ColonyError::NoSuchBlock { ordinal });
    }
    // Walk from whichever end is closer.
    let from_tail = root.block_count - 1 - ordinal;
    let (mut oid, steps, forward) = if ordinal <= from_tail {
        (root.block_head, ordinal, true)
    } else {
        (root.block_tail, from_tail, false)
    };
    let mut block: BlockRecord = record::load(store, oid)?;
    for _ in 0..steps {
        oid = if forward { block.next } else { block.prev };
        block = record::load(store, oid)?;
    }
    if block.ordinal != ordinal {
        return Err(ColonyError::Corrupt {
            detail: format!(
                "block {oid} at position {ordinal} records ordinal {}",
                block.ordinal
            ),
        });
    }
    Ok((oid, block))
}

/// The block containing global slot `index`.
pub(crate) fn by_index<S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
    index: SlotIndex,
) -> Result<(Oid, BlockRecord), ColonyError> {
    if index.0 >= root.capacity {
        return Err(ColonyError::IndexOutOfRange {
            index: index.0,
            capacity: root.capacity,
        });
    }
    by_ordinal(store, root, index.0 / root.block_capacity)
}

/// Every block, head to tail.
pub(crate) fn blocks<S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
) -> Result<Vec<(Oid, BlockRecord)>, ColonyError> {
    let mut out = Vec::new();
    let mut cursor = root.block_head;
    let mut prev = Oid::NULL;
    while let Some(oid) = cursor.non_null() {
        if out.len() as u64 >= root.block_count {
            return Err(ColonyError::Corrupt {
                detail: format!("block chain longer than block_count {}", root.block_count),
            });
        }
        let block: BlockRecord = record::load(store, oid)?;
        if block.prev != prev {
            return Err(ColonyError::Corrupt {
                detail: format!("block {oid} back-link {} != {prev}", block.prev),
            });
        }
        prev = oid;
        cursor = block.next;
        out.push((oid, block));
    }
    Ok(out)
}

/// Remove the vacant block at `oid` from the chain and free it.
///
/// The block must be on the free-block list. Later blocks move down one
/// ordinal and free-index entries past the block are rebased to match.
pub(crate) fn retire<E: Element, S: TransactionalStore>(
    store: &mut S,
    root: &mut ColonyRecord,
    oid: Oid,
    block: BlockRecord,
) -> Result<(), ColonyError> {
    let cap = root.block_capacity;
    if block.free_slots != cap || block.occupied != 0 {
        return Err(ColonyError::BlockNotVacant {
            ordinal: block.ordinal,
        });
    }
    free_block::remove(store, root, oid)?;

    match block.prev.non_null() {
        Some(prev_oid) => {
            let mut prev: BlockRecord = record::load(store, prev_oid)?;
            prev.next = block.next;
            record::save(store, prev_oid, &prev)?;
        }
        None => root.block_head = block.next,
    }
    match block.next.non_null() {
        Some(next_oid) => {
            let mut next: BlockRecord = record::load(store, next_oid)?;
            next.prev = block.prev;
            record::save(store, next_oid, &next)?;
        }
        None => root.block_tail = block.prev,
    }

    let mut cursor = block.next;
    while let Some(later_oid) = cursor.non_null() {
        let mut later: BlockRecord = record::load(store, later_oid)?;
        later.ordinal -= 1;
        record::save(store, later_oid, &later)?;
        cursor = later.next;
    }
    free_index::rebase_after(store, root, block.ordinal)?;

    ElementTable::<E>::at(block.table).free(store)?;
    store.free(oid)?;
    root.block_count -= 1;
    root.capacity -= cap;

    tracing::debug!(ordinal = block.ordinal, block = %oid, "block retired");
    Ok(())
}
