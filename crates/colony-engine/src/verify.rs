//! Structural consistency check over a persisted colony.
//!
//! Walks every list and table and cross-checks them against the root
//! counters. Used by tests after every operation and by
//! [`Colony::verify`](crate::Colony::verify).

use std::collections::{HashMap, HashSet};

use colony_core::{ColonyError, Element, Oid, TransactionalStore};

use crate::chain;
use crate::free_block;
use crate::free_index;
use crate::record::ColonyRecord;
use crate::table::ElementTable;

macro_rules! ensure {
    ($cond:expr, $($fmt:tt)+) => {
        if !$cond {
            return Err(ColonyError::Corrupt {
                detail: format!($($fmt)+),
            });
        }
    };
}

pub(crate) fn check<E: Element, S: TransactionalStore>(
    store: &S,
    root: &ColonyRecord,
) -> Result<(), ColonyError> {
    let cap = root.block_capacity;
    ensure!(cap > 0, "block capacity is zero");
    ensure!(
        cap.checked_mul(root.block_count) == Some(root.capacity),
        "capacity {} != {} blocks of {cap}",
        root.capacity,
        root.block_count
    );
    ensure!(
        root.size <= root.capacity,
        "size {} exceeds capacity {}",
        root.size,
        root.capacity
    );

    let blocks = chain::blocks(store, root)?;
    ensure!(
        blocks.len() as u64 == root.block_count,
        "chain has {} blocks, root says {}",
        blocks.len(),
        root.block_count
    );
    let tail = blocks.last().map_or(Oid::NULL, |(oid, _)| *oid);
    ensure!(
        tail == root.block_tail,
        "chain ends at {tail}, root tail is {}",
        root.block_tail
    );

    let mut position: HashMap<Oid, usize> = HashMap::with_capacity(blocks.len());
    let mut occupied_total = 0;
    for (pos, (oid, block)) in blocks.iter().enumerate() {
        position.insert(*oid, pos);
        ensure!(
            block.ordinal == pos as u64,
            "block {oid} at position {pos} has ordinal {}",
            block.ordinal
        );
        if let Some(last) = block.last_used {
            ensure!(last < cap, "block {pos} last used slot {last} >= {cap}");
        }
        if pos + 1 < blocks.len() {
            ensure!(
                block.last_used == Some(cap - 1),
                "non-tail block {pos} has untouched slots"
            );
        }

        let table = ElementTable::<E>::at(block.table);
        ensure!(
            table.slots(store)? == cap,
            "table of block {pos} does not hold {cap} slots"
        );
        let live = table.live(store)?;
        ensure!(
            live.len() as u64 == block.occupied,
            "block {pos} has {} live slots, records {}",
            live.len(),
            block.occupied
        );
        if let Some(&(local, _)) = live.last() {
            ensure!(
                block.last_used.is_some_and(|l| local <= l),
                "block {pos} has live slot {local} beyond its last used slot"
            );
        }
        let touched = block.next_untouched();
        let vacated = touched.checked_sub(block.occupied);
        ensure!(
            vacated == Some(block.free_slots),
            "block {pos} has {} of {touched} touched slots occupied but free count {}",
            block.occupied,
            block.free_slots
        );
        occupied_total = block
            .occupied
            .checked_add(occupied_total)
            .ok_or_else(|| ColonyError::Corrupt {
                detail: format!("occupied counts overflow at block {pos}"),
            })?;
    }
    ensure!(
        occupied_total == root.size,
        "blocks hold {occupied_total} elements, root size is {}",
        root.size
    );

    let mut tally = vec![0u64; blocks.len()];
    let mut seen = HashSet::new();
    let free = free_index::entries(store, root)?;
    ensure!(
        free.len() as u64 == root.free_idx_count,
        "free-index list has {} entries, root says {}",
        free.len(),
        root.free_idx_count
    );
    for index in free {
        ensure!(
            index.0 < root.capacity,
            "free index {index} beyond capacity {}",
            root.capacity
        );
        ensure!(seen.insert(index), "free index {index} listed twice");
        let (ordinal, local) = index.split(cap);
        let block = &blocks[ordinal as usize].1;
        ensure!(
            block.last_used.is_some_and(|l| local <= l),
            "free index {index} was never handed out"
        );
        ensure!(
            ElementTable::<E>::at(block.table).get(store, local)?.is_none(),
            "free index {index} is live"
        );
        tally[ordinal as usize] += 1;
    }

    let mut listed = vec![false; blocks.len()];
    let free_blocks = free_block::entries(store, root)?;
    ensure!(
        free_blocks.len() as u64 == root.free_block_count,
        "free-block list has {} entries, root says {}",
        free_blocks.len(),
        root.free_block_count
    );
    for block_oid in free_blocks {
        let pos = *position
            .get(&block_oid)
            .ok_or_else(|| ColonyError::Corrupt {
                detail: format!("free-block entry {block_oid} is not in the chain"),
            })?;
        ensure!(!listed[pos], "block {pos} listed free twice");
        listed[pos] = true;
    }

    for (pos, (_, block)) in blocks.iter().enumerate() {
        if listed[pos] {
            ensure!(
                block.free_slots == cap && tally[pos] == 0,
                "listed free block {pos} has {} free slots and {} free-index entries",
                block.free_slots,
                tally[pos]
            );
        } else {
            ensure!(
                block.free_slots < cap,
                "vacant block {pos} is missing from the free-block list"
            );
            ensure!(
                tally[pos] == block.free_slots,
                "block {pos} has {} free-index entries for {} free slots",
                tally[pos],
                block.free_slots
            );
        }
    }
    Ok(())
}
