//! The colony handle.

use std::marker::PhantomData;

use colony_core::{ColonyError, Element, Oid, SlotIndex, TransactionalStore};
use smallvec::{smallvec, SmallVec};

use crate::chain;
use crate::config::ColonyConfig;
use crate::free_block;
use crate::free_index;
use crate::record::{self, BlockRecord, ColonyRecord};
use crate::remap::IndexRemap;
use crate::stats::ColonyStats;
use crate::table::ElementTable;
use crate::verify;

/// A persistent, segmented, hole-tolerant container of `E` values.
///
/// Elements live in fixed-capacity blocks chained in order; the slot an
/// element is inserted into never moves, so the returned [`SlotIndex`]
/// stays valid until the element is removed (or [`shrink`](Self::shrink)
/// relocates it and says so). Vacated slots are reused before the
/// colony grows.
///
/// All state lives in store objects reachable from the store root. The
/// handle caches nothing but the root id and block capacity, so every
/// mutating call is a single store transaction: it either happens
/// completely or not at all, even when the process dies mid-call.
///
/// Calls compose with an enclosing transaction: wrap several operations
/// in `store_mut().begin()` / `commit()` to make them atomic together.
/// A call rejected for a bad argument (out-of-range index, hole,
/// occupied or missing block) leaves the enclosing transaction intact.
pub struct Colony<E: Element, S: TransactionalStore> {
    store: S,
    root: Oid,
    block_capacity: u64,
    _element: PhantomData<E>,
}

impl<E: Element, S: TransactionalStore> Colony<E, S> {
    /// Create an empty colony in `store` and make it the store root.
    ///
    /// No blocks are allocated until the first insert.
    ///
    /// # Errors
    ///
    /// `Config` if the block capacity is zero or a block's table would
    /// exceed the store's largest allocation, `RootOccupied` if the store
    /// already has a root, `Transaction` if the store rejects the write.
    pub fn create(mut store: S, config: ColonyConfig) -> Result<Self, ColonyError> {
        config.validate::<E, S>(&store)?;
        if let Some(existing) = store.root().non_null() {
            return Err(ColonyError::RootOccupied { root: existing });
        }
        let block_capacity = config.block_capacity;
        let root = store
            .transaction(|s| {
                let oid = record::create(s, &ColonyRecord::empty(E::KIND, block_capacity))?;
                s.set_root(oid)?;
                Ok::<_, ColonyError>(oid)
            })
            .inspect_err(|e| tracing::warn!(op = "create", error = %e, "colony transaction aborted"))?;
        tracing::debug!(kind = %E::KIND, block_capacity, root = %root, "colony created");
        Ok(Self {
            store,
            root,
            block_capacity,
            _element: PhantomData,
        })
    }

    /// Reattach to the colony at the store root.
    ///
    /// # Errors
    ///
    /// `NoColony` if the store has no root, `KindMismatch` if the colony
    /// holds a different element kind, `Corrupt` if the root object is
    /// not a colony record.
    pub fn open(store: S) -> Result<Self, ColonyError> {
        let root = store.root().non_null().ok_or(ColonyError::NoColony)?;
        let rec: ColonyRecord = record::load(&store, root)?;
        if rec.kind != E::KIND {
            return Err(ColonyError::KindMismatch {
                expected: E::KIND,
                found: rec.kind,
            });
        }
        if rec.block_capacity == 0 {
            return Err(ColonyError::Corrupt {
                detail: "block capacity is zero".into(),
            });
        }
        tracing::debug!(
            kind = %rec.kind,
            block_capacity = rec.block_capacity,
            size = rec.size,
            blocks = rec.block_count,
            "colony opened"
        );
        Ok(Self {
            store,
            root,
            block_capacity: rec.block_capacity,
            _element: PhantomData,
        })
    }

    /// [`open`](Self::open) if the store has a root, otherwise
    /// [`create`](Self::create). An existing colony keeps its own block
    /// capacity.
    pub fn open_or_create(store: S, config: ColonyConfig) -> Result<Self, ColonyError> {
        if store.root().is_null() {
            Self::create(store, config)
        } else {
            Self::open(store)
        }
    }

    // ── Mutation ────────────────────────────────────────────────

    /// Insert `value`, returning its stable index.
    ///
    /// Slot choice, in order: a fresh block when the colony is full, the
    /// most recently freed slot, slot 0 of the most recently vacated
    /// block, and finally the next untouched slot of the tail block.
    pub fn insert(&mut self, value: E) -> Result<SlotIndex, ColonyError> {
        self.mutate("insert", |s, root| {
            let cap = root.block_capacity;
            let (index, block_oid, mut block) = if root.size == root.capacity {
                let (oid, block) = chain::append::<E, _>(s, root)?;
                (SlotIndex::join(block.ordinal, 0, cap), oid, block)
            } else if let Some((index, block_oid, block)) = free_index::pop(s, root)? {
                tracing::trace!(%index, "reusing freed slot");
                (index, block_oid, block)
            } else if let Some(slot) = free_block::pop(s, root)? {
                slot
            } else {
                let tail_oid = root.block_tail;
                let tail: BlockRecord = record::load(s, tail_oid)?;
                let local = tail.next_untouched();
                if local >= cap {
                    return Err(ColonyError::Corrupt {
                        detail: format!(
                            "size {} < capacity {} but no vacant slot is tracked",
                            root.size, root.capacity
                        ),
                    });
                }
                (SlotIndex::join(tail.ordinal, local, cap), tail_oid, tail)
            };

            let (_, local) = index.split(cap);
            let table = ElementTable::<E>::at(block.table);
            if table.get(s, local)?.is_some() {
                return Err(ColonyError::Corrupt {
                    detail: format!("slot {index} chosen for insert is already live"),
                });
            }
            table.put(s, local, value)?;
            block.occupied += 1;
            block.last_used = Some(block.last_used.map_or(local, |l| l.max(local)));
            record::save(s, block_oid, &block)?;
            root.size += 1;
            Ok(index)
        })
    }

    /// Remove the element at `index`, returning it.
    ///
    /// The slot becomes a hole; no other element moves.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if `index` is beyond the colony's capacity,
    /// `NotOccupied` if the slot holds no element.
    pub fn remove(&mut self, index: SlotIndex) -> Result<E, ColonyError> {
        if self.get(index)?.is_none() {
            return Err(ColonyError::NotOccupied { index: index.0 });
        }
        self.mutate("remove", |s, root| {
            let (block_oid, mut block) = chain::by_index(s, root, index)?;
            let (_, local) = index.split(root.block_capacity);
            let table = ElementTable::<E>::at(block.table);
            let value = table
                .get(s, local)?
                .ok_or(ColonyError::NotOccupied { index: index.0 })?;
            table.clear(s, local)?;
            block.occupied -= 1;
            root.size -= 1;
            free_index::push(s, root, index, block_oid, &mut block)?;
            record::save(s, block_oid, &block)?;
            Ok(value)
        })
    }

    /// Retire the wholly vacant block at `ordinal`, returning its storage
    /// to the store.
    ///
    /// Every later block moves down one position; the returned remap
    /// translates indices held from before the call.
    ///
    /// # Errors
    ///
    /// `NoSuchBlock` if there is no such block, `BlockNotVacant` unless
    /// the block is on the free-block list.
    pub fn retire(&mut self, ordinal: u64) -> Result<IndexRemap, ColonyError> {
        let root = self.load_root()?;
        let (_, block) = chain::by_ordinal(&self.store, &root, ordinal)?;
        if block.free_slots != root.block_capacity || block.occupied != 0 {
            return Err(ColonyError::BlockNotVacant { ordinal });
        }
        self.mutate("retire", |s, root| {
            let (oid, block) = chain::by_ordinal(s, root, ordinal)?;
            chain::retire::<E, _>(s, root, oid, block)?;
            Ok(IndexRemap::new(root.block_capacity, smallvec![ordinal]))
        })
    }

    /// Retire every wholly vacant block in one transaction.
    ///
    /// This is the only operation that relocates live elements; the
    /// returned remap says where each old index went.
    pub fn shrink(&mut self) -> Result<IndexRemap, ColonyError> {
        let remap = self.mutate("shrink", |s, root| {
            let mut targets: SmallVec<[(u64, Oid); 4]> = SmallVec::new();
            for block_oid in free_block::entries(s, root)? {
                let block: BlockRecord = record::load(s, block_oid)?;
                targets.push((block.ordinal, block_oid));
            }
            // Highest first, so pending ordinals are not shifted.
            targets.sort_unstable_by(|a, b| b.0.cmp(&a.0));
            for &(_, oid) in &targets {
                let block: BlockRecord = record::load(s, oid)?;
                chain::retire::<E, _>(s, root, oid, block)?;
            }
            Ok(IndexRemap::new(
                root.block_capacity,
                targets.iter().map(|&(ordinal, _)| ordinal).collect(),
            ))
        })?;
        tracing::debug!(retired = remap.retired_blocks().len(), "colony shrunk");
        Ok(remap)
    }

    /// Free every block, table and list node, then the colony record.
    ///
    /// Clears the store root if it named this colony. Afterwards every
    /// call except the store accessors fails with `NoColony`.
    pub fn destroy(&mut self) -> Result<(), ColonyError> {
        let root_oid = self.live_root()?;
        self.store
            .transaction(|s| {
                let mut root: ColonyRecord = record::load(s, root_oid)?;
                free_index::clear(s, &mut root)?;
                free_block::clear(s, &mut root)?;
                for (oid, block) in chain::blocks(s, &root)? {
                    ElementTable::<E>::at(block.table).free(s)?;
                    s.free(oid)?;
                }
                if s.root() == root_oid {
                    s.set_root(Oid::NULL)?;
                }
                s.free(root_oid)?;
                Ok::<_, ColonyError>(())
            })
            .inspect_err(|e| tracing::warn!(op = "destroy", error = %e, "colony transaction aborted"))?;
        self.root = Oid::NULL;
        tracing::debug!(root = %root_oid, "colony destroyed");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    /// The element at `index`, or `None` for a hole.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` if `index` is beyond the colony's capacity.
    pub fn get(&self, index: SlotIndex) -> Result<Option<E>, ColonyError> {
        let root = self.load_root()?;
        let (_, block) = chain::by_index(&self.store, &root, index)?;
        ElementTable::<E>::at(block.table).get(&self.store, index.0 % root.block_capacity)
    }

    /// Whether `index` holds an element. Out-of-range indices do not.
    pub fn contains(&self, index: SlotIndex) -> Result<bool, ColonyError> {
        match self.get(index) {
            Ok(value) => Ok(value.is_some()),
            Err(ColonyError::IndexOutOfRange { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Every live element with its index, in index order.
    pub fn entries(&self) -> Result<Vec<(SlotIndex, E)>, ColonyError> {
        let root = self.load_root()?;
        let mut out = Vec::with_capacity(root.size as usize);
        for (_, block) in chain::blocks(&self.store, &root)? {
            for (local, value) in ElementTable::<E>::at(block.table).live(&self.store)? {
                out.push((SlotIndex::join(block.ordinal, local, root.block_capacity), value));
            }
        }
        Ok(out)
    }

    /// Live elements.
    pub fn len(&self) -> Result<u64, ColonyError> {
        Ok(self.load_root()?.size)
    }

    /// Whether the colony holds no elements.
    pub fn is_empty(&self) -> Result<bool, ColonyError> {
        Ok(self.len()? == 0)
    }

    /// Total slots across all blocks.
    pub fn capacity(&self) -> Result<u64, ColonyError> {
        Ok(self.load_root()?.capacity)
    }

    /// Slots per block.
    pub fn block_capacity(&self) -> u64 {
        self.block_capacity
    }

    /// Current counters.
    pub fn stats(&self) -> Result<ColonyStats, ColonyError> {
        let root = self.load_root()?;
        let untouched_tail_slots = match root.block_tail.non_null() {
            Some(tail_oid) => {
                let tail: BlockRecord = record::load(&self.store, tail_oid)?;
                root.block_capacity - tail.next_untouched()
            }
            None => 0,
        };
        Ok(ColonyStats {
            kind: root.kind,
            size: root.size,
            capacity: root.capacity,
            block_count: root.block_count,
            block_capacity: root.block_capacity,
            free_idx_count: root.free_idx_count,
            free_block_count: root.free_block_count,
            untouched_tail_slots,
        })
    }

    /// Indices on the free-index list, next to be reused first.
    pub fn free_indices(&self) -> Result<Vec<SlotIndex>, ColonyError> {
        free_index::entries(&self.store, &self.load_root()?)
    }

    /// Ordinals of wholly vacant blocks, next to be reused first.
    pub fn free_blocks(&self) -> Result<Vec<u64>, ColonyError> {
        let root = self.load_root()?;
        free_block::entries(&self.store, &root)?
            .into_iter()
            .map(|oid| record::load::<BlockRecord, _>(&self.store, oid).map(|b| b.ordinal))
            .collect()
    }

    /// Cross-check every list and table against the root counters.
    ///
    /// # Errors
    ///
    /// `Corrupt` describing the first inconsistency found.
    pub fn verify(&self) -> Result<(), ColonyError> {
        verify::check::<E, S>(&self.store, &self.load_root()?)
    }

    // ── Store access ────────────────────────────────────────────

    /// The colony record's object id, or null after `destroy`.
    pub fn root_oid(&self) -> Oid {
        self.root
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The underlying store, for composing outer transactions.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Release the handle, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    // ── Internals ───────────────────────────────────────────────

    fn live_root(&self) -> Result<Oid, ColonyError> {
        self.root.non_null().ok_or(ColonyError::NoColony)
    }

    fn load_root(&self) -> Result<ColonyRecord, ColonyError> {
        record::load(&self.store, self.live_root()?)
    }

    /// Run `f` on the root record inside one transaction, persisting the
    /// record if `f` succeeds.
    ///
    /// Any error from `f` aborts, and with flat nesting that includes an
    /// enclosing transaction. Caller mistakes are therefore rejected
    /// before this is reached; errors raised in here mean the store failed
    /// or the structure is corrupt.
    fn mutate<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut S, &mut ColonyRecord) -> Result<T, ColonyError>,
    ) -> Result<T, ColonyError> {
        let root_oid = self.live_root()?;
        self.store
            .transaction(|s| {
                let mut root: ColonyRecord = record::load(s, root_oid)?;
                let value = f(s, &mut root)?;
                record::save(s, root_oid, &root)?;
                Ok(value)
            })
            .inspect_err(|e| {
                if let ColonyError::Transaction(cause) = e {
                    tracing::warn!(op, error = %cause, "colony transaction aborted");
                }
            })
    }
}

impl<E: Element, S: TransactionalStore> std::fmt::Debug for Colony<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Colony")
            .field("kind", &E::KIND)
            .field("root", &self.root)
            .field("block_capacity", &self.block_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::ElementKind;
    use colony_pool::{Pool, PoolConfig};

    fn colony(cap: u64) -> Colony<i32, Pool> {
        Colony::create(Pool::volatile(PoolConfig::default()), ColonyConfig::new(cap)).unwrap()
    }

    #[test]
    fn create_is_empty_and_rooted() {
        let c = colony(4);
        assert_eq!(c.store().root(), c.root_oid());
        let stats = c.stats().unwrap();
        assert_eq!(stats.kind, ElementKind::Scalar);
        assert_eq!((stats.size, stats.capacity, stats.block_count), (0, 0, 0));
        assert!(c.is_empty().unwrap());
        c.verify().unwrap();
    }

    #[test]
    fn create_refuses_occupied_root() {
        let c = colony(4);
        let store = c.into_store();
        let root = store.root();
        let err = Colony::<i32, _>::create(store, ColonyConfig::new(4)).unwrap_err();
        assert!(matches!(err, ColonyError::RootOccupied { root: r } if r == root));
    }

    #[test]
    fn sequential_inserts_fill_blocks_in_order() {
        let mut c = colony(2);
        let idx: Vec<u64> = (0..5).map(|v| c.insert(v).unwrap().0).collect();
        assert_eq!(idx, vec![0, 1, 2, 3, 4]);
        let stats = c.stats().unwrap();
        assert_eq!(stats.block_count, 3);
        assert_eq!(stats.untouched_tail_slots, 1);
        assert!(stats.is_balanced());
        c.verify().unwrap();
    }

    #[test]
    fn remove_leaves_hole_and_returns_value() {
        let mut c = colony(4);
        let a = c.insert(10).unwrap();
        let b = c.insert(20).unwrap();
        assert_eq!(c.remove(a).unwrap(), 10);
        assert_eq!(c.get(a).unwrap(), None);
        assert_eq!(c.get(b).unwrap(), Some(20));
        assert_eq!(c.free_indices().unwrap(), vec![a]);
        c.verify().unwrap();
    }

    #[test]
    fn remove_rejects_holes_and_out_of_range() {
        let mut c = colony(4);
        let a = c.insert(1).unwrap();
        c.remove(a).unwrap();
        assert!(matches!(
            c.remove(a),
            Err(ColonyError::NotOccupied { index: 0 })
        ));
        // Untouched slot in range.
        assert!(matches!(
            c.remove(SlotIndex(3)),
            Err(ColonyError::NotOccupied { index: 3 })
        ));
        assert!(matches!(
            c.remove(SlotIndex(4)),
            Err(ColonyError::IndexOutOfRange {
                index: 4,
                capacity: 4
            })
        ));
        assert!(!c.contains(SlotIndex(99)).unwrap());
        c.verify().unwrap();
    }

    #[test]
    fn freed_slots_reused_most_recent_first() {
        let mut c = colony(4);
        for v in 0..4 {
            c.insert(v).unwrap();
        }
        c.remove(SlotIndex(1)).unwrap();
        c.remove(SlotIndex(2)).unwrap();
        assert_eq!(c.insert(7).unwrap(), SlotIndex(2));
        assert_eq!(c.insert(8).unwrap(), SlotIndex(1));
        assert_eq!(c.stats().unwrap().capacity, 4);
        c.verify().unwrap();
    }

    #[test]
    fn emptied_block_is_promoted_then_reused() {
        let mut c = colony(2);
        for v in 0..3 {
            c.insert(v).unwrap();
        }
        c.remove(SlotIndex(0)).unwrap();
        c.remove(SlotIndex(1)).unwrap();
        let stats = c.stats().unwrap();
        assert_eq!(stats.free_idx_count, 0);
        assert_eq!(stats.free_block_count, 1);
        assert_eq!(c.free_blocks().unwrap(), vec![0]);
        c.verify().unwrap();

        assert_eq!(c.insert(9).unwrap(), SlotIndex(0));
        assert_eq!(c.free_indices().unwrap(), vec![SlotIndex(1)]);
        assert_eq!(c.stats().unwrap().free_block_count, 0);
        c.verify().unwrap();
    }

    #[test]
    fn single_slot_blocks() {
        let mut c = colony(1);
        let a = c.insert(1).unwrap();
        let b = c.insert(2).unwrap();
        c.remove(a).unwrap();
        assert_eq!(c.free_blocks().unwrap(), vec![0]);
        assert_eq!(c.insert(3).unwrap(), a);
        assert_eq!(c.get(b).unwrap(), Some(2));
        c.verify().unwrap();
    }

    #[test]
    fn retire_shifts_later_blocks() {
        let mut c = colony(2);
        for v in 0..6 {
            c.insert(v).unwrap();
        }
        c.remove(SlotIndex(2)).unwrap();
        c.remove(SlotIndex(3)).unwrap();
        c.remove(SlotIndex(5)).unwrap();
        let remap = c.retire(1).unwrap();
        assert_eq!(remap.remap(SlotIndex(4)), Some(SlotIndex(2)));
        assert_eq!(c.get(SlotIndex(2)).unwrap(), Some(4));
        assert_eq!(c.free_indices().unwrap(), vec![SlotIndex(3)]);
        assert_eq!(c.capacity().unwrap(), 4);
        c.verify().unwrap();
    }

    #[test]
    fn retire_rejects_occupied_and_missing_blocks() {
        let mut c = colony(2);
        c.insert(1).unwrap();
        assert!(matches!(
            c.retire(0),
            Err(ColonyError::BlockNotVacant { ordinal: 0 })
        ));
        assert!(matches!(
            c.retire(3),
            Err(ColonyError::NoSuchBlock { ordinal: 3 })
        ));
        c.verify().unwrap();
    }

    #[test]
    fn destroy_frees_everything() {
        let mut c = colony(2);
        for v in 0..5 {
            c.insert(v).unwrap();
        }
        c.remove(SlotIndex(0)).unwrap();
        c.remove(SlotIndex(2)).unwrap();
        c.remove(SlotIndex(3)).unwrap();
        c.destroy().unwrap();
        assert!(c.root_oid().is_null());
        assert!(matches!(c.len(), Err(ColonyError::NoColony)));
        assert!(matches!(c.destroy(), Err(ColonyError::NoColony)));
        let store = c.into_store();
        assert_eq!(store.object_count(), 0);
        assert!(store.root().is_null());
    }

    #[test]
    fn open_checks_kind() {
        let mut c = colony(3);
        let idx = c.insert(42).unwrap();
        let store = c.into_store();
        let err = Colony::<Oid, _>::open(store).unwrap_err();
        assert!(matches!(
            err,
            ColonyError::KindMismatch {
                expected: ElementKind::OpaqueRef,
                found: ElementKind::Scalar
            }
        ));

        let mut c = colony(3);
        c.insert(1).unwrap();
        let reopened = Colony::<i32, _>::open(c.into_store()).unwrap();
        assert_eq!(reopened.block_capacity(), 3);
        assert_eq!(reopened.get(idx).unwrap(), Some(1));
    }

    #[test]
    fn open_without_root_reports_no_colony() {
        let err = Colony::<i32, _>::open(Pool::volatile(PoolConfig::default())).unwrap_err();
        assert!(matches!(err, ColonyError::NoColony));
    }

    fn tamper_root(c: &mut Colony<i32, Pool>, f: impl FnOnce(&mut ColonyRecord)) {
        let root_oid = c.root_oid();
        let store = c.store_mut();
        store.begin().unwrap();
        let mut rec: ColonyRecord = record::load(store, root_oid).unwrap();
        f(&mut rec);
        record::save(store, root_oid, &rec).unwrap();
        store.commit().unwrap();
    }

    #[test]
    fn verify_reports_overflowing_capacity_as_corrupt() {
        let mut c = colony(2);
        c.insert(1).unwrap();
        tamper_root(&mut c, |rec| rec.block_count = u64::MAX / 2 + 1);
        assert!(matches!(c.verify(), Err(ColonyError::Corrupt { .. })));
    }

    #[test]
    fn verify_survives_huge_block_count() {
        let mut c = colony(2);
        c.insert(1).unwrap();
        tamper_root(&mut c, |rec| {
            rec.block_count = u64::MAX / 2;
            rec.capacity = rec.block_count * 2;
        });
        let err = c.verify().unwrap_err();
        assert!(
            matches!(&err, ColonyError::Corrupt { detail } if detail.contains("chain has 1 blocks")),
            "got {err:?}"
        );
    }
}
