//! Seeded workloads and a reference model for colony tests.
//!
//! [`Workload`] draws a deterministic stream of operations from a
//! ChaCha8 RNG; [`Model`] shadows the live contents in a `BTreeMap` so
//! tests can compare the colony against something obviously correct.

use std::collections::BTreeMap;

use colony_core::{SlotIndex, TransactionalStore};
use colony_engine::{Colony, IndexRemap};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::assert_consistent;

/// One step of a workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Insert this value.
    Insert(i32),
    /// Remove the n-th live element in index order (modulo the live count).
    Remove(usize),
    /// Retire every vacant block.
    Shrink,
}

/// Deterministic operation stream.
pub struct Workload {
    rng: ChaCha8Rng,
    remove_percent: u64,
    shrink_percent: u64,
}

impl Workload {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            remove_percent: 40,
            shrink_percent: 0,
        }
    }

    /// Share of steps that remove, when anything is live.
    pub fn remove_percent(mut self, percent: u64) -> Self {
        self.remove_percent = percent.min(100);
        self
    }

    /// Share of steps that shrink.
    pub fn shrink_percent(mut self, percent: u64) -> Self {
        self.shrink_percent = percent.min(100);
        self
    }

    pub fn next_op(&mut self, live: usize) -> Op {
        let roll = self.rng.next_u64() % 100;
        let pick = self.rng.next_u64();
        if roll < self.shrink_percent {
            Op::Shrink
        } else if live > 0 && roll < self.shrink_percent + self.remove_percent {
            Op::Remove(pick as usize % live)
        } else {
            Op::Insert(pick as i32)
        }
    }
}

/// Shadow of a colony's live contents.
#[derive(Default, Debug)]
pub struct Model {
    live: BTreeMap<SlotIndex, i32>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn insert(&mut self, index: SlotIndex, value: i32) {
        let prev = self.live.insert(index, value);
        assert!(prev.is_none(), "insert returned live index {index}");
    }

    pub fn remove(&mut self, index: SlotIndex) -> i32 {
        self.live.remove(&index).expect("removed index was live")
    }

    /// The n-th live index in index order.
    pub fn nth(&self, n: usize) -> SlotIndex {
        *self.live.keys().nth(n).expect("nth live index")
    }

    /// Relocate every index through `remap`.
    pub fn apply(&mut self, remap: &IndexRemap) {
        let old = std::mem::take(&mut self.live);
        for (index, value) in old {
            let moved = remap.remap(index).expect("live element in a retired block");
            self.live.insert(moved, value);
        }
    }

    /// Panic unless the colony holds exactly the modelled elements.
    pub fn assert_matches<S: TransactionalStore>(&self, colony: &Colony<i32, S>) {
        let actual: Vec<(SlotIndex, i32)> = colony.entries().expect("entries");
        let expected: Vec<(SlotIndex, i32)> = self.live.iter().map(|(&k, &v)| (k, v)).collect();
        assert_eq!(actual, expected);
        assert_eq!(colony.len().expect("len"), self.live.len() as u64);
    }
}

/// Run `steps` workload operations, checking consistency after each.
pub fn drive<S: TransactionalStore>(
    colony: &mut Colony<i32, S>,
    model: &mut Model,
    workload: &mut Workload,
    steps: usize,
) {
    for _ in 0..steps {
        match workload.next_op(model.len()) {
            Op::Insert(value) => {
                let index = colony.insert(value).expect("insert");
                model.insert(index, value);
            }
            Op::Remove(n) => {
                let index = model.nth(n);
                let value = colony.remove(index).expect("remove");
                assert_eq!(value, model.remove(index));
            }
            Op::Shrink => {
                let remap = colony.shrink().expect("shrink");
                model.apply(&remap);
            }
        }
        assert_consistent(colony);
    }
    model.assert_matches(colony);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_ops() {
        let mut a = Workload::new(7);
        let mut b = Workload::new(7);
        for live in 0..32 {
            assert_eq!(a.next_op(live), b.next_op(live));
        }
    }

    #[test]
    fn nothing_removed_from_empty() {
        let mut w = Workload::new(1).remove_percent(100);
        assert!(matches!(w.next_op(0), Op::Insert(_)));
        assert!(matches!(w.next_op(3), Op::Remove(n) if n < 3));
    }

    #[test]
    fn drive_small_colony() {
        let mut colony = crate::volatile_colony::<i32>(3);
        let mut model = Model::new();
        let mut workload = Workload::new(11).shrink_percent(5);
        drive(&mut colony, &mut model, &mut workload, 200);
    }
}
