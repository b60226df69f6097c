//! Integration test: structural invariants under random operation
//! sequences, checked against a `BTreeMap` model after every step.

use colony_core::SlotIndex;
use colony_test_utils::fixtures::{drive, Model, Workload};
use colony_test_utils::{assert_consistent, volatile_colony};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Step {
    Insert(i32),
    Remove(usize),
    Shrink,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        5 => any::<i32>().prop_map(Step::Insert),
        4 => any::<usize>().prop_map(Step::Remove),
        1 => Just(Step::Shrink),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_sequences_stay_consistent(
        cap in 1u64..6,
        steps in proptest::collection::vec(step(), 1..120),
    ) {
        let mut colony = volatile_colony::<i32>(cap);
        let mut model = Model::new();
        for step in steps {
            match step {
                Step::Insert(v) => {
                    let before = colony.stats().unwrap();
                    let idx = colony.insert(v).unwrap();
                    // Growth only when nothing was vacant.
                    let after = colony.stats().unwrap();
                    prop_assert_eq!(after.capacity > before.capacity, before.size == before.capacity);
                    model.insert(idx, v);
                }
                Step::Remove(n) if !model.is_empty() => {
                    let idx = model.nth(n % model.len());
                    prop_assert_eq!(colony.remove(idx).unwrap(), model.remove(idx));
                    prop_assert_eq!(colony.get(idx).unwrap(), None);
                }
                Step::Remove(_) => {}
                Step::Shrink => {
                    let remap = colony.shrink().unwrap();
                    model.apply(&remap);
                    prop_assert_eq!(colony.stats().unwrap().free_block_count, 0);
                }
            }
            assert_consistent(&colony);
        }
        model.assert_matches(&colony);
    }

    #[test]
    fn reinsert_after_remove_reuses_that_slot(
        cap in 1u64..6,
        n in 1u64..30,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut colony = volatile_colony::<i32>(cap);
        for v in 0..n {
            colony.insert(v as i32).unwrap();
        }
        let victim = SlotIndex(pick.index(n as usize) as u64);
        colony.remove(victim).unwrap();
        prop_assert_eq!(colony.insert(-1).unwrap(), victim);
    }
}

#[test]
fn long_seeded_workloads() {
    for (seed, cap) in [(1, 1), (2, 2), (3, 7), (4, 16)] {
        let mut colony = volatile_colony::<i32>(cap);
        let mut model = Model::new();
        let mut workload = Workload::new(seed).remove_percent(45).shrink_percent(2);
        drive(&mut colony, &mut model, &mut workload, 600);
    }
}
