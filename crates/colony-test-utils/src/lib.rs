//! Test utilities and fault injection for Colony development.
//!
//! Provides [`FaultyStore`], a [`TransactionalStore`] wrapper that fails
//! chosen operations on demand, consistency assertions, and the seeded
//! workload fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use colony_core::{Element, Oid, StoreError, TransactionalStore};
use colony_engine::{Colony, ColonyConfig};
use colony_pool::{Pool, PoolConfig};

/// A colony over a fresh in-memory pool.
pub fn volatile_colony<E: Element>(block_capacity: u64) -> Colony<E, Pool> {
    Colony::create(
        Pool::volatile(PoolConfig::default()),
        ColonyConfig::new(block_capacity),
    )
    .expect("create colony")
}

/// Panic with the first inconsistency in `colony`.
pub fn assert_consistent<E: Element, S: TransactionalStore>(colony: &Colony<E, S>) {
    if let Err(e) = colony.verify() {
        panic!("colony inconsistent: {e}");
    }
    let stats = colony.stats().expect("stats");
    assert!(stats.is_balanced(), "vacancy accounting off: {stats:?}");
}

/// Wraps a store and fails operations on demand.
///
/// [`fail_after(n)`](FaultyStore::fail_after) lets `n` more mutating
/// calls (`alloc`, `free`, `write`, `set_root`) through and fails the
/// next one with [`StoreError::Injected`]; the budget then disarms.
/// [`fail_next_commit`](FaultyStore::fail_next_commit) makes the next
/// outermost commit roll back and report `CommitFailed`, as a store
/// would when durability fails.
pub struct FaultyStore<S> {
    inner: S,
    budget: Option<u64>,
    fail_commit: bool,
    depth: u32,
    injected: u64,
}

impl<S: TransactionalStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            budget: None,
            fail_commit: false,
            depth: 0,
            injected: 0,
        }
    }

    /// Fail the mutating call after the next `n`.
    pub fn fail_after(&mut self, n: u64) {
        self.budget = Some(n);
    }

    /// Fail the next outermost commit.
    pub fn fail_next_commit(&mut self) {
        self.fail_commit = true;
    }

    /// Cancel any pending fault.
    pub fn disarm(&mut self) {
        self.budget = None;
        self.fail_commit = false;
    }

    /// Faults injected so far.
    pub fn injected(&self) -> u64 {
        self.injected
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn tick(&mut self, operation: &'static str) -> Result<(), StoreError> {
        match self.budget {
            Some(0) => {
                self.budget = None;
                self.injected += 1;
                Err(StoreError::Injected { operation })
            }
            Some(n) => {
                self.budget = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<S: TransactionalStore> TransactionalStore for FaultyStore<S> {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.inner.begin()?;
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.depth == 1 && self.fail_commit {
            self.fail_commit = false;
            self.injected += 1;
            self.depth = 0;
            self.inner.abort();
            return Err(StoreError::CommitFailed {
                reason: "injected commit failure".into(),
            });
        }
        self.depth = self.depth.saturating_sub(1);
        self.inner.commit()
    }

    fn abort(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.inner.abort();
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn alloc(&mut self, size: usize) -> Result<Oid, StoreError> {
        self.tick("alloc")?;
        self.inner.alloc(size)
    }

    fn free(&mut self, oid: Oid) -> Result<(), StoreError> {
        self.tick("free")?;
        self.inner.free(oid)
    }

    fn read(&self, oid: Oid) -> Result<&[u8], StoreError> {
        self.inner.read(oid)
    }

    fn write(&mut self, oid: Oid, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.tick("write")?;
        self.inner.write(oid, offset, bytes)
    }

    fn root(&self) -> Oid {
        self.inner.root()
    }

    fn set_root(&mut self, oid: Oid) -> Result<(), StoreError> {
        self.tick("set_root")?;
        self.inner.set_root(oid)
    }

    fn max_alloc_size(&self) -> usize {
        self.inner.max_alloc_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_fails_exactly_one_call() {
        let mut store = FaultyStore::new(Pool::volatile(PoolConfig::default()));
        store.fail_after(1);
        store.begin().unwrap();
        store.alloc(4).unwrap();
        assert!(matches!(
            store.alloc(4),
            Err(StoreError::Injected { operation: "alloc" })
        ));
        store.alloc(4).unwrap();
        store.commit().unwrap();
        assert_eq!(store.injected(), 1);
        assert_eq!(store.inner().object_count(), 2);
    }

    #[test]
    fn failed_commit_rolls_back() {
        let mut store = FaultyStore::new(Pool::volatile(PoolConfig::default()));
        store.fail_next_commit();
        let err = store.transaction(|s| s.alloc(8)).unwrap_err();
        assert!(matches!(err, StoreError::CommitFailed { .. }));
        assert_eq!(store.inner().object_count(), 0);
        assert!(!store.in_transaction());
        store.transaction(|s| s.alloc(8)).unwrap();
        assert_eq!(store.inner().object_count(), 1);
    }
}
