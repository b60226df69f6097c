//! Undo log for pool transactions.
//!
//! Records just enough to reverse every mutation made since the
//! outermost `begin()`. Replaying the log in reverse restores the
//! object table and root exactly; object ids handed out by aborted
//! allocations are not recycled.

use std::collections::HashSet;

use colony_core::Oid;
use indexmap::IndexMap;

/// A single reversible mutation.
#[derive(Debug)]
enum UndoEntry {
    /// Object created in this transaction.
    Allocated(Oid),
    /// Object freed in this transaction, with its bytes at free time.
    Freed { oid: Oid, bytes: Vec<u8> },
    /// First write to a pre-existing object in this transaction.
    Written { oid: Oid, prior: Vec<u8> },
    /// Root replaced; holds the previous root.
    Root(Oid),
}

/// Per-transaction undo log.
#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    entries: Vec<UndoEntry>,
    /// Objects whose pre-transaction content is already recoverable,
    /// either snapshotted or created in this transaction.
    covered: HashSet<Oid>,
}

impl UndoLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_alloc(&mut self, oid: Oid) {
        self.covered.insert(oid);
        self.entries.push(UndoEntry::Allocated(oid));
    }

    pub(crate) fn record_free(&mut self, oid: Oid, bytes: Vec<u8>) {
        self.entries.push(UndoEntry::Freed { oid, bytes });
    }

    /// Snapshot `current` unless this object is already covered.
    pub(crate) fn record_write(&mut self, oid: Oid, current: &[u8]) {
        if self.covered.insert(oid) {
            self.entries.push(UndoEntry::Written {
                oid,
                prior: current.to_vec(),
            });
        }
    }

    pub(crate) fn record_root(&mut self, prior: Oid) {
        self.entries.push(UndoEntry::Root(prior));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.covered.clear();
    }

    /// Reverse every recorded mutation, newest first.
    ///
    /// Returns the restored live byte total.
    pub(crate) fn rollback(
        &mut self,
        objects: &mut IndexMap<Oid, Vec<u8>>,
        root: &mut Oid,
        mut used_bytes: usize,
    ) -> usize {
        while let Some(entry) = self.entries.pop() {
            match entry {
                UndoEntry::Allocated(oid) => {
                    if let Some(bytes) = objects.swap_remove(&oid) {
                        used_bytes -= bytes.len();
                    }
                }
                UndoEntry::Freed { oid, bytes } => {
                    used_bytes += bytes.len();
                    objects.insert(oid, bytes);
                }
                UndoEntry::Written { oid, prior } => {
                    objects.insert(oid, prior);
                }
                UndoEntry::Root(prior) => *root = prior,
            }
        }
        self.covered.clear();
        used_bytes
    }
}
