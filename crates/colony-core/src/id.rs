//! Strongly-typed identifiers for store objects and colony slots.

use std::fmt;

/// Identifies an object allocated in a [`TransactionalStore`](crate::TransactionalStore).
///
/// Object ids are non-zero and never reused within the lifetime of a
/// store. [`Oid::NULL`] is the "no object" sentinel used for empty
/// links in persisted records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(pub u64);

impl Oid {
    /// The null object id.
    pub const NULL: Oid = Oid(0);

    /// Whether this is the null id.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for the null id, `Some(self)` otherwise.
    pub fn non_null(self) -> Option<Oid> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

impl From<u64> for Oid {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Colony-wide address of one element slot.
///
/// Computed as `ordinal * block_capacity + local_slot`. The index
/// returned by an insert stays valid for as long as the element remains
/// in the colony; only `shrink` relocates live elements, and it reports
/// how through an index remap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub u64);

impl SlotIndex {
    /// Split into `(block ordinal, local slot)` for the given block capacity.
    pub fn split(self, block_capacity: u64) -> (u64, u64) {
        (self.0 / block_capacity, self.0 % block_capacity)
    }

    /// Join a block ordinal and local slot into a global index.
    pub fn join(ordinal: u64, local: u64, block_capacity: u64) -> Self {
        Self(ordinal * block_capacity + local)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SlotIndex {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
