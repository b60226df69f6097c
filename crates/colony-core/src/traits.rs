//! The transactional store abstraction the colony engine is written against.

use crate::error::StoreError;
use crate::id::Oid;

/// A store of fixed-size byte objects with all-or-nothing transactions.
///
/// Every mutation (`alloc`, `free`, `write`, `set_root`) must happen
/// inside a transaction. When the outermost transaction commits, all of
/// its mutations become visible (and durable, for persistent stores)
/// together; when it aborts, none of them survive.
///
/// Transactions nest flatly: `begin()` inside an active transaction only
/// deepens it, the matching inner `commit()` publishes nothing, and an
/// `abort()` at any depth rolls back the whole outermost transaction.
/// After an inner abort the enclosing levels must still be unwound with
/// `abort()` or `commit()` (which then returns [`StoreError::Aborted`]).
pub trait TransactionalStore {
    /// Begin a transaction, or deepen the active one.
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Commit the innermost transaction level.
    ///
    /// Only the outermost commit publishes. On failure the whole
    /// transaction has been rolled back.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Abort the innermost transaction level, rolling back every
    /// mutation since the outermost `begin()`. A no-op when no
    /// transaction is active.
    fn abort(&mut self);

    /// Whether a live (not aborted) transaction is active.
    fn in_transaction(&self) -> bool;

    /// Allocate a zero-filled object of `size` bytes.
    fn alloc(&mut self, size: usize) -> Result<Oid, StoreError>;

    /// Free an object.
    fn free(&mut self, oid: Oid) -> Result<(), StoreError>;

    /// Borrow an object's bytes.
    fn read(&self, oid: Oid) -> Result<&[u8], StoreError>;

    /// Overwrite `bytes.len()` bytes of an object starting at `offset`.
    fn write(&mut self, oid: Oid, offset: usize, bytes: &[u8]) -> Result<(), StoreError>;

    /// The store's root object, or [`Oid::NULL`].
    fn root(&self) -> Oid;

    /// Replace the root object id.
    fn set_root(&mut self, oid: Oid) -> Result<(), StoreError>;

    /// Largest single allocation the store accepts, in bytes.
    fn max_alloc_size(&self) -> usize;

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, aborts when it returns `Err`. A
    /// commit failure is converted into the caller's error type; the
    /// store has already rolled back in that case.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }
}
