//! Error types for the Colony workspace.
//!
//! Organised by layer: [`StoreError`] for the transactional store,
//! [`ConfigError`] for colony construction, and [`ColonyError`] for the
//! container operations, which wraps the other two.

use std::error::Error;
use std::fmt;
use std::io;

use crate::element::ElementKind;
use crate::id::Oid;

/// Errors from a [`TransactionalStore`](crate::TransactionalStore).
///
/// Any `StoreError` surfaced from inside a transaction causes that
/// transaction to be aborted; the store is left exactly as it was
/// before the outermost `begin()`.
#[derive(Debug)]
pub enum StoreError {
    /// A mutating call was made outside of an active transaction.
    NotInTransaction,
    /// `commit()` without a matching `begin()`.
    NoActiveTransaction,
    /// A nested transaction aborted; the enclosing transaction can only
    /// be unwound, not committed or extended.
    Aborted,
    /// A single allocation exceeds the store's maximum object size.
    AllocTooLarge {
        /// Bytes requested.
        requested: usize,
        /// Largest single allocation the store accepts.
        max: usize,
    },
    /// The store has no room for the requested allocation.
    OutOfSpace {
        /// Bytes requested.
        requested: usize,
        /// Total store capacity in bytes.
        capacity: usize,
    },
    /// The object id does not name a live object.
    InvalidOid {
        /// The offending id.
        oid: Oid,
    },
    /// A read or write extends past the end of an object.
    OutOfBounds {
        /// The object accessed.
        oid: Oid,
        /// Start offset of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Size of the object.
        size: usize,
    },
    /// The outermost commit could not be made durable; the transaction
    /// was rolled back.
    CommitFailed {
        /// Description of the failure.
        reason: String,
    },
    /// A failure injected by a test harness.
    Injected {
        /// The store operation that was failed.
        operation: &'static str,
    },
    /// The persisted image is malformed.
    Corrupt {
        /// Description of what went wrong.
        detail: String,
    },
    /// The persisted image was written for a different layout.
    LayoutMismatch {
        /// Layout the caller asked for.
        expected: String,
        /// Layout recorded in the image.
        found: String,
    },
    /// An I/O error occurred while opening or persisting the store.
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInTransaction => write!(f, "operation requires an active transaction"),
            Self::NoActiveTransaction => write!(f, "no active transaction"),
            Self::Aborted => write!(f, "transaction already aborted"),
            Self::AllocTooLarge { requested, max } => {
                write!(
                    f,
                    "allocation too large: requested {requested} bytes, max {max} bytes"
                )
            }
            Self::OutOfSpace {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "store out of space: requested {requested} bytes, capacity {capacity} bytes"
                )
            }
            Self::InvalidOid { oid } => write!(f, "invalid object id {oid}"),
            Self::OutOfBounds {
                oid,
                offset,
                len,
                size,
            } => {
                write!(
                    f,
                    "access out of bounds: object {oid} has {size} bytes, \
                     accessed {len} bytes at offset {offset}"
                )
            }
            Self::CommitFailed { reason } => write!(f, "commit failed: {reason}"),
            Self::Injected { operation } => write!(f, "injected failure in {operation}"),
            Self::Corrupt { detail } => write!(f, "corrupt store image: {detail}"),
            Self::LayoutMismatch { expected, found } => {
                write!(f, "layout mismatch: expected '{expected}', found '{found}'")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors detected while validating a colony configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Blocks must hold at least one element.
    ZeroBlockCapacity,
    /// One block's element table would exceed the store's maximum
    /// single allocation.
    TableTooLarge {
        /// Table size in bytes for the requested capacity.
        requested: usize,
        /// Largest single allocation the store accepts.
        max: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBlockCapacity => write!(f, "block capacity must be at least 1"),
            Self::TableTooLarge { requested, max } => {
                write!(
                    f,
                    "element table of {requested} bytes exceeds max allocation of {max} bytes"
                )
            }
        }
    }
}

impl Error for ConfigError {}

/// Errors from colony operations.
#[derive(Debug)]
pub enum ColonyError {
    /// The colony configuration is invalid; nothing was created.
    Config(ConfigError),
    /// The index is at or beyond the colony's capacity. No mutation
    /// was performed.
    IndexOutOfRange {
        /// The requested index.
        index: u64,
        /// Colony capacity at the time of the call.
        capacity: u64,
    },
    /// The slot at this index holds no live element.
    NotOccupied {
        /// The requested index.
        index: u64,
    },
    /// The persisted colony holds a different element kind.
    KindMismatch {
        /// Kind of the handle type.
        expected: ElementKind,
        /// Kind recorded in the store.
        found: ElementKind,
    },
    /// The store root does not point at a colony.
    NoColony,
    /// The store root already points at an object; creating a colony
    /// would orphan it.
    RootOccupied {
        /// The existing root.
        root: Oid,
    },
    /// No block has this ordinal.
    NoSuchBlock {
        /// The requested ordinal.
        ordinal: u64,
    },
    /// The block still holds live or untracked slots and cannot be retired.
    BlockNotVacant {
        /// Ordinal of the block.
        ordinal: u64,
    },
    /// A persisted record failed validation.
    Corrupt {
        /// Description of the inconsistency.
        detail: String,
    },
    /// The store could not apply the operation's transaction. The colony
    /// is unchanged.
    Transaction(StoreError),
}

impl fmt::Display for ColonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid colony config: {e}"),
            Self::IndexOutOfRange { index, capacity } => {
                write!(f, "index {index} out of range (capacity {capacity})")
            }
            Self::NotOccupied { index } => write!(f, "no element at index {index}"),
            Self::KindMismatch { expected, found } => {
                write!(f, "element kind mismatch: expected {expected}, found {found}")
            }
            Self::NoColony => write!(f, "store root does not hold a colony"),
            Self::RootOccupied { root } => write!(f, "store root already set to {root}"),
            Self::NoSuchBlock { ordinal } => write!(f, "no block with ordinal {ordinal}"),
            Self::BlockNotVacant { ordinal } => {
                write!(f, "block {ordinal} is not fully vacant")
            }
            Self::Corrupt { detail } => write!(f, "corrupt colony: {detail}"),
            Self::Transaction(e) => write!(f, "transaction failed: {e}"),
        }
    }
}

impl Error for ColonyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Transaction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ColonyError {
    fn from(e: StoreError) -> Self {
        Self::Transaction(e)
    }
}

impl From<ConfigError> for ColonyError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_wraps_into_transaction_failure() {
        let err: ColonyError = StoreError::Injected { operation: "alloc" }.into();
        assert!(matches!(err, ColonyError::Transaction(_)));
        assert_eq!(
            err.to_string(),
            "transaction failed: injected failure in alloc"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn range_error_message() {
        let err = ColonyError::IndexOutOfRange {
            index: 9,
            capacity: 4,
        };
        assert_eq!(err.to_string(), "index 9 out of range (capacity 4)");
        assert!(err.source().is_none());
    }

    #[test]
    fn io_error_is_source() {
        let err = StoreError::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk gone"));
    }
}
