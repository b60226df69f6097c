//! Core types and traits for the Colony persistent container.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Colony workspace:
//! object ids, element representations, error types, and the
//! [`TransactionalStore`] trait the colony engine is written against.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod element;
pub mod error;
pub mod id;
pub mod traits;

pub use element::{Element, ElementKind};
pub use error::{ColonyError, ConfigError, StoreError};
pub use id::{Oid, SlotIndex};
pub use traits::TransactionalStore;
