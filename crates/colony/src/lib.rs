//! Colony: a crash-consistent, hole-tolerant persistent container.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Colony sub-crates. For most users, adding `colony` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use colony::prelude::*;
//!
//! let pool = Pool::volatile(PoolConfig::default());
//! let mut colony = Colony::<i32, _>::create(pool, ColonyConfig::new(2)).unwrap();
//!
//! let a = colony.insert(10).unwrap();
//! let b = colony.insert(20).unwrap();
//! colony.remove(a).unwrap();
//!
//! // `b` kept its index; the hole at `a` is reused first.
//! assert_eq!(colony.get(b).unwrap(), Some(20));
//! assert_eq!(colony.insert(30).unwrap(), a);
//!
//! colony.destroy().unwrap();
//! assert!(colony.store().root().is_null());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `colony-core` | Object ids, element kinds, errors, the store trait |
//! | [`pool`] | `colony-pool` | In-memory and file-backed transactional pool |
//! | [`engine`] | `colony-engine` | The colony container, its config and stats |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and ids (`colony-core`).
///
/// Contains [`types::Oid`], [`types::SlotIndex`], the [`types::Element`]
/// trait, the error enums, and [`types::TransactionalStore`].
pub use colony_core as types;

/// Transactional object pool (`colony-pool`).
///
/// [`pool::Pool`] is the reference [`types::TransactionalStore`]: volatile
/// or persisted to a single image file replaced atomically on commit.
pub use colony_pool as pool;

/// The colony container (`colony-engine`).
pub use colony_engine as engine;

/// Common imports for typical Colony usage.
///
/// ```rust
/// use colony::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use colony_core::{Element, ElementKind, Oid, SlotIndex, TransactionalStore};

    // Errors
    pub use colony_core::{ColonyError, ConfigError, StoreError};

    // Store
    pub use colony_pool::{Pool, PoolConfig};

    // Container
    pub use colony_engine::{Colony, ColonyConfig, ColonyStats, IndexRemap};
}
