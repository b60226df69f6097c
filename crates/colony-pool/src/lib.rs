//! Transactional object pool backing Colony containers.
//!
//! [`Pool`] implements [`colony_core::TransactionalStore`]: fixed-size
//! byte objects addressed by [`Oid`](colony_core::Oid), grouped mutation
//! through undo-logged transactions, and optional file persistence with
//! atomic image replacement on every outermost commit.
//!
//! # Architecture
//!
//! ```text
//! Pool
//! ├── IndexMap<Oid, Vec<u8>>   live objects, insertion ordered
//! ├── UndoLog                  reversible record of the open transaction
//! └── Option<PathBuf>          image file (volatile when None)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod pool;
mod undo;

pub use config::PoolConfig;
pub use pool::{Pool, PoolStats};

/// Magic bytes at the start of every pool image.
pub const MAGIC: [u8; 4] = *b"CLNY";

/// Current image format version.
pub const FORMAT_VERSION: u8 = 1;
