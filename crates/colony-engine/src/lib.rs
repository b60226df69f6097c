//! Segmented, hole-tolerant persistent colony container.
//!
//! A [`Colony`] stores elements in a chain of fixed-capacity blocks
//! inside a [`TransactionalStore`](colony_core::TransactionalStore).
//! Indices are stable: removal leaves a hole that later inserts reuse,
//! and wholly vacant blocks are recycled before the chain grows.
//!
//! # Architecture
//!
//! ```text
//! ColonyRecord (store root)
//! ├── block chain       head ⇄ … ⇄ tail, each block owns an element table
//! ├── free-index list   individually vacated slots, reused LIFO
//! └── free-block list   wholly vacant blocks, reused LIFO
//! ```
//!
//! Every operation loads the root record, mutates records through the
//! store, and writes the root back, all inside one store transaction.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod chain;
pub mod colony;
pub mod config;
mod free_block;
mod free_index;
mod list;
mod record;
pub mod remap;
pub mod stats;
mod table;
mod verify;

pub use colony::Colony;
pub use config::ColonyConfig;
pub use remap::IndexRemap;
pub use stats::ColonyStats;
