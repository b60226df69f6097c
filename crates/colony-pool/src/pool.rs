//! The transactional object pool.
//!
//! [`Pool`] is the reference [`TransactionalStore`]. Objects are byte
//! vectors keyed by [`Oid`]; every mutation inside a transaction is
//! undo-logged so an abort restores the exact pre-transaction state.
//!
//! A pool is either volatile ([`Pool::volatile`]) or backed by a file
//! ([`Pool::create`], [`Pool::open`]). A file-backed pool makes each
//! outermost commit durable by writing the whole image to a sibling
//! temporary file, syncing it, and renaming it over the pool file. If
//! any step fails the transaction is rolled back in memory, so the
//! in-process state always matches the last durable image.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use colony_core::{Oid, StoreError, TransactionalStore};
use indexmap::IndexMap;

use crate::codec::{decode_image, encode_image, ImageHeader};
use crate::config::PoolConfig;
use crate::undo::UndoLog;

/// Cumulative transaction counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Outermost transactions committed.
    pub commits: u64,
    /// Outermost transactions rolled back (explicit aborts and failed commits).
    pub aborts: u64,
}

/// A transactional store of byte objects, volatile or file-backed.
pub struct Pool {
    objects: IndexMap<Oid, Vec<u8>>,
    /// Next id to hand out. Never decreases, so ids are not recycled.
    next_oid: u64,
    root: Oid,
    /// Sum of live object sizes.
    used_bytes: usize,
    config: PoolConfig,
    path: Option<PathBuf>,
    /// Transaction nesting depth (0 = no transaction).
    depth: u32,
    /// Set when an inner level aborted; cleared when depth returns to 0.
    aborted: bool,
    undo: UndoLog,
    stats: PoolStats,
}

impl Pool {
    /// Create an in-memory pool. Commits are atomic but not durable.
    pub fn volatile(config: PoolConfig) -> Self {
        Self {
            objects: IndexMap::new(),
            next_oid: 1,
            root: Oid::NULL,
            used_bytes: 0,
            config,
            path: None,
            depth: 0,
            aborted: false,
            undo: UndoLog::new(),
            stats: PoolStats::default(),
        }
    }

    /// Create a new file-backed pool at `path`.
    ///
    /// Fails with an I/O error if the file already exists.
    pub fn create(path: impl AsRef<Path>, config: PoolConfig) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("pool file {} already exists", path.display()),
            )));
        }
        let mut pool = Self::volatile(config);
        pool.path = Some(path.to_path_buf());
        pool.persist()?;
        tracing::debug!(path = %path.display(), layout = %pool.config.layout, "pool created");
        Ok(pool)
    }

    /// Open an existing file-backed pool written under `layout`.
    pub fn open(path: impl AsRef<Path>, layout: &str) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let (header, objects) = decode_image(&mut BufReader::new(file))?;
        if header.layout != layout {
            return Err(StoreError::LayoutMismatch {
                expected: layout.to_string(),
                found: header.layout,
            });
        }
        let used_bytes = objects.values().map(Vec::len).sum();
        tracing::debug!(
            path = %path.display(),
            objects = objects.len(),
            used_bytes,
            "pool opened"
        );
        Ok(Self {
            objects,
            next_oid: header.next_oid,
            root: header.root,
            used_bytes,
            config: PoolConfig {
                max_alloc_size: header.max_alloc_size,
                capacity_bytes: header.capacity_bytes,
                layout: header.layout,
            },
            path: Some(path.to_path_buf()),
            depth: 0,
            aborted: false,
            undo: UndoLog::new(),
            stats: PoolStats::default(),
        })
    }

    /// Open the pool at `path` if the file exists, otherwise create it.
    pub fn create_or_open(path: impl AsRef<Path>, config: PoolConfig) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, &config.layout)
        } else {
            Self::create(path, config)
        }
    }

    /// The pool configuration (limits come from the image for reopened pools).
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Total bytes held by live objects.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Whether `oid` names a live object.
    pub fn contains(&self, oid: Oid) -> bool {
        self.objects.contains_key(&oid)
    }

    /// Cumulative commit/abort counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn require_live_tx(&self) -> Result<(), StoreError> {
        if self.depth == 0 {
            Err(StoreError::NotInTransaction)
        } else if self.aborted {
            Err(StoreError::Aborted)
        } else {
            Ok(())
        }
    }

    fn rollback(&mut self) {
        self.used_bytes = self
            .undo
            .rollback(&mut self.objects, &mut self.root, self.used_bytes);
        self.stats.aborts += 1;
    }

    /// Write the current image to `<path>.tmp`, sync, and rename over `<path>`.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let header = ImageHeader {
            layout: self.config.layout.clone(),
            max_alloc_size: self.config.max_alloc_size,
            capacity_bytes: self.config.capacity_bytes,
            next_oid: self.next_oid,
            root: self.root,
        };
        let mut writer = BufWriter::new(File::create(&tmp)?);
        encode_image(&mut writer, &header, &self.objects)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn object(&self, oid: Oid) -> Result<&Vec<u8>, StoreError> {
        self.objects.get(&oid).ok_or(StoreError::InvalidOid { oid })
    }
}

impl TransactionalStore for Pool {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.aborted {
            return Err(StoreError::Aborted);
        }
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.depth == 0 {
            return Err(StoreError::NoActiveTransaction);
        }
        self.depth -= 1;
        if self.aborted {
            if self.depth == 0 {
                self.aborted = false;
            }
            return Err(StoreError::Aborted);
        }
        if self.depth > 0 {
            return Ok(());
        }

        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "pool commit could not be made durable, rolling back");
            self.rollback();
            return Err(StoreError::CommitFailed {
                reason: e.to_string(),
            });
        }
        tracing::trace!(mutations = self.undo.len(), "pool transaction committed");
        self.undo.clear();
        self.stats.commits += 1;
        Ok(())
    }

    fn abort(&mut self) {
        if self.depth == 0 {
            return;
        }
        if !self.aborted {
            tracing::debug!(
                depth = self.depth,
                mutations = self.undo.len(),
                "pool transaction aborted"
            );
            self.rollback();
        }
        self.depth -= 1;
        self.aborted = self.depth > 0;
    }

    fn in_transaction(&self) -> bool {
        self.depth > 0 && !self.aborted
    }

    fn alloc(&mut self, size: usize) -> Result<Oid, StoreError> {
        self.require_live_tx()?;
        if size > self.config.max_alloc_size {
            return Err(StoreError::AllocTooLarge {
                requested: size,
                max: self.config.max_alloc_size,
            });
        }
        if self.used_bytes + size > self.config.capacity_bytes {
            return Err(StoreError::OutOfSpace {
                requested: size,
                capacity: self.config.capacity_bytes,
            });
        }
        let oid = Oid(self.next_oid);
        self.next_oid += 1;
        self.objects.insert(oid, vec![0; size]);
        self.used_bytes += size;
        self.undo.record_alloc(oid);
        Ok(oid)
    }

    fn free(&mut self, oid: Oid) -> Result<(), StoreError> {
        self.require_live_tx()?;
        let bytes = self
            .objects
            .swap_remove(&oid)
            .ok_or(StoreError::InvalidOid { oid })?;
        self.used_bytes -= bytes.len();
        if self.root == oid {
            self.undo.record_root(self.root);
            self.root = Oid::NULL;
        }
        self.undo.record_free(oid, bytes);
        Ok(())
    }

    fn read(&self, oid: Oid) -> Result<&[u8], StoreError> {
        self.object(oid).map(Vec::as_slice)
    }

    fn write(&mut self, oid: Oid, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.require_live_tx()?;
        let size = self.object(oid)?.len();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= size)
            .ok_or(StoreError::OutOfBounds {
                oid,
                offset,
                len: bytes.len(),
                size,
            })?;
        let data = self
            .objects
            .get_mut(&oid)
            .ok_or(StoreError::InvalidOid { oid })?;
        self.undo.record_write(oid, data);
        data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn root(&self) -> Oid {
        self.root
    }

    fn set_root(&mut self, oid: Oid) -> Result<(), StoreError> {
        self.require_live_tx()?;
        if !oid.is_null() && !self.objects.contains_key(&oid) {
            return Err(StoreError::InvalidOid { oid });
        }
        self.undo.record_root(self.root);
        self.root = oid;
        Ok(())
    }

    fn max_alloc_size(&self) -> usize {
        self.config.max_alloc_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool {
        Pool::volatile(PoolConfig::new("test").with_max_alloc_size(64).with_capacity_bytes(256))
    }

    #[test]
    fn mutations_require_transaction() {
        let mut p = pool();
        assert!(matches!(p.alloc(8), Err(StoreError::NotInTransaction)));
        assert!(matches!(p.set_root(Oid::NULL), Err(StoreError::NotInTransaction)));
    }

    #[test]
    fn alloc_is_zero_filled_and_readable() {
        let mut p = pool();
        let oid = p
            .transaction(|p| p.alloc(8))
            .unwrap();
        assert_eq!(p.read(oid).unwrap(), &[0u8; 8]);
        assert_eq!(p.used_bytes(), 8);
        assert_eq!(p.stats().commits, 1);
    }

    #[test]
    fn abort_restores_everything() {
        let mut p = pool();
        let a = p
            .transaction(|p| {
                let a = p.alloc(4)?;
                p.write(a, 0, &[1, 2, 3, 4])?;
                p.set_root(a)?;
                Ok::<_, StoreError>(a)
            })
            .unwrap();

        let result: Result<(), StoreError> = p.transaction(|p| {
            p.write(a, 1, &[9, 9])?;
            let b = p.alloc(16)?;
            p.set_root(b)?;
            p.free(a)?;
            Err(StoreError::Injected { operation: "test" })
        });
        assert!(result.is_err());
        assert_eq!(p.read(a).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(p.root(), a);
        assert_eq!(p.object_count(), 1);
        assert_eq!(p.used_bytes(), 4);
        assert_eq!(p.stats().aborts, 1);
    }

    #[test]
    fn alloc_limits_enforced() {
        let mut p = pool();
        p.begin().unwrap();
        assert!(matches!(p.alloc(65), Err(StoreError::AllocTooLarge { .. })));
        for _ in 0..4 {
            p.alloc(64).unwrap();
        }
        assert!(matches!(p.alloc(1), Err(StoreError::OutOfSpace { .. })));
        p.abort();
        assert_eq!(p.used_bytes(), 0);
    }

    #[test]
    fn write_out_of_bounds_rejected() {
        let mut p = pool();
        p.begin().unwrap();
        let oid = p.alloc(4).unwrap();
        assert!(matches!(
            p.write(oid, 3, &[1, 2]),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert!(matches!(
            p.write(Oid(99), 0, &[1]),
            Err(StoreError::InvalidOid { .. })
        ));
        p.commit().unwrap();
    }

    #[test]
    fn nested_commit_publishes_only_at_outermost() {
        let mut p = pool();
        p.begin().unwrap();
        p.begin().unwrap();
        p.alloc(4).unwrap();
        p.commit().unwrap();
        assert_eq!(p.stats().commits, 0);
        p.commit().unwrap();
        assert_eq!(p.stats().commits, 1);
        assert_eq!(p.object_count(), 1);
    }

    #[test]
    fn inner_abort_dooms_outer() {
        let mut p = pool();
        p.begin().unwrap();
        p.alloc(4).unwrap();
        p.begin().unwrap();
        p.alloc(4).unwrap();
        p.abort();
        assert_eq!(p.object_count(), 0);
        assert!(!p.in_transaction());
        assert!(matches!(p.alloc(1), Err(StoreError::Aborted)));
        assert!(matches!(p.commit(), Err(StoreError::Aborted)));
        // Fully unwound: a fresh transaction works again.
        p.transaction(|p| p.alloc(2)).unwrap();
        assert_eq!(p.object_count(), 1);
    }

    #[test]
    fn freeing_root_clears_it() {
        let mut p = pool();
        let oid = p
            .transaction(|p| {
                let oid = p.alloc(1)?;
                p.set_root(oid)?;
                Ok::<_, StoreError>(oid)
            })
            .unwrap();
        p.transaction(|p| p.free(oid)).unwrap();
        assert!(p.root().is_null());
    }

    #[test]
    fn object_ids_are_not_recycled() {
        let mut p = pool();
        let a = p.transaction(|p| p.alloc(1)).unwrap();
        p.transaction(|p| p.free(a)).unwrap();
        let b = p.transaction(|p| p.alloc(1)).unwrap();
        assert_ne!(a, b);
    }
}
