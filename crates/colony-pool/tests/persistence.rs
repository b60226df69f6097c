//! Integration test: file-backed pools survive reopen and never expose
//! an aborted or failed transaction on disk.

use colony_core::{Oid, StoreError, TransactionalStore};
use colony_pool::{Pool, PoolConfig};

fn config() -> PoolConfig {
    PoolConfig::new("colony").with_max_alloc_size(1024)
}

#[test]
fn committed_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");

    let oid = {
        let mut pool = Pool::create(&path, config()).unwrap();
        pool.transaction(|p| {
            let oid = p.alloc(6)?;
            p.write(oid, 0, b"colony")?;
            p.set_root(oid)?;
            Ok::<_, StoreError>(oid)
        })
        .unwrap()
    };

    let pool = Pool::open(&path, "colony").unwrap();
    assert_eq!(pool.root(), oid);
    assert_eq!(pool.read(oid).unwrap(), b"colony");
    assert_eq!(pool.max_alloc_size(), 1024);
}

#[test]
fn aborted_transaction_never_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");

    {
        let mut pool = Pool::create(&path, config()).unwrap();
        pool.transaction(|p| p.alloc(4)).unwrap();
        let _ = pool.transaction(|p| -> Result<(), StoreError> {
            p.alloc(8)?;
            Err(StoreError::Injected { operation: "test" })
        });
        // Uncommitted work is dropped with the process.
        pool.begin().unwrap();
        pool.alloc(16).unwrap();
    }

    let pool = Pool::open(&path, "colony").unwrap();
    assert_eq!(pool.object_count(), 1);
    assert_eq!(pool.used_bytes(), 4);
}

#[test]
fn next_oid_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");

    let first = {
        let mut pool = Pool::create(&path, config()).unwrap();
        let a = pool.transaction(|p| p.alloc(1)).unwrap();
        pool.transaction(|p| p.free(a)).unwrap();
        a
    };
    let mut pool = Pool::open(&path, "colony").unwrap();
    let second = pool.transaction(|p| p.alloc(1)).unwrap();
    assert!(second > first);
}

#[test]
fn layout_mismatch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");
    Pool::create(&path, config()).unwrap();
    let err = Pool::open(&path, "other").err().unwrap();
    assert!(matches!(err, StoreError::LayoutMismatch { .. }));
}

#[test]
fn create_refuses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");
    Pool::create(&path, config()).unwrap();
    assert!(matches!(
        Pool::create(&path, config()),
        Err(StoreError::Io(_))
    ));
    // create_or_open takes the open path instead.
    let pool = Pool::create_or_open(&path, config()).unwrap();
    assert_eq!(pool.root(), Oid::NULL);
}

#[test]
fn failed_commit_rolls_back_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");
    let mut pool = Pool::create(&path, config()).unwrap();
    pool.transaction(|p| p.alloc(2)).unwrap();

    // Removing the directory makes the temporary image impossible to create.
    drop(dir);
    let err = pool.transaction(|p| p.alloc(3)).unwrap_err();
    assert!(matches!(err, StoreError::CommitFailed { .. }));
    assert_eq!(pool.object_count(), 1);
    assert_eq!(pool.used_bytes(), 2);
    assert_eq!(pool.stats().aborts, 1);
}

#[test]
fn garbage_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.bin");
    std::fs::write(&path, b"not a pool").unwrap();
    assert!(matches!(
        Pool::open(&path, "colony"),
        Err(StoreError::Corrupt { .. })
    ));
}
