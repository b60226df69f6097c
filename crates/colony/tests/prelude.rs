//! Integration test: the facade is enough to run a persistent colony
//! through its whole life cycle.

use colony::prelude::*;

#[test]
fn create_reopen_destroy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("refs.pool");

    let kept = {
        let pool = Pool::create(&path, PoolConfig::default()).unwrap();
        let mut refs = Colony::<Oid, _>::create(pool, ColonyConfig::new(4)).unwrap();
        let kept = refs.insert(Oid(0x1234)).unwrap();
        let gone = refs.insert(Oid(0x5678)).unwrap();
        refs.remove(gone).unwrap();
        kept
    };

    let pool = Pool::open(&path, PoolConfig::DEFAULT_LAYOUT).unwrap();
    let mut refs = Colony::<Oid, _>::open(pool).unwrap();
    assert_eq!(refs.get(kept).unwrap(), Some(Oid(0x1234)));
    assert_eq!(refs.stats().unwrap().free_idx_count, 1);
    refs.destroy().unwrap();

    let pool = Pool::open(&path, PoolConfig::DEFAULT_LAYOUT).unwrap();
    assert_eq!(pool.object_count(), 0);
    assert!(matches!(
        Colony::<Oid, _>::open(pool),
        Err(ColonyError::NoColony)
    ));
}
