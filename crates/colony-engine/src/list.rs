//! Tail-anchored doubly-linked lists of persistent records.
//!
//! Both free lists are addressed only through their tail; pushes and
//! pops happen there and everything else is a backward walk.

use colony_core::{ColonyError, Oid, TransactionalStore};

use crate::record::{self, Linked};

/// Append `node` after `tail`, returning the new node's id.
pub(crate) fn push_tail<N: Linked, S: TransactionalStore>(
    store: &mut S,
    tail: &mut Oid,
    mut node: N,
) -> Result<Oid, ColonyError> {
    node.set_prev(*tail);
    node.set_next(Oid::NULL);
    let oid = record::create(store, &node)?;
    if let Some(old_tail) = tail.non_null() {
        let mut prev: N = record::load(store, old_tail)?;
        prev.set_next(oid);
        record::save(store, old_tail, &prev)?;
    }
    *tail = oid;
    Ok(oid)
}

/// Unlink and free the node at `oid`, returning its last contents.
pub(crate) fn unlink<N: Linked, S: TransactionalStore>(
    store: &mut S,
    tail: &mut Oid,
    oid: Oid,
) -> Result<N, ColonyError> {
    let node: N = record::load(store, oid)?;
    if let Some(prev_oid) = node.prev().non_null() {
        let mut prev: N = record::load(store, prev_oid)?;
        prev.set_next(node.next());
        record::save(store, prev_oid, &prev)?;
    }
    match node.next().non_null() {
        Some(next_oid) => {
            let mut next: N = record::load(store, next_oid)?;
            next.set_prev(node.prev());
            record::save(store, next_oid, &next)?;
        }
        None => *tail = node.prev(),
    }
    store.free(oid)?;
    Ok(node)
}

/// Every node, tail first.
///
/// Fails with `Corrupt` if the forward links disagree with the backward
/// walk or the list holds more than `limit` nodes.
pub(crate) fn collect<N: Linked, S: TransactionalStore>(
    store: &S,
    tail: Oid,
    limit: u64,
) -> Result<Vec<(Oid, N)>, ColonyError> {
    let mut out: Vec<(Oid, N)> = Vec::new();
    let mut cursor = tail;
    let mut after = Oid::NULL;
    while let Some(oid) = cursor.non_null() {
        if out.len() as u64 >= limit {
            return Err(ColonyError::Corrupt {
                detail: format!("{} list longer than its count {limit}", N::NAME),
            });
        }
        let node: N = record::load(store, oid)?;
        if node.next() != after {
            return Err(ColonyError::Corrupt {
                detail: format!("{} {oid} forward link {} != {after}", N::NAME, node.next()),
            });
        }
        after = oid;
        cursor = node.prev();
        out.push((oid, node));
    }
    Ok(out)
}

/// Free every node, leaving the list empty.
pub(crate) fn clear<N: Linked, S: TransactionalStore>(
    store: &mut S,
    tail: &mut Oid,
) -> Result<u64, ColonyError> {
    let mut freed = 0;
    let mut cursor = *tail;
    while let Some(oid) = cursor.non_null() {
        let node: N = record::load(store, oid)?;
        store.free(oid)?;
        cursor = node.prev();
        freed += 1;
    }
    *tail = Oid::NULL;
    Ok(freed)
}
