//! Per-block element storage.
//!
//! A table is one store object of `block_capacity` slots. Each slot is
//! a liveness tag byte followed by the element's encoded bytes, so a
//! freshly allocated (zero-filled) table reads as all-vacant.

use std::marker::PhantomData;

use colony_core::{ColonyError, Element, Oid, TransactionalStore};

const VACANT: u8 = 0;
const LIVE: u8 = 1;

/// Bytes per slot for element type `E`.
pub(crate) const fn slot_size<E: Element>() -> usize {
    1 + E::SIZE
}

/// Bytes of a table holding `block_capacity` slots, or `None` on overflow.
pub(crate) fn table_bytes<E: Element>(block_capacity: u64) -> Option<usize> {
    usize::try_from(block_capacity)
        .ok()?
        .checked_mul(slot_size::<E>())
}

/// Typed view of a block's element table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ElementTable<E> {
    oid: Oid,
    _element: PhantomData<E>,
}

impl<E: Element> ElementTable<E> {
    pub(crate) fn at(oid: Oid) -> Self {
        Self {
            oid,
            _element: PhantomData,
        }
    }

    /// Allocate a zero-filled table of `block_capacity` slots.
    pub(crate) fn alloc<S: TransactionalStore>(
        store: &mut S,
        block_capacity: u64,
    ) -> Result<Self, ColonyError> {
        let bytes = table_bytes::<E>(block_capacity).ok_or_else(|| ColonyError::Corrupt {
            detail: format!("block capacity {block_capacity} overflows a table"),
        })?;
        Ok(Self::at(store.alloc(bytes)?))
    }

    pub(crate) fn oid(&self) -> Oid {
        self.oid
    }

    fn slot_bytes<'s, S: TransactionalStore>(
        &self,
        store: &'s S,
        local: u64,
    ) -> Result<&'s [u8], ColonyError> {
        let bytes = store.read(self.oid)?;
        let start = local as usize * slot_size::<E>();
        bytes
            .get(start..start + slot_size::<E>())
            .ok_or_else(|| ColonyError::Corrupt {
                detail: format!("slot {local} outside table {}", self.oid),
            })
    }

    /// The element in `local`, or `None` if the slot is vacant.
    pub(crate) fn get<S: TransactionalStore>(
        &self,
        store: &S,
        local: u64,
    ) -> Result<Option<E>, ColonyError> {
        let slot = self.slot_bytes(store, local)?;
        match slot[0] {
            VACANT => Ok(None),
            LIVE => Ok(Some(E::decode(&slot[1..]))),
            tag => Err(ColonyError::Corrupt {
                detail: format!("slot {local} of table {} has tag {tag}", self.oid),
            }),
        }
    }

    /// Store `value` in `local` and mark it live.
    pub(crate) fn put<S: TransactionalStore>(
        &self,
        store: &mut S,
        local: u64,
        value: E,
    ) -> Result<(), ColonyError> {
        let mut slot = vec![0u8; slot_size::<E>()];
        slot[0] = LIVE;
        value.encode(&mut slot[1..]);
        store.write(self.oid, local as usize * slot_size::<E>(), &slot)?;
        Ok(())
    }

    /// Mark `local` vacant. Element bytes are left in place.
    pub(crate) fn clear<S: TransactionalStore>(
        &self,
        store: &mut S,
        local: u64,
    ) -> Result<(), ColonyError> {
        store.write(self.oid, local as usize * slot_size::<E>(), &[VACANT])?;
        Ok(())
    }

    /// Live slots in ascending order.
    pub(crate) fn live<S: TransactionalStore>(
        &self,
        store: &S,
    ) -> Result<Vec<(u64, E)>, ColonyError> {
        let bytes = store.read(self.oid)?;
        let mut out = Vec::new();
        for (local, slot) in bytes.chunks_exact(slot_size::<E>()).enumerate() {
            match slot[0] {
                VACANT => {}
                LIVE => out.push((local as u64, E::decode(&slot[1..]))),
                tag => {
                    return Err(ColonyError::Corrupt {
                        detail: format!("slot {local} of table {} has tag {tag}", self.oid),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Number of slots the table object actually holds.
    pub(crate) fn slots<S: TransactionalStore>(&self, store: &S) -> Result<u64, ColonyError> {
        Ok((store.read(self.oid)?.len() / slot_size::<E>()) as u64)
    }

    pub(crate) fn free<S: TransactionalStore>(self, store: &mut S) -> Result<(), ColonyError> {
        store.free(self.oid)?;
        Ok(())
    }
}
