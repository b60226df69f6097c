//! Fixed-layout persistent records.
//!
//! Every piece of colony state lives in a store object with one of the
//! layouts below. Fields are little-endian `u64`s; object ids are stored
//! as their raw `u64` with 0 meaning "no link".
//!
//! ```text
//! ColonyRecord    [magic u32] [kind u8] [pad 3] [block_capacity] [block_count]
//!                 [size] [capacity] [free_idx_count] [free_block_count]
//!                 [block_head] [block_tail] [free_idx_tail] [free_block_tail]
//! BlockRecord     [table] [occupied] [ordinal] [last_used] [free_slots] [prev] [next]
//! FreeIndexNode   [index] [prev] [next]
//! FreeBlockNode   [block] [prev] [next]
//! ```

use colony_core::{ColonyError, ElementKind, Oid, TransactionalStore};
use smallvec::SmallVec;

/// Tag at the start of every colony root record.
pub(crate) const COLONY_MAGIC: u32 = u32::from_le_bytes(*b"COLN");

/// Sentinel for "no slot touched yet" in [`BlockRecord::last_used`].
const NO_SLOT: u64 = u64::MAX;

fn corrupt(detail: String) -> ColonyError {
    ColonyError::Corrupt { detail }
}

// ── Field cursors ───────────────────────────────────────────────

/// Sequential little-endian reader over a record's bytes.
pub(crate) struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn oid(&mut self) -> Oid {
        Oid(self.u64())
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Sequential little-endian writer into a record buffer.
pub(crate) struct FieldsMut<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldsMut<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.put(&v.to_le_bytes());
    }

    fn oid(&mut self, v: Oid) {
        self.u64(v.0);
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

// ── Record trait and store helpers ──────────────────────────────

/// A fixed-size record persisted as one store object.
pub(crate) trait Record: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;
    /// Name used in corruption diagnostics.
    const NAME: &'static str;

    fn encode(&self, out: &mut FieldsMut<'_>);
    fn decode(fields: &mut Fields<'_>) -> Result<Self, ColonyError>;
}

/// Read and decode the record stored at `oid`.
pub(crate) fn load<R: Record, S: TransactionalStore>(
    store: &S,
    oid: Oid,
) -> Result<R, ColonyError> {
    if oid.is_null() {
        return Err(corrupt(format!("null link where a {} was expected", R::NAME)));
    }
    let bytes = store.read(oid)?;
    if bytes.len() != R::SIZE {
        return Err(corrupt(format!(
            "{} at {oid} is {} bytes, expected {}",
            R::NAME,
            bytes.len(),
            R::SIZE
        )));
    }
    R::decode(&mut Fields::new(bytes))
}

/// Encode `record` over the object at `oid`.
pub(crate) fn save<R: Record, S: TransactionalStore>(
    store: &mut S,
    oid: Oid,
    record: &R,
) -> Result<(), ColonyError> {
    let mut buf: SmallVec<[u8; 96]> = SmallVec::from_elem(0, R::SIZE);
    record.encode(&mut FieldsMut::new(&mut buf));
    store.write(oid, 0, &buf)?;
    Ok(())
}

/// Allocate a new object holding `record`.
pub(crate) fn create<R: Record, S: TransactionalStore>(
    store: &mut S,
    record: &R,
) -> Result<Oid, ColonyError> {
    let oid = store.alloc(R::SIZE)?;
    save(store, oid, record)?;
    Ok(oid)
}

// ── Records ─────────────────────────────────────────────────────

/// The colony root: counters plus the heads and tails of all three lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ColonyRecord {
    pub kind: ElementKind,
    pub block_capacity: u64,
    pub block_count: u64,
    pub size: u64,
    pub capacity: u64,
    pub free_idx_count: u64,
    pub free_block_count: u64,
    pub block_head: Oid,
    pub block_tail: Oid,
    pub free_idx_tail: Oid,
    pub free_block_tail: Oid,
}

impl ColonyRecord {
    pub(crate) fn empty(kind: ElementKind, block_capacity: u64) -> Self {
        Self {
            kind,
            block_capacity,
            block_count: 0,
            size: 0,
            capacity: 0,
            free_idx_count: 0,
            free_block_count: 0,
            block_head: Oid::NULL,
            block_tail: Oid::NULL,
            free_idx_tail: Oid::NULL,
            free_block_tail: Oid::NULL,
        }
    }
}

impl Record for ColonyRecord {
    const SIZE: usize = 8 + 10 * 8;
    const NAME: &'static str = "colony record";

    fn encode(&self, out: &mut FieldsMut<'_>) {
        out.u32(COLONY_MAGIC);
        out.u8(self.kind.to_u8());
        out.skip(3);
        out.u64(self.block_capacity);
        out.u64(self.block_count);
        out.u64(self.size);
        out.u64(self.capacity);
        out.u64(self.free_idx_count);
        out.u64(self.free_block_count);
        out.oid(self.block_head);
        out.oid(self.block_tail);
        out.oid(self.free_idx_tail);
        out.oid(self.free_block_tail);
    }

    fn decode(fields: &mut Fields<'_>) -> Result<Self, ColonyError> {
        let magic = fields.u32();
        if magic != COLONY_MAGIC {
            return Err(corrupt(format!("bad colony magic {magic:#010x}")));
        }
        let tag = fields.u8();
        let kind = ElementKind::from_u8(tag)
            .ok_or_else(|| corrupt(format!("unknown element kind tag {tag}")))?;
        fields.skip(3);
        Ok(Self {
            kind,
            block_capacity: fields.u64(),
            block_count: fields.u64(),
            size: fields.u64(),
            capacity: fields.u64(),
            free_idx_count: fields.u64(),
            free_block_count: fields.u64(),
            block_head: fields.oid(),
            block_tail: fields.oid(),
            free_idx_tail: fields.oid(),
            free_block_tail: fields.oid(),
        })
    }
}

/// One block of the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BlockRecord {
    /// The block's element table.
    pub table: Oid,
    /// Live elements in this block.
    pub occupied: u64,
    /// Position in the chain, 0-based.
    pub ordinal: u64,
    /// Highest local slot ever handed out, if any.
    pub last_used: Option<u64>,
    /// Vacant slots of this block that sit in a free list.
    pub free_slots: u64,
    pub prev: Oid,
    pub next: Oid,
}

impl BlockRecord {
    /// Local slot the next tail insertion would use.
    pub(crate) fn next_untouched(&self) -> u64 {
        self.last_used.map_or(0, |l| l + 1)
    }
}

impl Record for BlockRecord {
    const SIZE: usize = 7 * 8;
    const NAME: &'static str = "block record";

    fn encode(&self, out: &mut FieldsMut<'_>) {
        out.oid(self.table);
        out.u64(self.occupied);
        out.u64(self.ordinal);
        out.u64(self.last_used.unwrap_or(NO_SLOT));
        out.u64(self.free_slots);
        out.oid(self.prev);
        out.oid(self.next);
    }

    fn decode(fields: &mut Fields<'_>) -> Result<Self, ColonyError> {
        let table = fields.oid();
        let occupied = fields.u64();
        let ordinal = fields.u64();
        let last_used = match fields.u64() {
            NO_SLOT => None,
            slot => Some(slot),
        };
        Ok(Self {
            table,
            occupied,
            ordinal,
            last_used,
            free_slots: fields.u64(),
            prev: fields.oid(),
            next: fields.oid(),
        })
    }
}

/// An entry of the free-index list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FreeIndexNode {
    pub index: u64,
    pub prev: Oid,
    pub next: Oid,
}

impl Record for FreeIndexNode {
    const SIZE: usize = 3 * 8;
    const NAME: &'static str = "free-index node";

    fn encode(&self, out: &mut FieldsMut<'_>) {
        out.u64(self.index);
        out.oid(self.prev);
        out.oid(self.next);
    }

    fn decode(fields: &mut Fields<'_>) -> Result<Self, ColonyError> {
        Ok(Self {
            index: fields.u64(),
            prev: fields.oid(),
            next: fields.oid(),
        })
    }
}

/// An entry of the free-block list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FreeBlockNode {
    pub block: Oid,
    pub prev: Oid,
    pub next: Oid,
}

impl Record for FreeBlockNode {
    const SIZE: usize = 3 * 8;
    const NAME: &'static str = "free-block node";

    fn encode(&self, out: &mut FieldsMut<'_>) {
        out.oid(self.block);
        out.oid(self.prev);
        out.oid(self.next);
    }

    fn decode(fields: &mut Fields<'_>) -> Result<Self, ColonyError> {
        Ok(Self {
            block: fields.oid(),
            prev: fields.oid(),
            next: fields.oid(),
        })
    }
}

// ── List links ──────────────────────────────────────────────────

/// A record threaded on a doubly-linked list.
pub(crate) trait Linked: Record {
    fn prev(&self) -> Oid;
    fn next(&self) -> Oid;
    fn set_prev(&mut self, oid: Oid);
    fn set_next(&mut self, oid: Oid);
}

macro_rules! impl_linked {
    ($($ty:ty),*) => {$(
        impl Linked for $ty {
            fn prev(&self) -> Oid {
                self.prev
            }
            fn next(&self) -> Oid {
                self.next
            }
            fn set_prev(&mut self, oid: Oid) {
                self.prev = oid;
            }
            fn set_next(&mut self, oid: Oid) {
                self.next = oid;
            }
        }
    )*};
}

impl_linked!(BlockRecord, FreeIndexNode, FreeBlockNode);

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<R: Record>(r: &R) -> Vec<u8> {
        let mut buf = vec![0u8; R::SIZE];
        r.encode(&mut FieldsMut::new(&mut buf));
        buf
    }

    fn decode<R: Record>(buf: &[u8]) -> Result<R, ColonyError> {
        R::decode(&mut Fields::new(buf))
    }

    #[test]
    fn block_without_touched_slots_uses_sentinel() {
        let block = BlockRecord {
            table: Oid(7),
            occupied: 0,
            ordinal: 3,
            last_used: None,
            free_slots: 0,
            prev: Oid(2),
            next: Oid::NULL,
        };
        let buf = encode(&block);
        assert_eq!(&buf[24..32], &u64::MAX.to_le_bytes());
        assert_eq!(decode::<BlockRecord>(&buf).unwrap(), block);
        assert_eq!(block.next_untouched(), 0);
    }

    #[test]
    fn colony_record_layout() {
        let mut rec = ColonyRecord::empty(ElementKind::OpaqueRef, 16);
        rec.block_tail = Oid(9);
        let buf = encode(&rec);
        assert_eq!(buf.len(), ColonyRecord::SIZE);
        assert_eq!(&buf[0..4], b"COLN");
        assert_eq!(buf[4], 2);
        assert_eq!(&buf[8..16], &16u64.to_le_bytes());
        assert_eq!(decode::<ColonyRecord>(&buf).unwrap(), rec);
    }

    #[test]
    fn colony_record_rejects_bad_magic_and_kind() {
        let rec = ColonyRecord::empty(ElementKind::Scalar, 4);
        let mut buf = encode(&rec);
        buf[4] = 99;
        assert!(matches!(
            decode::<ColonyRecord>(&buf),
            Err(ColonyError::Corrupt { .. })
        ));
        buf[0] = b'X';
        assert!(matches!(
            decode::<ColonyRecord>(&buf),
            Err(ColonyError::Corrupt { .. })
        ));
    }
}
