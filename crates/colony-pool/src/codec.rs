//! Binary encode/decode for persisted pool images.
//!
//! All integers are little-endian. Strings and byte arrays are
//! length-prefixed with a `u32` length. No compression, no alignment
//! padding, no self-describing schema.
//!
//! ```text
//! [MAGIC "CLNY"] [VERSION u8] [layout str]
//! [max_alloc u64] [capacity u64] [next_oid u64] [root u64] [count u64]
//! [oid u64] [bytes] × count
//! ```

use std::io::{self, Read, Write};

use colony_core::{Oid, StoreError};
use indexmap::IndexMap;

use crate::{FORMAT_VERSION, MAGIC};

/// Pool-wide fields stored ahead of the object table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    /// Layout name the pool was created with.
    pub layout: String,
    /// Largest single allocation.
    pub max_alloc_size: usize,
    /// Total byte budget.
    pub capacity_bytes: usize,
    /// Next object id to hand out.
    pub next_oid: u64,
    /// Root object.
    pub root: Oid,
}

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), StoreError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), StoreError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), StoreError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), StoreError> {
    let len = u32::try_from(b.len()).map_err(|_| StoreError::Corrupt {
        detail: format!("object of {} bytes exceeds the u32 length prefix", b.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(b)?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string.
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), StoreError> {
    write_length_prefixed_bytes(w, s.as_bytes())
}

// ── Primitive readers ───────────────────────────────────────────

fn read_exact(r: &mut dyn Read, buf: &mut [u8]) -> Result<(), StoreError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            StoreError::Corrupt {
                detail: "truncated image".into(),
            }
        } else {
            StoreError::Io(e)
        }
    })
}

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, StoreError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, StoreError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, StoreError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a length-prefixed byte array of at most `limit` bytes.
pub fn read_length_prefixed_bytes(r: &mut dyn Read, limit: usize) -> Result<Vec<u8>, StoreError> {
    let len = read_u32_le(r)? as usize;
    if len > limit {
        return Err(StoreError::Corrupt {
            detail: format!("length prefix {len} exceeds limit {limit}"),
        });
    }
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read, limit: usize) -> Result<String, StoreError> {
    let buf = read_length_prefixed_bytes(r, limit)?;
    String::from_utf8(buf).map_err(|e| StoreError::Corrupt {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

fn read_usize(r: &mut dyn Read, what: &str) -> Result<usize, StoreError> {
    let v = read_u64_le(r)?;
    usize::try_from(v).map_err(|_| StoreError::Corrupt {
        detail: format!("{what} {v} does not fit in usize"),
    })
}

// ── Image encode/decode ─────────────────────────────────────────

const MAX_LAYOUT_LEN: usize = 1024;

/// Encode a full pool image.
pub fn encode_image(
    w: &mut dyn Write,
    header: &ImageHeader,
    objects: &IndexMap<Oid, Vec<u8>>,
) -> Result<(), StoreError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_length_prefixed_str(w, &header.layout)?;
    write_u64_le(w, header.max_alloc_size as u64)?;
    write_u64_le(w, header.capacity_bytes as u64)?;
    write_u64_le(w, header.next_oid)?;
    write_u64_le(w, header.root.0)?;
    write_u64_le(w, objects.len() as u64)?;
    for (oid, bytes) in objects {
        write_u64_le(w, oid.0)?;
        write_length_prefixed_bytes(w, bytes)?;
    }
    Ok(())
}

/// Decode a full pool image, validating structure but not layout.
pub fn decode_image(
    r: &mut dyn Read,
) -> Result<(ImageHeader, IndexMap<Oid, Vec<u8>>), StoreError> {
    let mut magic = [0u8; 4];
    read_exact(r, &mut magic)?;
    if magic != MAGIC {
        return Err(StoreError::Corrupt {
            detail: "invalid magic bytes (expected b\"CLNY\")".into(),
        });
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(StoreError::Corrupt {
            detail: format!("unsupported format version {version}"),
        });
    }

    let layout = read_length_prefixed_str(r, MAX_LAYOUT_LEN)?;
    let max_alloc_size = read_usize(r, "max_alloc_size")?;
    let capacity_bytes = read_usize(r, "capacity_bytes")?;
    let next_oid = read_u64_le(r)?;
    let root = Oid(read_u64_le(r)?);
    let count = read_usize(r, "object count")?;

    let mut objects = IndexMap::new();
    let mut total = 0usize;
    for _ in 0..count {
        let oid = Oid(read_u64_le(r)?);
        if oid.is_null() || oid.0 >= next_oid {
            return Err(StoreError::Corrupt {
                detail: format!("object id {oid} outside allocated range"),
            });
        }
        let bytes = read_length_prefixed_bytes(r, max_alloc_size)?;
        total += bytes.len();
        if objects.insert(oid, bytes).is_some() {
            return Err(StoreError::Corrupt {
                detail: format!("duplicate object id {oid}"),
            });
        }
    }
    if total > capacity_bytes {
        return Err(StoreError::Corrupt {
            detail: format!("{total} live bytes exceed capacity {capacity_bytes}"),
        });
    }
    if !root.is_null() && !objects.contains_key(&root) {
        return Err(StoreError::Corrupt {
            detail: format!("root {root} is not a live object"),
        });
    }

    let header = ImageHeader {
        layout,
        max_alloc_size,
        capacity_bytes,
        next_oid,
        root,
    };
    Ok((header, objects))
}
