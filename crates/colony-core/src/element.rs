//! Element representations stored in colony tables.
//!
//! A colony is homogeneous: its [`ElementKind`] is fixed at creation and
//! recorded in the persisted root, and the in-process handle is generic
//! over one [`Element`] type. There is no per-operation dispatch on the
//! kind tag.

use std::fmt;

use crate::id::Oid;

/// Persisted tag naming the representation of a colony's elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Inline 32-bit signed integers (`"int"`).
    Scalar,
    /// Opaque references to other persisted objects (`"oid"`, also
    /// accepted as `"PMEMoid"`).
    OpaqueRef,
}

impl ElementKind {
    /// Parse a kind from its command-line name.
    ///
    /// Returns `None` for an unrecognised name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Scalar),
            "oid" | "PMEMoid" => Some(Self::OpaqueRef),
            _ => None,
        }
    }

    /// The command-line name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "int",
            Self::OpaqueRef => "oid",
        }
    }

    /// The on-store tag byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Scalar => 1,
            Self::OpaqueRef => 2,
        }
    }

    /// Decode an on-store tag byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Scalar),
            2 => Some(Self::OpaqueRef),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fixed-size value that can live in an element table slot.
///
/// `encode` and `decode` operate on exactly [`Element::SIZE`] bytes;
/// callers are responsible for slicing.
pub trait Element: Copy + fmt::Debug + PartialEq + 'static {
    /// The persisted kind tag for this representation.
    const KIND: ElementKind;
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Write the little-endian encoding into `buf[..Self::SIZE]`.
    fn encode(&self, buf: &mut [u8]);

    /// Read a value back from `buf[..Self::SIZE]`.
    fn decode(buf: &[u8]) -> Self;
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::Scalar;
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[..4]);
        i32::from_le_bytes(raw)
    }
}

impl Element for Oid {
    const KIND: ElementKind = ElementKind::OpaqueRef;
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.0.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[..8]);
        Oid(u64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(ElementKind::from_name("int"), Some(ElementKind::Scalar));
        assert_eq!(ElementKind::from_name("oid"), Some(ElementKind::OpaqueRef));
        assert_eq!(ElementKind::from_name("PMEMoid"), Some(ElementKind::OpaqueRef));
        assert_eq!(ElementKind::from_name("pmemoid"), None);
        assert_eq!(ElementKind::from_name("float"), None);
        assert_eq!(ElementKind::OpaqueRef.to_string(), "oid");
    }

    #[test]
    fn kind_tag_rejects_unknown() {
        assert_eq!(ElementKind::from_u8(0), None);
        assert_eq!(ElementKind::from_u8(3), None);
        assert_eq!(
            ElementKind::from_u8(ElementKind::Scalar.to_u8()),
            Some(ElementKind::Scalar)
        );
    }

    #[test]
    fn scalar_encoding_is_little_endian() {
        let mut buf = [0u8; 4];
        (-2i32).encode(&mut buf);
        assert_eq!(buf, [0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(i32::decode(&buf), -2);
    }

    #[test]
    fn oid_decode_ignores_trailing_bytes() {
        let mut buf = [0xaau8; 12];
        Oid(0x0102).encode(&mut buf);
        assert_eq!(Oid::decode(&buf), Oid(0x0102));
        assert_eq!(buf[8], 0xaa);
    }
}
