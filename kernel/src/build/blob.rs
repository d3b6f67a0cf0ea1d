//! Constant blob: the serialized store handed to the device compiler.
//!
//! # Layout (little-endian)
//!
//! | Offset | Width      | Field                         |
//! |--------|------------|-------------------------------|
//! | 0      | 4          | magic `b"SPKC"`               |
//! | 4      | u16le      | version (1)                   |
//! | 6      | u32le      | entry count                   |
//! | 10     | repeated   | entries                       |
//!
//! Each entry is `u64le token`, `u32le length`, then `length` raw bytes.
//! Value bytes are the host's in-memory representation of the constant.
//! Entries are strictly ascending by token. Every declared constant appears,
//! set or not; unset constants carry their default bytes.

use crate::constant::{ConstantStore, ConstantToken};

/// Blob magic.
pub const BLOB_MAGIC: [u8; 4] = *b"SPKC";

/// Current blob version.
pub const BLOB_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4;

/// One `(token, bytes)` triple from a decoded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub token: ConstantToken,
    pub bytes: Vec<u8>,
}

/// Blob decoding failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// Input shorter than the header or an entry it announces.
    Truncated { offset: usize },
    /// First four bytes are not [`BLOB_MAGIC`].
    BadMagic,
    /// Version other than [`BLOB_VERSION`].
    UnsupportedVersion { version: u16 },
    /// Entries not strictly ascending by token.
    OutOfOrder { token: ConstantToken },
    /// Bytes left after the announced entries.
    TrailingBytes { count: usize },
    /// A count or length does not fit its field.
    LengthOverflow,
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { offset } => write!(f, "blob truncated at offset {offset}"),
            Self::BadMagic => write!(f, "blob magic mismatch"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported blob version {version}")
            }
            Self::OutOfOrder { token } => write!(f, "blob entry {token} out of order"),
            Self::TrailingBytes { count } => write!(f, "{count} trailing bytes after blob"),
            Self::LengthOverflow => write!(f, "blob count or length field overflows"),
        }
    }
}

impl std::error::Error for BlobError {}

/// Serialize every entry of `store` in token order.
///
/// # Errors
///
/// Returns [`BlobError::LengthOverflow`] if the entry count or a value
/// length does not fit in a `u32`.
pub fn encode_blob(store: &ConstantStore) -> Result<Vec<u8>, BlobError> {
    let body: usize = store.entries().map(|e| 8 + 4 + e.value.len()).sum();
    let mut buf = Vec::with_capacity(HEADER_LEN + body);
    buf.extend_from_slice(&BLOB_MAGIC);
    buf.extend_from_slice(&BLOB_VERSION.to_le_bytes());
    let count = u32::try_from(store.len()).map_err(|_| BlobError::LengthOverflow)?;
    buf.extend_from_slice(&count.to_le_bytes());
    for entry in store.entries() {
        let len = u32::try_from(entry.value.len()).map_err(|_| BlobError::LengthOverflow)?;
        buf.extend_from_slice(&entry.descriptor.token().raw().to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(entry.value);
    }
    Ok(buf)
}

/// Parse a blob produced by [`encode_blob`].
///
/// # Errors
///
/// Returns [`BlobError`] on any structural violation. Fail-closed: no partial
/// entry list is returned.
pub fn decode_blob(bytes: &[u8]) -> Result<Vec<BlobEntry>, BlobError> {
    let mut cursor = Cursor { bytes, offset: 0 };
    if cursor.take(4)? != BLOB_MAGIC {
        return Err(BlobError::BadMagic);
    }
    let version = u16::from_le_bytes(cursor.array()?);
    if version != BLOB_VERSION {
        return Err(BlobError::UnsupportedVersion { version });
    }
    let count = usize::try_from(u32::from_le_bytes(cursor.array()?))
        .map_err(|_| BlobError::LengthOverflow)?;

    let mut entries: Vec<BlobEntry> = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let token = ConstantToken::from_raw(u64::from_le_bytes(cursor.array()?));
        if entries.last().is_some_and(|prev| prev.token >= token) {
            return Err(BlobError::OutOfOrder { token });
        }
        let len = usize::try_from(u32::from_le_bytes(cursor.array()?))
            .map_err(|_| BlobError::LengthOverflow)?;
        let bytes = cursor.take(len)?.to_vec();
        entries.push(BlobEntry { token, bytes });
    }
    let rest = bytes.len() - cursor.offset;
    if rest != 0 {
        return Err(BlobError::TrailingBytes { count: rest });
    }
    Ok(entries)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], BlobError> {
        let end = self
            .offset
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(BlobError::Truncated {
                offset: self.offset,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BlobError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
