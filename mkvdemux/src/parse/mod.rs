//! Parsers for the segment's metadata containers.
//!
//! Each parser takes a cursor positioned at the first byte of a container
//! body plus the container's header, and returns the model type it fills.

pub(crate) mod attachments;
pub(crate) mod chapters;
pub(crate) mod header;
pub(crate) mod info;
pub(crate) mod seekhead;
pub(crate) mod tags;
pub(crate) mod tracks;

use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::error::{MkvError, Result};
use crate::source::ByteSource;

/// Body size of a leaf element; leaves cannot have unknown size.
pub(crate) fn leaf_size(header: &ElementHeader) -> Result<u64> {
    header.size.ok_or_else(|| {
        MkvError::malformed(
            header.position,
            format!("element 0x{:X} has unknown size", header.id),
        )
    })
}

pub(crate) fn uint<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<u64> {
    c.read_uint(leaf_size(h)?)
}

pub(crate) fn sint<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<i64> {
    c.read_sint(leaf_size(h)?)
}

pub(crate) fn float<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<f64> {
    c.read_float(leaf_size(h)?)
}

pub(crate) fn string<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<String> {
    c.read_string(leaf_size(h)?)
}

pub(crate) fn binary<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<Vec<u8>> {
    c.read_bytes(leaf_size(h)?)
}

pub(crate) fn flag<S: ByteSource>(c: &mut ByteCursor<S>, h: &ElementHeader) -> Result<bool> {
    Ok(uint(c, h)? != 0)
}

/// A 16-byte UID; other lengths are rejected.
pub(crate) fn uid128<S: ByteSource>(
    c: &mut ByteCursor<S>,
    h: &ElementHeader,
) -> Result<Option<[u8; 16]>> {
    let data = binary(c, h)?;
    Ok(<[u8; 16]>::try_from(data.as_slice()).ok())
}
