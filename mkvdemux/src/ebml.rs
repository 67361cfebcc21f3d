//! EBML (Extensible Binary Meta Language) primitives.
//!
//! EBML is the binary format underlying Matroska/WebM. It uses variable-length
//! integers (VINTs) for both element IDs and sizes. The functions here decode
//! from byte slices; [`crate::cursor::ByteCursor`] builds the streaming
//! versions on top of them.

use crate::error::{MkvError, Result};

/// Maximum recursion depth for nested elements.
pub const MAX_RECURSION_DEPTH: u32 = 64;

/// Maximum VINT length in bytes.
pub const MAX_VINT_LENGTH: usize = 8;

/// Maximum element ID length in bytes.
pub const MAX_ID_LENGTH: usize = 4;

/// Length of a VINT, derived from its lead byte.
///
/// EBML VINTs use a leading bit pattern to indicate the length:
/// - 1xxxxxxx: 1 byte (7 bits of data)
/// - 01xxxxxx xxxxxxxx: 2 bytes (14 bits)
/// - 001xxxxx xxxxxxxx xxxxxxxx: 3 bytes (21 bits)
/// - etc.
///
/// Returns `None` for a zero lead byte, which has no length marker within
/// the 8-octet maximum.
pub fn vint_length_from_lead(lead: u8) -> Option<usize> {
    if lead == 0 {
        None
    } else {
        Some(lead.leading_zeros() as usize + 1)
    }
}

/// All-ones data pattern of a VINT of `length` bytes (the unknown-size marker).
pub fn unknown_size_marker(length: usize) -> u64 {
    debug_assert!((1..=MAX_VINT_LENGTH).contains(&length));
    (1u64 << (7 * length)) - 1
}

/// Decode a VINT from the start of `data`.
///
/// Returns the value (marker bits stripped) and the number of bytes used.
/// `offset` is only used for error reporting.
pub fn parse_vint(data: &[u8], offset: u64) -> Result<(u64, usize)> {
    let lead = *data
        .first()
        .ok_or(MkvError::UnexpectedEndOfData { offset })?;
    let length = vint_length_from_lead(lead).ok_or(MkvError::MalformedVarInt { offset })?;
    if data.len() < length {
        return Err(MkvError::UnexpectedEndOfData {
            offset: offset + data.len() as u64,
        });
    }

    let mask = 0xFFu8.checked_shr(length as u32).unwrap_or(0);
    let mut value = (lead & mask) as u64;
    for &byte in &data[1..length] {
        value = (value << 8) | byte as u64;
    }

    Ok((value, length))
}

/// Decode a signed VINT as used by EBML lacing deltas.
///
/// The value is stored as `delta + bias` where
/// `bias = 2^(7*length - 1) - 1`.
pub fn parse_signed_vint(data: &[u8], offset: u64) -> Result<(i64, usize)> {
    let (raw, length) = parse_vint(data, offset)?;
    Ok((vint_to_signed(raw, length), length))
}

/// Convert an unsigned VINT value to its bias-corrected signed value.
pub fn vint_to_signed(value: u64, vint_length: usize) -> i64 {
    let bits = 7 * vint_length - 1;
    let bias = (1_i64 << bits) - 1;
    (value as i64) - bias
}

/// Encode a value as a VINT.
///
/// Returns the encoded bytes and the length. Values whose data bits would be
/// all ones at the minimal length are widened so they never collide with the
/// unknown-size marker.
pub fn encode_vint(value: u64) -> Result<([u8; 8], usize)> {
    if value >= unknown_size_marker(MAX_VINT_LENGTH) {
        return Err(MkvError::MalformedVarInt { offset: 0 });
    }
    Ok(encode_vint_with_length(value, vint_length(value)))
}

/// Encode `value` in exactly `length` bytes (caller guarantees it fits).
pub fn encode_vint_with_length(value: u64, length: usize) -> ([u8; 8], usize) {
    let mut bytes = [0u8; 8];
    let marker = 0x80u8 >> (length - 1);

    let mut v = value;
    for i in (0..length).rev() {
        bytes[i] = (v & 0xFF) as u8;
        v >>= 8;
    }
    bytes[0] |= marker;

    (bytes, length)
}

/// Calculate the minimum number of bytes needed to encode a value as a VINT.
pub fn vint_length(value: u64) -> usize {
    (1..MAX_VINT_LENGTH)
        .find(|&len| value < unknown_size_marker(len))
        .unwrap_or(MAX_VINT_LENGTH)
}

/// An EBML element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// The element ID (marker bits included).
    pub id: u32,
    /// The element size (`None` for unknown size).
    pub size: Option<u64>,
    /// Absolute position of the first header byte.
    pub position: u64,
    /// Total header size in bytes.
    pub header_size: usize,
}

impl ElementHeader {
    /// Absolute position of the element body.
    pub fn data_offset(&self) -> u64 {
        self.position + self.header_size as u64
    }

    /// Absolute end position of the element, when its size is known.
    pub fn end(&self) -> Option<u64> {
        self.size.map(|s| self.data_offset().saturating_add(s))
    }
}

/// EBML document header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlHeader {
    /// EBML version.
    pub version: u64,
    /// EBML read version.
    pub read_version: u64,
    /// Maximum ID length.
    pub max_id_length: u64,
    /// Maximum size length.
    pub max_size_length: u64,
    /// Document type (e.g., "matroska" or "webm").
    pub doc_type: String,
    /// Document type version.
    pub doc_type_version: u64,
    /// Document type read version.
    pub doc_type_read_version: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: "matroska".to_string(),
            doc_type_version: 1,
            doc_type_read_version: 1,
        }
    }
}

impl EbmlHeader {
    /// Check if this is a WebM document.
    pub fn is_webm(&self) -> bool {
        self.doc_type == "webm"
    }

    /// Check if this is a Matroska document.
    pub fn is_matroska(&self) -> bool {
        self.doc_type == "matroska"
    }
}

/// Read a signed big-endian integer from EBML data.
pub fn read_signed_int(data: &[u8]) -> i64 {
    if data.is_empty() {
        return 0;
    }

    // Sign-extend the first byte
    let mut value = if data[0] & 0x80 != 0 { -1i64 } else { 0i64 };

    for &byte in data {
        value = (value << 8) | byte as i64;
    }

    value
}

/// Read an unsigned big-endian integer from EBML data.
pub fn read_unsigned_int(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}

/// Read a float from EBML data (0, 4 or 8 bytes).
pub fn read_float(data: &[u8], offset: u64) -> Result<f64> {
    match *data {
        [] => Ok(0.0),
        [a, b, c, d] => Ok(f32::from_be_bytes([a, b, c, d]) as f64),
        [a, b, c, d, e, f, g, h] => Ok(f64::from_be_bytes([a, b, c, d, e, f, g, h])),
        _ => Err(MkvError::malformed(
            offset,
            format!("float element of {} bytes", data.len()),
        )),
    }
}

/// Read a UTF-8 string from EBML data.
///
/// Strings may be NUL-padded; invalid sequences are replaced rather than
/// rejected so a bad title cannot fail a whole container.
pub fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}
