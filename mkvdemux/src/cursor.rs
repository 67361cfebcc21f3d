//! Buffered, seekable EBML reader.
//!
//! [`ByteCursor`] keeps one page of the source resident. Seeks only move the
//! logical position; the page is refilled lazily on the next read that
//! misses it, so hopping back and forth inside a page never touches the
//! source.

use crate::ebml::{self, ElementHeader, MAX_ID_LENGTH, MAX_VINT_LENGTH};
use crate::error::{MkvError, Result};
use crate::source::{read_full, ByteSource};

/// Buffered reader decoding EBML primitives from a [`ByteSource`].
pub struct ByteCursor<S: ByteSource> {
    source: S,
    page: Vec<u8>,
    page_start: u64,
    page_len: usize,
    pos: u64,
}

impl<S: ByteSource> ByteCursor<S> {
    /// Create a cursor at position 0 with a page of `page_size` bytes.
    pub fn new(source: S, page_size: usize) -> Self {
        Self {
            source,
            page: vec![0u8; page_size.max(16)],
            page_start: 0,
            page_len: 0,
            pos: 0,
        }
    }

    /// Get the underlying source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Total length of the source, if known.
    pub fn len(&self) -> Option<u64> {
        self.source.len()
    }

    /// Current absolute position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Move to an absolute position.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Advance by `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.pos = self
            .pos
            .checked_add(n)
            .ok_or_else(|| MkvError::malformed(self.pos, "skip past end of address space"))?;
        Ok(())
    }

    /// Whether the position is at or past the end of a known-length source.
    pub fn at_end(&self) -> bool {
        self.len().is_some_and(|len| self.pos >= len)
    }

    fn resident(&self, pos: u64) -> Option<usize> {
        let offset = pos.checked_sub(self.page_start)?;
        if offset < self.page_len as u64 {
            Some(offset as usize)
        } else {
            None
        }
    }

    fn fill_page(&mut self) -> Result<()> {
        self.page_start = self.pos;
        self.page_len = 0;
        self.page_len = read_full(&mut self.source, self.pos, &mut self.page)?;
        Ok(())
    }

    /// Fill `buf` exactly from the current position.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(offset) = self.resident(self.pos) {
                let n = (self.page_len - offset).min(buf.len() - filled);
                buf[filled..filled + n].copy_from_slice(&self.page[offset..offset + n]);
                filled += n;
                self.pos += n as u64;
                continue;
            }

            let remaining = buf.len() - filled;
            if remaining >= self.page.len() {
                // Large reads go straight to the source.
                let n = read_full(&mut self.source, self.pos, &mut buf[filled..])?;
                self.pos += n as u64;
                filled += n;
                if n < remaining {
                    return Err(MkvError::UnexpectedEndOfData { offset: self.pos });
                }
            } else {
                self.fill_page()?;
                if self.page_len == 0 {
                    return Err(MkvError::UnexpectedEndOfData { offset: self.pos });
                }
            }
        }
        Ok(())
    }

    /// Read one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    /// Read `n` bytes into a new buffer.
    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        // Refuse sizes the source cannot satisfy before allocating for them.
        if let Some(len) = self.len() {
            if self.pos.saturating_add(n) > len {
                return Err(MkvError::UnexpectedEndOfData { offset: len });
            }
        }
        let n = usize::try_from(n)
            .map_err(|_| MkvError::malformed(self.pos, format!("{n}-byte element")))?;
        let mut data = vec![0u8; n];
        self.read_into(&mut data)?;
        Ok(data)
    }

    /// Read an element ID (marker bits kept, at most 4 bytes).
    pub fn read_id(&mut self) -> Result<(u32, usize)> {
        let start = self.pos;
        let lead = self.read_byte()?;
        let length = ebml::vint_length_from_lead(lead)
            .filter(|&len| len <= MAX_ID_LENGTH)
            .ok_or(MkvError::MalformedVarInt { offset: start })?;

        let mut id = lead as u32;
        for _ in 1..length {
            id = (id << 8) | self.read_byte()? as u32;
        }
        Ok((id, length))
    }

    /// Read an unsigned VINT, returning the value and its length.
    pub fn read_vint(&mut self) -> Result<(u64, usize)> {
        let start = self.pos;
        let lead = self.read_byte()?;
        let length = ebml::vint_length_from_lead(lead)
            .filter(|&len| len <= MAX_VINT_LENGTH)
            .ok_or(MkvError::MalformedVarInt { offset: start })?;

        let mut raw = [0u8; MAX_VINT_LENGTH];
        raw[0] = lead;
        self.read_into(&mut raw[1..length])?;
        ebml::parse_vint(&raw[..length], start)
    }

    /// Read a bias-corrected signed VINT.
    pub fn read_signed_vint(&mut self) -> Result<(i64, usize)> {
        let (raw, length) = self.read_vint()?;
        Ok((ebml::vint_to_signed(raw, length), length))
    }

    /// Read an element size; `None` is the EBML unknown-size marker.
    pub fn read_size(&mut self) -> Result<(Option<u64>, usize)> {
        let (value, length) = self.read_vint()?;
        if value == ebml::unknown_size_marker(length) {
            Ok((None, length))
        } else {
            Ok((Some(value), length))
        }
    }

    /// Read an element header at the current position.
    pub fn read_element_header(&mut self) -> Result<ElementHeader> {
        let position = self.pos;
        let (id, id_len) = self.read_id()?;
        let (size, size_len) = self.read_size()?;
        Ok(ElementHeader {
            id,
            size,
            position,
            header_size: id_len + size_len,
        })
    }

    fn read_small(&mut self, n: u64, what: &str) -> Result<([u8; 8], usize)> {
        if n > 8 {
            return Err(MkvError::malformed(
                self.pos,
                format!("{what} element of {n} bytes"),
            ));
        }
        let n = n as usize;
        let mut buf = [0u8; 8];
        self.read_into(&mut buf[..n])?;
        Ok((buf, n))
    }

    /// Read a big-endian unsigned integer of 0–8 bytes.
    pub fn read_uint(&mut self, n: u64) -> Result<u64> {
        let (buf, n) = self.read_small(n, "integer")?;
        Ok(ebml::read_unsigned_int(&buf[..n]))
    }

    /// Read a big-endian signed integer of 0–8 bytes.
    pub fn read_sint(&mut self, n: u64) -> Result<i64> {
        let (buf, n) = self.read_small(n, "integer")?;
        Ok(ebml::read_signed_int(&buf[..n]))
    }

    /// Read an IEEE-754 float of 0, 4 or 8 bytes.
    pub fn read_float(&mut self, n: u64) -> Result<f64> {
        let start = self.pos;
        let (buf, n) = self.read_small(n, "float")?;
        ebml::read_float(&buf[..n], start)
    }

    /// Read a string element.
    pub fn read_string(&mut self, n: u64) -> Result<String> {
        let data = self.read_bytes(n)?;
        Ok(ebml::read_string(&data))
    }

    /// Find the next occurrence of a 4-byte signature at or after `from`.
    pub fn scan(&mut self, from: u64, signature: [u8; 4]) -> Result<Option<u64>> {
        Ok(self.source.scan(from, signature)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn cursor(data: &[u8]) -> ByteCursor<MemorySource<Vec<u8>>> {
        ByteCursor::new(MemorySource::new(data.to_vec()), 16)
    }

    #[test]
    fn test_read_across_pages() {
        let data: Vec<u8> = (0..64).collect();
        let mut c = cursor(&data);
        c.seek(10);
        let bytes = c.read_bytes(12).unwrap();
        assert_eq!(bytes, (10..22).collect::<Vec<u8>>());
        assert_eq!(c.tell(), 22);

        // Large read bypasses the page.
        c.seek(0);
        assert_eq!(c.read_bytes(40).unwrap().len(), 40);
    }

    #[test]
    fn test_seek_inside_page() {
        let data: Vec<u8> = (0..32).collect();
        let mut c = cursor(&data);
        assert_eq!(c.read_byte().unwrap(), 0);
        c.seek(5);
        assert_eq!(c.read_byte().unwrap(), 5);
        c.seek(1);
        assert_eq!(c.read_byte().unwrap(), 1);
    }

    #[test]
    fn test_read_id() {
        let mut c = cursor(&[0x1A, 0x45, 0xDF, 0xA3, 0xEC]);
        assert_eq!(c.read_id().unwrap(), (0x1A45DFA3, 4));
        assert_eq!(c.read_id().unwrap(), (0xEC, 1));
    }

    #[test]
    fn test_read_id_too_long() {
        let mut c = cursor(&[0x08, 0, 0, 0, 0]);
        assert!(matches!(
            c.read_id(),
            Err(MkvError::MalformedVarInt { offset: 0 })
        ));
    }

    #[test]
    fn test_read_vint_errors() {
        let mut c = cursor(&[0x00]);
        assert!(matches!(
            c.read_vint(),
            Err(MkvError::MalformedVarInt { .. })
        ));

        let mut c = cursor(&[0x20, 0x01]);
        assert!(matches!(
            c.read_vint(),
            Err(MkvError::UnexpectedEndOfData { .. })
        ));
    }

    #[test]
    fn test_read_unknown_size() {
        let mut c = cursor(&[0xFF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(c.read_size().unwrap(), (None, 1));
        assert_eq!(c.read_size().unwrap(), (None, 8));
    }

    #[test]
    fn test_read_element_header() {
        let mut c = cursor(&[0x00, 0x1F, 0x43, 0xB6, 0x75, 0x84]);
        c.seek(1);
        let header = c.read_element_header().unwrap();
        assert_eq!(header.id, 0x1F43B675);
        assert_eq!(header.size, Some(4));
        assert_eq!(header.position, 1);
        assert_eq!(header.header_size, 5);
    }

    #[test]
    fn test_read_numbers() {
        let mut data = vec![0x01, 0x00, 0xFF, 0xFE];
        data.extend_from_slice(&0.5f64.to_be_bytes());
        let mut c = cursor(&data);
        assert_eq!(c.read_uint(2).unwrap(), 256);
        assert_eq!(c.read_sint(2).unwrap(), -2);
        assert_eq!(c.read_float(8).unwrap(), 0.5);
        assert!(c.read_uint(9).is_err());
    }

    #[test]
    fn test_read_bytes_past_end() {
        let mut c = cursor(&[1, 2, 3]);
        assert!(matches!(
            c.read_bytes(1 << 40),
            Err(MkvError::UnexpectedEndOfData { .. })
        ));
        c.seek(1);
        assert!(matches!(
            c.read_bytes(3),
            Err(MkvError::UnexpectedEndOfData { .. })
        ));
    }
}
