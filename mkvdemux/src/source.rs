//! Random-access byte sources.
//!
//! The demuxer never owns a file handle directly; it reads through
//! [`ByteSource`], which callers implement for whatever storage they have.

use std::io::{self, Read, Seek, SeekFrom};

/// Chunk size used by the default [`ByteSource::scan`].
const SCAN_CHUNK: usize = 64 * 1024;

/// A seekable, random-access byte source.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes starting at absolute position `pos`.
    ///
    /// Returns the number of bytes read; `0` means end of data.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length in bytes, if known.
    fn len(&self) -> Option<u64>;

    /// Whether the source is known to be empty.
    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Size of the cache backing this source, if any. The demuxer spends at
    /// most half of it on readahead.
    fn cache_size(&self) -> Option<u64> {
        None
    }

    /// Find the first occurrence of `signature` at or after `from`.
    ///
    /// The default implementation reads forward in chunks; sources with an
    /// index or a memory map should override it.
    fn scan(&mut self, from: u64, signature: [u8; 4]) -> io::Result<Option<u64>> {
        let mut buf = vec![0u8; SCAN_CHUNK];
        let mut pos = from;

        loop {
            let n = read_full(self, pos, &mut buf)?;
            if n < signature.len() {
                return Ok(None);
            }

            if let Some(i) = buf[..n].windows(4).position(|w| w == signature) {
                return Ok(Some(pos + i as u64));
            }
            if n < buf.len() {
                return Ok(None);
            }
            // Overlap so a signature straddling chunks is still found.
            pos += (n - (signature.len() - 1)) as u64;
        }
    }
}

/// Fill `buf` from `pos`, stopping early only at end of data.
pub(crate) fn read_full<S: ByteSource + ?Sized>(
    source: &mut S,
    pos: u64,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read_at(pos + filled as u64, &mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(pos, buf)
    }

    fn len(&self) -> Option<u64> {
        (**self).len()
    }

    fn cache_size(&self) -> Option<u64> {
        (**self).cache_size()
    }

    fn scan(&mut self, from: u64, signature: [u8; 4]) -> io::Result<Option<u64>> {
        (**self).scan(from, signature)
    }
}

/// In-memory source over an owned or borrowed buffer.
#[derive(Debug, Clone)]
pub struct MemorySource<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> MemorySource<T> {
    /// Wrap a buffer.
    pub fn new(data: T) -> Self {
        Self { data }
    }

    /// Get the underlying buffer.
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: AsRef<[u8]>> ByteSource for MemorySource<T> {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.as_ref();
        let Ok(start) = usize::try_from(pos) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.as_ref().len() as u64)
    }

    fn scan(&mut self, from: u64, signature: [u8; 4]) -> io::Result<Option<u64>> {
        let data = self.data.as_ref();
        let Ok(start) = usize::try_from(from) else {
            return Ok(None);
        };
        if start >= data.len() {
            return Ok(None);
        }
        Ok(data[start..]
            .windows(4)
            .position(|w| w == signature)
            .map(|i| from + i as u64))
    }
}

/// Adapter for any `Read + Seek` (files, `BufReader`, `Cursor`).
#[derive(Debug)]
pub struct ReaderSource<R: Read + Seek> {
    reader: R,
    len: Option<u64>,
    position: u64,
    cache_size: Option<u64>,
}

impl<R: Read + Seek> ReaderSource<R> {
    /// Wrap a reader, probing its length by seeking to the end.
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            len: Some(len),
            position: 0,
            cache_size: None,
        })
    }

    /// Advertise the size of a cache in front of this reader.
    pub fn with_cache_size(mut self, bytes: u64) -> Self {
        self.cache_size = Some(bytes);
        self
    }

    /// Get the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> ByteSource for ReaderSource<R> {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<usize> {
        if pos != self.position {
            self.reader.seek(SeekFrom::Start(pos))?;
            self.position = pos;
        }
        let n = self.reader.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn len(&self) -> Option<u64> {
        self.len
    }

    fn cache_size(&self) -> Option<u64> {
        self.cache_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SIG: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];

    #[test]
    fn test_memory_source_read() {
        let mut source = MemorySource::new(vec![1u8, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(source.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(source.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(source.len(), Some(5));
    }

    #[test]
    fn test_memory_source_scan() {
        let mut data = vec![0u8; 100];
        data[40..44].copy_from_slice(&SIG);
        data[70..74].copy_from_slice(&SIG);
        let mut source = MemorySource::new(data);
        assert_eq!(source.scan(0, SIG).unwrap(), Some(40));
        assert_eq!(source.scan(41, SIG).unwrap(), Some(70));
        assert_eq!(source.scan(71, SIG).unwrap(), None);
    }

    #[test]
    fn test_default_scan_across_chunks() {
        // Signature straddles the first chunk boundary.
        let mut data = vec![0u8; SCAN_CHUNK + 100];
        let at = SCAN_CHUNK - 2;
        data[at..at + 4].copy_from_slice(&SIG);
        let mut source = ReaderSource::new(Cursor::new(data)).unwrap();
        assert_eq!(source.scan(0, SIG).unwrap(), Some(at as u64));
        assert_eq!(source.scan(at as u64 + 1, SIG).unwrap(), None);
    }

    #[test]
    fn test_reader_source() {
        let mut source = ReaderSource::new(Cursor::new(vec![9u8; 16]))
            .unwrap()
            .with_cache_size(1024);
        assert_eq!(source.len(), Some(16));
        assert_eq!(source.cache_size(), Some(1024));
        let mut buf = [0u8; 4];
        assert_eq!(read_full(&mut source, 14, &mut buf).unwrap(), 2);
    }
}
