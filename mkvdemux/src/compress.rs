//! Per-track content decompression.
//!
//! zlib-compressed frames are inflated incrementally: the compressed payload
//! is pulled from the source in small chunks and fed to [`flate2::Decompress`]
//! so a frame never has to be resident twice. Header-stripped frames get the
//! stored prefix put back in front of the payload.

use std::io::{self, Read};

use flate2::read::ZlibDecoder;
use flate2::{Decompress, FlushDecompress, Status};

use crate::cursor::ByteCursor;
use crate::error::{MkvError, Result};
use crate::source::ByteSource;

/// Inflate a complete zlib buffer (used for CodecPrivate).
pub fn inflate_all(data: &[u8], track: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| MkvError::DecompressionFailure {
            track,
            message: e.to_string(),
        })?;
    Ok(out)
}

/// Incremental inflater for one track's frames.
pub struct CompressedStreamReader {
    track: usize,
    inflate: Decompress,
    chunk: Vec<u8>,
    chunk_pos: usize,
    chunk_len: usize,
    position: u64,
    remaining: u64,
    finished: bool,
}

impl CompressedStreamReader {
    /// Create an inflater reading `chunk_size` compressed bytes per step.
    pub fn new(track: usize, chunk_size: usize) -> Self {
        Self {
            track,
            inflate: Decompress::new(true),
            chunk: vec![0u8; chunk_size.max(1)],
            chunk_pos: 0,
            chunk_len: 0,
            position: 0,
            remaining: 0,
            finished: true,
        }
    }

    /// Start a new frame whose compressed payload is at
    /// `[position, position + length)`.
    pub fn next_frame(&mut self, position: u64, length: u64) {
        self.inflate.reset(true);
        self.chunk_pos = 0;
        self.chunk_len = 0;
        self.position = position;
        self.remaining = length;
        self.finished = false;
    }

    fn failure(&self, message: impl Into<String>) -> MkvError {
        MkvError::DecompressionFailure {
            track: self.track,
            message: message.into(),
        }
    }

    /// Inflate into `buf`. `Ok(0)` means the frame is drained.
    pub fn read_decoded<S: ByteSource>(
        &mut self,
        cursor: &mut ByteCursor<S>,
        buf: &mut [u8],
    ) -> Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.chunk_pos == self.chunk_len && self.remaining > 0 {
                let n = self.remaining.min(self.chunk.len() as u64) as usize;
                cursor.seek(self.position);
                cursor.read_into(&mut self.chunk[..n])?;
                self.position += n as u64;
                self.remaining -= n as u64;
                self.chunk_pos = 0;
                self.chunk_len = n;
            }

            let input_done = self.remaining == 0;
            let flush = if input_done {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };

            let before_in = self.inflate.total_in();
            let before_out = self.inflate.total_out();
            let status = match self.inflate.decompress(
                &self.chunk[self.chunk_pos..self.chunk_len],
                buf,
                flush,
            ) {
                Ok(status) => status,
                Err(e) => return Err(self.failure(e.to_string())),
            };
            let consumed = (self.inflate.total_in() - before_in) as usize;
            let produced = (self.inflate.total_out() - before_out) as usize;
            self.chunk_pos += consumed;

            if status == Status::StreamEnd {
                self.finished = true;
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.finished {
                return Ok(0);
            }
            if consumed == 0 && input_done && self.chunk_pos == self.chunk_len {
                return Err(self.failure("compressed frame is truncated"));
            }
            if consumed == 0 && self.chunk_pos < self.chunk_len {
                return Err(self.failure("inflate made no progress"));
            }
        }
    }
}

enum ReadMode<'a> {
    Raw {
        prefix: &'a [u8],
        prefix_pos: usize,
        position: u64,
        remaining: u64,
    },
    Inflate(&'a mut CompressedStreamReader),
}

/// Reader over one frame's decoded payload.
///
/// Returned by [`crate::MkvDemuxer::frame_reader`].
pub struct FrameReader<'a, S: ByteSource> {
    cursor: &'a mut ByteCursor<S>,
    mode: ReadMode<'a>,
}

impl<'a, S: ByteSource> FrameReader<'a, S> {
    /// Reader over a stored payload, optionally preceded by a stripped header.
    pub(crate) fn raw(
        cursor: &'a mut ByteCursor<S>,
        prefix: &'a [u8],
        position: u64,
        length: u64,
    ) -> Self {
        Self {
            cursor,
            mode: ReadMode::Raw {
                prefix,
                prefix_pos: 0,
                position,
                remaining: length,
            },
        }
    }

    /// Reader inflating a zlib payload.
    pub(crate) fn inflate(
        cursor: &'a mut ByteCursor<S>,
        inflater: &'a mut CompressedStreamReader,
        position: u64,
        length: u64,
    ) -> Self {
        inflater.next_frame(position, length);
        Self {
            cursor,
            mode: ReadMode::Inflate(inflater),
        }
    }

    /// Decode into `buf`, returning the number of bytes written.
    pub fn read_decoded(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.mode {
            ReadMode::Raw {
                prefix,
                prefix_pos,
                position,
                remaining,
            } => {
                if *prefix_pos < prefix.len() {
                    let n = (prefix.len() - *prefix_pos).min(buf.len());
                    buf[..n].copy_from_slice(&prefix[*prefix_pos..*prefix_pos + n]);
                    *prefix_pos += n;
                    return Ok(n);
                }
                let n = (*remaining).min(buf.len() as u64) as usize;
                if n == 0 {
                    return Ok(0);
                }
                self.cursor.seek(*position);
                self.cursor.read_into(&mut buf[..n])?;
                *position += n as u64;
                *remaining -= n as u64;
                Ok(n)
            }
            ReadMode::Inflate(inflater) => inflater.read_decoded(self.cursor, buf),
        }
    }

    /// Decode the rest of the frame into a vector.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.read_decoded(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

impl<S: ByteSource> Read for FrameReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_decoded(buf).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_inflate_all() {
        let packed = zlib(b"codec private bytes");
        assert_eq!(inflate_all(&packed, 0).unwrap(), b"codec private bytes");
        assert!(matches!(
            inflate_all(&[1, 2, 3, 4], 2),
            Err(MkvError::DecompressionFailure { track: 2, .. })
        ));
    }

    #[test]
    fn test_incremental_inflate_small_chunks() {
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let packed = zlib(&payload);
        let mut data = vec![0xAAu8; 10];
        data.extend_from_slice(&packed);
        data.extend_from_slice(&[0xBB; 10]);

        let mut cursor = ByteCursor::new(MemorySource::new(data), 64);
        let mut inflater = CompressedStreamReader::new(0, 7);
        let mut reader = FrameReader::inflate(&mut cursor, &mut inflater, 10, packed.len() as u64);
        assert_eq!(reader.read_all().unwrap(), payload);

        // Drained frames keep returning 0.
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_decoded(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_truncated_frame_fails() {
        let packed = zlib(&[7u8; 1000]);
        let truncated = packed[..packed.len() / 2].to_vec();
        let len = truncated.len() as u64;
        let mut cursor = ByteCursor::new(MemorySource::new(truncated), 64);
        let mut inflater = CompressedStreamReader::new(3, 16);
        let mut reader = FrameReader::inflate(&mut cursor, &mut inflater, 0, len);
        assert!(matches!(
            reader.read_all(),
            Err(MkvError::DecompressionFailure { track: 3, .. })
        ));
    }

    #[test]
    fn test_raw_with_stripped_header() {
        let mut cursor = ByteCursor::new(MemorySource::new(vec![9u8, 1, 2, 3, 9]), 16);
        let prefix = [0xFFu8, 0xF1];
        let mut reader = FrameReader::raw(&mut cursor, &prefix, 1, 3);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![0xFF, 0xF1, 1, 2, 3]);
    }
}
