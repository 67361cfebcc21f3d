//! Block and SimpleBlock decoding.
//!
//! A block body is a track-number VINT, a signed 16-bit timecode relative to
//! the cluster, a flags byte, and then either one payload or a lace of up to
//! 256 payloads. Decoding only computes payload byte ranges; the bytes stay
//! in the source until a frame is read.

use crate::ebml;
use crate::error::{MkvError, Result};

/// Longest possible block header: 8-byte track VINT, timecode, flags.
pub const MAX_BLOCK_HEADER: usize = 8 + 2 + 1;

/// Lacing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    /// One frame per block.
    None,
    /// Xiph-style lacing with 255-continued sizes.
    Xiph,
    /// All frames the same size.
    Fixed,
    /// EBML-style lacing with signed size deltas.
    Ebml,
}

impl Lacing {
    fn from_flags(flags: u8) -> Self {
        match (flags >> 1) & 0x03 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::Fixed,
            _ => Lacing::Ebml,
        }
    }
}

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Track number.
    pub track_number: u64,
    /// Timecode relative to the cluster, in ticks.
    pub timecode: i16,
    /// Raw flags byte.
    pub flags: u8,
    /// Lacing mode.
    pub lacing: Lacing,
    /// Header length in bytes.
    pub size: usize,
}

impl BlockHeader {
    /// Keyframe flag (SimpleBlock only).
    pub fn is_keyframe(&self) -> bool {
        self.flags & 0x80 != 0
    }

    /// Invisible flag.
    pub fn is_invisible(&self) -> bool {
        self.flags & 0x08 != 0
    }

    /// Discardable flag (SimpleBlock only).
    pub fn is_discardable(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// Parse a block header from the start of `data`.
pub fn parse_block_header(data: &[u8], offset: u64) -> Result<BlockHeader> {
    let (track_number, vint_len) = ebml::parse_vint(data, offset)?;
    let rest = &data[vint_len..];
    if rest.len() < 3 {
        return Err(MkvError::malformed(offset, "block header too small"));
    }

    let timecode = i16::from_be_bytes([rest[0], rest[1]]);
    let flags = rest[2];

    Ok(BlockHeader {
        track_number,
        timecode,
        flags,
        lacing: Lacing::from_flags(flags),
        size: vint_len + 3,
    })
}

/// Split a laced payload into frame sizes.
///
/// `data` starts at the frame-count byte and runs to the end of the block.
/// Returns the size of every frame and the length of the lace header.
pub fn lace_sizes(data: &[u8], lacing: Lacing, offset: u64) -> Result<(Vec<u64>, usize)> {
    if lacing == Lacing::None {
        return Ok((vec![data.len() as u64], 0));
    }

    let (&count, sizes_data) = data
        .split_first()
        .ok_or_else(|| MkvError::InvalidLacing("no data after block header".to_string()))?;
    let num_frames = count as usize + 1;

    let (mut sizes, sizes_len) = match lacing {
        Lacing::Xiph => parse_xiph_lacing(sizes_data, num_frames)?,
        Lacing::Ebml => parse_ebml_lacing(sizes_data, num_frames, offset + 1)?,
        Lacing::Fixed => {
            let sizes = parse_fixed_lacing(sizes_data.len() as u64, num_frames, offset)?;
            return Ok((sizes, 1));
        }
        Lacing::None => unreachable!(),
    };

    let header_len = 1 + sizes_len;
    let available = (data.len() - header_len) as u64;
    let used = sizes
        .iter()
        .try_fold(0u64, |total, &size| total.checked_add(size))
        .unwrap_or(u64::MAX);
    if used > available {
        return Err(MkvError::InvalidLacing(format!(
            "lace sizes total {} bytes but only {} remain",
            used, available
        )));
    }
    sizes.push(available - used);

    Ok((sizes, header_len))
}

/// Parse frame sizes from Xiph-style lacing (all but the last frame).
///
/// Each size is a run of 255 bytes terminated by a byte below 255.
fn parse_xiph_lacing(data: &[u8], num_frames: usize) -> Result<(Vec<u64>, usize)> {
    let mut frame_sizes = Vec::with_capacity(num_frames);
    let mut offset = 0;

    for _ in 0..num_frames - 1 {
        let mut size = 0u64;
        loop {
            let byte = *data.get(offset).ok_or_else(|| {
                MkvError::InvalidLacing("Xiph lacing: unexpected end of data".to_string())
            })? as u64;
            offset += 1;
            size += byte;
            if byte < 255 {
                break;
            }
        }
        frame_sizes.push(size);
    }

    Ok((frame_sizes, offset))
}

/// Parse frame sizes from EBML-style lacing (all but the last frame).
///
/// The first size is an unsigned VINT; later sizes are signed deltas from the
/// previous size.
fn parse_ebml_lacing(data: &[u8], num_frames: usize, offset: u64) -> Result<(Vec<u64>, usize)> {
    let mut frame_sizes = Vec::with_capacity(num_frames);
    if num_frames < 2 {
        return Ok((frame_sizes, 0));
    }

    let (first, mut pos) = ebml::parse_vint(data, offset)?;
    frame_sizes.push(first);

    let mut prev = first as i64;
    for _ in 1..num_frames - 1 {
        let (delta, len) = ebml::parse_signed_vint(&data[pos..], offset + pos as u64)?;
        pos += len;
        prev = prev
            .checked_add(delta)
            .filter(|&size| size >= 0)
            .ok_or_else(|| MkvError::InvalidLacing("EBML lacing: negative frame size".to_string()))?;
        frame_sizes.push(prev as u64);
    }

    Ok((frame_sizes, pos))
}

/// Frame sizes for fixed-size lacing.
fn parse_fixed_lacing(total: u64, num_frames: usize, offset: u64) -> Result<Vec<u64>> {
    let n = num_frames as u64;
    if total % n != 0 {
        return Err(MkvError::malformed(
            offset,
            format!(
                "fixed lacing: {} bytes not divisible into {} frames",
                total, num_frames
            ),
        ));
    }
    Ok(vec![total / n; num_frames])
}

/// Time in nanoseconds of `cluster + relative` ticks, rebased by the first
/// cluster's `first_ticks` before scaling and saturating at zero.
pub fn block_time_ns(
    cluster_timecode: u64,
    relative: i16,
    track_scale: f64,
    segment_scale: u64,
    first_ticks: u64,
) -> u64 {
    let ticks = cluster_timecode as i128 + relative as i128 - first_ticks as i128;
    if ticks <= 0 {
        return 0;
    }
    ticks_to_ns(ticks as u64, track_scale, segment_scale)
}

/// Convert ticks to nanoseconds.
pub fn ticks_to_ns(ticks: u64, track_scale: f64, segment_scale: u64) -> u64 {
    if track_scale == 1.0 {
        ticks.saturating_mul(segment_scale)
    } else {
        (ticks as f64 * track_scale * segment_scale as f64) as u64
    }
}
