//! Decoded frames and the per-track FIFOs that hold them until delivery.

use std::collections::VecDeque;

use bitflags::bitflags;
use serde::Serialize;

/// Highest number of tracks the engine tracks; later entries are dropped.
pub const MAX_TRACKS: usize = 256;

bitflags! {
    /// Per-frame flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct FrameFlags: u32 {
        /// The start time is inherited from the block, not exact.
        const UNKNOWN_START = 0x01;
        /// The end time is not known.
        const UNKNOWN_END = 0x02;
        /// Frame can be decoded without earlier frames.
        const KEYFRAME = 0x04;
        /// First frame of this track after a seek or resync.
        const GAP = 0x08;
        /// Frame may be dropped by the decoder.
        const DISCARDABLE = 0x10;
        /// Frame is decoded but not displayed.
        const INVISIBLE = 0x20;
        /// Block additions are attached.
        const BLOCK_ADDITIONS = 0x40;
    }
}

/// One demuxed frame. The payload stays in the source until read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Track index.
    pub track: usize,
    /// Start time in nanoseconds.
    pub start: u64,
    /// End time in nanoseconds (equal to `start` when unknown).
    pub end: u64,
    /// Absolute byte offset of the payload.
    pub position: u64,
    /// Payload length in bytes, before decompression.
    pub length: u64,
    /// Frame flags.
    pub flags: FrameFlags,
    /// Byte range `(position, length)` of the first BlockAdditional.
    pub additions: Option<(u64, u64)>,
}

impl Frame {
    /// Whether the frame is a keyframe.
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(FrameFlags::KEYFRAME)
    }

    /// Duration in nanoseconds, when the end is known.
    pub fn duration(&self) -> Option<u64> {
        if self.flags.contains(FrameFlags::UNKNOWN_END) {
            None
        } else {
            Some(self.end.saturating_sub(self.start))
        }
    }
}

/// Set of track indices to ignore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TrackMask([u64; MAX_TRACKS / 64]);

impl TrackMask {
    /// Empty mask: every track is delivered.
    pub fn none() -> Self {
        Self::default()
    }

    /// Mask every track except `keep`.
    pub fn all_except(track_count: usize, keep: &[usize]) -> Self {
        let mut mask = Self::default();
        for index in (0..track_count.min(MAX_TRACKS)).filter(|i| !keep.contains(i)) {
            mask.insert(index);
        }
        mask
    }

    /// Mask `index`. Indices past [`MAX_TRACKS`] are ignored.
    pub fn insert(&mut self, index: usize) {
        if index < MAX_TRACKS {
            self.0[index / 64] |= 1 << (index % 64);
        }
    }

    /// Unmask `index`.
    pub fn remove(&mut self, index: usize) {
        if index < MAX_TRACKS {
            self.0[index / 64] &= !(1 << (index % 64));
        }
    }

    /// Whether `index` is masked.
    pub fn contains(&self, index: usize) -> bool {
        index < MAX_TRACKS && self.0[index / 64] & (1 << (index % 64)) != 0
    }

    /// Whether no track is masked.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    /// Masked track indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_TRACKS).filter(move |&i| self.contains(i))
    }
}

impl FromIterator<usize> for TrackMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = Self::default();
        for index in iter {
            mask.insert(index);
        }
        mask
    }
}

/// Per-track frame FIFOs.
#[derive(Debug, Default)]
pub(crate) struct TrackQueues {
    queues: Vec<VecDeque<Frame>>,
    bytes: u64,
}

impl TrackQueues {
    pub fn new(track_count: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); track_count],
            bytes: 0,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if let Some(queue) = self.queues.get_mut(frame.track) {
            self.bytes += frame.length;
            queue.push_back(frame);
        }
    }

    /// Payload bytes currently queued.
    pub fn queued_bytes(&self) -> u64 {
        self.bytes
    }

    /// Every unmasked track has at least one frame queued.
    pub fn all_ready(&self, mask: &TrackMask) -> bool {
        self.unmasked(mask).all(|(_, q)| !q.is_empty())
    }

    /// At least one unmasked track has a frame queued.
    pub fn any_ready(&self, mask: &TrackMask) -> bool {
        self.unmasked(mask).any(|(_, q)| !q.is_empty())
    }

    /// Remove the earliest unmasked frame: lowest start, then lowest index.
    pub fn pop_earliest(&mut self, mask: &TrackMask) -> Option<Frame> {
        let (index, _) = self
            .unmasked(mask)
            .filter_map(|(i, q)| q.front().map(|f| (i, f.start)))
            .min_by_key(|&(i, start)| (start, i))?;
        let frame = self.queues[index].pop_front()?;
        self.bytes -= frame.length;
        Some(frame)
    }

    /// Drain every queue in delivery order.
    pub fn drain_all(&mut self) -> Vec<Frame> {
        let everything = TrackMask::none();
        let mut frames = Vec::new();
        while let Some(frame) = self.pop_earliest(&everything) {
            frames.push(frame);
        }
        frames
    }

    pub fn clear_track(&mut self, index: usize) {
        if let Some(queue) = self.queues.get_mut(index) {
            self.bytes -= queue.iter().map(|f| f.length).sum::<u64>();
            queue.clear();
        }
    }

    pub fn clear(&mut self) {
        self.queues.iter_mut().for_each(VecDeque::clear);
        self.bytes = 0;
    }

    fn unmasked<'a>(
        &'a self,
        mask: &'a TrackMask,
    ) -> impl Iterator<Item = (usize, &'a VecDeque<Frame>)> + 'a {
        self.queues
            .iter()
            .enumerate()
            .filter(move |(i, _)| !mask.contains(*i))
    }
}
