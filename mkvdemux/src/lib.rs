//! # mkvdemux
//!
//! Matroska (.mkv) and WebM demultiplexer.
//!
//! The demuxer reads any seekable [`ByteSource`], parses the segment metadata
//! once at open time and then hands out [`Frame`]s in presentation order
//! across tracks. Frame payloads stay in the source until requested, so
//! memory use is bounded by the readahead budget rather than the file.
//!
//! ## Features
//!
//! - EBML variable-length integer decoding and element walking
//! - Segment info, tracks, chapters, attachments and tags
//! - SeekHead chains, with sequential fallback when pointers are missing
//! - Cue-based seeking, and reindexing by cluster scan when there are no cues
//! - Xiph, fixed-size and EBML lacing
//! - zlib and header-stripping content compression
//! - Resynchronisation on damaged clusters
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use mkvdemux::{MkvDemuxer, ReaderSource, SeekFlags};
//!
//! let source = ReaderSource::new(File::open("video.mkv").unwrap()).unwrap();
//! let mut demuxer = MkvDemuxer::open(source).unwrap();
//!
//! for track in demuxer.tracks() {
//!     println!("Track {}: {} {}", track.number, track.kind.name(), track.codec_id);
//! }
//!
//! demuxer.seek(30_000_000_000, SeekFlags::PREFER_PREV_KEYFRAME).unwrap();
//! while let Some(frame) = demuxer.read_frame().unwrap() {
//!     let data = demuxer.frame_data(&frame).unwrap();
//!     println!("track={} start={}ns size={}", frame.track, frame.start, data.len());
//! }
//! ```
//!
//! ## Matroska Element Structure
//!
//! ```text
//! EBML Header
//! Segment
//! ├── SeekHead (index to other elements)
//! ├── Info (segment information)
//! ├── Tracks (track definitions)
//! │   └── TrackEntry
//! │       ├── Video
//! │       ├── Audio
//! │       └── ContentEncodings
//! ├── Chapters (chapter markers)
//! ├── Cues (seeking index)
//! ├── Attachments (embedded files)
//! ├── Tags (metadata)
//! └── Cluster (media data)
//!     ├── Timecode
//!     └── SimpleBlock / BlockGroup
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod block;
pub mod compress;
pub mod config;
pub mod cues;
pub mod cursor;
pub mod demuxer;
pub mod ebml;
pub mod elements;
pub mod error;
pub mod model;
mod parse;
pub mod queue;
pub mod source;
pub mod walker;

pub use compress::FrameReader;
pub use config::DemuxConfig;
pub use cues::{Cue, CueIndex};
pub use demuxer::{DemuxerState, MkvDemuxer, SeekFlags, StreamError};
pub use ebml::{EbmlHeader, ElementHeader};
pub use elements::CodecClass;
pub use error::{MkvError, Result};
pub use model::{
    Attachment, AudioSettings, ChapterAtom, ChapterCommand, ChapterDisplay, ChapterProcess,
    Compression, CompressionAlgorithm, Edition, EncodingScope, SegmentInfo, SimpleTag, Tag,
    TagTargets, Track, TrackKind, TrackSettings, VideoSettings,
};
pub use queue::{Frame, FrameFlags, TrackMask, MAX_TRACKS};
pub use source::{ByteSource, MemorySource, ReaderSource};

/// Check if a buffer starts with the EBML header signature.
pub fn is_mkv_signature(data: &[u8]) -> bool {
    data.starts_with(&elements::EBML.to_be_bytes())
}
