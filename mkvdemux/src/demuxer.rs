//! Matroska demuxer engine.
//!
//! [`MkvDemuxer`] owns the byte cursor, the metadata parsed at open, the cue
//! index and the per-track frame queues. Opening walks the segment's
//! top-level elements up to the first Cluster and follows SeekHead pointers
//! for the rest. Reading decodes clusters block by block into the queues and
//! hands frames out in time order.

use std::collections::HashMap;

use bitflags::bitflags;
use tracing::{debug, error, info, trace, warn};

use crate::block::{self, Lacing, MAX_BLOCK_HEADER};
use crate::compress::{CompressedStreamReader, FrameReader};
use crate::config::{DemuxConfig, MAX_RESYNC_ATTEMPTS, MAX_SEEK_HEAD_HOPS};
use crate::cues::{self, Cue, CueIndex};
use crate::cursor::ByteCursor;
use crate::ebml::{EbmlHeader, ElementHeader};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::model::{Attachment, CompressionAlgorithm, Edition, SegmentInfo, Tag, Track};
use crate::parse::attachments::parse_attachments;
use crate::parse::chapters::parse_chapters;
use crate::parse::header::parse_ebml_header;
use crate::parse::info::parse_info;
use crate::parse::seekhead::{parse_seek_head, SeekEntry};
use crate::parse::tags::parse_tags;
use crate::parse::tracks::parse_tracks;
use crate::parse::{leaf_size, uint};
use crate::queue::{Frame, FrameFlags, TrackMask, TrackQueues};
use crate::source::ByteSource;
use crate::walker::{walk_nested, Walk};

bitflags! {
    /// Seek behaviour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeekFlags: u32 {
        /// Start every track at its last keyframe at or before the target.
        const PREFER_PREV_KEYFRAME = 0x01;
        /// Only frames flagged as keyframes count as keyframes, on every
        /// track.
        const STRICT = 0x02;
    }
}

/// Demuxer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerState {
    /// Parsing metadata.
    Open,
    /// Delivering frames.
    Reading,
    /// Repositioning.
    Seeking,
}

/// A fatal stream error recorded by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    /// Error description.
    pub message: String,
    /// Track whose block was being decoded, if any.
    pub track: Option<usize>,
    /// Byte offset of the element that failed.
    pub offset: u64,
}

bitflags! {
    /// Top-level containers already parsed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Sections: u8 {
        const INFO = 0x01;
        const TRACKS = 0x02;
        const CUES = 0x04;
        const CHAPTERS = 0x08;
        const ATTACHMENTS = 0x10;
        const TAGS = 0x20;
    }
}

impl Sections {
    fn for_id(id: u32) -> Option<Self> {
        match id {
            INFO => Some(Sections::INFO),
            TRACKS => Some(Sections::TRACKS),
            CUES => Some(Sections::CUES),
            CHAPTERS => Some(Sections::CHAPTERS),
            ATTACHMENTS => Some(Sections::ATTACHMENTS),
            TAGS => Some(Sections::TAGS),
            _ => None,
        }
    }

    fn is_mandatory(self) -> bool {
        self.intersects(Sections::INFO | Sections::TRACKS)
    }
}

/// Bookkeeping for the open pass.
#[derive(Debug, Default)]
struct OpenPass {
    seen: Sections,
    pointers: Vec<SeekEntry>,
    seek_heads: Vec<u64>,
}

impl Default for Sections {
    fn default() -> Self {
        Sections::empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct ClusterState {
    timecode: Option<u64>,
    end: Option<u64>,
}

/// Per-track filter applied after a seek.
#[derive(Debug, Clone, Copy)]
struct SkipUntil {
    time: u64,
    need_keyframe: bool,
}

/// BlockGroup children that modify the Block.
#[derive(Debug, Clone, Copy, Default)]
struct BlockExtras {
    duration: Option<u64>,
    referenced: bool,
    additions: Option<(u64, u64)>,
}

/// Matroska/WebM demuxer.
pub struct MkvDemuxer<S: ByteSource> {
    cursor: ByteCursor<S>,
    config: DemuxConfig,
    state: DemuxerState,
    ebml_header: EbmlHeader,
    info: SegmentInfo,
    tracks: Vec<Track>,
    track_numbers: HashMap<u64, usize>,
    editions: Vec<Edition>,
    attachments: Vec<Attachment>,
    tags: Vec<Tag>,
    cues: CueIndex,
    /// First byte of the segment body.
    segment_start: u64,
    /// End of the segment body, clamped to the source length.
    segment_end: u64,
    first_cluster: Option<u64>,
    /// Timecode of the first cluster, in segment ticks.
    first_ticks: u64,
    /// Timecode of the first cluster, in nanoseconds.
    first_timecode: u64,
    readahead: u64,
    /// Next element to decode.
    position: u64,
    cluster: Option<ClusterState>,
    queues: TrackQueues,
    mask: TrackMask,
    skip: Vec<Option<SkipUntil>>,
    gap: Vec<bool>,
    inflaters: Vec<Option<CompressedStreamReader>>,
    eos: bool,
    resync_attempts: usize,
    current_track: Option<usize>,
    error: Option<StreamError>,
}

impl<S: ByteSource> MkvDemuxer<S> {
    /// Open a source with the default configuration.
    pub fn open(source: S) -> Result<Self> {
        Self::open_with_config(source, DemuxConfig::default())
    }

    /// Open a source: parse the EBML header and all segment metadata.
    pub fn open_with_config(source: S, config: DemuxConfig) -> Result<Self> {
        config.validate()?;
        let readahead = config.readahead_budget(source.cache_size());
        let mut cursor = ByteCursor::new(source, config.page_size);

        let ebml_header = parse_ebml_header(&mut cursor)?;
        let segment = find_segment(&mut cursor)?;

        let source_end = cursor.len().unwrap_or(u64::MAX);
        let segment_start = segment.data_offset();
        let segment_end = match segment.end() {
            Some(end) if end > source_end => {
                warn!(
                    declared = end,
                    available = source_end,
                    "segment extends past the end of the source, clamped"
                );
                source_end
            }
            Some(end) => end,
            None => source_end,
        };
        debug!(
            doc_type = %ebml_header.doc_type,
            segment_start,
            segment_end,
            "segment found"
        );

        let mut demuxer = Self {
            cursor,
            config,
            state: DemuxerState::Open,
            ebml_header,
            info: SegmentInfo::default(),
            tracks: Vec::new(),
            track_numbers: HashMap::new(),
            editions: Vec::new(),
            attachments: Vec::new(),
            tags: Vec::new(),
            cues: CueIndex::default(),
            segment_start,
            segment_end,
            first_cluster: None,
            first_ticks: 0,
            first_timecode: 0,
            readahead,
            position: segment_end,
            cluster: None,
            queues: TrackQueues::default(),
            mask: TrackMask::none(),
            skip: Vec::new(),
            gap: Vec::new(),
            inflaters: Vec::new(),
            eos: false,
            resync_attempts: 0,
            current_track: None,
            error: None,
        };
        demuxer.read_metadata()?;
        Ok(demuxer)
    }

    /// Release the byte source.
    pub fn into_inner(self) -> S {
        self.cursor.into_inner()
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    fn read_metadata(&mut self) -> Result<()> {
        let mut pass = OpenPass::default();
        let mut pos = self.segment_start;

        while pos < self.segment_end {
            self.cursor.seek(pos);
            let header = match self.cursor.read_element_header() {
                Ok(header) => header,
                Err(e) if e.is_corruption() => {
                    warn!(offset = pos, error = %e, "damaged top-level element, metadata walk stopped");
                    break;
                }
                Err(e) => return Err(e),
            };

            match header.id {
                CLUSTER => {
                    self.first_cluster = Some(pos);
                    break;
                }
                SEGMENT | EBML => break,
                _ => {}
            }

            match self.read_section(&header, &mut pass, true)? {
                Some(end) => pos = end,
                None => {
                    warn!(
                        offset = pos,
                        element = top_level_name(header.id),
                        "unknown-size element skipped, metadata walk stopped"
                    );
                    break;
                }
            }
        }

        self.resolve_pointers(&mut pass)?;

        if !pass.seen.contains(Sections::TRACKS) {
            return Err(MkvError::MissingElement("Tracks".to_string()));
        }
        if !pass.seen.contains(Sections::INFO) {
            warn!("segment has no Info element, defaults used");
        }

        if self.first_cluster.is_none() {
            let hint = pass.pointers.iter().find(|e| e.id == CLUSTER).map(|e| e.position);
            self.first_cluster = self.locate_first_cluster(pos, hint)?;
        }
        if let Some(first) = self.first_cluster {
            match cues::probe_cluster(&mut self.cursor, first, self.segment_end)? {
                Some(probe) => {
                    self.first_ticks = probe.timecode;
                    self.first_timecode =
                        block::ticks_to_ns(probe.timecode, 1.0, self.info.timecode_scale);
                }
                None => {
                    return Err(MkvError::malformed(
                        first,
                        "first cluster has no readable Timecode",
                    ))
                }
            }
        } else {
            debug!("segment has no clusters");
        }

        for edition in &mut self.editions {
            for atom in &mut edition.chapters {
                atom.rebase(self.first_timecode);
            }
        }

        let count = self.tracks.len();
        self.track_numbers = self
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| (track.number, index))
            .collect();
        self.queues = TrackQueues::new(count);
        self.skip = vec![None; count];
        self.gap = vec![false; count];
        self.inflaters = (0..count).map(|_| None).collect();
        self.position = self.first_cluster.unwrap_or(self.segment_end);
        self.state = DemuxerState::Reading;

        info!(
            tracks = count,
            cues = self.cues.len(),
            editions = self.editions.len(),
            attachments = self.attachments.len(),
            first_timecode = self.first_timecode,
            "matroska segment opened"
        );
        Ok(())
    }

    /// Parse one top-level element. Returns where it ends, or `None` when
    /// an unknown-size element was skipped and its end cannot be known.
    fn read_section(
        &mut self,
        header: &ElementHeader,
        pass: &mut OpenPass,
        inline: bool,
    ) -> Result<Option<u64>> {
        if header.id == SEEK_HEAD {
            match parse_seek_head(&mut self.cursor, header) {
                Ok(entries) => {
                    debug!(position = header.position, entries = entries.len(), "seek head parsed");
                    pass.seek_heads.push(header.position);
                    pass.pointers.extend(entries);
                }
                Err(e) if e.is_corruption() => {
                    warn!(position = header.position, error = %e, "damaged SeekHead ignored");
                    return Ok(header.end());
                }
                Err(e) => return Err(e),
            }
            return Ok(Some(header.end().unwrap_or_else(|| self.cursor.tell())));
        }

        let Some(section) = Sections::for_id(header.id) else {
            trace!(id = header.id, position = header.position, "top-level element skipped");
            return Ok(header.end());
        };
        let name = top_level_name(header.id);

        if pass.seen.contains(section) {
            debug!(element = name, position = header.position, "already parsed, skipped");
            return Ok(header.end());
        }
        if inline
            && !section.is_mandatory()
            && header.size.is_some_and(|size| size > self.config.max_metadata_size)
        {
            debug!(element = name, size = header.size, "oversized element deferred");
            return Ok(header.end());
        }
        pass.seen |= section;

        let result = match header.id {
            INFO => parse_info(&mut self.cursor, header).map(|info| self.info = info),
            TRACKS => parse_tracks(&mut self.cursor, header).map(|tracks| self.tracks = tracks),
            CUES => cues::parse_cues(&mut self.cursor, header).map(|c| self.cues = CueIndex::new(c)),
            CHAPTERS => parse_chapters(&mut self.cursor, header).map(|e| self.editions = e),
            ATTACHMENTS => {
                parse_attachments(&mut self.cursor, header).map(|a| self.attachments = a)
            }
            TAGS => parse_tags(&mut self.cursor, header).map(|t| self.tags = t),
            _ => Ok(()),
        };

        match result {
            Ok(()) => Ok(Some(header.end().unwrap_or_else(|| self.cursor.tell()))),
            Err(e) if section.is_mandatory() => Err(e),
            Err(e) if e.is_corruption() => {
                warn!(element = name, error = %e, "damaged section treated as absent");
                Ok(header.end())
            }
            Err(e) => Err(e),
        }
    }

    /// Parse the containers advertised by SeekHeads that the sequential walk
    /// did not reach.
    fn resolve_pointers(&mut self, pass: &mut OpenPass) -> Result<()> {
        let mut hops = 0;
        let mut next = 0;

        while next < pass.pointers.len() {
            let entry = pass.pointers[next];
            next += 1;

            match entry.id {
                SEEK_HEAD => {
                    let position = self.segment_start.saturating_add(entry.position);
                    if pass.seek_heads.contains(&position) {
                        continue;
                    }
                    if hops >= MAX_SEEK_HEAD_HOPS {
                        warn!(position, "SeekHead chain too long, remaining links ignored");
                        continue;
                    }
                    hops += 1;
                }
                id => match Sections::for_id(id) {
                    Some(section) if !pass.seen.contains(section) => {}
                    _ => continue,
                },
            }

            let position = self.segment_start.saturating_add(entry.position);
            if position >= self.segment_end {
                warn!(
                    element = top_level_name(entry.id),
                    position,
                    "seek entry points past the segment end"
                );
                continue;
            }

            self.cursor.seek(position);
            let header = match self.cursor.read_element_header() {
                Ok(header) if header.id == entry.id => header,
                Ok(header) => {
                    warn!(
                        expected = top_level_name(entry.id),
                        found = header.id,
                        position,
                        "seek entry points at the wrong element"
                    );
                    continue;
                }
                Err(e) if e.is_corruption() => {
                    warn!(position, error = %e, "unreadable seek target");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.read_section(&header, pass, false)?;
        }
        Ok(())
    }

    /// Find the first cluster when the sequential walk stopped short of it.
    fn locate_first_cluster(&mut self, from: u64, hint: Option<u64>) -> Result<Option<u64>> {
        if let Some(relative) = hint {
            let position = self.segment_start.saturating_add(relative);
            if cues::probe_cluster(&mut self.cursor, position, self.segment_end)?.is_some() {
                return Ok(Some(position));
            }
        }
        let found = self.find_next_cluster(from)?;
        if let Some(position) = found {
            debug!(position, "first cluster located by scanning");
        }
        Ok(found)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Segment information.
    pub fn file_info(&self) -> &SegmentInfo {
        &self.info
    }

    /// EBML header.
    pub fn ebml_header(&self) -> &EbmlHeader {
        &self.ebml_header
    }

    /// Number of tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track at `index`.
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Track carrying block track number `number`.
    pub fn track_by_number(&self, number: u64) -> Option<&Track> {
        self.track_numbers.get(&number).map(|&index| &self.tracks[index])
    }

    /// All tracks, in file order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Chapter editions, rebased to the first cluster.
    pub fn chapters(&self) -> &[Edition] {
        &self.editions
    }

    /// Attachments. Use [`MkvDemuxer::attachment_data`] for the contents.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Read the data of attachment `index`.
    pub fn attachment_data(&mut self, index: usize) -> Result<Vec<u8>> {
        let attachment = self
            .attachments
            .get(index)
            .ok_or_else(|| MkvError::MissingElement(format!("attachment {index}")))?;
        self.cursor.seek(attachment.position);
        self.cursor.read_bytes(attachment.length)
    }

    /// Tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Cue index (possibly rebuilt by scanning).
    pub fn cues(&self) -> &CueIndex {
        &self.cues
    }

    /// Timecode of the first cluster in nanoseconds; frame and chapter times
    /// are relative to it.
    pub fn first_timecode(&self) -> u64 {
        self.first_timecode
    }

    /// Current state.
    pub fn state(&self) -> DemuxerState {
        self.state
    }

    /// The fatal stream error, if the engine is in the failed state.
    pub fn last_error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    /// Tracks currently ignored.
    pub fn track_mask(&self) -> TrackMask {
        self.mask
    }

    /// Ignore the tracks in `mask`. Frames already queued for newly masked
    /// tracks are dropped. A fatal error raised on a track that is now
    /// masked is cleared.
    pub fn set_track_mask(&mut self, mask: TrackMask) {
        for index in mask.iter().filter(|&i| !self.mask.contains(i)) {
            self.queues.clear_track(index);
        }
        self.mask = mask;

        let offending = self.error.as_ref().and_then(|e| e.track);
        if let Some(track) = offending.filter(|&t| mask.contains(t)) {
            info!(track, "stream error cleared by masking its track");
            self.error = None;
            self.eos = false;
            self.resync_attempts = 0;
        }
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Next frame in presentation order across unmasked tracks, or `None`
    /// at end of stream.
    ///
    /// Frames decoded before a fatal stream error are still delivered; the
    /// error surfaces as end of stream once they are drained.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.error.is_none() {
            self.state = DemuxerState::Reading;
            if !self.queues.all_ready(&self.mask) {
                self.fill_queues()?;
            }
        }
        Ok(self.queues.pop_earliest(&self.mask))
    }

    /// Decoded payload of `frame`.
    pub fn frame_data(&mut self, frame: &Frame) -> Result<Vec<u8>> {
        self.frame_reader(frame)?.read_all()
    }

    /// Streaming reader over the decoded payload of `frame`.
    pub fn frame_reader(&mut self, frame: &Frame) -> Result<FrameReader<'_, S>> {
        let track = self.tracks.get(frame.track).ok_or(MkvError::TrackNotFound {
            track_number: frame.track as u64,
        })?;

        let Some(compression) = track.frame_compression() else {
            return Ok(FrameReader::raw(&mut self.cursor, &[], frame.position, frame.length));
        };

        match compression.algorithm {
            CompressionAlgorithm::HeaderStripping => Ok(FrameReader::raw(
                &mut self.cursor,
                &compression.settings,
                frame.position,
                frame.length,
            )),
            CompressionAlgorithm::Zlib => {
                let index = frame.track;
                let chunk = self.config.inflate_chunk;
                let inflater = self.inflaters[index]
                    .get_or_insert_with(|| CompressedStreamReader::new(index, chunk));
                Ok(FrameReader::inflate(
                    &mut self.cursor,
                    inflater,
                    frame.position,
                    frame.length,
                ))
            }
            other => Err(MkvError::UnsupportedCompression(other.code())),
        }
    }

    /// Decode until every unmasked track has a frame queued, the stream
    /// ends, or the readahead budget is spent.
    fn fill_queues(&mut self) -> Result<()> {
        while !self.eos && !self.queues.all_ready(&self.mask) {
            if self.queues.queued_bytes() >= self.readahead && self.queues.any_ready(&self.mask) {
                trace!(queued = self.queues.queued_bytes(), "readahead budget reached");
                break;
            }
            if !self.advance()? {
                debug!(position = self.position, "end of stream");
                self.eos = true;
            }
        }
        Ok(())
    }

    /// Decode one element, resyncing on damaged data. Returns `false` at
    /// end of stream.
    fn advance(&mut self) -> Result<bool> {
        let offset = self.position;
        match self.step() {
            Ok(more) => Ok(more),
            Err(e) if e.is_corruption() => self.recover(offset, e),
            Err(e) => Err(e),
        }
    }

    fn recover(&mut self, offset: u64, err: MkvError) -> Result<bool> {
        self.resync_attempts += 1;
        warn!(offset, attempt = self.resync_attempts, error = %err, "damaged stream, resyncing");

        if self.resync_attempts <= MAX_RESYNC_ATTEMPTS {
            if let Some(cluster) = self.find_next_cluster(offset + 1)? {
                info!(offset, cluster, skipped = cluster - offset, "resynced at cluster");
                self.position = cluster;
                self.cluster = None;
                self.gap.fill(true);
                return Ok(true);
            }
        }

        error!(offset, track = ?self.current_track, error = %err, "fatal stream error");
        self.error = Some(StreamError {
            message: err.to_string(),
            track: self.current_track,
            offset,
        });
        self.eos = true;
        Ok(false)
    }

    /// Next position at or after `from` holding a well-formed cluster.
    fn find_next_cluster(&mut self, mut from: u64) -> Result<Option<u64>> {
        while from < self.segment_end {
            let Some(candidate) = self.cursor.scan(from, CLUSTER_SIGNATURE)? else {
                return Ok(None);
            };
            if candidate >= self.segment_end {
                return Ok(None);
            }
            if cues::probe_cluster(&mut self.cursor, candidate, self.segment_end)?.is_some() {
                return Ok(Some(candidate));
            }
            from = candidate + 1;
        }
        Ok(None)
    }

    fn step(&mut self) -> Result<bool> {
        self.current_track = None;
        match self.cluster {
            Some(cluster) => self.step_in_cluster(cluster),
            None => self.step_top_level(),
        }
    }

    fn step_top_level(&mut self) -> Result<bool> {
        if self.position >= self.segment_end {
            return Ok(false);
        }
        self.cursor.seek(self.position);
        let header = self.cursor.read_element_header()?;

        match header.id {
            CLUSTER => {
                if header.end().is_some_and(|end| end > self.segment_end) {
                    return Err(MkvError::malformed(header.position, "cluster overruns segment"));
                }
                trace!(position = header.position, size = header.size, "cluster");
                self.cluster = Some(ClusterState {
                    timecode: None,
                    end: header.end(),
                });
                self.position = header.data_offset();
            }
            SEGMENT | EBML => {
                debug!(position = header.position, "next segment reached");
                return Ok(false);
            }
            _ => match header.end() {
                Some(end) if end <= self.segment_end => self.position = end,
                Some(_) => {
                    return Err(MkvError::malformed(header.position, "element overruns segment"))
                }
                None => {
                    return Err(MkvError::malformed(
                        header.position,
                        "unknown-size element between clusters",
                    ))
                }
            },
        }
        Ok(true)
    }

    fn step_in_cluster(&mut self, cluster: ClusterState) -> Result<bool> {
        let end = cluster.end.unwrap_or(self.segment_end);
        if self.position >= end {
            self.cluster = None;
            return Ok(true);
        }

        self.cursor.seek(self.position);
        let header = self.cursor.read_element_header()?;
        if cluster.end.is_none() && is_top_level(header.id) {
            self.cluster = None;
            return Ok(true);
        }
        let child_end = match header.end() {
            Some(child_end) if child_end <= end => child_end,
            _ => return Err(MkvError::malformed(header.position, "element overruns cluster")),
        };
        let body = header.data_offset();

        match header.id {
            TIMECODE => {
                let timecode = self.cursor.read_uint(child_end - body)?;
                self.cluster = Some(ClusterState {
                    timecode: Some(timecode),
                    ..cluster
                });
            }
            SIMPLE_BLOCK => self.decode_block(body, child_end - body, true, BlockExtras::default())?,
            BLOCK_GROUP => self.decode_block_group(&header)?,
            _ => {}
        }

        self.position = child_end;
        Ok(true)
    }

    fn decode_block_group(&mut self, group: &ElementHeader) -> Result<()> {
        let mut block = None;
        let mut extras = BlockExtras::default();

        walk_nested(&mut self.cursor, group.size, &[], 3, |c, h| {
            match h.id {
                BLOCK => {
                    block = Some((h.data_offset(), leaf_size(h)?));
                    return Ok(Walk::Skip);
                }
                BLOCK_DURATION => extras.duration = Some(uint(c, h)?),
                REFERENCE_BLOCK => {
                    extras.referenced = true;
                    return Ok(Walk::Skip);
                }
                BLOCK_ADDITIONS => extras.additions = first_addition(c, h)?,
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;

        match block {
            Some((position, length)) => self.decode_block(position, length, false, extras),
            None => {
                trace!(position = group.position, "BlockGroup without Block");
                Ok(())
            }
        }
    }

    /// Decode a Block or SimpleBlock body at `[position, position + length)`
    /// into queued frames.
    fn decode_block(
        &mut self,
        position: u64,
        length: u64,
        simple: bool,
        extras: BlockExtras,
    ) -> Result<()> {
        let cluster_timecode = self
            .cluster
            .and_then(|c| c.timecode)
            .ok_or_else(|| MkvError::malformed(position, "block before cluster Timecode"))?;

        self.cursor.seek(position);
        let prefix = self.cursor.read_bytes(length.min(MAX_BLOCK_HEADER as u64))?;
        let header = block::parse_block_header(&prefix, position)?;

        let Some(&index) = self.track_numbers.get(&header.track_number) else {
            trace!(
                error = %MkvError::TrackNotFound { track_number: header.track_number },
                "block skipped"
            );
            return Ok(());
        };
        if self.mask.contains(index) {
            return Ok(());
        }
        self.current_track = Some(index);

        let payload_start = position + header.size as u64;
        let payload_len = length - header.size as u64;
        let (sizes, lace_len) = if header.lacing == Lacing::None {
            (vec![payload_len], 0)
        } else {
            self.cursor.seek(payload_start);
            let payload = self.cursor.read_bytes(payload_len)?;
            block::lace_sizes(&payload, header.lacing, payload_start)?
        };

        let track = &self.tracks[index];
        let segment_scale = self.info.timecode_scale;
        let base = block::block_time_ns(
            cluster_timecode,
            header.timecode,
            track.timecode_scale,
            segment_scale,
            self.first_ticks,
        );
        let block_end = extras.duration.map(|ticks| {
            base.saturating_add(block::ticks_to_ns(ticks, track.timecode_scale, segment_scale))
        });
        let default_duration = track.default_duration;

        let mut flags = FrameFlags::empty();
        let keyframe = if simple { header.is_keyframe() } else { !extras.referenced };
        flags.set(FrameFlags::KEYFRAME, keyframe);
        flags.set(FrameFlags::INVISIBLE, header.is_invisible());
        flags.set(FrameFlags::DISCARDABLE, simple && header.is_discardable());

        let count = sizes.len();
        let mut offset = payload_start + lace_len as u64;
        for (i, size) in sizes.into_iter().enumerate() {
            let mut frame_flags = flags;
            let start = match default_duration {
                Some(duration) => base.saturating_add(duration.saturating_mul(i as u64)),
                None => {
                    frame_flags.set(FrameFlags::UNKNOWN_START, i > 0);
                    base
                }
            };
            let mut end = match default_duration {
                Some(duration) => start.saturating_add(duration),
                None => {
                    frame_flags |= FrameFlags::UNKNOWN_END;
                    start
                }
            };
            if i + 1 == count {
                if let Some(block_end) = block_end {
                    end = block_end.max(start);
                    frame_flags.remove(FrameFlags::UNKNOWN_END);
                }
            }
            let additions = if i == 0 { extras.additions } else { None };
            frame_flags.set(FrameFlags::BLOCK_ADDITIONS, additions.is_some());

            self.enqueue(Frame {
                track: index,
                start,
                end,
                position: offset,
                length: size,
                flags: frame_flags,
                additions,
            });
            offset += size;
        }

        trace!(track = index, time = base, frames = count, keyframe, "block decoded");
        self.resync_attempts = 0;
        Ok(())
    }

    fn enqueue(&mut self, mut frame: Frame) {
        let track = frame.track;
        if let Some(skip) = self.skip[track] {
            let ends_before = frame.flags.contains(FrameFlags::UNKNOWN_END) || frame.end <= skip.time;
            if frame.start < skip.time && ends_before {
                return;
            }
            if skip.need_keyframe && !frame.is_keyframe() {
                return;
            }
            self.skip[track] = None;
        }
        if std::mem::take(&mut self.gap[track]) {
            frame.flags |= FrameFlags::GAP;
        }
        self.queues.push(frame);
    }

    // -------------------------------------------------------------------------
    // Seeking
    // -------------------------------------------------------------------------

    /// Reposition to `target` nanoseconds. `seek(0, _)` rewinds to the first
    /// cluster and clears a failed state.
    pub fn seek(&mut self, target: u64, flags: SeekFlags) -> Result<()> {
        if target == 0 {
            self.rewind();
            return Ok(());
        }
        if let Some(err) = &self.error {
            return Err(MkvError::EngineFailed(err.message.clone()));
        }

        self.state = DemuxerState::Seeking;
        let result = self.seek_to(target, flags);
        self.state = DemuxerState::Reading;
        result
    }

    fn rewind(&mut self) {
        self.clear_read_state();
        self.position = self.first_cluster.unwrap_or(self.segment_end);
        self.error = None;
        self.state = DemuxerState::Reading;
        debug!(position = self.position, "rewound to first cluster");
    }

    fn seek_to(&mut self, target: u64, flags: SeekFlags) -> Result<()> {
        if self.cues.is_empty() && !self.cues.is_synthetic() {
            if let Some(first) = self.first_cluster {
                info!("no cues, reindexing segment");
                self.cues = cues::reindex(
                    &mut self.cursor,
                    self.segment_start,
                    first,
                    self.segment_end,
                    self.config.reindex_samples,
                )?;
            }
        }

        let ticks = target.saturating_add(self.first_timecode) / self.info.timecode_scale.max(1);
        let Some(mut cue) = self.cues.lookup(ticks) else {
            debug!(target, "nothing to seek to, stream left at its end");
            self.clear_read_state();
            self.position = self.segment_end;
            self.eos = true;
            return Ok(());
        };
        if self.cues.is_synthetic() {
            cue = self.refine_cue(cue, ticks)?;
        }

        let strict = flags.contains(SeekFlags::STRICT);
        let mut resolved = vec![None; self.tracks.len()];
        if flags.contains(SeekFlags::PREFER_PREV_KEYFRAME) {
            loop {
                let (keyframes, retry) = self.scan_keyframes(cue, target, strict)?;
                if let Some(err) = &self.error {
                    return Err(MkvError::EngineFailed(err.message.clone()));
                }
                resolved = keyframes;
                if !retry || cue == 0 {
                    break;
                }
                debug!(cue, "no keyframe before target, retrying from previous cue");
                cue -= 1;
            }
        }

        self.position_at(cue);
        for (index, track) in self.tracks.iter().enumerate() {
            self.skip[index] = Some(SkipUntil {
                time: resolved[index].unwrap_or(target),
                need_keyframe: strict || track.is_video(),
            });
        }

        debug!(target, cue, position = self.position, "seek positioned");
        Ok(())
    }

    /// Hop cluster headers forward from a synthetic cue to the last cluster
    /// starting at or before `ticks`, recording each cluster found.
    fn refine_cue(&mut self, mut index: usize, ticks: u64) -> Result<usize> {
        while let Some(cue) = self.cues.get(index).copied() {
            let position = self.segment_start.saturating_add(cue.position);
            let Some(probe) = cues::probe_cluster(&mut self.cursor, position, self.segment_end)?
            else {
                break;
            };
            let Some(next) = probe.header.end().filter(|&end| end < self.segment_end) else {
                break;
            };
            let Some(next_probe) = cues::probe_cluster(&mut self.cursor, next, self.segment_end)?
            else {
                break;
            };
            if next_probe.timecode > ticks {
                break;
            }
            trace!(position = next, timecode = next_probe.timecode, "cluster added to index");
            index = self
                .cues
                .insert(Cue::at(next_probe.timecode, next - self.segment_start));
        }
        Ok(index)
    }

    /// Decode forward from `cue` and find each track's last keyframe at or
    /// before `target`. The flag is set when some track only saw delta frames.
    fn scan_keyframes(
        &mut self,
        cue: usize,
        target: u64,
        strict: bool,
    ) -> Result<(Vec<Option<u64>>, bool)> {
        self.position_at(cue);

        let count = self.tracks.len();
        let mut keyframe = vec![None; count];
        let mut saw_delta = vec![false; count];
        let mut done: Vec<bool> = (0..count).map(|i| self.mask.contains(i)).collect();
        let mut scanned = 0u64;

        while scanned < self.readahead && !done.iter().all(|&d| d) {
            if !self.advance()? {
                break;
            }
            for frame in self.queues.drain_all() {
                let track = frame.track;
                scanned += frame.length;
                if done[track] {
                    continue;
                }
                if frame.start > target {
                    done[track] = true;
                } else if frame.is_keyframe() || (!strict && !self.tracks[track].is_video()) {
                    keyframe[track] = Some(frame.start);
                } else if keyframe[track].is_none() {
                    saw_delta[track] = true;
                }
            }
        }

        let retry = (0..count).any(|t| !self.mask.contains(t) && saw_delta[t] && keyframe[t].is_none());
        Ok((keyframe, retry))
    }

    fn position_at(&mut self, cue: usize) {
        let position = self
            .cues
            .get(cue)
            .map_or(self.segment_end, |c| self.segment_start.saturating_add(c.position));
        self.clear_read_state();
        self.position = position;
    }

    fn clear_read_state(&mut self) {
        self.cluster = None;
        self.queues.clear();
        self.skip.fill(None);
        self.gap.fill(true);
        self.eos = false;
        self.resync_attempts = 0;
    }
}

/// Skip to the Segment element after the EBML header.
fn find_segment<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<ElementHeader> {
    while !c.at_end() {
        let header = c.read_element_header()?;
        if header.id == SEGMENT {
            return Ok(header);
        }
        match header.end() {
            Some(end) => c.seek(end),
            None => break,
        }
    }
    Err(MkvError::MissingElement("Segment".to_string()))
}

/// Byte range of the first BlockAdditional inside a BlockAdditions element.
fn first_addition<S: ByteSource>(
    c: &mut ByteCursor<S>,
    additions: &ElementHeader,
) -> Result<Option<(u64, u64)>> {
    let mut found = None;
    walk_nested(c, additions.size, &[], 4, |c, more| {
        if more.id != BLOCK_MORE || found.is_some() {
            return Ok(Walk::Skip);
        }
        walk_nested(c, more.size, &[], 5, |_, h| {
            if h.id == BLOCK_ADDITIONAL && found.is_none() {
                found = Some((h.data_offset(), leaf_size(h)?));
            }
            Ok(Walk::Skip)
        })?;
        Ok(Walk::Handled)
    })?;
    Ok(found)
}
