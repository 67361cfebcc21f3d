//! Segment metadata model: info, tracks, chapters, attachments and tags.
//!
//! Everything here is filled in once while opening a file and is read-only
//! afterwards.

use bitflags::bitflags;

use crate::elements::{self, CodecClass};

/// Default timecode scale (1 millisecond in nanoseconds).
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Language assumed when a track does not declare one.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Segment information.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per tick.
    pub timecode_scale: u64,
    /// Duration in ticks, as stored.
    pub duration: Option<f64>,
    /// Segment UID.
    pub uid: Option<[u8; 16]>,
    /// UID of the previous segment in a linked chain.
    pub prev_uid: Option<[u8; 16]>,
    /// UID of the next segment in a linked chain.
    pub next_uid: Option<[u8; 16]>,
    /// Segment filename.
    pub filename: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Muxing application.
    pub muxing_app: Option<String>,
    /// Writing application.
    pub writing_app: Option<String>,
    /// Creation date, nanoseconds since 2001-01-01T00:00:00 UTC.
    pub date_utc: Option<i64>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: None,
            uid: None,
            prev_uid: None,
            next_uid: None,
            filename: None,
            title: None,
            muxing_app: None,
            writing_app: None,
            date_utc: None,
        }
    }
}

impl SegmentInfo {
    /// Duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| (d * self.timecode_scale as f64) as u64)
    }
}

/// Track type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Video.
    Video,
    /// Audio.
    Audio,
    /// Combined audio/video.
    Complex,
    /// Logo overlay.
    Logo,
    /// Subtitles.
    Subtitle,
    /// Menu buttons.
    Buttons,
    /// Control codes.
    Control,
    /// Timed metadata.
    Metadata,
    /// Unrecognised type code.
    Unknown(u64),
}

impl From<u64> for TrackKind {
    fn from(code: u64) -> Self {
        match code {
            elements::TRACK_TYPE_VIDEO => TrackKind::Video,
            elements::TRACK_TYPE_AUDIO => TrackKind::Audio,
            elements::TRACK_TYPE_COMPLEX => TrackKind::Complex,
            elements::TRACK_TYPE_LOGO => TrackKind::Logo,
            elements::TRACK_TYPE_SUBTITLE => TrackKind::Subtitle,
            elements::TRACK_TYPE_BUTTONS => TrackKind::Buttons,
            elements::TRACK_TYPE_CONTROL => TrackKind::Control,
            elements::TRACK_TYPE_METADATA => TrackKind::Metadata,
            other => TrackKind::Unknown(other),
        }
    }
}

impl TrackKind {
    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Complex => "complex",
            TrackKind::Logo => "logo",
            TrackKind::Subtitle => "subtitle",
            TrackKind::Buttons => "buttons",
            TrackKind::Control => "control",
            TrackKind::Metadata => "metadata",
            TrackKind::Unknown(_) => "unknown",
        }
    }
}

/// Video track settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoSettings {
    /// Coded width in pixels.
    pub pixel_width: u64,
    /// Coded height in pixels.
    pub pixel_height: u64,
    /// Display width (defaults to the pixel width).
    pub display_width: u64,
    /// Display height (defaults to the pixel height).
    pub display_height: u64,
    /// Unit of the display size (0 = pixels).
    pub display_unit: u64,
    /// Pixels cropped from the top.
    pub crop_top: u64,
    /// Pixels cropped from the bottom.
    pub crop_bottom: u64,
    /// Pixels cropped from the left.
    pub crop_left: u64,
    /// Pixels cropped from the right.
    pub crop_right: u64,
    /// Interlaced content.
    pub interlaced: bool,
    /// Stereo-3D layout.
    pub stereo_mode: u64,
    /// Alpha channel present in BlockAdditions.
    pub alpha_mode: u64,
    /// Colour space FourCC.
    pub colour_space: Option<[u8; 4]>,
}

/// Audio track settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Sampling frequency in Hz.
    pub sampling_frequency: f64,
    /// Output sampling frequency (SBR); defaults to the sampling frequency.
    pub output_sampling_frequency: f64,
    /// Channel count.
    pub channels: u64,
    /// Bits per sample.
    pub bit_depth: Option<u64>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: 8000.0,
            output_sampling_frequency: 8000.0,
            channels: 1,
            bit_depth: None,
        }
    }
}

/// Type-specific track settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TrackSettings {
    /// Video track.
    Video(VideoSettings),
    /// Audio track.
    Audio(AudioSettings),
    /// No type-specific settings.
    #[default]
    None,
}

/// ContentCompAlgo values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// zlib (deflate).
    Zlib,
    /// bzlib.
    Bzlib,
    /// lzo1x.
    Lzo1x,
    /// A fixed prefix removed from every frame.
    HeaderStripping,
    /// Unrecognised algorithm code.
    Other(u64),
}

impl From<u64> for CompressionAlgorithm {
    fn from(code: u64) -> Self {
        match code {
            0 => CompressionAlgorithm::Zlib,
            1 => CompressionAlgorithm::Bzlib,
            2 => CompressionAlgorithm::Lzo1x,
            3 => CompressionAlgorithm::HeaderStripping,
            other => CompressionAlgorithm::Other(other),
        }
    }
}

impl CompressionAlgorithm {
    /// The ContentCompAlgo code.
    pub fn code(self) -> u64 {
        match self {
            CompressionAlgorithm::Zlib => 0,
            CompressionAlgorithm::Bzlib => 1,
            CompressionAlgorithm::Lzo1x => 2,
            CompressionAlgorithm::HeaderStripping => 3,
            CompressionAlgorithm::Other(code) => code,
        }
    }
}

bitflags! {
    /// ContentEncodingScope bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EncodingScope: u64 {
        /// Frame payloads are encoded.
        const FRAMES = 0x1;
        /// CodecPrivate is encoded.
        const CODEC_PRIVATE = 0x2;
        /// The next ContentEncoding applies to this one's output.
        const NEXT = 0x4;
    }
}

/// Compression applied to a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compression {
    /// Algorithm.
    pub algorithm: CompressionAlgorithm,
    /// ContentCompSettings (the stripped header for header stripping).
    pub settings: Vec<u8>,
    /// What the compression covers.
    pub scope: EncodingScope,
}

/// A track from the `Tracks` element.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Index in [`crate::MkvDemuxer::tracks`].
    pub index: usize,
    /// Track number referenced by blocks.
    pub number: u64,
    /// Track UID.
    pub uid: u64,
    /// Track type.
    pub kind: TrackKind,
    /// Enabled flag.
    pub enabled: bool,
    /// Default flag.
    pub default: bool,
    /// Forced flag.
    pub forced: bool,
    /// Whether blocks of this track may use lacing.
    pub lacing: bool,
    /// Minimum number of frames a player should cache.
    pub min_cache: u64,
    /// Maximum number of frames a player should cache.
    pub max_cache: Option<u64>,
    /// Default frame duration in nanoseconds.
    pub default_duration: Option<u64>,
    /// Per-track timecode scale.
    pub timecode_scale: f64,
    /// Matroska codec ID.
    pub codec_id: String,
    /// Codec family derived from the codec ID.
    pub codec_class: CodecClass,
    /// Codec private data, decompressed when stored compressed.
    pub codec_private: Vec<u8>,
    /// Human-readable codec name.
    pub codec_name: Option<String>,
    /// Codec built-in delay in nanoseconds.
    pub codec_delay: u64,
    /// Pre-roll needed after a seek, in nanoseconds.
    pub seek_pre_roll: u64,
    /// Track name.
    pub name: Option<String>,
    /// Language (ISO 639-2).
    pub language: String,
    /// Compression descriptor, if the track is compressed.
    pub compression: Option<Compression>,
    /// Type-specific settings.
    pub settings: TrackSettings,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            index: 0,
            number: 0,
            uid: 0,
            kind: TrackKind::Unknown(0),
            enabled: true,
            default: true,
            forced: false,
            lacing: true,
            min_cache: 0,
            max_cache: None,
            default_duration: None,
            timecode_scale: 1.0,
            codec_id: String::new(),
            codec_class: CodecClass::Unknown,
            codec_private: Vec::new(),
            codec_name: None,
            codec_delay: 0,
            seek_pre_roll: 0,
            name: None,
            language: DEFAULT_LANGUAGE.to_string(),
            compression: None,
            settings: TrackSettings::None,
        }
    }
}

impl Track {
    /// Whether this is a video track.
    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }

    /// Compression applied to frame payloads, if any.
    pub fn frame_compression(&self) -> Option<&Compression> {
        self.compression
            .as_ref()
            .filter(|c| c.scope.contains(EncodingScope::FRAMES))
    }

    /// Video settings, if this is a video track.
    pub fn video(&self) -> Option<&VideoSettings> {
        match &self.settings {
            TrackSettings::Video(v) => Some(v),
            _ => None,
        }
    }

    /// Audio settings, if this is an audio track.
    pub fn audio(&self) -> Option<&AudioSettings> {
        match &self.settings {
            TrackSettings::Audio(a) => Some(a),
            _ => None,
        }
    }
}

/// A chapter edition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edition {
    /// Edition UID.
    pub uid: u64,
    /// Hidden flag.
    pub hidden: bool,
    /// Default flag.
    pub default: bool,
    /// Ordered chapters flag.
    pub ordered: bool,
    /// Top-level chapter atoms.
    pub chapters: Vec<ChapterAtom>,
}

/// A chapter atom, possibly with nested atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterAtom {
    /// Chapter UID.
    pub uid: u64,
    /// WebVTT-style string ID.
    pub string_uid: Option<String>,
    /// Start in nanoseconds, relative to the first cluster.
    pub start: u64,
    /// End in nanoseconds, relative to the first cluster.
    pub end: Option<u64>,
    /// Hidden flag.
    pub hidden: bool,
    /// Enabled flag.
    pub enabled: bool,
    /// Linked segment UID.
    pub segment_uid: Option<Vec<u8>>,
    /// Track numbers the chapter applies to (empty means all).
    pub tracks: Vec<u64>,
    /// Titles.
    pub displays: Vec<ChapterDisplay>,
    /// Chapter codec processing entries.
    pub processes: Vec<ChapterProcess>,
    /// Nested atoms.
    pub children: Vec<ChapterAtom>,
}

impl Default for ChapterAtom {
    fn default() -> Self {
        Self {
            uid: 0,
            string_uid: None,
            start: 0,
            end: None,
            hidden: false,
            enabled: true,
            segment_uid: None,
            tracks: Vec::new(),
            displays: Vec::new(),
            processes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl ChapterAtom {
    /// Shift this atom and its children earlier by `offset` nanoseconds.
    pub(crate) fn rebase(&mut self, offset: u64) {
        self.start = self.start.saturating_sub(offset);
        self.end = self.end.map(|end| end.saturating_sub(offset));
        for child in &mut self.children {
            child.rebase(offset);
        }
    }

    /// First title, if any.
    pub fn title(&self) -> Option<&str> {
        self.displays.first().map(|d| d.title.as_str())
    }
}

/// A chapter title in one or more languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDisplay {
    /// Title text.
    pub title: String,
    /// Languages (ISO 639-2); `eng` when none is given.
    pub languages: Vec<String>,
    /// Countries.
    pub countries: Vec<String>,
}

/// Chapter codec processing entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterProcess {
    /// Chapter codec (0 = Matroska script, 1 = DVD menu).
    pub codec_id: u64,
    /// Codec private data.
    pub private: Vec<u8>,
    /// Commands.
    pub commands: Vec<ChapterCommand>,
}

/// A chapter process command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterCommand {
    /// When the command runs (0 = during, 1 = before, 2 = after).
    pub time: u64,
    /// Command payload.
    pub data: Vec<u8>,
}

/// An attached file. The data stays in the source until requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// File UID.
    pub uid: u64,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Description.
    pub description: Option<String>,
    /// Absolute position of the file data.
    pub position: u64,
    /// Length of the file data in bytes.
    pub length: u64,
}

/// A tag and what it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    /// Tag targets.
    pub targets: TagTargets,
    /// Simple tags.
    pub simple_tags: Vec<SimpleTag>,
}

/// Tag targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTargets {
    /// Logical level (50 = album/movie/episode).
    pub type_value: u64,
    /// Target type string.
    pub target_type: Option<String>,
    /// Track UIDs.
    pub track_uids: Vec<u64>,
    /// Edition UIDs.
    pub edition_uids: Vec<u64>,
    /// Chapter UIDs.
    pub chapter_uids: Vec<u64>,
    /// Attachment UIDs.
    pub attachment_uids: Vec<u64>,
}

impl Default for TagTargets {
    fn default() -> Self {
        Self {
            type_value: 50,
            target_type: None,
            track_uids: Vec::new(),
            edition_uids: Vec::new(),
            chapter_uids: Vec::new(),
            attachment_uids: Vec::new(),
        }
    }
}

/// A name/value tag, possibly with nested tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleTag {
    /// Tag name.
    pub name: String,
    /// Language (ISO 639-2).
    pub language: String,
    /// Default-language flag.
    pub default: bool,
    /// String value.
    pub string: Option<String>,
    /// Binary value.
    pub binary: Option<Vec<u8>>,
    /// Nested tags.
    pub children: Vec<SimpleTag>,
}

impl Default for SimpleTag {
    fn default() -> Self {
        Self {
            name: String::new(),
            language: "und".to_string(),
            default: true,
            string: None,
            binary: None,
            children: Vec::new(),
        }
    }
}
