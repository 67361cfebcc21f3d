//! Matroska element definitions and codec ID classification.
//!
//! Element IDs keep their marker bits, matching what
//! [`crate::cursor::ByteCursor::read_id`] returns.

// =============================================================================
// EBML Header Elements
// =============================================================================

/// EBML Header element.
pub const EBML: u32 = 0x1A45DFA3;
/// EBML Version.
pub const EBML_VERSION: u32 = 0x4286;
/// EBML Read Version.
pub const EBML_READ_VERSION: u32 = 0x42F7;
/// EBML Max ID Length.
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
/// EBML Max Size Length.
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
/// EBML Doc Type.
pub const DOC_TYPE: u32 = 0x4282;
/// EBML Doc Type Version.
pub const DOC_TYPE_VERSION: u32 = 0x4287;
/// EBML Doc Type Read Version.
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

// =============================================================================
// Segment and Meta Seek
// =============================================================================

/// Segment (the root container for all Matroska data).
pub const SEGMENT: u32 = 0x18538067;
/// SeekHead (index of top-level elements).
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Seek entry.
pub const SEEK: u32 = 0x4DBB;
/// Seek ID.
pub const SEEK_ID: u32 = 0x53AB;
/// Seek Position (relative to the segment data start).
pub const SEEK_POSITION: u32 = 0x53AC;

// =============================================================================
// Segment Information
// =============================================================================

/// Segment Info.
pub const INFO: u32 = 0x1549A966;
/// Segment UID.
pub const SEGMENT_UID: u32 = 0x73A4;
/// Segment Filename.
pub const SEGMENT_FILENAME: u32 = 0x7384;
/// Previous UID.
pub const PREV_UID: u32 = 0x3CB923;
/// Next UID.
pub const NEXT_UID: u32 = 0x3EB923;
/// Timecode Scale (nanoseconds per tick).
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
/// Duration (in ticks, float).
pub const DURATION: u32 = 0x4489;
/// Date UTC (nanoseconds since 2001-01-01).
pub const DATE_UTC: u32 = 0x4461;
/// Title.
pub const TITLE: u32 = 0x7BA9;
/// Muxing App.
pub const MUXING_APP: u32 = 0x4D80;
/// Writing App.
pub const WRITING_APP: u32 = 0x5741;

// =============================================================================
// Cluster Elements
// =============================================================================

/// Cluster (contains blocks of media data).
pub const CLUSTER: u32 = 0x1F43B675;
/// Cluster Timecode.
pub const TIMECODE: u32 = 0xE7;
/// Position (cluster position in segment).
pub const POSITION: u32 = 0xA7;
/// Previous Size (size of previous cluster).
pub const PREV_SIZE: u32 = 0xAB;
/// SimpleBlock.
pub const SIMPLE_BLOCK: u32 = 0xA3;
/// BlockGroup (block with additional info).
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block.
pub const BLOCK: u32 = 0xA1;
/// Block Duration.
pub const BLOCK_DURATION: u32 = 0x9B;
/// Reference Block (timestamp offset to reference frame).
pub const REFERENCE_BLOCK: u32 = 0xFB;
/// Block Additions.
pub const BLOCK_ADDITIONS: u32 = 0x75A1;
/// Block More.
pub const BLOCK_MORE: u32 = 0xA6;
/// Block Add ID.
pub const BLOCK_ADD_ID: u32 = 0xEE;
/// Block Additional.
pub const BLOCK_ADDITIONAL: u32 = 0xA5;
/// Discard Padding.
pub const DISCARD_PADDING: u32 = 0x75A2;

/// Cluster signature as it appears on disk.
pub const CLUSTER_SIGNATURE: [u8; 4] = CLUSTER.to_be_bytes();

// =============================================================================
// Track Elements
// =============================================================================

/// Tracks.
pub const TRACKS: u32 = 0x1654AE6B;
/// Track Entry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track Number.
pub const TRACK_NUMBER: u32 = 0xD7;
/// Track UID.
pub const TRACK_UID: u32 = 0x73C5;
/// Track Type.
pub const TRACK_TYPE: u32 = 0x83;
/// Flag Enabled.
pub const FLAG_ENABLED: u32 = 0xB9;
/// Flag Default.
pub const FLAG_DEFAULT: u32 = 0x88;
/// Flag Forced.
pub const FLAG_FORCED: u32 = 0x55AA;
/// Flag Lacing.
pub const FLAG_LACING: u32 = 0x9C;
/// Min Cache.
pub const MIN_CACHE: u32 = 0x6DE7;
/// Max Cache.
pub const MAX_CACHE: u32 = 0x6DF8;
/// Default Duration (ns).
pub const DEFAULT_DURATION: u32 = 0x23E383;
/// Track Timecode Scale (float).
pub const TRACK_TIMECODE_SCALE: u32 = 0x23314F;
/// Name.
pub const NAME: u32 = 0x536E;
/// Language.
pub const LANGUAGE: u32 = 0x22B59C;
/// Codec ID.
pub const CODEC_ID: u32 = 0x86;
/// Codec Private.
pub const CODEC_PRIVATE: u32 = 0x63A2;
/// Codec Name.
pub const CODEC_NAME: u32 = 0x258688;
/// Codec Delay.
pub const CODEC_DELAY: u32 = 0x56AA;
/// Seek Pre-Roll.
pub const SEEK_PRE_ROLL: u32 = 0x56BB;

// =============================================================================
// Video Elements
// =============================================================================

/// Video settings.
pub const VIDEO: u32 = 0xE0;
/// Flag Interlaced.
pub const FLAG_INTERLACED: u32 = 0x9A;
/// Stereo Mode.
pub const STEREO_MODE: u32 = 0x53B8;
/// Alpha Mode.
pub const ALPHA_MODE: u32 = 0x53C0;
/// Pixel Width.
pub const PIXEL_WIDTH: u32 = 0xB0;
/// Pixel Height.
pub const PIXEL_HEIGHT: u32 = 0xBA;
/// Pixel Crop Bottom.
pub const PIXEL_CROP_BOTTOM: u32 = 0x54AA;
/// Pixel Crop Top.
pub const PIXEL_CROP_TOP: u32 = 0x54BB;
/// Pixel Crop Left.
pub const PIXEL_CROP_LEFT: u32 = 0x54CC;
/// Pixel Crop Right.
pub const PIXEL_CROP_RIGHT: u32 = 0x54DD;
/// Display Width.
pub const DISPLAY_WIDTH: u32 = 0x54B0;
/// Display Height.
pub const DISPLAY_HEIGHT: u32 = 0x54BA;
/// Display Unit.
pub const DISPLAY_UNIT: u32 = 0x54B2;
/// Colour Space (FourCC).
pub const COLOUR_SPACE: u32 = 0x2EB524;

// =============================================================================
// Audio Elements
// =============================================================================

/// Audio settings.
pub const AUDIO: u32 = 0xE1;
/// Sampling Frequency.
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
/// Output Sampling Frequency.
pub const OUTPUT_SAMPLING_FREQUENCY: u32 = 0x78B5;
/// Channels.
pub const CHANNELS: u32 = 0x9F;
/// Bit Depth.
pub const BIT_DEPTH: u32 = 0x6264;

// =============================================================================
// Content Encoding
// =============================================================================

/// Content Encodings.
pub const CONTENT_ENCODINGS: u32 = 0x6D80;
/// Content Encoding.
pub const CONTENT_ENCODING: u32 = 0x6240;
/// Content Encoding Order.
pub const CONTENT_ENCODING_ORDER: u32 = 0x5031;
/// Content Encoding Scope.
pub const CONTENT_ENCODING_SCOPE: u32 = 0x5032;
/// Content Encoding Type (0 = compression, 1 = encryption).
pub const CONTENT_ENCODING_TYPE: u32 = 0x5033;
/// Content Compression.
pub const CONTENT_COMPRESSION: u32 = 0x5034;
/// Content Comp Algo.
pub const CONTENT_COMP_ALGO: u32 = 0x4254;
/// Content Comp Settings.
pub const CONTENT_COMP_SETTINGS: u32 = 0x4255;

// =============================================================================
// Cueing Data
// =============================================================================

/// Cues.
pub const CUES: u32 = 0x1C53BB6B;
/// Cue Point.
pub const CUE_POINT: u32 = 0xBB;
/// Cue Time.
pub const CUE_TIME: u32 = 0xB3;
/// Cue Track Positions.
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// Cue Track.
pub const CUE_TRACK: u32 = 0xF7;
/// Cue Cluster Position.
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
/// Cue Relative Position.
pub const CUE_RELATIVE_POSITION: u32 = 0xF0;
/// Cue Duration.
pub const CUE_DURATION: u32 = 0xB2;
/// Cue Block Number.
pub const CUE_BLOCK_NUMBER: u32 = 0x5378;

// =============================================================================
// Attachment Elements
// =============================================================================

/// Attachments.
pub const ATTACHMENTS: u32 = 0x1941A469;
/// Attached File.
pub const ATTACHED_FILE: u32 = 0x61A7;
/// File Description.
pub const FILE_DESCRIPTION: u32 = 0x467E;
/// File Name.
pub const FILE_NAME: u32 = 0x466E;
/// File Media Type.
pub const FILE_MEDIA_TYPE: u32 = 0x4660;
/// File Data.
pub const FILE_DATA: u32 = 0x465C;
/// File UID.
pub const FILE_UID: u32 = 0x46AE;

// =============================================================================
// Chapters
// =============================================================================

/// Chapters.
pub const CHAPTERS: u32 = 0x1043A770;
/// Edition Entry.
pub const EDITION_ENTRY: u32 = 0x45B9;
/// Edition UID.
pub const EDITION_UID: u32 = 0x45BC;
/// Edition Flag Hidden.
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
/// Edition Flag Default.
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
/// Edition Flag Ordered.
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;
/// Chapter Atom.
pub const CHAPTER_ATOM: u32 = 0xB6;
/// Chapter UID.
pub const CHAPTER_UID: u32 = 0x73C4;
/// Chapter String UID.
pub const CHAPTER_STRING_UID: u32 = 0x5654;
/// Chapter Time Start.
pub const CHAPTER_TIME_START: u32 = 0x91;
/// Chapter Time End.
pub const CHAPTER_TIME_END: u32 = 0x92;
/// Chapter Flag Hidden.
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
/// Chapter Flag Enabled.
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
/// Chapter Segment UID.
pub const CHAPTER_SEGMENT_UID: u32 = 0x6E67;
/// Chapter Track.
pub const CHAPTER_TRACK: u32 = 0x8F;
/// Chapter Track Number.
pub const CHAPTER_TRACK_NUMBER: u32 = 0x89;
/// Chapter Display.
pub const CHAPTER_DISPLAY: u32 = 0x80;
/// Chap String.
pub const CHAP_STRING: u32 = 0x85;
/// Chap Language.
pub const CHAP_LANGUAGE: u32 = 0x437C;
/// Chap Country.
pub const CHAP_COUNTRY: u32 = 0x437E;
/// Chap Process.
pub const CHAP_PROCESS: u32 = 0x6944;
/// Chap Process Codec ID.
pub const CHAP_PROCESS_CODEC_ID: u32 = 0x6955;
/// Chap Process Private.
pub const CHAP_PROCESS_PRIVATE: u32 = 0x450D;
/// Chap Process Command.
pub const CHAP_PROCESS_COMMAND: u32 = 0x6911;
/// Chap Process Time.
pub const CHAP_PROCESS_TIME: u32 = 0x6922;
/// Chap Process Data.
pub const CHAP_PROCESS_DATA: u32 = 0x6933;

// =============================================================================
// Tagging
// =============================================================================

/// Tags.
pub const TAGS: u32 = 0x1254C367;
/// Tag.
pub const TAG: u32 = 0x7373;
/// Targets.
pub const TARGETS: u32 = 0x63C0;
/// Target Type Value.
pub const TARGET_TYPE_VALUE: u32 = 0x68CA;
/// Target Type.
pub const TARGET_TYPE: u32 = 0x63CA;
/// Tag Track UID.
pub const TAG_TRACK_UID: u32 = 0x63C5;
/// Tag Edition UID.
pub const TAG_EDITION_UID: u32 = 0x63C9;
/// Tag Chapter UID.
pub const TAG_CHAPTER_UID: u32 = 0x63C4;
/// Tag Attachment UID.
pub const TAG_ATTACHMENT_UID: u32 = 0x63C6;
/// Simple Tag.
pub const SIMPLE_TAG: u32 = 0x67C8;
/// Tag Name.
pub const TAG_NAME: u32 = 0x45A3;
/// Tag Language.
pub const TAG_LANGUAGE: u32 = 0x447A;
/// Tag Default.
pub const TAG_DEFAULT: u32 = 0x4484;
/// Tag String.
pub const TAG_STRING: u32 = 0x4487;
/// Tag Binary.
pub const TAG_BINARY: u32 = 0x4485;

// =============================================================================
// Void and CRC
// =============================================================================

/// Void (padding).
pub const VOID: u32 = 0xEC;
/// CRC-32.
pub const CRC32: u32 = 0xBF;

/// Children of Segment. An unknown-size Cluster ends at the next one of these.
pub const TOP_LEVEL_IDS: &[u32] = &[
    SEEK_HEAD,
    INFO,
    TRACKS,
    CLUSTER,
    CUES,
    ATTACHMENTS,
    CHAPTERS,
    TAGS,
    SEGMENT,
    EBML,
];

/// Whether `id` belongs directly under Segment (or starts a new document).
pub fn is_top_level(id: u32) -> bool {
    TOP_LEVEL_IDS.contains(&id)
}

/// Human-readable name for the top-level IDs, used in log lines.
pub fn top_level_name(id: u32) -> &'static str {
    match id {
        SEEK_HEAD => "SeekHead",
        INFO => "Info",
        TRACKS => "Tracks",
        CLUSTER => "Cluster",
        CUES => "Cues",
        ATTACHMENTS => "Attachments",
        CHAPTERS => "Chapters",
        TAGS => "Tags",
        SEGMENT => "Segment",
        EBML => "EBML",
        _ => "unknown",
    }
}

// =============================================================================
// Track Types
// =============================================================================

/// Track type: Video.
pub const TRACK_TYPE_VIDEO: u64 = 1;
/// Track type: Audio.
pub const TRACK_TYPE_AUDIO: u64 = 2;
/// Track type: Complex (combined audio/video).
pub const TRACK_TYPE_COMPLEX: u64 = 3;
/// Track type: Logo.
pub const TRACK_TYPE_LOGO: u64 = 16;
/// Track type: Subtitle.
pub const TRACK_TYPE_SUBTITLE: u64 = 17;
/// Track type: Buttons.
pub const TRACK_TYPE_BUTTONS: u64 = 18;
/// Track type: Control.
pub const TRACK_TYPE_CONTROL: u64 = 32;
/// Track type: Metadata.
pub const TRACK_TYPE_METADATA: u64 = 33;

// =============================================================================
// Codec Classification
// =============================================================================

/// Broad codec family derived from a Matroska `CodecID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecClass {
    /// H.264/AVC.
    Avc,
    /// H.265/HEVC.
    Hevc,
    /// AV1.
    Av1,
    /// VP8.
    Vp8,
    /// VP9.
    Vp9,
    /// MPEG-4 Part 2 (SP/ASP/AP, MS V3).
    Mpeg4Visual,
    /// MPEG-1/MPEG-2 video.
    MpegVideo,
    /// Motion JPEG.
    Mjpeg,
    /// Theora.
    Theora,
    /// Uncompressed video.
    RawVideo,
    /// Video for Windows compatibility (BITMAPINFOHEADER in CodecPrivate).
    VfwVideo,
    /// AAC in any profile.
    Aac,
    /// Opus.
    Opus,
    /// Vorbis.
    Vorbis,
    /// FLAC.
    Flac,
    /// MPEG audio layer 1/2.
    MpegAudio,
    /// MPEG audio layer 3.
    Mp3,
    /// AC-3.
    Ac3,
    /// E-AC-3.
    Eac3,
    /// DTS family.
    Dts,
    /// Dolby TrueHD.
    TrueHd,
    /// PCM in any layout.
    Pcm,
    /// ACM compatibility (WAVEFORMATEX in CodecPrivate).
    AcmAudio,
    /// Plain UTF-8 text subtitles.
    TextSubtitle,
    /// SSA/ASS subtitles.
    SsaSubtitle,
    /// WebVTT subtitles.
    WebVtt,
    /// VobSub bitmap subtitles.
    VobSub,
    /// HDMV PGS bitmap subtitles.
    Pgs,
    /// DVB subtitles.
    DvbSub,
    /// Codec ID not in the table.
    Unknown,
}

impl CodecClass {
    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            CodecClass::Avc => "avc",
            CodecClass::Hevc => "hevc",
            CodecClass::Av1 => "av1",
            CodecClass::Vp8 => "vp8",
            CodecClass::Vp9 => "vp9",
            CodecClass::Mpeg4Visual => "mpeg4",
            CodecClass::MpegVideo => "mpeg-video",
            CodecClass::Mjpeg => "mjpeg",
            CodecClass::Theora => "theora",
            CodecClass::RawVideo => "rawvideo",
            CodecClass::VfwVideo => "vfw",
            CodecClass::Aac => "aac",
            CodecClass::Opus => "opus",
            CodecClass::Vorbis => "vorbis",
            CodecClass::Flac => "flac",
            CodecClass::MpegAudio => "mpeg-audio",
            CodecClass::Mp3 => "mp3",
            CodecClass::Ac3 => "ac3",
            CodecClass::Eac3 => "eac3",
            CodecClass::Dts => "dts",
            CodecClass::TrueHd => "truehd",
            CodecClass::Pcm => "pcm",
            CodecClass::AcmAudio => "acm",
            CodecClass::TextSubtitle => "text",
            CodecClass::SsaSubtitle => "ssa",
            CodecClass::WebVtt => "webvtt",
            CodecClass::VobSub => "vobsub",
            CodecClass::Pgs => "pgs",
            CodecClass::DvbSub => "dvbsub",
            CodecClass::Unknown => "unknown",
        }
    }
}

/// Codec ID table. Entries ending in `/` match any ID with that prefix;
/// exact entries are listed first so they win over prefixes.
pub const CODEC_TABLE: &[(&str, CodecClass)] = &[
    ("V_MPEG4/ISO/AVC", CodecClass::Avc),
    ("V_MPEGH/ISO/HEVC", CodecClass::Hevc),
    ("V_AV1", CodecClass::Av1),
    ("V_VP8", CodecClass::Vp8),
    ("V_VP9", CodecClass::Vp9),
    ("V_MPEG4/MS/V3", CodecClass::Mpeg4Visual),
    ("V_MPEG1", CodecClass::MpegVideo),
    ("V_MPEG2", CodecClass::MpegVideo),
    ("V_MJPEG", CodecClass::Mjpeg),
    ("V_THEORA", CodecClass::Theora),
    ("V_UNCOMPRESSED", CodecClass::RawVideo),
    ("V_MS/VFW/FOURCC", CodecClass::VfwVideo),
    ("A_OPUS", CodecClass::Opus),
    ("A_VORBIS", CodecClass::Vorbis),
    ("A_FLAC", CodecClass::Flac),
    ("A_AAC", CodecClass::Aac),
    ("A_MPEG/L3", CodecClass::Mp3),
    ("A_MPEG/L2", CodecClass::MpegAudio),
    ("A_MPEG/L1", CodecClass::MpegAudio),
    ("A_AC3", CodecClass::Ac3),
    ("A_EAC3", CodecClass::Eac3),
    ("A_DTS", CodecClass::Dts),
    ("A_TRUEHD", CodecClass::TrueHd),
    ("A_MS/ACM", CodecClass::AcmAudio),
    ("S_TEXT/UTF8", CodecClass::TextSubtitle),
    ("S_TEXT/ASCII", CodecClass::TextSubtitle),
    ("S_TEXT/SSA", CodecClass::SsaSubtitle),
    ("S_TEXT/ASS", CodecClass::SsaSubtitle),
    ("S_SSA", CodecClass::SsaSubtitle),
    ("S_ASS", CodecClass::SsaSubtitle),
    ("S_TEXT/WEBVTT", CodecClass::WebVtt),
    ("S_VOBSUB", CodecClass::VobSub),
    ("S_HDMV/PGS", CodecClass::Pgs),
    ("S_DVBSUB", CodecClass::DvbSub),
    // Prefixes.
    ("V_MPEG4/ISO/", CodecClass::Mpeg4Visual),
    ("A_AAC/", CodecClass::Aac),
    ("A_AC3/", CodecClass::Ac3),
    ("A_DTS/", CodecClass::Dts),
    ("A_PCM/", CodecClass::Pcm),
];

/// Classify a Matroska codec ID.
pub fn codec_class(codec_id: &str) -> CodecClass {
    CODEC_TABLE
        .iter()
        .find(|(id, _)| *id == codec_id)
        .or_else(|| {
            CODEC_TABLE
                .iter()
                .find(|(id, _)| id.ends_with('/') && codec_id.starts_with(id))
        })
        .map(|&(_, class)| class)
        .unwrap_or(CodecClass::Unknown)
}
