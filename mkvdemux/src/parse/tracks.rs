use tracing::{debug, trace, warn};

use super::{binary, flag, float, string, uint};
use crate::compress::inflate_all;
use crate::cursor::ByteCursor;
use crate::ebml::ElementHeader;
use crate::elements::{self, *};
use crate::error::{MkvError, Result};
use crate::model::{
    AudioSettings, Compression, CompressionAlgorithm, EncodingScope, Track, TrackKind,
    TrackSettings, VideoSettings,
};
use crate::queue::MAX_TRACKS;
use crate::source::ByteSource;
use crate::walker::{walk, walk_nested, Walk};

/// Parse the `Tracks` element.
///
/// Entries without a track number, entries reusing a UID and entries reusing
/// a track number are dropped; the first occurrence wins.
pub(crate) fn parse_tracks<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Vec<Track>> {
    let mut tracks: Vec<Track> = Vec::new();

    walk(c, element.size, TOP_LEVEL_IDS, |c, h| {
        if h.id != TRACK_ENTRY {
            return Ok(Walk::Skip);
        }
        let track = parse_track_entry(c, h)?;
        accept_track(&mut tracks, track, h.position);
        Ok(Walk::Handled)
    })?;

    debug!(count = tracks.len(), "tracks parsed");
    Ok(tracks)
}

fn accept_track(tracks: &mut Vec<Track>, mut track: Track, offset: u64) {
    if track.number == 0 {
        warn!(offset, "TrackEntry without a track number dropped");
        return;
    }
    if track.number > 255 {
        warn!(offset, number = track.number, "track number out of range, track dropped");
        return;
    }
    if track.uid != 0 && tracks.iter().any(|t| t.uid == track.uid) {
        debug!(uid = track.uid, "duplicate track UID dropped");
        return;
    }
    if tracks.iter().any(|t| t.number == track.number) {
        let err = MkvError::DuplicateMandatoryElement {
            element: "TrackNumber",
            offset,
        };
        warn!(number = track.number, error = %err, "duplicate track number dropped");
        return;
    }
    if tracks.len() >= MAX_TRACKS {
        warn!(number = track.number, "track limit reached, track dropped");
        return;
    }

    track.index = tracks.len();
    finish_track(&mut track);
    trace!(
        index = track.index,
        number = track.number,
        codec = %track.codec_id,
        kind = track.kind.name(),
        "track"
    );
    tracks.push(track);
}

/// Derive the codec class and undo CodecPrivate compression.
fn finish_track(track: &mut Track) {
    track.codec_class = elements::codec_class(&track.codec_id);

    let Some(compression) = &track.compression else {
        return;
    };
    if !compression.scope.contains(EncodingScope::CODEC_PRIVATE) || track.codec_private.is_empty()
    {
        return;
    }

    match compression.algorithm {
        CompressionAlgorithm::Zlib => match inflate_all(&track.codec_private, track.index) {
            Ok(inflated) => track.codec_private = inflated,
            Err(e) => warn!(track = track.index, error = %e, "CodecPrivate left compressed"),
        },
        CompressionAlgorithm::HeaderStripping => {
            let mut private = compression.settings.clone();
            private.extend_from_slice(&track.codec_private);
            track.codec_private = private;
        }
        other => warn!(
            track = track.index,
            algorithm = other.code(),
            "CodecPrivate compression not supported"
        ),
    }
}

fn parse_track_entry<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Track> {
    let mut track = Track::default();

    walk_nested(c, element.size, &[], 1, |c, h| {
        match h.id {
            TRACK_NUMBER => track.number = uint(c, h)?,
            TRACK_UID => track.uid = uint(c, h)?,
            TRACK_TYPE => track.kind = TrackKind::from(uint(c, h)?),
            FLAG_ENABLED => track.enabled = flag(c, h)?,
            FLAG_DEFAULT => track.default = flag(c, h)?,
            FLAG_FORCED => track.forced = flag(c, h)?,
            FLAG_LACING => track.lacing = flag(c, h)?,
            MIN_CACHE => track.min_cache = uint(c, h)?,
            MAX_CACHE => track.max_cache = Some(uint(c, h)?),
            DEFAULT_DURATION => {
                track.default_duration = Some(uint(c, h)?).filter(|&d| d > 0);
            }
            TRACK_TIMECODE_SCALE => {
                let scale = float(c, h)?;
                if scale.is_finite() && scale > 0.0 {
                    track.timecode_scale = scale;
                }
            }
            NAME => track.name = Some(string(c, h)?),
            LANGUAGE => {
                let language = string(c, h)?;
                if !language.is_empty() {
                    track.language = language;
                }
            }
            CODEC_ID => track.codec_id = string(c, h)?,
            CODEC_PRIVATE => track.codec_private = binary(c, h)?,
            CODEC_NAME => track.codec_name = Some(string(c, h)?),
            CODEC_DELAY => track.codec_delay = uint(c, h)?,
            SEEK_PRE_ROLL => track.seek_pre_roll = uint(c, h)?,
            VIDEO => track.settings = TrackSettings::Video(parse_video(c, h)?),
            AUDIO => track.settings = TrackSettings::Audio(parse_audio(c, h)?),
            CONTENT_ENCODINGS => track.compression = parse_content_encodings(c, h)?,
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    Ok(track)
}

fn parse_video<S: ByteSource>(c: &mut ByteCursor<S>, element: &ElementHeader) -> Result<VideoSettings> {
    let mut video = VideoSettings::default();
    let mut display_width = None;
    let mut display_height = None;

    walk_nested(c, element.size, &[], 2, |c, h| {
        match h.id {
            PIXEL_WIDTH => video.pixel_width = uint(c, h)?,
            PIXEL_HEIGHT => video.pixel_height = uint(c, h)?,
            DISPLAY_WIDTH => display_width = Some(uint(c, h)?),
            DISPLAY_HEIGHT => display_height = Some(uint(c, h)?),
            DISPLAY_UNIT => video.display_unit = uint(c, h)?,
            PIXEL_CROP_TOP => video.crop_top = uint(c, h)?,
            PIXEL_CROP_BOTTOM => video.crop_bottom = uint(c, h)?,
            PIXEL_CROP_LEFT => video.crop_left = uint(c, h)?,
            PIXEL_CROP_RIGHT => video.crop_right = uint(c, h)?,
            FLAG_INTERLACED => video.interlaced = uint(c, h)? == 1,
            STEREO_MODE => video.stereo_mode = uint(c, h)?,
            ALPHA_MODE => video.alpha_mode = uint(c, h)?,
            COLOUR_SPACE => video.colour_space = <[u8; 4]>::try_from(binary(c, h)?.as_slice()).ok(),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    let visible_width = video
        .pixel_width
        .saturating_sub(video.crop_left.saturating_add(video.crop_right));
    let visible_height = video
        .pixel_height
        .saturating_sub(video.crop_top.saturating_add(video.crop_bottom));
    video.display_width = display_width.filter(|&w| w > 0).unwrap_or(visible_width);
    video.display_height = display_height.filter(|&h| h > 0).unwrap_or(visible_height);

    Ok(video)
}

fn parse_audio<S: ByteSource>(c: &mut ByteCursor<S>, element: &ElementHeader) -> Result<AudioSettings> {
    let mut audio = AudioSettings::default();
    let mut output_frequency = None;

    walk_nested(c, element.size, &[], 2, |c, h| {
        match h.id {
            SAMPLING_FREQUENCY => audio.sampling_frequency = float(c, h)?,
            OUTPUT_SAMPLING_FREQUENCY => output_frequency = Some(float(c, h)?),
            CHANNELS => audio.channels = uint(c, h)?,
            BIT_DEPTH => audio.bit_depth = Some(uint(c, h)?),
            _ => return Ok(Walk::Skip),
        }
        Ok(Walk::Handled)
    })?;

    audio.output_sampling_frequency = output_frequency.unwrap_or(audio.sampling_frequency);
    Ok(audio)
}

struct Encoding {
    order: u64,
    scope: EncodingScope,
    kind: u64,
    algorithm: CompressionAlgorithm,
    settings: Vec<u8>,
}

fn parse_content_encodings<S: ByteSource>(
    c: &mut ByteCursor<S>,
    element: &ElementHeader,
) -> Result<Option<Compression>> {
    let mut encodings = Vec::new();

    walk_nested(c, element.size, &[], 2, |c, h| {
        if h.id != CONTENT_ENCODING {
            return Ok(Walk::Skip);
        }
        let mut encoding = Encoding {
            order: 0,
            scope: EncodingScope::FRAMES,
            kind: 0,
            algorithm: CompressionAlgorithm::Zlib,
            settings: Vec::new(),
        };
        walk_nested(c, h.size, &[], 3, |c, h| {
            match h.id {
                CONTENT_ENCODING_ORDER => encoding.order = uint(c, h)?,
                CONTENT_ENCODING_SCOPE => {
                    encoding.scope = EncodingScope::from_bits_truncate(uint(c, h)?)
                }
                CONTENT_ENCODING_TYPE => encoding.kind = uint(c, h)?,
                CONTENT_COMPRESSION => {
                    walk_nested(c, h.size, &[], 4, |c, h| {
                        match h.id {
                            CONTENT_COMP_ALGO => {
                                encoding.algorithm = CompressionAlgorithm::from(uint(c, h)?)
                            }
                            CONTENT_COMP_SETTINGS => encoding.settings = binary(c, h)?,
                            _ => return Ok(Walk::Skip),
                        }
                        Ok(Walk::Handled)
                    })?;
                }
                _ => return Ok(Walk::Skip),
            }
            Ok(Walk::Handled)
        })?;
        encodings.push(encoding);
        Ok(Walk::Handled)
    })?;

    if encodings.iter().any(|e| e.kind != 0) {
        warn!("encrypted track content is not supported");
    }

    let mut compressions: Vec<Encoding> = encodings.into_iter().filter(|e| e.kind == 0).collect();
    compressions.sort_by_key(|e| e.order);
    if compressions.len() > 1 {
        warn!(
            count = compressions.len(),
            "only the first of several content compressions is applied"
        );
    }

    Ok(compressions.into_iter().next().map(|e| Compression {
        algorithm: e.algorithm,
        settings: e.settings,
        scope: e.scope,
    }))
}
