//! EBML fixture builder shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use mkvdemux::ebml::encode_vint;
use mkvdemux::elements::*;

/// Element with a minimal-length size.
pub fn element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    let (size, len) = encode_vint(body.len() as u64).unwrap();
    out.extend_from_slice(&size[..len]);
    out.extend_from_slice(body);
    out
}

/// Element with the unknown-size marker.
pub fn unknown_size(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.push(0xFF);
    out.extend_from_slice(body);
    out
}

fn id_bytes(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

pub fn uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    element(id, &bytes[skip..])
}

/// Unsigned integer stored in 8 bytes regardless of value.
pub fn wide_uint(id: u32, value: u64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub fn float(id: u32, value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub fn string(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn ebml_header(doc_type: &str) -> Vec<u8> {
    element(
        EBML,
        &concat(&[
            uint(EBML_VERSION, 1),
            uint(EBML_READ_VERSION, 1),
            string(DOC_TYPE, doc_type),
            uint(DOC_TYPE_VERSION, 4),
            uint(DOC_TYPE_READ_VERSION, 2),
        ]),
    )
}

pub fn info(timecode_scale: u64) -> Vec<u8> {
    element(
        INFO,
        &concat(&[
            uint(TIMECODE_SCALE, timecode_scale),
            float(DURATION, 15_000.0),
            string(MUXING_APP, "fixture"),
            string(WRITING_APP, "fixture"),
        ]),
    )
}

/// Description of one TrackEntry.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub number: u64,
    pub uid: u64,
    pub kind: u64,
    pub codec: &'static str,
    pub default_duration: Option<u64>,
    pub timecode_scale: Option<f64>,
    pub codec_private: Option<Vec<u8>>,
    /// `(algorithm, scope, settings)`
    pub compression: Option<(u64, u64, Vec<u8>)>,
}

impl TrackSpec {
    pub fn video(number: u64) -> Self {
        Self {
            number,
            uid: number * 1000,
            kind: 1,
            codec: "V_VP9",
            default_duration: None,
            timecode_scale: None,
            codec_private: None,
            compression: None,
        }
    }

    pub fn audio(number: u64) -> Self {
        Self {
            kind: 2,
            codec: "A_OPUS",
            ..Self::video(number)
        }
    }

    pub fn subtitle(number: u64) -> Self {
        Self {
            kind: 0x11,
            codec: "S_TEXT/UTF8",
            ..Self::video(number)
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = concat(&[
            uint(TRACK_NUMBER, self.number),
            uint(TRACK_UID, self.uid),
            uint(TRACK_TYPE, self.kind),
            string(CODEC_ID, self.codec),
        ]);
        if let Some(duration) = self.default_duration {
            body.extend(uint(DEFAULT_DURATION, duration));
        }
        if let Some(scale) = self.timecode_scale {
            body.extend(float(TRACK_TIMECODE_SCALE, scale));
        }
        if let Some(private) = &self.codec_private {
            body.extend(element(CODEC_PRIVATE, private));
        }
        if let Some((algorithm, scope, settings)) = &self.compression {
            let mut compression = uint(CONTENT_COMP_ALGO, *algorithm);
            if !settings.is_empty() {
                compression.extend(element(CONTENT_COMP_SETTINGS, settings));
            }
            let encoding = concat(&[
                uint(CONTENT_ENCODING_ORDER, 0),
                uint(CONTENT_ENCODING_SCOPE, *scope),
                uint(CONTENT_ENCODING_TYPE, 0),
                element(CONTENT_COMPRESSION, &compression),
            ]);
            body.extend(element(
                CONTENT_ENCODINGS,
                &element(CONTENT_ENCODING, &encoding),
            ));
        }
        element(TRACK_ENTRY, &body)
    }
}

pub fn tracks(specs: &[TrackSpec]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = specs.iter().map(TrackSpec::build).collect();
    element(TRACKS, &concat(&entries))
}

/// Block body: track number, relative timecode, flags, payload.
pub fn block_body(track: u8, relative: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80 | track];
    body.extend_from_slice(&relative.to_be_bytes());
    body.push(flags);
    body.extend_from_slice(payload);
    body
}

pub fn simple_block(track: u8, relative: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    element(SIMPLE_BLOCK, &block_body(track, relative, flags, payload))
}

/// Lacing modes for [`laced_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lace {
    Xiph,
    Fixed,
    Ebml,
}

/// SimpleBlock carrying `frames` with the given lacing.
pub fn laced_block(track: u8, relative: i16, flags: u8, lace: Lace, frames: &[&[u8]]) -> Vec<u8> {
    let (bits, sizes) = match lace {
        Lace::Xiph => (0x02, xiph_sizes(frames)),
        Lace::Fixed => (0x04, Vec::new()),
        Lace::Ebml => (0x06, ebml_sizes(frames)),
    };
    let mut payload = vec![(frames.len() - 1) as u8];
    payload.extend(sizes);
    for frame in frames {
        payload.extend_from_slice(frame);
    }
    simple_block(track, relative, flags | bits, &payload)
}

fn xiph_sizes(frames: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in &frames[..frames.len() - 1] {
        let mut size = frame.len();
        while size >= 255 {
            out.push(255);
            size -= 255;
        }
        out.push(size as u8);
    }
    out
}

fn ebml_sizes(frames: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut previous = 0i64;
    for (i, frame) in frames[..frames.len() - 1].iter().enumerate() {
        let size = frame.len() as i64;
        if i == 0 {
            let (bytes, len) = encode_vint(size as u64).unwrap();
            out.extend_from_slice(&bytes[..len]);
        } else {
            // Two-byte signed VINT: bias 2^13 - 1.
            let raw = (size - previous + 8191) as u16 | 0x4000;
            out.extend_from_slice(&raw.to_be_bytes());
        }
        previous = size;
    }
    out
}

/// BlockGroup around a Block with optional duration and reference.
pub fn block_group(body: Vec<u8>, duration: Option<u64>, reference: bool) -> Vec<u8> {
    let mut group = element(BLOCK, &body);
    if let Some(duration) = duration {
        group.extend(uint(BLOCK_DURATION, duration));
    }
    if reference {
        group.extend(element(REFERENCE_BLOCK, &[0xFF]));
    }
    element(BLOCK_GROUP, &group)
}

pub fn cluster(timecode: u64, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = uint(TIMECODE, timecode);
    for block in blocks {
        body.extend_from_slice(block);
    }
    element(CLUSTER, &body)
}

/// Chapter atom with start/end in nanoseconds.
pub fn chapter(uid: u64, start: u64, end: u64, title: &str) -> Vec<u8> {
    let display = concat(&[string(CHAP_STRING, title), string(CHAP_LANGUAGE, "eng")]);
    element(
        CHAPTER_ATOM,
        &concat(&[
            uint(CHAPTER_UID, uid),
            uint(CHAPTER_TIME_START, start),
            uint(CHAPTER_TIME_END, end),
            element(CHAPTER_DISPLAY, &display),
        ]),
    )
}

pub fn chapters(atoms: &[Vec<u8>]) -> Vec<u8> {
    let mut edition = uint(EDITION_UID, 1);
    edition.extend(concat(atoms));
    element(CHAPTERS, &element(EDITION_ENTRY, &edition))
}

pub fn attachment(name: &str, mime: &str, data: &[u8]) -> Vec<u8> {
    element(
        ATTACHMENTS,
        &element(
            ATTACHED_FILE,
            &concat(&[
                string(FILE_NAME, name),
                string(FILE_MEDIA_TYPE, mime),
                uint(FILE_UID, 77),
                element(FILE_DATA, data),
            ]),
        ),
    )
}

pub fn tags(name: &str, value: &str) -> Vec<u8> {
    let simple = concat(&[string(TAG_NAME, name), string(TAG_STRING, value)]);
    element(
        TAGS,
        &element(
            TAG,
            &concat(&[
                element(TARGETS, &uint(TARGET_TYPE_VALUE, 50)),
                element(SIMPLE_TAG, &simple),
            ]),
        ),
    )
}

/// SeekHead with one entry per `(id, position)`. Positions are stored in
/// 8 bytes so the element length does not depend on them.
pub fn seek_head(entries: &[(u32, u64)]) -> Vec<u8> {
    let seeks: Vec<Vec<u8>> = entries
        .iter()
        .map(|&(id, position)| {
            element(
                SEEK,
                &concat(&[element(SEEK_ID, &id_bytes(id)), wide_uint(SEEK_POSITION, position)]),
            )
        })
        .collect();
    element(SEEK_HEAD, &concat(&seeks))
}

/// EBML header followed by a Segment holding `parts` in order.
pub fn segment_file(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut out = ebml_header("matroska");
    out.extend(element(SEGMENT, &concat(parts)));
    out
}

/// Assembles a complete file.
///
/// `head` elements precede the clusters. `tail` elements follow them and
/// are advertised by a leading SeekHead. With `cues`, a Cues element with
/// one point per cluster is placed before the clusters.
#[derive(Debug, Clone, Default)]
pub struct FileBuilder {
    pub doc_type: String,
    pub head: Vec<Vec<u8>>,
    /// `(timecode, cluster bytes)`
    pub clusters: Vec<(u64, Vec<u8>)>,
    pub tail: Vec<Vec<u8>>,
    pub cues: bool,
}

impl FileBuilder {
    pub fn new(head: Vec<Vec<u8>>) -> Self {
        Self {
            doc_type: "matroska".to_string(),
            head,
            ..Default::default()
        }
    }

    pub fn cluster(mut self, timecode: u64, blocks: &[Vec<u8>]) -> Self {
        self.clusters.push((timecode, cluster(timecode, blocks)));
        self
    }

    pub fn raw_cluster(mut self, timecode: u64, bytes: Vec<u8>) -> Self {
        self.clusters.push((timecode, bytes));
        self
    }

    pub fn with_cues(mut self) -> Self {
        self.cues = true;
        self
    }

    pub fn tail(mut self, element: Vec<u8>) -> Self {
        self.tail.push(element);
        self
    }

    /// Offset of the first cluster relative to the segment body.
    pub fn first_cluster_offset(&self) -> u64 {
        (self.seek_head(&vec![0; self.tail.len()]).len()
            + self.head.iter().map(Vec::len).sum::<usize>()
            + self.cue_element(&vec![0; self.clusters.len()]).len()) as u64
    }

    fn seek_head(&self, positions: &[u64]) -> Vec<u8> {
        if self.tail.is_empty() {
            return Vec::new();
        }
        let seeks: Vec<Vec<u8>> = self
            .tail
            .iter()
            .zip(positions)
            .map(|(element, &position)| {
                let id_len = match element[0] {
                    b if b & 0x80 != 0 => 1,
                    b if b & 0x40 != 0 => 2,
                    b if b & 0x20 != 0 => 3,
                    _ => 4,
                };
                self::element(
                    SEEK,
                    &concat(&[
                        self::element(SEEK_ID, &element[..id_len]),
                        wide_uint(SEEK_POSITION, position),
                    ]),
                )
            })
            .collect();
        element(SEEK_HEAD, &concat(&seeks))
    }

    fn cue_element(&self, positions: &[u64]) -> Vec<u8> {
        if !self.cues {
            return Vec::new();
        }
        let points: Vec<Vec<u8>> = self
            .clusters
            .iter()
            .zip(positions)
            .map(|((timecode, _), &position)| {
                element(
                    CUE_POINT,
                    &concat(&[
                        wide_uint(CUE_TIME, *timecode),
                        element(
                            CUE_TRACK_POSITIONS,
                            &concat(&[uint(CUE_TRACK, 1), wide_uint(CUE_CLUSTER_POSITION, position)]),
                        ),
                    ]),
                )
            })
            .collect();
        element(CUES, &concat(&points))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut offset = self.first_cluster_offset();
        let mut cluster_positions = Vec::new();
        for (_, bytes) in &self.clusters {
            cluster_positions.push(offset);
            offset += bytes.len() as u64;
        }
        let mut tail_positions = Vec::new();
        for element in &self.tail {
            tail_positions.push(offset);
            offset += element.len() as u64;
        }

        let mut body = self.seek_head(&tail_positions);
        for element in &self.head {
            body.extend_from_slice(element);
        }
        body.extend(self.cue_element(&cluster_positions));
        for (_, bytes) in &self.clusters {
            body.extend_from_slice(bytes);
        }
        for element in &self.tail {
            body.extend_from_slice(element);
        }

        let mut out = ebml_header(&self.doc_type);
        out.extend(element(SEGMENT, &body));
        out
    }
}

/// Absolute offset of the segment body in a file built by [`FileBuilder`].
pub fn segment_body_offset(file: &[u8]) -> usize {
    let header_len = {
        // EBML ID (4 bytes) + 1-byte size + body.
        5 + (file[4] & 0x7F) as usize
    };
    let size_byte = file[header_len + 4];
    let size_len = size_byte.leading_zeros() as usize + 1;
    header_len + 4 + size_len
}
