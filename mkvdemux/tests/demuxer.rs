//! Integration tests for the demuxer engine.

mod common;

use std::io::Read;

use common::*;
use mkvdemux::config::{MAX_RESYNC_ATTEMPTS, MAX_SEEK_HEAD_HOPS};
use mkvdemux::elements::{CHAPTERS, CLUSTER, SEEK_HEAD, TAGS};
use mkvdemux::{
    DemuxConfig, FrameFlags, MemorySource, MkvDemuxer, MkvError, ReaderSource, SeekFlags,
    TrackKind, TrackMask,
};

const MS: u64 = 1_000_000;

type Demuxer = MkvDemuxer<MemorySource<Vec<u8>>>;

fn open(data: Vec<u8>) -> Demuxer {
    MkvDemuxer::open(MemorySource::new(data)).unwrap()
}

fn three_tracks() -> Vec<Vec<u8>> {
    vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1), TrackSpec::audio(2), TrackSpec::subtitle(3)]),
    ]
}

/// Five seconds of media: video every second (keyframe first when
/// `keyframe`), audio every half second, one subtitle at +1 s.
fn five_seconds(keyframe: bool) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    for i in 0..10i16 {
        let relative = i * 500;
        if i % 2 == 0 {
            let flags = if i == 0 && keyframe { 0x80 } else { 0x00 };
            blocks.push(simple_block(1, relative, flags, b"video"));
        }
        blocks.push(simple_block(2, relative, 0x80, b"audio"));
    }
    blocks.push(simple_block(3, 1000, 0x80, b"subtitle"));
    blocks
}

fn fifteen_second_file(middle_keyframe: bool) -> Vec<u8> {
    FileBuilder::new(three_tracks())
        .cluster(0, &five_seconds(true))
        .cluster(5000, &five_seconds(middle_keyframe))
        .cluster(10000, &five_seconds(true))
        .with_cues()
        .build()
}

fn first_frame_of(demuxer: &mut Demuxer, track: usize) -> mkvdemux::Frame {
    loop {
        let frame = demuxer.read_frame().unwrap().expect("track has a frame");
        if frame.track == track {
            return frame;
        }
    }
}

fn collect(demuxer: &mut Demuxer, limit: usize) -> Vec<mkvdemux::Frame> {
    let mut frames = Vec::new();
    while frames.len() < limit {
        match demuxer.read_frame().unwrap() {
            Some(frame) => frames.push(frame),
            None => break,
        }
    }
    frames
}

// =============================================================================
// Open
// =============================================================================

#[test]
fn test_open_metadata() {
    let demuxer = open(fifteen_second_file(true));

    assert_eq!(demuxer.ebml_header().doc_type, "matroska");
    assert_eq!(demuxer.file_info().timecode_scale, 1_000_000);
    assert_eq!(demuxer.file_info().duration_ns(), Some(15_000 * MS));
    assert_eq!(demuxer.track_count(), 3);
    assert_eq!(demuxer.track(0).unwrap().kind, TrackKind::Video);
    assert_eq!(demuxer.track(1).unwrap().kind, TrackKind::Audio);
    assert_eq!(demuxer.track(2).unwrap().kind, TrackKind::Subtitle);
    assert_eq!(demuxer.track(1).unwrap().language, "eng");

    let cue_times: Vec<u64> = demuxer.cues().as_slice().iter().map(|c| c.time).collect();
    assert_eq!(cue_times, vec![0, 5000, 10000]);
    assert!(!demuxer.cues().is_synthetic());
}

#[test]
fn test_unsupported_doc_type() {
    let mut builder = FileBuilder::new(three_tracks());
    builder.doc_type = "mp4".to_string();
    assert!(matches!(
        MkvDemuxer::open(MemorySource::new(builder.build())),
        Err(MkvError::UnsupportedDocType(_))
    ));
}

#[test]
fn test_open_from_reader() {
    let data = fifteen_second_file(true);
    let source = ReaderSource::new(std::io::Cursor::new(data)).unwrap();
    let mut demuxer = MkvDemuxer::open(source).unwrap();
    let frame = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(frame.track, 0);
    assert_eq!(demuxer.frame_data(&frame).unwrap(), b"video");
}

#[test]
fn test_track_uid_uniqueness() {
    let mut duplicate_uid = TrackSpec::audio(2);
    duplicate_uid.uid = 1000;
    let mut duplicate_number = TrackSpec::audio(1);
    duplicate_number.uid = 5;

    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1), duplicate_uid, duplicate_number, TrackSpec::audio(3)]),
    ];
    let demuxer = open(FileBuilder::new(head).build());

    let numbers: Vec<u64> = demuxer.tracks().iter().map(|t| t.number).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(demuxer.track(0).unwrap().kind, TrackKind::Video);
    assert_eq!(demuxer.track(1).unwrap().index, 1);
}

#[test]
fn test_chapters_rebased_and_attachments_readable() {
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1)]),
        chapters(&[chapter(1, 5_000 * MS, 8_000 * MS, "Intro")]),
        attachment("cover.jpg", "image/jpeg", b"JPEGDATA"),
    ];
    let data = FileBuilder::new(head)
        .cluster(2000, &[simple_block(1, 0, 0x80, b"v")])
        .tail(tags("TITLE", "Fixture"))
        .build();
    let mut demuxer = open(data);

    assert_eq!(demuxer.first_timecode(), 2_000 * MS);
    let atom = &demuxer.chapters()[0].chapters[0];
    assert_eq!(atom.start, 3_000 * MS);
    assert_eq!(atom.end, Some(6_000 * MS));
    assert_eq!(atom.title(), Some("Intro"));

    assert_eq!(demuxer.attachments()[0].name, "cover.jpg");
    assert_eq!(demuxer.attachment_data(0).unwrap(), b"JPEGDATA");
    assert!(demuxer.attachment_data(1).is_err());

    // Tags sit after the clusters and are only reachable through the SeekHead.
    assert_eq!(demuxer.tags().len(), 1);
    assert_eq!(demuxer.tags()[0].simple_tags[0].name, "TITLE");

    let frame = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(frame.start, 0);
}

#[test]
fn test_damaged_optional_sections_treated_as_absent() {
    // EditionEntry and Tag children claiming 5 bytes in 1-byte bodies.
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1)]),
        element(CHAPTERS, &[0x45, 0xB9, 0x85, 0x00]),
        element(TAGS, &[0x73, 0x73, 0x85, 0x00]),
    ];
    let data = FileBuilder::new(head)
        .cluster(0, &[simple_block(1, 0, 0x80, b"v")])
        .build();
    let mut demuxer = open(data);

    assert!(demuxer.chapters().is_empty());
    assert!(demuxer.tags().is_empty());
    assert_eq!(demuxer.track_count(), 1);
    assert!(demuxer.read_frame().unwrap().is_some());
}

/// Chapters larger than a 16-byte metadata budget, optionally advertised by
/// a leading SeekHead.
fn oversized_chapters(advertised: bool) -> Vec<u8> {
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1)]),
        chapters(&[chapter(1, 0, 1_000 * MS, "Intro")]),
    ];
    let link_len = seek_head(&[(CHAPTERS, 0)]).len() as u64;
    let chapters_position = link_len + (head[0].len() + head[1].len()) as u64;

    let mut parts = Vec::new();
    if advertised {
        parts.push(seek_head(&[(CHAPTERS, chapters_position)]));
    }
    parts.extend(head);
    parts.push(cluster(0, &[simple_block(1, 0, 0x80, b"v")]));
    segment_file(&parts)
}

#[test]
fn test_oversized_section_deferred_to_seek_head() {
    let config = DemuxConfig::default().with_max_metadata_size(16);

    let demuxer =
        MkvDemuxer::open_with_config(MemorySource::new(oversized_chapters(true)), config.clone())
            .unwrap();
    assert_eq!(demuxer.chapters().len(), 1);
    assert_eq!(demuxer.chapters()[0].chapters[0].title(), Some("Intro"));

    let demuxer =
        MkvDemuxer::open_with_config(MemorySource::new(oversized_chapters(false)), config).unwrap();
    assert!(demuxer.chapters().is_empty());
}

/// Tags reachable only through `links` chained SeekHeads placed after the
/// cluster. The leading SeekHead points at the first link.
fn seek_head_chain(links: usize) -> Vec<u8> {
    let link_len = seek_head(&[(SEEK_HEAD, 0)]).len() as u64;
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1)]),
        cluster(0, &[simple_block(1, 0, 0x80, b"v")]),
    ];
    let base = link_len + head.iter().map(|e| e.len() as u64).sum::<u64>();
    let target = |k: usize| {
        if k < links {
            (SEEK_HEAD, base + k as u64 * link_len)
        } else {
            (TAGS, base + links as u64 * link_len)
        }
    };

    let mut parts = vec![seek_head(&[target(0)])];
    parts.extend(head);
    for k in 1..=links {
        parts.push(seek_head(&[target(k)]));
    }
    parts.push(tags("TITLE", "Chained"));
    segment_file(&parts)
}

#[test]
fn test_seek_head_chain_followed() {
    let demuxer = open(seek_head_chain(3));
    assert_eq!(demuxer.tags().len(), 1);

    let demuxer = open(seek_head_chain(MAX_SEEK_HEAD_HOPS));
    assert_eq!(demuxer.tags().len(), 1);
    assert_eq!(demuxer.tags()[0].simple_tags[0].string.as_deref(), Some("Chained"));
}

#[test]
fn test_seek_head_chain_capped() {
    let mut demuxer = open(seek_head_chain(MAX_SEEK_HEAD_HOPS + 1));
    assert!(demuxer.tags().is_empty());
    assert!(demuxer.read_frame().unwrap().is_some());
}

#[test]
fn test_seek_head_cycle_terminates() {
    // The leading SeekHead and a trailing one point at each other.
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1)]),
        cluster(0, &[simple_block(1, 0, 0x80, b"v")]),
    ];
    let leading_len = seek_head(&[(SEEK_HEAD, 0)]).len() as u64;
    let trailing_len = seek_head(&[(SEEK_HEAD, 0), (TAGS, 0)]).len() as u64;
    let trailing = leading_len + head.iter().map(|e| e.len() as u64).sum::<u64>();

    let mut parts = vec![seek_head(&[(SEEK_HEAD, trailing)])];
    parts.extend(head);
    parts.push(seek_head(&[(SEEK_HEAD, 0), (TAGS, trailing + trailing_len)]));
    parts.push(tags("TITLE", "Cycle"));

    let demuxer = open(segment_file(&parts));
    assert_eq!(demuxer.tags().len(), 1);
    assert_eq!(demuxer.track_count(), 1);
}

#[test]
fn test_first_cluster_without_timecode_rejected() {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::video(1)])];
    let data = FileBuilder::new(head)
        .raw_cluster(0, element(CLUSTER, &simple_block(1, 0, 0x80, b"v")))
        .build();
    assert!(matches!(
        MkvDemuxer::open(MemorySource::new(data)),
        Err(MkvError::MalformedElement { .. })
    ));
}

// =============================================================================
// Reading
// =============================================================================

#[test]
fn test_frames_interleaved_by_time() {
    let mut demuxer = open(fifteen_second_file(true));
    let frames = collect(&mut demuxer, usize::MAX);

    assert_eq!(frames.len(), 3 * (5 + 10 + 1));
    assert!(frames.windows(2).all(|w| w[0].start <= w[1].start));
    assert!(frames.iter().all(|f| !f.flags.contains(FrameFlags::GAP)));

    // Equal starts are ordered by track index.
    assert_eq!((frames[0].track, frames[0].start), (0, 0));
    assert_eq!((frames[1].track, frames[1].start), (1, 0));
}

#[test]
fn test_track_mask_filters_and_discards() {
    let mut demuxer = open(fifteen_second_file(true));
    demuxer.set_track_mask(TrackMask::all_except(3, &[1]));

    let frames = collect(&mut demuxer, usize::MAX);
    assert_eq!(frames.len(), 30);
    assert!(frames.iter().all(|f| f.track == 1));

    demuxer.seek(0, SeekFlags::empty()).unwrap();
    demuxer.set_track_mask(TrackMask::none());
    let first = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(first.track, 0);
    assert!(first.flags.contains(FrameFlags::GAP));
}

#[test]
fn test_lacing_with_default_duration() {
    let mut audio = TrackSpec::audio(1);
    audio.default_duration = Some(20 * MS);
    let head = vec![info(1_000_000), tracks(&[audio])];

    let frames: [&[u8]; 3] = [b"first", &[7u8; 300], b"third!"];
    let fixed: [&[u8]; 3] = [b"aaaa", b"bbbb", b"cccc"];
    let data = FileBuilder::new(head)
        .cluster(
            0,
            &[
                laced_block(1, 0, 0x80, Lace::Xiph, &frames),
                laced_block(1, 100, 0x80, Lace::Ebml, &frames),
                laced_block(1, 200, 0x80, Lace::Fixed, &fixed),
            ],
        )
        .build();
    let mut demuxer = open(data);
    let decoded = collect(&mut demuxer, usize::MAX);
    assert_eq!(decoded.len(), 9);

    for (block, base) in [(0usize, 0u64), (1, 100 * MS)] {
        for (i, expected) in frames.iter().enumerate() {
            let frame = decoded[block * 3 + i];
            assert_eq!(frame.start, base + i as u64 * 20 * MS);
            assert_eq!(frame.duration(), Some(20 * MS));
            assert!(frame.is_keyframe());
            assert!(!frame.flags.contains(FrameFlags::UNKNOWN_START));
            assert_eq!(demuxer.frame_data(&frame).unwrap(), *expected);
        }
    }
    for (i, expected) in fixed.iter().enumerate() {
        let frame = decoded[6 + i];
        assert_eq!(demuxer.frame_data(&frame).unwrap(), *expected);
    }
}

#[test]
fn test_lacing_without_default_duration() {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::audio(1)])];
    let body = {
        let mut payload = vec![1u8, 3];
        payload.extend_from_slice(b"abcdefg");
        block_body(1, 10, 0x02, &payload)
    };
    let data = FileBuilder::new(head)
        .cluster(0, &[block_group(body, Some(40), true)])
        .build();
    let mut demuxer = open(data);
    let frames = collect(&mut demuxer, usize::MAX);

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].start, 10 * MS);
    assert!(frames[0].flags.contains(FrameFlags::UNKNOWN_END));
    assert!(!frames[0].flags.contains(FrameFlags::UNKNOWN_START));
    assert!(frames[1].flags.contains(FrameFlags::UNKNOWN_START));
    assert_eq!(frames[1].end, 50 * MS);
    assert!(frames.iter().all(|f| !f.is_keyframe()));
    assert_eq!(demuxer.frame_data(&frames[0]).unwrap(), b"abc");
    assert_eq!(demuxer.frame_data(&frames[1]).unwrap(), b"defg");
}

#[test]
fn test_track_timecode_scale_applied_after_rebase() {
    let mut video = TrackSpec::video(1);
    video.timecode_scale = Some(2.0);
    let head = vec![info(1_000_000), tracks(&[video])];
    let data = FileBuilder::new(head)
        .cluster(
            1000,
            &[
                simple_block(1, 0, 0x80, b"v0"),
                simple_block(1, 10, 0x00, b"v1"),
            ],
        )
        .build();
    let mut demuxer = open(data);

    let starts: Vec<u64> = collect(&mut demuxer, usize::MAX)
        .iter()
        .map(|f| f.start)
        .collect();
    assert_eq!(starts, vec![0, 20 * MS]);
}

#[test]
fn test_huge_default_duration_saturates() {
    let mut audio = TrackSpec::audio(1);
    audio.default_duration = Some(u64::MAX / 2 + 1);
    let head = vec![info(1_000_000), tracks(&[audio])];
    let fixed: [&[u8]; 3] = [b"aa", b"bb", b"cc"];
    let data = FileBuilder::new(head)
        .cluster(0, &[laced_block(1, 0, 0x80, Lace::Fixed, &fixed)])
        .build();
    let mut demuxer = open(data);

    let frames = collect(&mut demuxer, usize::MAX);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].start, u64::MAX / 2 + 1);
    assert_eq!(frames[2].start, u64::MAX);
    assert_eq!(frames[2].end, u64::MAX);
}

// =============================================================================
// Compression
// =============================================================================

#[test]
fn test_zlib_codec_private() {
    let private = b"codec initialisation data, repeated repeated repeated".to_vec();
    let mut video = TrackSpec::video(1);
    video.codec_private = Some(zlib(&private));
    video.compression = Some((0, 2, Vec::new()));

    let demuxer = open(FileBuilder::new(vec![info(1_000_000), tracks(&[video])]).build());
    let track = demuxer.track(0).unwrap();
    assert_eq!(track.codec_private, private);
    assert!(track.frame_compression().is_none());
}

#[test]
fn test_zlib_frames() {
    let mut audio = TrackSpec::audio(1);
    audio.compression = Some((0, 1, Vec::new()));
    let payloads: Vec<Vec<u8>> = (0..3u8).map(|i| vec![i; 5000 + i as usize]).collect();

    let blocks: Vec<Vec<u8>> = payloads
        .iter()
        .enumerate()
        .map(|(i, p)| simple_block(1, i as i16 * 20, 0x80, &zlib(p)))
        .collect();
    let data = FileBuilder::new(vec![info(1_000_000), tracks(&[audio])])
        .cluster(0, &blocks)
        .build();
    let mut demuxer = open(data);

    for expected in &payloads {
        let frame = demuxer.read_frame().unwrap().unwrap();
        assert!(frame.length < expected.len() as u64);
        assert_eq!(&demuxer.frame_data(&frame).unwrap(), expected);

        let mut streamed = Vec::new();
        demuxer
            .frame_reader(&frame)
            .unwrap()
            .read_to_end(&mut streamed)
            .unwrap();
        assert_eq!(&streamed, expected);
    }
}

#[test]
fn test_header_stripping_frames() {
    let mut video = TrackSpec::video(1);
    video.compression = Some((3, 1, vec![0x00, 0x00, 0x01]));
    let data = FileBuilder::new(vec![info(1_000_000), tracks(&[video])])
        .cluster(0, &[simple_block(1, 0, 0x80, &[0x65, 0x88])])
        .build();
    let mut demuxer = open(data);

    let frame = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(frame.length, 2);
    assert_eq!(demuxer.frame_data(&frame).unwrap(), vec![0x00, 0x00, 0x01, 0x65, 0x88]);
}

#[test]
fn test_unsupported_frame_compression() {
    let mut video = TrackSpec::video(1);
    video.compression = Some((1, 1, Vec::new()));
    let data = FileBuilder::new(vec![info(1_000_000), tracks(&[video])])
        .cluster(0, &[simple_block(1, 0, 0x80, b"bz")])
        .build();
    let mut demuxer = open(data);

    let frame = demuxer.read_frame().unwrap().unwrap();
    assert!(matches!(
        demuxer.frame_data(&frame),
        Err(MkvError::UnsupportedCompression(1))
    ));
}

// =============================================================================
// Seeking
// =============================================================================

#[test]
fn test_seek_prefers_previous_keyframe() {
    let mut demuxer = open(fifteen_second_file(true));
    demuxer
        .seek(7_000 * MS, SeekFlags::PREFER_PREV_KEYFRAME)
        .unwrap();

    let first = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(first.track, 0);
    assert_eq!(first.start, 5_000 * MS);
    assert!(first.start <= 7_000 * MS);
    assert!(first.is_keyframe());
    assert!(first.flags.contains(FrameFlags::GAP));

    let audio = first_frame_of(&mut demuxer, 1);
    assert_eq!(audio.start, 7_000 * MS);
    assert!(audio.flags.contains(FrameFlags::GAP));
}

#[test]
fn test_seek_without_flags_waits_for_video_keyframe() {
    let mut demuxer = open(fifteen_second_file(true));
    demuxer.seek(7_000 * MS, SeekFlags::empty()).unwrap();

    let frames = collect(&mut demuxer, usize::MAX);
    let first_video = frames.iter().find(|f| f.track == 0).unwrap();
    let first_audio = frames.iter().find(|f| f.track == 1).unwrap();
    let first_subtitle = frames.iter().find(|f| f.track == 2).unwrap();

    assert_eq!(first_video.start, 10_000 * MS);
    assert!(first_video.is_keyframe());
    assert_eq!(first_audio.start, 7_000 * MS);
    assert_eq!(first_subtitle.start, 11_000 * MS);
}

#[test]
fn test_seek_retries_previous_cue() {
    let mut demuxer = open(fifteen_second_file(false));
    demuxer
        .seek(7_000 * MS, SeekFlags::PREFER_PREV_KEYFRAME)
        .unwrap();

    let first = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(first.track, 0);
    assert_eq!(first.start, 0);
    assert!(first.is_keyframe());
}

#[test]
fn test_strict_seek_requires_flagged_keyframes() {
    let mut demuxer = open(fifteen_second_file(true));
    demuxer
        .seek(
            7_000 * MS,
            SeekFlags::PREFER_PREV_KEYFRAME | SeekFlags::STRICT,
        )
        .unwrap();

    let subtitle = first_frame_of(&mut demuxer, 2);
    assert!(subtitle.is_keyframe());
    assert_eq!(subtitle.start, 6_000 * MS);
}

#[test]
fn test_seek_is_idempotent() {
    let mut demuxer = open(fifteen_second_file(true));
    let flags = SeekFlags::PREFER_PREV_KEYFRAME;

    demuxer.seek(7_000 * MS, flags).unwrap();
    let first = collect(&mut demuxer, 12);
    demuxer.seek(7_000 * MS, flags).unwrap();
    let second = collect(&mut demuxer, 12);

    assert_eq!(first.len(), 12);
    assert_eq!(first, second);
}

#[test]
fn test_seek_past_end() {
    let mut demuxer = open(fifteen_second_file(true));
    demuxer.seek(60_000 * MS, SeekFlags::empty()).unwrap();
    assert!(demuxer.read_frame().unwrap().is_none());
}

#[test]
fn test_seek_without_cues_reindexes() {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::video(1)])];
    let mut builder = FileBuilder::new(head);
    for second in 0..6u64 {
        builder = builder.cluster(
            second * 1000,
            &[
                simple_block(1, 0, 0x80, b"key"),
                simple_block(1, 500, 0x00, b"delta"),
            ],
        );
    }
    let mut demuxer = open(builder.build());
    assert!(demuxer.cues().is_empty());

    demuxer
        .seek(3_200 * MS, SeekFlags::PREFER_PREV_KEYFRAME)
        .unwrap();
    assert!(!demuxer.cues().is_empty());
    assert!(demuxer.cues().is_synthetic());
    let times: Vec<u64> = demuxer.cues().as_slice().iter().map(|c| c.time).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(times[0], 0);

    let frame = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(frame.start, 3_000 * MS);
    assert!(frame.is_keyframe());
}

// =============================================================================
// Damaged input
// =============================================================================

/// Cluster header with an impossible size followed by junk, 200 bytes total.
fn corrupted_cluster() -> Vec<u8> {
    let mut bytes = vec![0x1F, 0x43, 0xB6, 0x75];
    bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF]);
    bytes.resize(200, 0xAA);
    bytes
}

#[test]
fn test_resync_after_corrupted_cluster() {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::video(1)])];
    let data = FileBuilder::new(head)
        .cluster(0, &[simple_block(1, 0, 0x80, b"before")])
        .raw_cluster(1000, corrupted_cluster())
        .cluster(2000, &[simple_block(1, 0, 0x80, b"after")])
        .build();
    let mut demuxer = open(data);

    let frames = collect(&mut demuxer, usize::MAX);
    assert_eq!(frames.len(), 2);
    assert_eq!(demuxer.frame_data(&frames[0]).unwrap(), b"before");
    assert_eq!(frames[1].start, 2_000 * MS);
    assert!(frames[1].flags.contains(FrameFlags::GAP));
    assert_eq!(demuxer.frame_data(&frames[1]).unwrap(), b"after");
    assert!(demuxer.last_error().is_none());
}

#[test]
fn test_fatal_error_until_rewind() {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::video(1)])];
    let data = FileBuilder::new(head)
        .cluster(0, &[simple_block(1, 0, 0x80, b"only")])
        .raw_cluster(1000, corrupted_cluster())
        .build();
    let mut demuxer = open(data);

    assert!(demuxer.read_frame().unwrap().is_some());
    assert!(demuxer.read_frame().unwrap().is_none());
    let error = demuxer.last_error().unwrap();
    assert_eq!(error.track, None);

    assert!(matches!(
        demuxer.seek(500 * MS, SeekFlags::empty()),
        Err(MkvError::EngineFailed(_))
    ));
    assert!(demuxer.read_frame().unwrap().is_none());

    demuxer.seek(0, SeekFlags::empty()).unwrap();
    assert!(demuxer.last_error().is_none());
    assert!(demuxer.read_frame().unwrap().is_some());
}

#[test]
fn test_masking_offending_track_clears_error() {
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1), TrackSpec::audio(2)]),
    ];
    // Xiph lace announcing a 200-byte frame in a 3-byte payload.
    let broken = simple_block(2, 0, 0x82, &[1, 200, 1, 2, 3]);
    let data = FileBuilder::new(head)
        .cluster(
            0,
            &[
                simple_block(1, 0, 0x80, b"v0"),
                broken,
                simple_block(1, 40, 0x00, b"v1"),
            ],
        )
        .build();
    let mut demuxer = open(data);

    // v0 was queued before the broken block.
    let first = demuxer.read_frame().unwrap().unwrap();
    assert_eq!(demuxer.frame_data(&first).unwrap(), b"v0");
    assert!(demuxer.read_frame().unwrap().is_none());
    assert_eq!(demuxer.last_error().unwrap().track, Some(1));

    demuxer.set_track_mask([1].into_iter().collect());
    assert!(demuxer.last_error().is_none());

    let frames = collect(&mut demuxer, usize::MAX);
    let payloads: Vec<Vec<u8>> = frames
        .iter()
        .map(|f| demuxer.frame_data(f).unwrap())
        .collect();
    assert_eq!(payloads, vec![b"v1".to_vec()]);
}

#[test]
fn test_queued_frames_delivered_after_fatal_error() {
    let head = vec![
        info(1_000_000),
        tracks(&[TrackSpec::video(1), TrackSpec::audio(2)]),
    ];
    // The audio track never gets a frame, so both video frames are queued
    // before the damaged tail is reached.
    let data = FileBuilder::new(head)
        .cluster(
            0,
            &[
                simple_block(1, 0, 0x80, b"v0"),
                simple_block(1, 40, 0x00, b"v1"),
            ],
        )
        .raw_cluster(1000, corrupted_cluster())
        .build();
    let mut demuxer = open(data);

    let frames = collect(&mut demuxer, usize::MAX);
    let payloads: Vec<Vec<u8>> = frames
        .iter()
        .map(|f| demuxer.frame_data(f).unwrap())
        .collect();
    assert_eq!(payloads, vec![b"v0".to_vec(), b"v1".to_vec()]);
    assert!(demuxer.last_error().is_some());
    assert!(demuxer.read_frame().unwrap().is_none());
}

/// One good cluster, `damaged` clusters whose only block has a broken lace,
/// then another good cluster.
fn damaged_run(damaged: usize) -> Vec<u8> {
    let head = vec![info(1_000_000), tracks(&[TrackSpec::video(1)])];
    let mut builder = FileBuilder::new(head).cluster(0, &[simple_block(1, 0, 0x80, b"before")]);
    for i in 1..=damaged as u64 {
        // Xiph lace announcing a 200-byte frame in a 3-byte payload.
        builder = builder.cluster(i * 1000, &[simple_block(1, 0, 0x82, &[1, 200, 1, 2, 3])]);
    }
    builder
        .cluster((damaged as u64 + 1) * 1000, &[simple_block(1, 0, 0x80, b"after")])
        .build()
}

fn payloads(demuxer: &mut Demuxer) -> Vec<Vec<u8>> {
    let frames = collect(demuxer, usize::MAX);
    frames
        .iter()
        .map(|f| demuxer.frame_data(f).unwrap())
        .collect()
}

#[test]
fn test_resync_within_attempt_limit() {
    let mut demuxer = open(damaged_run(MAX_RESYNC_ATTEMPTS));
    assert_eq!(
        payloads(&mut demuxer),
        vec![b"before".to_vec(), b"after".to_vec()]
    );
    assert!(demuxer.last_error().is_none());
}

#[test]
fn test_resync_gives_up_after_attempt_limit() {
    let mut demuxer = open(damaged_run(MAX_RESYNC_ATTEMPTS + 1));
    assert_eq!(payloads(&mut demuxer), vec![b"before".to_vec()]);
    let error = demuxer.last_error().unwrap();
    assert_eq!(error.track, Some(0));
}
