#![no_main]

//! Fuzz target for the demuxer engine.
//!
//! Opens arbitrary bytes as a Matroska file, then reads, seeks and masks
//! tracks. Any input must produce errors or end of stream, never a panic.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mkvdemux::{MemorySource, MkvDemuxer, SeekFlags, TrackMask};

#[derive(Arbitrary, Debug)]
struct DemuxInput {
    data: Vec<u8>,
    actions: Vec<Action>,
}

#[derive(Arbitrary, Debug)]
enum Action {
    Read,
    Seek { millis: u32, flags: u8 },
    Mask { track: u8 },
    Unmask,
}

fuzz_target!(|input: DemuxInput| {
    if input.data.len() > 256 * 1024 {
        return;
    }

    let Ok(mut demuxer) = MkvDemuxer::open(MemorySource::new(&input.data[..])) else {
        return;
    };
    for index in 0..demuxer.attachments().len() {
        let _ = demuxer.attachment_data(index);
    }

    for action in input.actions.iter().take(64) {
        match *action {
            Action::Read => {
                if let Ok(Some(frame)) = demuxer.read_frame() {
                    assert!(frame.track < demuxer.track_count());
                    let _ = demuxer.frame_data(&frame);
                }
            }
            Action::Seek { millis, flags } => {
                let flags = SeekFlags::from_bits_truncate(flags as u32);
                let _ = demuxer.seek(millis as u64 * 1_000_000, flags);
            }
            Action::Mask { track } => {
                let mut mask = demuxer.track_mask();
                mask.insert(track as usize);
                demuxer.set_track_mask(mask);
            }
            Action::Unmask => demuxer.set_track_mask(TrackMask::none()),
        }
    }
});
