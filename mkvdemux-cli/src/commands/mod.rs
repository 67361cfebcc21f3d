//! CLI subcommand implementations.

pub mod frames;
pub mod info;
pub mod seek;

pub use frames::CmdFrames;
pub use info::CmdInfo;
pub use seek::CmdSeek;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use console::style;
use mkvdemux::{DemuxConfig, Frame, FrameFlags, MkvDemuxer, ReaderSource};
use serde::Serialize;

/// Demuxer over a buffered file.
pub type FileDemuxer = MkvDemuxer<ReaderSource<BufReader<File>>>;

/// Open `path` as a Matroska file.
pub fn open_file(path: &Path, config: DemuxConfig) -> anyhow::Result<FileDemuxer> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let source = ReaderSource::new(BufReader::new(file))?;
    MkvDemuxer::open_with_config(source, config)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// One frame as printed by `frames` and `seek`.
#[derive(Debug, Clone, Serialize)]
pub struct FrameLine {
    /// Track index.
    pub track: usize,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Byte offset of the payload.
    pub position: u64,
    /// Stored payload size.
    pub size: u64,
    /// Raw flag bits.
    pub flags: FrameFlags,
}

impl From<&Frame> for FrameLine {
    fn from(frame: &Frame) -> Self {
        Self {
            track: frame.track,
            start: seconds(frame.start),
            duration: frame.duration().map(seconds),
            position: frame.position,
            size: frame.length,
            flags: frame.flags,
        }
    }
}

/// Read up to `limit` frames and print them.
pub fn print_frames(demuxer: &mut FileDemuxer, limit: Option<usize>, json: bool) -> anyhow::Result<usize> {
    let mut count = 0;
    while limit.map_or(true, |limit| count < limit) {
        let Some(frame) = demuxer.read_frame()? else {
            break;
        };
        let line = FrameLine::from(&frame);
        if json {
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!(
                "  {:>5}  {:>12}  {:>10}  {:>8}  {}",
                line.track,
                format!("{:.3}", line.start),
                line.duration.map_or_else(|| "-".to_string(), |d| format!("{d:.3}")),
                line.size,
                flag_letters(frame.flags)
            );
        }
        count += 1;
    }

    if let Some(error) = demuxer.last_error() {
        eprintln!(
            "{} stream stopped at offset {}: {}",
            style("error:").red().bold(),
            error.offset,
            error.message
        );
    }
    Ok(count)
}

/// Column header for the plain frame listing.
pub fn print_frame_header() {
    println!(
        "  {:>5}  {:>12}  {:>10}  {:>8}  {}",
        style("track").dim(),
        style("start").dim(),
        style("duration").dim(),
        style("size").dim(),
        style("flags").dim()
    );
}

/// Compact flag column: K keyframe, G gap, D discardable, I invisible,
/// A additions, ? unknown start.
fn flag_letters(flags: FrameFlags) -> String {
    [
        (FrameFlags::KEYFRAME, 'K'),
        (FrameFlags::GAP, 'G'),
        (FrameFlags::DISCARDABLE, 'D'),
        (FrameFlags::INVISIBLE, 'I'),
        (FrameFlags::BLOCK_ADDITIONS, 'A'),
        (FrameFlags::UNKNOWN_START, '?'),
    ]
    .iter()
    .map(|&(flag, letter)| if flags.contains(flag) { letter } else { '.' })
    .collect()
}

/// Nanoseconds to seconds.
pub fn seconds(ns: u64) -> f64 {
    ns as f64 / 1_000_000_000.0
}

/// Format a duration in seconds as `HH:MM:SS.mmm`.
pub fn format_duration(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let secs = (millis / 1000) % 60;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis % 1000)
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00.000");
        assert_eq!(format_duration(3725.5), "01:02:05.500");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_flag_letters() {
        assert_eq!(flag_letters(FrameFlags::empty()), "......");
        assert_eq!(
            flag_letters(FrameFlags::KEYFRAME | FrameFlags::GAP),
            "KG...."
        );
    }
}
