//! Seek command.

use clap::Args;
use console::style;
use mkvdemux::{DemuxConfig, SeekFlags};
use std::path::PathBuf;

use super::{format_duration, open_file, print_frame_header, print_frames};

/// Seek to a time and list the frames that follow.
#[derive(Args, Debug)]
pub struct CmdSeek {
    /// Path to the Matroska file.
    pub file: PathBuf,

    /// Target time in seconds.
    pub seconds: f64,

    /// Start each track at its last keyframe before the target.
    #[arg(short, long)]
    pub keyframe: bool,

    /// Only frames flagged as keyframes count, on every track.
    #[arg(long)]
    pub strict: bool,

    /// Number of frames to list after the seek.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Output one JSON object per frame.
    #[arg(long)]
    pub json: bool,
}

impl CmdSeek {
    fn flags(&self) -> SeekFlags {
        let mut flags = SeekFlags::empty();
        flags.set(SeekFlags::PREFER_PREV_KEYFRAME, self.keyframe);
        flags.set(SeekFlags::STRICT, self.strict);
        flags
    }

    /// Execute the seek command.
    pub fn run(&self, config: DemuxConfig) -> anyhow::Result<()> {
        if !self.seconds.is_finite() || self.seconds < 0.0 {
            anyhow::bail!("Seek target must be a non-negative number of seconds");
        }
        let mut demuxer = open_file(&self.file, config)?;
        let target = (self.seconds * 1_000_000_000.0) as u64;
        demuxer.seek(target, self.flags())?;

        if !self.json {
            println!(
                "{} {} ({} cues{})",
                style("Seeked to").cyan().bold(),
                format_duration(self.seconds),
                demuxer.cues().len(),
                if demuxer.cues().is_synthetic() { ", rebuilt by scanning" } else { "" }
            );
            println!();
            print_frame_header();
        }
        print_frames(&mut demuxer, Some(self.limit), self.json)?;
        Ok(())
    }
}
