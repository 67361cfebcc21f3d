//! Frame listing command.

use clap::Args;
use mkvdemux::{DemuxConfig, TrackMask};
use std::path::PathBuf;

use super::{open_file, print_frame_header, print_frames};

/// List frames in presentation order.
#[derive(Args, Debug)]
pub struct CmdFrames {
    /// Path to the Matroska file.
    pub file: PathBuf,

    /// Stop after this many frames.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Track indices to ignore (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub mask: Vec<usize>,

    /// Output one JSON object per frame.
    #[arg(long)]
    pub json: bool,
}

impl CmdFrames {
    /// Execute the frames command.
    pub fn run(&self, config: DemuxConfig) -> anyhow::Result<()> {
        let mut demuxer = open_file(&self.file, config)?;
        if let Some(&bad) = self.mask.iter().find(|&&i| i >= demuxer.track_count()) {
            anyhow::bail!("No track with index {} ({} tracks)", bad, demuxer.track_count());
        }
        demuxer.set_track_mask(self.mask.iter().copied().collect::<TrackMask>());

        if !self.json {
            print_frame_header();
        }
        let count = print_frames(&mut demuxer, self.limit, self.json)?;
        if !self.json {
            println!();
            println!("  {} frames", count);
        }
        Ok(())
    }
}
