//! File inspection command.

use clap::Args;
use console::style;
use mkvdemux::{DemuxConfig, Track, TrackSettings};
use serde::Serialize;
use std::path::PathBuf;

use super::{format_duration, format_size, open_file, seconds, FileDemuxer};

/// Track information for display.
#[derive(Debug, Clone, Serialize)]
pub struct TrackInfo {
    /// Track index.
    pub index: usize,
    /// Track number used by blocks.
    pub number: u64,
    /// Track type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Matroska codec ID.
    pub codec_id: String,
    /// Codec family.
    pub codec: String,
    /// Language code.
    pub language: String,
    /// Track name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the track is flagged default.
    pub default: bool,
    /// Default frame duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_duration: Option<f64>,
    /// CodecPrivate size in bytes.
    pub codec_private_size: usize,
    /// Compression algorithm, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Video-specific: width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    /// Video-specific: height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Audio-specific: sample rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    /// Audio-specific: channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u64>,
}

impl From<&Track> for TrackInfo {
    fn from(track: &Track) -> Self {
        let (width, height, sample_rate, channels) = match &track.settings {
            TrackSettings::Video(v) => (Some(v.pixel_width), Some(v.pixel_height), None, None),
            TrackSettings::Audio(a) => (None, None, Some(a.sampling_frequency), Some(a.channels)),
            TrackSettings::None => (None, None, None, None),
        };
        Self {
            index: track.index,
            number: track.number,
            kind: track.kind.name().to_string(),
            codec_id: track.codec_id.clone(),
            codec: format!("{:?}", track.codec_class).to_lowercase(),
            language: track.language.clone(),
            name: track.name.clone(),
            default: track.default,
            frame_duration: track.default_duration.map(seconds),
            codec_private_size: track.codec_private.len(),
            compression: track
                .compression
                .as_ref()
                .map(|c| format!("{:?}", c.algorithm).to_lowercase()),
            width,
            height,
            sample_rate,
            channels,
        }
    }
}

/// Chapter information for display.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterInfo {
    /// Start in seconds.
    pub start: f64,
    /// End in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// First title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Attachment information for display.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentInfo {
    /// File name.
    pub name: String,
    /// Media type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// File information.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    /// File path.
    pub file: String,
    /// EBML document type.
    pub doc_type: String,
    /// Segment title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Muxing application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muxing_app: Option<String>,
    /// Writing application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writing_app: Option<String>,
    /// Duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Timestamp scale in nanoseconds per tick.
    pub timecode_scale: u64,
    /// Number of cue points.
    pub cues: usize,
    /// Tracks.
    pub tracks: Vec<TrackInfo>,
    /// Chapters of every edition, flattened.
    pub chapters: Vec<ChapterInfo>,
    /// Attachments.
    pub attachments: Vec<AttachmentInfo>,
    /// Number of tags.
    pub tags: usize,
}

impl FileInfo {
    fn collect(file: String, demuxer: &FileDemuxer) -> Self {
        let info = demuxer.file_info();
        Self {
            file,
            doc_type: demuxer.ebml_header().doc_type.clone(),
            title: info.title.clone(),
            muxing_app: info.muxing_app.clone(),
            writing_app: info.writing_app.clone(),
            duration: info.duration_ns().map(seconds),
            timecode_scale: info.timecode_scale,
            cues: demuxer.cues().len(),
            tracks: demuxer.tracks().iter().map(TrackInfo::from).collect(),
            chapters: demuxer
                .chapters()
                .iter()
                .flat_map(|edition| &edition.chapters)
                .map(|atom| ChapterInfo {
                    start: seconds(atom.start),
                    end: atom.end.map(seconds),
                    title: atom.title().map(str::to_string),
                })
                .collect(),
            attachments: demuxer
                .attachments()
                .iter()
                .map(|a| AttachmentInfo {
                    name: a.name.clone(),
                    mime_type: a.mime_type.clone(),
                    size: a.length,
                })
                .collect(),
            tags: demuxer.tags().len(),
        }
    }
}

/// Inspect a Matroska file.
#[derive(Args, Debug)]
pub struct CmdInfo {
    /// Path to the Matroska file.
    pub file: PathBuf,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,
}

impl CmdInfo {
    /// Execute the info command.
    pub fn run(&self, config: DemuxConfig) -> anyhow::Result<()> {
        let demuxer = open_file(&self.file, config)?;
        let info = FileInfo::collect(self.file.display().to_string(), &demuxer);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            let size = std::fs::metadata(&self.file)?.len();
            print_file_info(&info, size);
        }
        Ok(())
    }
}

fn print_file_info(info: &FileInfo, size: u64) {
    println!();
    println!("{}", style("File Information").cyan().bold());
    println!();

    println!("  {:<16} {}", style("File:").white(), info.file);
    println!("  {:<16} {}", style("Size:").white(), format_size(size));
    println!("  {:<16} {}", style("Format:").white(), info.doc_type);
    if let Some(title) = &info.title {
        println!("  {:<16} {}", style("Title:").white(), title);
    }
    if let Some(duration) = info.duration {
        println!("  {:<16} {}", style("Duration:").white(), format_duration(duration));
    }
    if let Some(app) = &info.writing_app {
        println!("  {:<16} {}", style("Written by:").white(), app);
    }
    println!("  {:<16} {}", style("Cues:").white(), info.cues);

    println!();
    println!("{}", style("Tracks:").cyan().bold());
    for track in &info.tracks {
        println!();
        println!(
            "  {} #{} ({}, number {})",
            style("Track").white(),
            track.index,
            style(&track.kind).yellow(),
            track.number
        );
        println!("    {:<14} {} ({})", style("Codec:").dim(), track.codec_id, track.codec);
        println!("    {:<14} {}", style("Language:").dim(), track.language);
        if let Some(name) = &track.name {
            println!("    {:<14} {}", style("Name:").dim(), name);
        }
        if let (Some(w), Some(h)) = (track.width, track.height) {
            println!("    {:<14} {}x{}", style("Resolution:").dim(), w, h);
        }
        if let Some(rate) = track.sample_rate {
            println!("    {:<14} {} Hz", style("Sample Rate:").dim(), rate);
        }
        if let Some(channels) = track.channels {
            println!("    {:<14} {}", style("Channels:").dim(), channels);
        }
        if let Some(duration) = track.frame_duration {
            println!("    {:<14} {:.3} ms", style("Frame time:").dim(), duration * 1000.0);
        }
        if let Some(compression) = &track.compression {
            println!("    {:<14} {}", style("Compression:").dim(), compression);
        }
    }

    if !info.chapters.is_empty() {
        println!();
        println!("{}", style("Chapters:").cyan().bold());
        for chapter in &info.chapters {
            println!(
                "  {}  {}",
                format_duration(chapter.start),
                chapter.title.as_deref().unwrap_or("(untitled)")
            );
        }
    }

    if !info.attachments.is_empty() {
        println!();
        println!("{}", style("Attachments:").cyan().bold());
        for attachment in &info.attachments {
            println!(
                "  {} ({}, {})",
                attachment.name,
                attachment.mime_type,
                format_size(attachment.size)
            );
        }
    }
    println!();
}
