//! mkvdemux CLI - inspect Matroska and WebM files.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mkvdemux::DemuxConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::{CmdFrames, CmdInfo, CmdSeek};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "mkvdemux")]
#[command(version)]
#[command(about = "Inspect and demultiplex Matroska/WebM files")]
#[command(long_about = "Reads Matroska and WebM files and prints their metadata and frames.\n\n\
    EXAMPLES:\n    \
    mkvdemux info movie.mkv\n    \
    mkvdemux frames movie.mkv --limit 20 --json\n    \
    mkvdemux seek movie.webm 90.5 --keyframe")]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Demuxer configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show segment information, tracks, chapters and attachments
    Info(CmdInfo),
    /// List frames in presentation order
    Frames(CmdFrames),
    /// Seek to a time and list the frames that follow
    Seek(CmdSeek),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mkvdemux=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DemuxConfig> {
    let Some(path) = path else {
        return Ok(DemuxConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: DemuxConfig =
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?;
    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Info(cmd) => cmd.run(config),
        Command::Frames(cmd) => cmd.run(config),
        Command::Seek(cmd) => cmd.run(config),
    }
}
