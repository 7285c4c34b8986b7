use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsforge")]
#[command(author, version, about = "Convert video files into adaptive HLS packages")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file into an HLS package
    Convert(ConvertArgs),

    /// List the encoders this host can use, best first
    Encoders {
        /// Skip the hardware test encodes and trust ffmpeg's listing
        #[arg(long)]
        no_verify: bool,
    },

    /// Analyze a media file and display its streams
    Analyze {
        /// File to analyze
        #[arg(required = true)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the effective configuration to a file
    Save {
        /// Destination path
        path: PathBuf,
    },

    /// Validate the configuration file given with --config
    Validate,
}

#[derive(clap::Args)]
pub struct ConvertArgs {
    /// Input video file
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output directory (default: input path without extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Explicit rungs from the catalog, e.g. 720p,1080p
    #[arg(short, long, value_delimiter = ',')]
    pub resolutions: Option<Vec<String>>,

    /// What to do with explicit rungs taller than the source
    #[arg(long, value_enum)]
    pub upscale: Option<UpscaleArg>,

    /// Encoder speed preset
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Constant rate factor for software encoding
    #[arg(long)]
    pub crf: Option<u32>,

    /// Maximum concurrent jobs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Target segment length in seconds
    #[arg(long)]
    pub segment_duration: Option<f64>,

    /// Keyframe interval in frames
    #[arg(long)]
    pub gop_size: Option<u32>,

    /// Per-job timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip subtitle conversion
    #[arg(long)]
    pub no_subtitles: bool,

    /// Also try bitmap subtitle tracks (usually fails)
    #[arg(long)]
    pub include_bitmap_subtitles: bool,

    /// Never use hardware encoders
    #[arg(long)]
    pub software: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum UpscaleArg {
    Honor,
    Clamp,
    Reject,
}
