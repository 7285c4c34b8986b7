//! Source media model and encoder capability types.
//!
//! Enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subtitle codecs that carry bitmap images and cannot become WebVTT text.
pub const BITMAP_SUBTITLE_CODECS: &[&str] = &[
    "hdmv_pgs_subtitle",
    "dvd_subtitle",
    "dvb_subtitle",
    "xsub",
];

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The media kind an encoder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

// ---------------------------------------------------------------------------
// EncoderCapability
// ---------------------------------------------------------------------------

/// One encoder implementation usable on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapability {
    /// Video or audio.
    pub media_kind: MediaKind,
    /// Codec family (e.g. "h264", "aac").
    pub codec_id: String,
    /// ffmpeg encoder name (e.g. "h264_nvenc", "libx264").
    pub implementation_id: String,
    /// Whether the encoder runs on dedicated hardware.
    pub hardware: bool,
    /// Human-readable name (e.g. "NVIDIA NVENC").
    pub display_name: String,
}

impl fmt::Display for EncoderCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.hardware { "hardware" } else { "software" };
        write!(
            f,
            "{} ({}, {class})",
            self.display_name, self.implementation_id
        )
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// The primary video stream of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Average frame rate.
    pub frame_rate: f64,
    /// Declared bitrate in kbps.
    pub bitrate_kbps: Option<u32>,
    /// ffprobe codec name (e.g. "h264").
    pub codec_name: Option<String>,
}

impl VideoStream {
    /// Width divided by height, or 1.0 for degenerate streams.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// An audio track of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Ordinal among audio streams (ffmpeg `0:a:<index>`).
    pub index: u32,
    /// Language tag (ISO 639-2), or `und_<index>` when untagged.
    pub language: String,
    /// ffprobe codec name.
    pub codec_name: Option<String>,
    /// Declared bitrate in kbps.
    pub bitrate_kbps: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate_hz: Option<u32>,
    /// Channel count.
    pub channels: Option<u32>,
}

/// A subtitle track of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStream {
    /// Ordinal among subtitle streams (ffmpeg `0:s:<index>`).
    pub index: u32,
    /// Language tag, or `und_<index>` when untagged.
    pub language: String,
    /// ffprobe codec name (e.g. "subrip", "hdmv_pgs_subtitle").
    pub codec_name: String,
    /// Whether the track is image-based.
    pub bitmap: bool,
}

impl SubtitleStream {
    /// Whether `codec_name` is one of the known bitmap subtitle codecs.
    pub fn is_bitmap_codec(codec_name: &str) -> bool {
        let lower = codec_name.to_ascii_lowercase();
        BITMAP_SUBTITLE_CODECS.contains(&lower.as_str())
    }
}

/// Structural description of an input file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceMedia {
    /// Primary video stream; `None` for audio-only sources.
    pub video: Option<VideoStream>,
    /// Audio tracks in stream order.
    pub audio_tracks: Vec<AudioStream>,
    /// Subtitle tracks in stream order.
    pub subtitle_tracks: Vec<SubtitleStream>,
    /// Container format name reported by the probe.
    pub format_name: Option<String>,
    /// File size in bytes.
    pub file_size: Option<u64>,
}

impl SourceMedia {
    /// Duration of the source: video duration when present.
    pub fn duration_secs(&self) -> Option<f64> {
        self.video.as_ref().map(|v| v.duration_secs)
    }

    /// Whether the probe found no streams at all.
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio_tracks.is_empty() && self.subtitle_tracks.is_empty()
    }
}
