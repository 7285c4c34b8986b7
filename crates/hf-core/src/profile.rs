//! Bitrate profiles (ladder rungs) and the default quality catalog.

use serde::{Deserialize, Serialize};

/// Default audio bitrate attached to a rung, in kbps.
pub const DEFAULT_RUNG_AUDIO_KBPS: u32 = 160;

/// One rung of a bitrate ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateProfile {
    /// Rung label (e.g. "720p"); also the output subdirectory name.
    pub name: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Peak video bitrate in kbps.
    pub max_video_kbps: u32,
    /// Floor video bitrate in kbps.
    pub min_video_kbps: u32,
    /// Audio bitrate counted into the variant bandwidth, in kbps.
    #[serde(default = "default_audio_kbps")]
    pub audio_kbps: u32,
}

fn default_audio_kbps() -> u32 {
    DEFAULT_RUNG_AUDIO_KBPS
}

impl BitrateProfile {
    /// Create a rung with the default audio bitrate.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        max_video_kbps: u32,
        min_video_kbps: u32,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            max_video_kbps,
            min_video_kbps,
            audio_kbps: DEFAULT_RUNG_AUDIO_KBPS,
        }
    }

    /// Pixel count, used to order rungs with equal heights.
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// ffmpeg scale filter argument (`W:H`).
    pub fn scale_filter(&self) -> String {
        format!("{}:{}", self.width, self.height)
    }

    /// Peak variant bandwidth in bits per second (video + audio).
    pub fn bandwidth_bps(&self) -> u64 {
        (u64::from(self.max_video_kbps) + u64::from(self.audio_kbps)) * 1000
    }
}

/// The built-in catalog, ascending by resolution.
pub fn default_catalog() -> Vec<BitrateProfile> {
    vec![
        BitrateProfile::new("144p", 256, 144, 300, 200),
        BitrateProfile::new("240p", 426, 240, 500, 350),
        BitrateProfile::new("360p", 640, 360, 800, 600),
        BitrateProfile::new("480p", 854, 480, 1200, 900),
        BitrateProfile::new("720p", 1280, 720, 2500, 1800),
        BitrateProfile::new("1080p", 1920, 1080, 5000, 3500),
        BitrateProfile::new("1440p", 2560, 1440, 8000, 6000),
        BitrateProfile::new("2160p", 3840, 2160, 16000, 12000),
    ]
}
