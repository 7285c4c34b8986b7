//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! tool and conversion sections. Every section defaults sensibly so a
//! completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::profile::{default_catalog, BitrateProfile};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("config serialize error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Load configuration strictly: a missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let conv = &self.conversion;

        if conv.segment_duration <= 0.0 {
            warnings.push("conversion.segment_duration must be positive".into());
        }
        if conv.keyframe_interval == 0 {
            warnings.push("conversion.keyframe_interval must be positive".into());
        }
        if conv.crf > 51 {
            warnings.push(format!("conversion.crf {} is outside 0-51", conv.crf));
        }
        if !VALID_PRESETS.contains(&conv.preset.as_str()) {
            warnings.push(format!(
                "conversion.preset '{}' is not a recognized preset (valid: {})",
                conv.preset,
                VALID_PRESETS.join(", ")
            ));
        }
        if conv.max_workers == Some(0) {
            warnings.push("conversion.max_workers is 0; auto-detection will be used".into());
        }
        if conv.max_audio_kbps < conv.default_audio_kbps {
            warnings.push("conversion.max_audio_kbps is below default_audio_kbps".into());
        }
        if conv.bitrate_profiles.is_empty() {
            warnings.push("conversion.bitrate_profiles is empty; built-in catalog will be used".into());
        }
        for p in conv.bitrate_profiles.iter().chain(conv.ladder.iter().flatten()) {
            if p.min_video_kbps > p.max_video_kbps {
                warnings.push(format!(
                    "profile '{}' has min_video_kbps above max_video_kbps",
                    p.name
                ));
            }
            if p.width == 0 || p.height == 0 {
                warnings.push(format!("profile '{}' has a zero dimension", p.name));
            }
        }

        warnings
    }
}

/// Encoder speed presets accepted by x264-family encoders.
pub const VALID_PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// What to do with caller-supplied rungs taller than the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscalePolicy {
    /// Encode the ladder exactly as given.
    #[default]
    Honor,
    /// Drop rungs above the source height, keeping at least the smallest.
    Clamp,
    /// Fail the run with a validation error.
    Reject,
}

/// Conversion settings consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Target HLS segment length in seconds.
    pub segment_duration: f64,
    /// Keyframe interval (GOP size) in frames.
    pub keyframe_interval: u32,
    /// `-hls_playlist_type` value; "vod" closes playlists with ENDLIST.
    pub playlist_type: String,
    /// Encoder speed/quality preset.
    pub preset: String,
    /// Constant rate factor for software encoding.
    pub crf: u32,
    /// Worker pool size; derived from host parallelism when unset.
    pub max_workers: Option<usize>,
    /// Threads handed to each encoder process.
    pub encoder_threads: Option<u32>,
    /// Never select hardware encoders.
    pub force_software_encoding: bool,
    /// Do not pass `-hwaccel` decode flags to ffmpeg.
    pub disable_hwaccel: bool,
    /// Confirm hardware encoders with a short test encode.
    pub verify_hardware_encoders: bool,
    /// Convert text subtitles to WebVTT.
    pub convert_subtitles: bool,
    /// Also attempt bitmap subtitle tracks.
    pub include_bitmap_subtitles: bool,
    /// Keep only audio tracks with these language tags (all when unset).
    pub audio_languages: Option<Vec<String>>,
    /// Language of the default audio rendition.
    pub preferred_audio_language: Option<String>,
    /// Audio bitrate when the source track declares none, in kbps.
    pub default_audio_kbps: u32,
    /// Upper bound for copied source audio bitrates, in kbps.
    pub max_audio_kbps: u32,
    /// Lowest video bitrate the planner scales a rung down to, in kbps.
    pub bitrate_floor_kbps: u32,
    /// Per-job timeout in seconds; unlimited when unset.
    pub job_timeout_secs: Option<u64>,
    /// Quality catalog for adaptive planning.
    pub bitrate_profiles: Vec<BitrateProfile>,
    /// Explicit ladder overriding adaptive planning.
    pub ladder: Option<Vec<BitrateProfile>>,
    /// Handling of explicit rungs taller than the source.
    pub upscale_policy: UpscalePolicy,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            segment_duration: 2.0,
            keyframe_interval: 48,
            playlist_type: "vod".into(),
            preset: "fast".into(),
            crf: 23,
            max_workers: None,
            encoder_threads: None,
            force_software_encoding: false,
            disable_hwaccel: false,
            verify_hardware_encoders: true,
            convert_subtitles: true,
            include_bitmap_subtitles: false,
            audio_languages: None,
            preferred_audio_language: None,
            default_audio_kbps: 160,
            max_audio_kbps: 320,
            bitrate_floor_kbps: 200,
            job_timeout_secs: None,
            bitrate_profiles: default_catalog(),
            ladder: None,
            upscale_policy: UpscalePolicy::Honor,
        }
    }
}

impl ConversionConfig {
    /// The catalog to plan from, falling back to the built-in one when empty.
    pub fn catalog(&self) -> Vec<BitrateProfile> {
        if self.bitrate_profiles.is_empty() {
            default_catalog()
        } else {
            self.bitrate_profiles.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.conversion.segment_duration, 2.0);
        assert_eq!(cfg.conversion.keyframe_interval, 48);
        assert_eq!(cfg.conversion.preset, "fast");
        assert_eq!(cfg.conversion.crf, 23);
        assert!(cfg.conversion.convert_subtitles);
        assert!(!cfg.conversion.include_bitmap_subtitles);
        assert_eq!(cfg.conversion.upscale_policy, UpscalePolicy::Honor);
        assert_eq!(cfg.conversion.bitrate_profiles.len(), 8);
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.conversion.playlist_type, "vod");
        assert!(cfg.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn parse_partial_conversion_section() {
        let json = r#"{"conversion": {"crf": 20, "max_workers": 3, "upscale_policy": "clamp"}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.conversion.crf, 20);
        assert_eq!(cfg.conversion.max_workers, Some(3));
        assert_eq!(cfg.conversion.upscale_policy, UpscalePolicy::Clamp);
        assert_eq!(cfg.conversion.preset, "fast");
    }

    #[test]
    fn malformed_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn bad_values_warn() {
        let mut cfg = Config::default();
        cfg.conversion.preset = "warp".into();
        cfg.conversion.crf = 60;
        cfg.conversion.segment_duration = 0.0;
        cfg.conversion.ladder = Some(vec![BitrateProfile::new("bad", 0, 720, 100, 200)]);
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("preset")));
        assert!(warnings.iter().any(|w| w.contains("crf")));
        assert!(warnings.iter().any(|w| w.contains("segment_duration")));
        assert!(warnings.iter().any(|w| w.contains("min_video_kbps")));
        assert!(warnings.iter().any(|w| w.contains("zero dimension")));
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/hlsforge.json")));
        assert_eq!(cfg.conversion.crf, 23);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut cfg = Config::default();
        cfg.conversion.preset = "slow".into();
        cfg.conversion.job_timeout_secs = Some(600);
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.conversion.preset, "slow");
        assert_eq!(loaded.conversion.job_timeout_secs, Some(600));
    }

    #[test]
    fn empty_catalog_falls_back_to_builtin() {
        let mut conv = ConversionConfig::default();
        conv.bitrate_profiles.clear();
        assert_eq!(conv.catalog().len(), 8);
    }
}
