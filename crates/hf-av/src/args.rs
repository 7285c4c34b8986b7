//! Typed ffmpeg command builders.
//!
//! Every function here is pure: it maps an encoder choice, a rung or track
//! and [`EncodeOptions`] to the argument vector handed to [`ToolCommand`].
//! Nothing is executed.
//!
//! [`ToolCommand`]: crate::ToolCommand

use std::path::Path;

use hf_core::config::ConversionConfig;
use hf_core::{BitrateProfile, EncoderCapability};

/// Render node used for VAAPI encoding.
pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Segment file pattern inside every rendition directory.
pub const SEGMENT_PATTERN: &str = "chunk_%03d.ts";

/// Playlist file name inside every rendition directory.
pub const RENDITION_PLAYLIST: &str = "playlist.m3u8";

/// Output sample rate for every audio rendition.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Encoding knobs shared by every job of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOptions {
    /// Target segment length in seconds.
    pub segment_duration: f64,
    /// GOP size in frames.
    pub keyframe_interval: u32,
    /// `-hls_playlist_type` value.
    pub playlist_type: String,
    /// Encoder preset.
    pub preset: String,
    /// CRF for software x264.
    pub crf: u32,
    /// `-threads` value per encoder process.
    pub threads: u32,
    /// Pass `-hwaccel auto` for hardware encoders.
    pub hwaccel: bool,
    /// DRM render node for VAAPI.
    pub vaapi_device: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default(), 2)
    }
}

impl EncodeOptions {
    /// Derive options from the conversion config and a per-process thread count.
    pub fn from_config(conv: &ConversionConfig, threads: u32) -> Self {
        Self {
            segment_duration: conv.segment_duration,
            keyframe_interval: conv.keyframe_interval,
            playlist_type: conv.playlist_type.clone(),
            preset: conv.preset.clone(),
            crf: conv.crf,
            threads: conv.encoder_threads.unwrap_or(threads).max(1),
            hwaccel: !conv.disable_hwaccel,
            vaapi_device: DEFAULT_VAAPI_DEVICE.to_string(),
        }
    }
}

fn is_vaapi(encoder: &EncoderCapability) -> bool {
    encoder.implementation_id.ends_with("_vaapi")
}

fn common_prefix() -> Vec<String> {
    ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn hls_output(args: &mut Vec<String>, out_dir: &Path, opts: &EncodeOptions) {
    args.extend([
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        format!("{}", opts.segment_duration),
        "-hls_playlist_type".into(),
        opts.playlist_type.clone(),
        "-hls_flags".into(),
        "independent_segments".into(),
        "-hls_segment_filename".into(),
        out_dir.join(SEGMENT_PATTERN).to_string_lossy().to_string(),
        "-progress".into(),
        "pipe:2".into(),
        out_dir.join(RENDITION_PLAYLIST).to_string_lossy().to_string(),
    ]);
}

/// Encoder-specific flags placed right after `-c:v`.
pub fn video_encoder_flags(encoder: &EncoderCapability, opts: &EncodeOptions) -> Vec<String> {
    let id = encoder.implementation_id.as_str();
    if id.ends_with("_videotoolbox") {
        vec!["-allow_sw".into(), "1".into()]
    } else if id.ends_with("_nvenc") {
        vec!["-preset".into(), opts.preset.clone(), "-rc".into(), "vbr".into()]
    } else if id.ends_with("_qsv") {
        vec!["-preset".into(), opts.preset.clone()]
    } else if id == "libx264" {
        vec![
            "-preset".into(),
            opts.preset.clone(),
            "-crf".into(),
            opts.crf.to_string(),
        ]
    } else {
        Vec::new()
    }
}

/// Build the ffmpeg arguments for one video rendition.
pub fn video_args(
    input: &Path,
    encoder: &EncoderCapability,
    profile: &BitrateProfile,
    out_dir: &Path,
    opts: &EncodeOptions,
) -> Vec<String> {
    let mut args = common_prefix();

    if is_vaapi(encoder) {
        args.extend(["-vaapi_device".into(), opts.vaapi_device.clone()]);
    } else if encoder.hardware && opts.hwaccel {
        args.extend(["-hwaccel".into(), "auto".into()]);
    }

    args.extend([
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-vf".into(),
    ]);
    if is_vaapi(encoder) {
        args.push(format!("format=nv12,hwupload,scale_vaapi={}", profile.scale_filter()));
    } else {
        args.push(format!("scale={}", profile.scale_filter()));
    }

    args.extend(["-c:v".into(), encoder.implementation_id.clone()]);
    args.extend(video_encoder_flags(encoder, opts));

    let max = profile.max_video_kbps;
    args.extend([
        "-b:v".into(),
        format!("{max}k"),
        "-minrate".into(),
        format!("{}k", profile.min_video_kbps),
        "-maxrate".into(),
        format!("{}k", max * 6 / 5),
        "-bufsize".into(),
        format!("{}k", max * 2),
        "-g".into(),
        opts.keyframe_interval.to_string(),
        "-keyint_min".into(),
        opts.keyframe_interval.to_string(),
        "-sc_threshold".into(),
        "0".into(),
        "-threads".into(),
        opts.threads.to_string(),
        "-an".into(),
        "-sn".into(),
    ]);

    hls_output(&mut args, out_dir, opts);
    args
}

/// Build the ffmpeg arguments for one audio rendition.
pub fn audio_args(
    input: &Path,
    encoder: &EncoderCapability,
    track_index: u32,
    bitrate_kbps: u32,
    out_dir: &Path,
    opts: &EncodeOptions,
) -> Vec<String> {
    let mut args = common_prefix();
    args.extend([
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-map".into(),
        format!("0:a:{track_index}"),
        "-c:a".into(),
        encoder.implementation_id.clone(),
        "-b:a".into(),
        format!("{bitrate_kbps}k"),
        "-ar".into(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-ac".into(),
        "2".into(),
        "-vn".into(),
        "-sn".into(),
    ]);
    hls_output(&mut args, out_dir, opts);
    args
}

/// Build the ffmpeg arguments that extract one subtitle track to WebVTT.
pub fn subtitle_args(input: &Path, track_index: u32, out_file: &Path) -> Vec<String> {
    let mut args = common_prefix();
    args.extend([
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-map".into(),
        format!("0:s:{track_index}"),
        "-vn".into(),
        "-an".into(),
        "-c:s".into(),
        "webvtt".into(),
        out_file.to_string_lossy().to_string(),
    ]);
    args
}

/// Arguments listing every encoder compiled into ffmpeg.
pub fn encoder_listing_args() -> Vec<String> {
    vec!["-hide_banner".into(), "-encoders".into()]
}

/// Arguments for a short synthetic encode proving a hardware encoder works.
pub fn hardware_test_args(encoder: &EncoderCapability, vaapi_device: &str) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
    match encoder.media_kind {
        hf_core::MediaKind::Video => {
            if is_vaapi(encoder) {
                args.extend(["-vaapi_device".into(), vaapi_device.to_string()]);
            }
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                "testsrc=duration=0.1:size=320x240:rate=1".into(),
            ]);
            if is_vaapi(encoder) {
                args.extend(["-vf".into(), "format=nv12,hwupload".into()]);
            }
            args.extend(["-c:v".into(), encoder.implementation_id.clone()]);
        }
        hf_core::MediaKind::Audio => {
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                "sine=frequency=1000:duration=0.1".into(),
                "-c:a".into(),
                encoder.implementation_id.clone(),
            ]);
        }
    }
    args.extend([
        "-t".into(),
        "0.1".into(),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]);
    args
}
