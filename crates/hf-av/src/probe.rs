//! FFprobe-based source analysis.
//!
//! Shells out to `ffprobe -v error -show_format -show_streams -of json` and
//! maps the JSON output into [`hf_core::SourceMedia`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use hf_core::{AudioStream, Error, SourceMedia, SubtitleStream, VideoStream};
use serde::Deserialize;

use crate::command::ToolCommand;

/// Default probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads the structure of a source file through `ffprobe`.
#[derive(Debug, Clone)]
pub struct SourceInspector {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl SourceInspector {
    /// Create an inspector using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze `path` with a single ffprobe invocation.
    ///
    /// # Errors
    ///
    /// - [`Error::ProbeFailed`] when ffprobe cannot run, times out, exits
    ///   non-zero without output, or prints unparsable JSON.
    /// - [`Error::UnreadableMedia`] when the file has no usable streams or
    ///   its video stream lacks dimensions or duration.
    pub async fn analyze(&self, path: &Path) -> hf_core::Result<SourceMedia> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
            .arg(path.to_string_lossy())
            .timeout(self.timeout);

        tracing::debug!("Probing {}", path.display());
        let output = cmd
            .output()
            .await
            .map_err(|e| Error::ProbeFailed(e.to_string()))?;

        if !output.status.success() && output.stdout.trim().is_empty() {
            return Err(Error::ProbeFailed(format!(
                "ffprobe exited with status {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }

        let source = parse_probe_json(&output.stdout)?;
        tracing::info!(
            "Analyzed {}: video={} audio={} subtitles={}",
            path.display(),
            source
                .video
                .as_ref()
                .map(|v| format!("{}x{}", v.width, v.height))
                .unwrap_or_else(|| "none".into()),
            source.audio_tracks.len(),
            source.subtitle_tracks.len()
        );
        Ok(source)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: ProbeDisposition,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    language: Option<String>,
    #[serde(rename = "BPS")]
    bps: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map ffprobe JSON into a [`SourceMedia`].
pub fn parse_probe_json(json: &str) -> hf_core::Result<SourceMedia> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| Error::ProbeFailed(format!("ffprobe JSON parse error: {e}")))?;

    let format_duration = output.format.duration.as_deref().and_then(parse_f64);

    let mut source = SourceMedia {
        format_name: output.format.format_name,
        file_size: output.format.size.as_deref().and_then(|s| s.parse().ok()),
        ..SourceMedia::default()
    };

    for stream in output.streams {
        match stream.codec_type.as_deref() {
            Some("video") if stream.disposition.attached_pic == 1 => {
                tracing::debug!("Skipping attached picture stream");
            }
            Some("video") if source.video.is_none() => {
                source.video = Some(video_stream(&stream, format_duration)?);
            }
            Some("audio") => {
                let index = source.audio_tracks.len() as u32;
                source.audio_tracks.push(AudioStream {
                    index,
                    language: language_or_und(stream.tags.language.as_deref(), index),
                    codec_name: stream.codec_name.clone(),
                    bitrate_kbps: stream_bitrate_kbps(&stream),
                    sample_rate_hz: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
                    channels: stream.channels,
                });
            }
            Some("subtitle") => {
                let index = source.subtitle_tracks.len() as u32;
                let codec_name = stream.codec_name.clone().unwrap_or_default();
                source.subtitle_tracks.push(SubtitleStream {
                    index,
                    language: language_or_und(stream.tags.language.as_deref(), index),
                    bitmap: SubtitleStream::is_bitmap_codec(&codec_name),
                    codec_name,
                });
            }
            _ => {}
        }
    }

    if source.is_empty() {
        return Err(Error::UnreadableMedia(
            "no video, audio or subtitle streams found".into(),
        ));
    }
    Ok(source)
}

fn video_stream(stream: &ProbeStream, format_duration: Option<f64>) -> hf_core::Result<VideoStream> {
    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(Error::UnreadableMedia(format!(
            "video stream has invalid dimensions {width}x{height}"
        )));
    }

    let duration_secs = stream
        .duration
        .as_deref()
        .and_then(parse_f64)
        .or(format_duration)
        .filter(|d| *d > 0.0)
        .ok_or_else(|| Error::UnreadableMedia("video stream has no duration".into()))?;

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(VideoStream {
        width,
        height,
        duration_secs,
        frame_rate,
        bitrate_kbps: stream_bitrate_kbps(stream),
        codec_name: stream.codec_name.clone(),
    })
}

/// Stream `bit_rate`, falling back to the Matroska `BPS` statistics tag.
fn stream_bitrate_kbps(stream: &ProbeStream) -> Option<u32> {
    stream
        .bit_rate
        .as_deref()
        .or(stream.tags.bps.as_deref())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|bps| (bps / 1000) as u32)
        .filter(|kbps| *kbps > 0)
}

fn language_or_und(language: Option<&str>, index: u32) -> String {
    match language.map(str::trim) {
        Some(lang) if !lang.is_empty() => lang.to_string(),
        _ => format!("und_{index}"),
    }
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an ffprobe rational like `"24000/1001"` into a float.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.parse::<f64>().ok()?, d.parse::<f64>().ok()?),
        None => (s.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num == 0.0 {
        None
    } else {
        Some(num / den)
    }
}
