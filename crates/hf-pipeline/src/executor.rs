//! The [`RenditionExecutor`] trait runs one job; [`FfmpegExecutor`] is the
//! production implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hf_av::args::{self, EncodeOptions, RENDITION_PLAYLIST};
use hf_av::ToolCommand;

use crate::job::{JobArtifact, JobSpec, RenditionJob};

/// Timeout used when no per-job limit is configured.
const UNLIMITED_JOB_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Read-only inputs shared by every job of a run.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Source file.
    pub input: PathBuf,
    /// Root of the HLS package.
    pub output_root: PathBuf,
    /// Encoding knobs.
    pub options: EncodeOptions,
    /// Per-job timeout; unlimited when `None`.
    pub timeout: Option<Duration>,
    /// Source duration for progress reporting.
    pub source_duration_secs: Option<f64>,
}

/// Runs a single rendition job to completion.
///
/// Implementations write only under the job's own
/// [`output_path`](RenditionJob::output_path) and report failure through
/// the returned error; the scheduler owns the outcome slot.
#[async_trait]
pub trait RenditionExecutor: Send + Sync {
    /// A short name for logs (e.g. "ffmpeg").
    fn name(&self) -> &'static str;

    /// Produce the job's output.
    async fn execute(&self, job: &RenditionJob, ctx: &JobContext) -> hf_core::Result<JobArtifact>;
}

/// Runs jobs as ffmpeg subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    ffmpeg: PathBuf,
}

impl FfmpegExecutor {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    /// The argument vector for a job, without executing anything.
    pub fn build_args(job: &RenditionJob, ctx: &JobContext) -> Vec<String> {
        let out = job.output_path(&ctx.output_root);
        match &job.spec {
            JobSpec::Video { profile, encoder } => {
                args::video_args(&ctx.input, encoder, profile, &out, &ctx.options)
            }
            JobSpec::Audio {
                track,
                encoder,
                bitrate_kbps,
            } => args::audio_args(&ctx.input, encoder, track.index, *bitrate_kbps, &out, &ctx.options),
            JobSpec::Subtitle { track } => args::subtitle_args(&ctx.input, track.index, &out),
        }
    }
}

#[async_trait]
impl RenditionExecutor for FfmpegExecutor {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn execute(&self, job: &RenditionJob, ctx: &JobContext) -> hf_core::Result<JobArtifact> {
        let out = job.output_path(&ctx.output_root);
        let artifact_path = match job.spec {
            JobSpec::Subtitle { .. } => {
                if let Some(parent) = out.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                out.clone()
            }
            _ => {
                tokio::fs::create_dir_all(&out).await?;
                out.join(RENDITION_PLAYLIST)
            }
        };

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(Self::build_args(job, ctx))
            .timeout(ctx.timeout.unwrap_or(UNLIMITED_JOB_TIMEOUT));
        tracing::debug!("[{}] ffmpeg {}", job.label, cmd.get_args().join(" "));

        let mut tracker = ProgressTracker::new(&job.label, ctx.source_duration_secs);
        cmd.execute_with_stderr_callback(|line| tracker.observe(line))
            .await
            .map_err(|e| hf_core::Error::job_failed(&job.label, e.to_string()))?;

        if !artifact_exists(&artifact_path).await {
            return Err(hf_core::Error::job_failed(
                &job.label,
                format!("encoder finished but {} is missing", artifact_path.display()),
            ));
        }

        Ok(JobArtifact {
            path: artifact_path,
            produced_duration_secs: tracker.reached_secs(),
        })
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Follows `-progress pipe:2` output and logs each 10% step.
struct ProgressTracker<'a> {
    label: &'a str,
    total_secs: Option<f64>,
    reached_us: Option<u64>,
    last_decile: u32,
}

impl<'a> ProgressTracker<'a> {
    fn new(label: &'a str, total_secs: Option<f64>) -> Self {
        Self {
            label,
            total_secs: total_secs.filter(|t| *t > 0.0),
            reached_us: None,
            last_decile: 0,
        }
    }

    fn observe(&mut self, line: &str) {
        if let Some(us) = parse_out_time_us(line) {
            self.reached_us = Some(us);
            if let Some(total) = self.total_secs {
                let pct = ((us as f64 / 1_000_000.0) / total * 100.0).clamp(0.0, 100.0);
                let decile = (pct / 10.0) as u32;
                if decile > self.last_decile {
                    self.last_decile = decile;
                    tracing::debug!("[{}] {:.0}%", self.label, pct);
                }
            }
        } else if line.trim() == "progress=end" {
            tracing::debug!("[{}] encoder finished", self.label);
        }
    }

    fn reached_secs(&self) -> Option<f64> {
        self.reached_us.map(|us| us as f64 / 1_000_000.0)
    }
}

/// Parse `out_time_us=` (or the misnamed `out_time_ms=`, also microseconds).
fn parse_out_time_us(line: &str) -> Option<u64> {
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{plan_jobs, JobEncoders, PlanOptions};
    use hf_core::{AudioStream, BitrateProfile, EncoderCapability, MediaKind, SourceMedia, SubtitleStream, VideoStream};

    fn ctx(root: &Path) -> JobContext {
        JobContext {
            input: PathBuf::from("/in/movie.mkv"),
            output_root: root.to_path_buf(),
            options: EncodeOptions::default(),
            timeout: Some(Duration::from_secs(5)),
            source_duration_secs: Some(10.0),
        }
    }

    fn jobs() -> Vec<RenditionJob> {
        let source = SourceMedia {
            video: Some(VideoStream {
                width: 1280,
                height: 720,
                duration_secs: 10.0,
                frame_rate: 25.0,
                bitrate_kbps: None,
                codec_name: None,
            }),
            audio_tracks: vec![AudioStream {
                index: 0,
                language: "eng".into(),
                codec_name: None,
                bitrate_kbps: None,
                sample_rate_hz: None,
                channels: None,
            }],
            subtitle_tracks: vec![SubtitleStream {
                index: 0,
                language: "fre".into(),
                codec_name: "subrip".into(),
                bitmap: false,
            }],
            ..SourceMedia::default()
        };
        let encoders = JobEncoders {
            video: Some(EncoderCapability {
                media_kind: MediaKind::Video,
                codec_id: "h264".into(),
                implementation_id: "libx264".into(),
                hardware: false,
                display_name: "x264".into(),
            }),
            audio: Some(EncoderCapability {
                media_kind: MediaKind::Audio,
                codec_id: "aac".into(),
                implementation_id: "aac".into(),
                hardware: false,
                display_name: "FFmpeg AAC".into(),
            }),
        };
        let ladder = vec![BitrateProfile::new("720p", 1280, 720, 2500, 1800)];
        plan_jobs(&ladder, &source, &encoders, &PlanOptions::default()).unwrap()
    }

    #[test]
    fn args_target_each_job_output() {
        let root = Path::new("/out");
        let jobs = jobs();
        let video = FfmpegExecutor::build_args(&jobs[0], &ctx(root));
        assert_eq!(video.last().map(String::as_str), Some("/out/720p/playlist.m3u8"));
        let audio = FfmpegExecutor::build_args(&jobs[1], &ctx(root));
        assert_eq!(audio.last().map(String::as_str), Some("/out/audio_eng/playlist.m3u8"));
        let subs = FfmpegExecutor::build_args(&jobs[2], &ctx(root));
        assert_eq!(subs.last().map(String::as_str), Some("/out/fre.vtt"));
    }

    #[test]
    fn progress_lines() {
        assert_eq!(parse_out_time_us("out_time_us=2500000"), Some(2_500_000));
        assert_eq!(parse_out_time_us("out_time_ms=1000"), Some(1000));
        assert_eq!(parse_out_time_us("frame=12"), None);

        let mut tracker = ProgressTracker::new("720p", Some(10.0));
        tracker.observe("out_time_us=5000000");
        assert_eq!(tracker.last_decile, 5);
        assert_eq!(tracker.reached_secs(), Some(5.0));
    }

    #[tokio::test]
    async fn missing_ffmpeg_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FfmpegExecutor::new(PathBuf::from("nonexistent_ffmpeg_xyz"));
        let jobs = jobs();
        let err = executor.execute(&jobs[0], &ctx(dir.path())).await.unwrap_err();
        assert!(matches!(err, hf_core::Error::RenditionJobFailed { ref label, .. } if label == "720p"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_without_output_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FfmpegExecutor::new(PathBuf::from("true"));
        let jobs = jobs();
        let err = executor.execute(&jobs[2], &ctx(dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
