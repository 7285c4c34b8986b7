//! Rendition jobs: what the scheduler runs and where results land.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use hf_core::config::ConversionConfig;
use hf_core::{AudioStream, BitrateProfile, EncoderCapability, Error, MediaKind, SourceMedia, SubtitleStream};

/// Broad category of a job, used by the failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Video,
    Audio,
    Subtitle,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// What a job encodes.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSpec {
    Video {
        profile: BitrateProfile,
        encoder: EncoderCapability,
    },
    Audio {
        track: AudioStream,
        encoder: EncoderCapability,
        bitrate_kbps: u32,
    },
    Subtitle {
        track: SubtitleStream,
    },
}

impl JobSpec {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Video { .. } => JobKind::Video,
            Self::Audio { .. } => JobKind::Audio,
            Self::Subtitle { .. } => JobKind::Subtitle,
        }
    }
}

/// Files produced by a successful job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobArtifact {
    /// Media playlist (video/audio) or WebVTT file (subtitle).
    pub path: PathBuf,
    /// Media time the encoder reported reaching, if known.
    pub produced_duration_secs: Option<f64>,
}

/// Result slot of a job.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobOutcome {
    #[default]
    Pending,
    Succeeded(JobArtifact),
    Failed(String),
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionJob {
    /// Dispatch index; also the job's position in the slot arena.
    pub slot: usize,
    /// Unique label, also the output directory or file stem.
    pub label: String,
    pub spec: JobSpec,
    pub outcome: JobOutcome,
}

impl RenditionJob {
    pub fn kind(&self) -> JobKind {
        self.spec.kind()
    }

    /// Directory (video/audio) or file (subtitle) this job writes under `root`.
    pub fn output_path(&self, root: &Path) -> PathBuf {
        match self.spec {
            JobSpec::Subtitle { .. } => root.join(format!("{}.vtt", self.label)),
            _ => root.join(&self.label),
        }
    }

    /// Delete whatever this job left under `root`: its rendition directory,
    /// or its `.vtt` file for subtitles. A missing path is not an error.
    pub async fn remove_output(&self, root: &Path) {
        let path = self.output_path(root);
        let result = match self.spec {
            JobSpec::Subtitle { .. } => tokio::fs::remove_file(&path).await,
            _ => tokio::fs::remove_dir_all(&path).await,
        };
        match result {
            Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove partial output {}: {e}", path.display()),
        }
    }

    pub fn artifact(&self) -> Option<&JobArtifact> {
        match &self.outcome {
            JobOutcome::Succeeded(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Track selection and audio bitrate rules for planning.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    /// Keep only audio tracks with these language tags.
    pub audio_languages: Option<Vec<String>>,
    pub convert_subtitles: bool,
    pub include_bitmap_subtitles: bool,
    pub default_audio_kbps: u32,
    pub max_audio_kbps: u32,
}

impl PlanOptions {
    pub fn from_config(conv: &ConversionConfig) -> Self {
        Self {
            audio_languages: conv.audio_languages.clone(),
            convert_subtitles: conv.convert_subtitles,
            include_bitmap_subtitles: conv.include_bitmap_subtitles,
            default_audio_kbps: conv.default_audio_kbps,
            max_audio_kbps: conv.max_audio_kbps,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// Encoders chosen during pre-flight. A kind may be absent when the source
/// has no stream of that kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobEncoders {
    pub video: Option<EncoderCapability>,
    pub audio: Option<EncoderCapability>,
}

/// Audio bitrate for a track: its own bitrate capped at `max`, else `default`.
pub fn audio_bitrate_kbps(track: &AudioStream, default_kbps: u32, max_kbps: u32) -> u32 {
    match track.bitrate_kbps {
        Some(kbps) if kbps > 0 => kbps.min(max_kbps),
        _ => default_kbps,
    }
}

/// Lowercase a language tag and replace anything but `[a-z0-9_-]`.
pub fn sanitize_label(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "und".to_string()
    } else {
        cleaned
    }
}

/// Hands out unique labels: the first use of a base is bare, later ones get
/// the lowest free `_1`, `_2`, ... suffix. A suffixed candidate that was
/// already issued verbatim (e.g. `und_1` from an untagged track) is skipped.
#[derive(Default)]
struct LabelAllocator {
    issued: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

impl LabelAllocator {
    fn allocate(&mut self, base: String) -> String {
        if self.issued.insert(base.clone()) {
            return base;
        }
        let next = self.next_suffix.entry(base.clone()).or_insert(1);
        loop {
            let candidate = format!("{base}_{next}");
            *next += 1;
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Build the job list in dispatch order: video rungs ascending, then audio,
/// then subtitles.
///
/// # Errors
///
/// [`Error::NoEncoderAvailable`] when the ladder or audio tracks need an
/// encoder that was not selected.
pub fn plan_jobs(
    ladder: &[BitrateProfile],
    source: &SourceMedia,
    encoders: &JobEncoders,
    options: &PlanOptions,
) -> hf_core::Result<Vec<RenditionJob>> {
    let mut specs: Vec<(String, JobSpec)> = Vec::new();
    let mut labels = LabelAllocator::default();

    if !ladder.is_empty() {
        let encoder = encoders.video.as_ref().ok_or(Error::NoEncoderAvailable {
            kind: MediaKind::Video,
        })?;
        let mut rungs = ladder.to_vec();
        rungs.sort_by_key(|p| (p.height, p.pixels()));
        for profile in rungs {
            let label = labels.allocate(sanitize_label(&profile.name));
            specs.push((
                label,
                JobSpec::Video {
                    profile,
                    encoder: encoder.clone(),
                },
            ));
        }
    }

    let audio: Vec<&AudioStream> = source
        .audio_tracks
        .iter()
        .filter(|t| match &options.audio_languages {
            Some(langs) => langs.iter().any(|l| l.eq_ignore_ascii_case(&t.language)),
            None => true,
        })
        .collect();
    if !audio.is_empty() {
        let encoder = encoders.audio.as_ref().ok_or(Error::NoEncoderAvailable {
            kind: MediaKind::Audio,
        })?;
        for track in audio {
            let label = labels.allocate(format!("audio_{}", sanitize_label(&track.language)));
            specs.push((
                label,
                JobSpec::Audio {
                    track: track.clone(),
                    encoder: encoder.clone(),
                    bitrate_kbps: audio_bitrate_kbps(
                        track,
                        options.default_audio_kbps,
                        options.max_audio_kbps,
                    ),
                },
            ));
        }
    }

    if options.convert_subtitles {
        for track in &source.subtitle_tracks {
            if track.bitmap && !options.include_bitmap_subtitles {
                tracing::info!(
                    "Skipping bitmap subtitle track {} ({}, {})",
                    track.index,
                    track.language,
                    track.codec_name
                );
                continue;
            }
            let label = labels.allocate(sanitize_label(&track.language));
            specs.push((label, JobSpec::Subtitle { track: track.clone() }));
        }
    }

    Ok(specs
        .into_iter()
        .enumerate()
        .map(|(slot, (label, spec))| RenditionJob {
            slot,
            label,
            spec,
            outcome: JobOutcome::Pending,
        })
        .collect())
}
