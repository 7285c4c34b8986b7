//! Playlist assembly.
//!
//! Runs after the scheduler. [`Assembler::finalize_renditions`] re-emits each
//! encoder playlist with verified segments; [`Assembler::assemble`] writes
//! subtitle playlists and `master.m3u8` from the successful jobs only.

use std::path::{Path, PathBuf};

use hf_core::config::ConversionConfig;
use hf_core::Error;
use hf_media::hls::{
    generate_master_playlist, generate_media_playlist, parse_media_playlist, referenced_uris,
    MasterPlaylist, MediaPlaylist, MediaRendition, MediaType, PlaylistType, Segment, Variant,
};

use crate::job::{JobOutcome, JobSpec, RenditionJob};

/// File name of the master playlist.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// H.264 High profile, level 4.1.
pub const VIDEO_CODEC: &str = "avc1.640029";

/// AAC-LC.
pub const AUDIO_CODEC: &str = "mp4a.40.2";

const AUDIO_GROUP: &str = "audio";
const SUBTITLE_GROUP: &str = "subs";
const HLS_VERSION: u8 = 3;

/// Settings the assembler needs from the run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    /// Configured segment length; the target duration is its ceiling.
    pub segment_duration: f64,
    pub playlist_type: PlaylistType,
    /// Language whose audio rendition becomes `DEFAULT=YES`.
    pub preferred_audio_language: Option<String>,
    /// Source duration, used for single-segment subtitle playlists.
    pub source_duration_secs: f64,
}

impl AssemblyOptions {
    pub fn from_config(conv: &ConversionConfig, source_duration_secs: f64) -> Self {
        Self {
            segment_duration: conv.segment_duration,
            playlist_type: PlaylistType::parse(&conv.playlist_type).unwrap_or(PlaylistType::Vod),
            preferred_audio_language: conv.preferred_audio_language.clone(),
            source_duration_secs,
        }
    }
}

/// Successful jobs split by kind, each in slot order.
pub struct SucceededJobs<'a> {
    pub video: Vec<&'a RenditionJob>,
    pub audio: Vec<&'a RenditionJob>,
    pub subtitles: Vec<&'a RenditionJob>,
}

impl<'a> SucceededJobs<'a> {
    pub fn from_jobs(jobs: &'a [RenditionJob]) -> Self {
        let mut split = Self {
            video: Vec::new(),
            audio: Vec::new(),
            subtitles: Vec::new(),
        };
        for job in jobs.iter().filter(|j| j.is_succeeded()) {
            match job.spec {
                JobSpec::Video { .. } => split.video.push(job),
                JobSpec::Audio { .. } => split.audio.push(job),
                JobSpec::Subtitle { .. } => split.subtitles.push(job),
            }
        }
        split
    }
}

/// Builds the HLS package from finished jobs.
#[derive(Debug, Clone)]
pub struct Assembler {
    options: AssemblyOptions,
}

impl Assembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    /// `#EXT-X-TARGETDURATION` for the configured segment length.
    pub fn target_duration(&self) -> u32 {
        self.options.segment_duration.ceil().max(1.0) as u32
    }

    /// Rewrite every successful video/audio playlist. A rendition whose
    /// playlist is unreadable or whose segments are missing is marked failed
    /// and its directory under `output_root` is removed.
    ///
    /// Returns the rewritten playlist paths.
    pub async fn finalize_renditions(
        &self,
        jobs: &mut [RenditionJob],
        output_root: &Path,
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for job in jobs.iter_mut() {
            if matches!(job.spec, JobSpec::Subtitle { .. }) {
                continue;
            }
            let Some(path) = job.artifact().map(|a| a.path.clone()) else {
                continue;
            };
            match self.rewrite_media_playlist(&path).await {
                Ok(playlist) => {
                    tracing::debug!(
                        "[{}] {} segment(s), {:.1}s",
                        job.label,
                        playlist.segments.len(),
                        playlist.total_duration()
                    );
                    written.push(path);
                }
                Err(e) => {
                    tracing::warn!("[{}] excluded from package: {e}", job.label);
                    job.remove_output(output_root).await;
                    job.outcome = JobOutcome::Failed(e.to_string());
                }
            }
        }
        written
    }

    /// Re-emit one media playlist with verified segments and normalized tags.
    pub async fn rewrite_media_playlist(&self, path: &Path) -> hf_core::Result<MediaPlaylist> {
        let text = tokio::fs::read_to_string(path).await?;
        let parsed = parse_media_playlist(&text)?;
        if parsed.segments.is_empty() {
            return Err(Error::Validation(format!("{} lists no segments", path.display())));
        }

        let dir = path.parent().unwrap_or(Path::new("."));
        for segment in &parsed.segments {
            if tokio::fs::metadata(dir.join(&segment.uri)).await.is_err() {
                return Err(Error::Validation(format!(
                    "segment {} listed in {} is missing",
                    segment.uri,
                    path.display()
                )));
            }
        }

        let mut target = self.target_duration();
        let longest = parsed.longest_segment_secs();
        if longest > target {
            tracing::warn!(
                "{} has a {longest}s segment; raising target duration from {target}s",
                path.display()
            );
            target = longest;
        }

        let playlist = MediaPlaylist {
            version: HLS_VERSION,
            target_duration: target,
            media_sequence: parsed.media_sequence,
            playlist_type: Some(self.options.playlist_type),
            independent_segments: true,
            segments: parsed.segments,
            ended: self.options.playlist_type == PlaylistType::Vod || parsed.ended,
            init_segment_uri: parsed.init_segment_uri,
        };
        tokio::fs::write(path, generate_media_playlist(&playlist)).await?;
        Ok(playlist)
    }

    /// Write subtitle playlists and the master playlist. A subtitle whose
    /// playlist cannot be written is left out of the master.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when there is nothing playable, and
    /// [`Error::Internal`] if the written master references a missing file.
    pub async fn assemble(
        &self,
        video: &[&RenditionJob],
        audio: &[&RenditionJob],
        subtitles: &[&RenditionJob],
        output_root: &Path,
    ) -> hf_core::Result<MasterPlaylist> {
        if video.is_empty() && audio.is_empty() {
            return Err(Error::Validation(
                "no successful video or audio rendition to package".into(),
            ));
        }

        let audio_media = self.audio_renditions(audio);
        let mut subtitle_media = Vec::new();
        for job in subtitles {
            match self.write_subtitle_playlist(job, output_root).await {
                Ok(media) => subtitle_media.push(media),
                Err(e) => tracing::warn!(
                    "[{}] subtitle playlist not written, skipping: {e}",
                    job.label
                ),
            }
        }

        let audio_group = (!audio_media.is_empty()).then(|| AUDIO_GROUP.to_string());
        let subtitle_group = (!subtitle_media.is_empty()).then(|| SUBTITLE_GROUP.to_string());

        let mut master = MasterPlaylist {
            version: HLS_VERSION,
            independent_segments: true,
            media: Vec::new(),
            variants: Vec::new(),
        };

        if video.is_empty() {
            // Audio-only package: each audio rendition is a variant.
            for job in audio {
                let JobSpec::Audio { bitrate_kbps, .. } = &job.spec else {
                    continue;
                };
                master.variants.push(Variant {
                    bandwidth: u64::from(*bitrate_kbps) * 1000,
                    resolution: None,
                    codecs: AUDIO_CODEC.to_string(),
                    audio_group: None,
                    subtitle_group: subtitle_group.clone(),
                    uri: playlist_uri(job),
                });
            }
        } else {
            master.media.extend(audio_media);
            let mut rungs: Vec<&RenditionJob> = video.to_vec();
            rungs.sort_by_key(|j| match &j.spec {
                JobSpec::Video { profile, .. } => (profile.height, profile.pixels()),
                _ => (0, 0),
            });
            for job in rungs {
                let JobSpec::Video { profile, .. } = &job.spec else {
                    continue;
                };
                let codecs = if audio_group.is_some() {
                    format!("{VIDEO_CODEC},{AUDIO_CODEC}")
                } else {
                    VIDEO_CODEC.to_string()
                };
                master.variants.push(Variant {
                    bandwidth: profile.bandwidth_bps(),
                    resolution: Some((profile.width, profile.height)),
                    codecs,
                    audio_group: audio_group.clone(),
                    subtitle_group: subtitle_group.clone(),
                    uri: playlist_uri(job),
                });
            }
        }
        master.media.extend(subtitle_media);

        let text = generate_master_playlist(&master);
        for uri in referenced_uris(&text) {
            if tokio::fs::metadata(output_root.join(&uri)).await.is_err() {
                return Err(Error::Internal(format!(
                    "master playlist references missing {uri}"
                )));
            }
        }
        let master_path = output_root.join(MASTER_PLAYLIST);
        tokio::fs::write(&master_path, text).await?;
        tracing::info!(
            "Wrote {} ({} variant(s), {} alternative rendition(s))",
            master_path.display(),
            master.variants.len(),
            master.media.len()
        );
        Ok(master)
    }

    fn audio_renditions(&self, audio: &[&RenditionJob]) -> Vec<MediaRendition> {
        let preferred = self.options.preferred_audio_language.as_deref().and_then(|lang| {
            audio.iter().position(|j| match &j.spec {
                JobSpec::Audio { track, .. } => track.language.eq_ignore_ascii_case(lang),
                _ => false,
            })
        });
        let default_index = preferred.unwrap_or(0);

        audio
            .iter()
            .enumerate()
            .filter_map(|(i, job)| {
                let JobSpec::Audio { track, .. } = &job.spec else {
                    return None;
                };
                Some(MediaRendition {
                    media_type: MediaType::Audio,
                    group_id: AUDIO_GROUP.to_string(),
                    name: job.label.trim_start_matches("audio_").to_string(),
                    language: language_attribute(&track.language),
                    default: i == default_index,
                    autoselect: true,
                    uri: playlist_uri(job),
                })
            })
            .collect()
    }

    async fn write_subtitle_playlist(
        &self,
        job: &RenditionJob,
        output_root: &Path,
    ) -> hf_core::Result<MediaRendition> {
        let JobSpec::Subtitle { track } = &job.spec else {
            return Err(Error::Internal(format!("{} is not a subtitle job", job.label)));
        };
        let duration = self.options.source_duration_secs.max(0.0);
        let playlist = MediaPlaylist {
            version: HLS_VERSION,
            target_duration: (duration.ceil() as u32).max(1),
            media_sequence: 0,
            playlist_type: Some(PlaylistType::Vod),
            independent_segments: false,
            segments: vec![Segment {
                duration,
                uri: format!("{}.vtt", job.label),
                title: None,
            }],
            ended: true,
            init_segment_uri: None,
        };
        let name = format!("subs_{}.m3u8", job.label);
        tokio::fs::write(output_root.join(&name), generate_media_playlist(&playlist)).await?;

        Ok(MediaRendition {
            media_type: MediaType::Subtitles,
            group_id: SUBTITLE_GROUP.to_string(),
            name: job.label.clone(),
            language: language_attribute(&track.language),
            default: false,
            autoselect: true,
            uri: name,
        })
    }
}

/// Relative URI of a video/audio job's media playlist.
fn playlist_uri(job: &RenditionJob) -> String {
    format!("{}/{}", job.label, hf_av::args::RENDITION_PLAYLIST)
}

/// `LANGUAGE` value; untagged tracks (`und_<n>`) get none.
fn language_attribute(tag: &str) -> Option<String> {
    if tag.is_empty() || tag.starts_with("und") {
        None
    } else {
        Some(tag.to_string())
    }
}
