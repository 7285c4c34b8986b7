//! End-to-end conversion: discovery, analysis, planning, scheduling,
//! assembly.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hf_av::{CapabilityRegistry, EncodeOptions, SourceInspector, ToolRegistry};
use hf_core::config::{Config, ConversionConfig};
use hf_core::{BitrateProfile, Error, MediaKind, SourceMedia};

use crate::assembler::{Assembler, AssemblyOptions, SucceededJobs, MASTER_PLAYLIST};
use crate::executor::{FfmpegExecutor, JobContext, RenditionExecutor};
use crate::job::{plan_jobs, JobEncoders, PlanOptions};
use crate::ladder::{build_ladder, resolve_explicit, validate_ladder};
use crate::policy;
use crate::result::{ConversionResult, StepTimings};
use crate::scheduler::{effective_workers, threads_per_job, Scheduler};

/// Wires the engine's components together for one input at a time.
pub struct Converter {
    registry: Arc<CapabilityRegistry>,
    inspector: SourceInspector,
    executor: Arc<dyn RenditionExecutor>,
    cpus: usize,
}

impl Converter {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        inspector: SourceInspector,
        executor: Arc<dyn RenditionExecutor>,
    ) -> Self {
        Self {
            registry,
            inspector,
            executor,
            cpus: num_cpus::get(),
        }
    }

    /// Build a converter backed by the discovered ffmpeg and ffprobe.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] when either tool is missing.
    pub fn from_config(config: &Config) -> hf_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        let ffmpeg = tools.require("ffmpeg")?.path.clone();
        let ffprobe = tools.require("ffprobe")?.path.clone();

        let registry = CapabilityRegistry::new(ffmpeg.clone()).with_config(&config.conversion);
        Ok(Self::new(
            Arc::new(registry),
            SourceInspector::new(ffprobe),
            Arc::new(FfmpegExecutor::new(ffmpeg)),
        ))
    }

    /// Override the detected CPU count.
    pub fn with_cpus(mut self, cpus: usize) -> Self {
        self.cpus = cpus.max(1);
        self
    }

    /// Convert `input` into an HLS package under `output_root`.
    ///
    /// Pre-flight failures (no encoder, probe failure, unreadable media, bad
    /// ladder) return `Err` before any job runs. When every video rendition
    /// fails, or the master playlist cannot be assembled, the result is `Ok`
    /// with `success == false`; use [`ConversionResult::into_result`] to turn
    /// that into an error.
    pub async fn convert(
        &self,
        input: &Path,
        output_root: &Path,
        request: &ConversionConfig,
    ) -> hf_core::Result<ConversionResult> {
        if !input.is_file() {
            return Err(Error::Validation(format!(
                "input file not found: {}",
                input.display()
            )));
        }
        let mut timings = StepTimings::default();
        tracing::info!("Converting {} -> {}", input.display(), output_root.display());

        // Discovery and analysis are independent.
        let (capabilities, analysis) = tokio::join!(
            timed(self.registry.discover(false)),
            timed(self.inspector.analyze(input)),
        );
        let (capabilities, detection_time) = capabilities;
        let (analysis, analysis_time) = analysis;
        timings.detection = detection_time;
        timings.analysis = analysis_time;
        let source = analysis?;

        // Pre-flight.
        let planning_started = Instant::now();
        let force_software = request.force_software_encoding;
        let mut encoders = JobEncoders::default();
        if source.video.is_some() {
            encoders.video = Some(capabilities.select_best(MediaKind::Video, force_software)?);
        }
        if !source.audio_tracks.is_empty() {
            encoders.audio = Some(capabilities.select_best(MediaKind::Audio, force_software)?);
        }
        for encoder in [&encoders.video, &encoders.audio].into_iter().flatten() {
            tracing::info!("Using {} encoder: {encoder}", encoder.media_kind);
        }

        let ladder = plan_ladder(&source, request)?;
        let jobs = plan_jobs(&ladder, &source, &encoders, &PlanOptions::from_config(request))?;
        if jobs.is_empty() {
            return Err(Error::Validation("nothing to convert".into()));
        }
        tokio::fs::create_dir_all(output_root).await?;

        let workers = effective_workers(request.max_workers, self.cpus);
        let ctx = Arc::new(JobContext {
            input: input.to_path_buf(),
            output_root: output_root.to_path_buf(),
            options: EncodeOptions::from_config(request, threads_per_job(self.cpus, workers)),
            timeout: request.job_timeout_secs.map(Duration::from_secs),
            source_duration_secs: source.duration_secs().filter(|d| *d > 0.0),
        });
        timings.planning = planning_started.elapsed();

        // Processing.
        let processing_started = Instant::now();
        let mut jobs = Scheduler::new(Arc::clone(&self.executor), workers)
            .run(jobs, ctx)
            .await;
        timings.processing = processing_started.elapsed();

        // Assembly.
        let playlist_started = Instant::now();
        let assembler = Assembler::new(AssemblyOptions::from_config(
            request,
            source.duration_secs().unwrap_or_default(),
        ));
        let rendition_playlists = assembler.finalize_renditions(&mut jobs, output_root).await;
        let decision = policy::evaluate(&jobs);

        let mut master_playlist = None;
        let mut assembly_error = None;
        let mut success = decision.success;
        if success {
            let succeeded = SucceededJobs::from_jobs(&jobs);
            match assembler
                .assemble(
                    &succeeded.video,
                    &succeeded.audio,
                    &succeeded.subtitles,
                    output_root,
                )
                .await
            {
                Ok(_) => master_playlist = Some(output_root.join(MASTER_PLAYLIST)),
                Err(e) => {
                    tracing::error!("Playlist assembly failed; master playlist not written: {e}");
                    assembly_error = Some(e.to_string());
                    success = false;
                }
            }
        } else {
            tracing::error!(
                "No playable rendition produced ({} failure(s)); master playlist not written",
                decision.failures.len()
            );
            for failure in &decision.failures {
                tracing::error!("  {failure}");
            }
        }
        timings.playlist = playlist_started.elapsed();
        timings.log();

        Ok(ConversionResult {
            jobs,
            master_playlist,
            rendition_playlists,
            dropped_rungs: decision.dropped_rungs,
            assembly_error,
            success,
            output_root: output_root.to_path_buf(),
            source,
            timings,
        })
    }
}

/// Pick the ladder: explicit when configured, adaptive otherwise.
pub fn plan_ladder(
    source: &SourceMedia,
    request: &ConversionConfig,
) -> hf_core::Result<Vec<BitrateProfile>> {
    if source.video.is_none() {
        return Ok(Vec::new());
    }
    match &request.ladder {
        Some(explicit) => {
            let ladder = validate_ladder(explicit.clone())?;
            resolve_explicit(ladder, source, request.upscale_policy)
        }
        None => {
            let ladder = build_ladder(source, &request.catalog(), request.bitrate_floor_kbps);
            validate_ladder(ladder)
        }
    }
}

async fn timed<T>(fut: impl std::future::Future<Output = T>) -> (T, Duration) {
    let started = Instant::now();
    let out = fut.await;
    (out, started.elapsed())
}
