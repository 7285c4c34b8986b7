//! The outcome of one conversion run.

use std::path::PathBuf;
use std::time::Duration;

use hf_core::{Error, JobFailure, SourceMedia};

use crate::job::{JobKind, RenditionJob};

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTimings {
    pub detection: Duration,
    pub analysis: Duration,
    pub planning: Duration,
    pub processing: Duration,
    pub playlist: Duration,
}

impl StepTimings {
    pub fn total(&self) -> Duration {
        self.detection.max(self.analysis) + self.planning + self.processing + self.playlist
    }

    /// Emit one `info!` line per phase.
    pub fn log(&self) {
        for (name, d) in [
            ("encoder detection", self.detection),
            ("media analysis", self.analysis),
            ("planning", self.planning),
            ("processing", self.processing),
            ("playlist generation", self.playlist),
        ] {
            tracing::info!("{name}: {:.2}s", d.as_secs_f64());
        }
    }
}

/// Everything a caller needs to know about a finished run.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Every job with its final outcome, in slot order.
    pub jobs: Vec<RenditionJob>,
    /// `master.m3u8`, present only when the run succeeded.
    pub master_playlist: Option<PathBuf>,
    /// Rewritten media playlists of successful renditions.
    pub rendition_playlists: Vec<PathBuf>,
    /// Video rungs that failed and were left out.
    pub dropped_rungs: Vec<String>,
    /// Why `master.m3u8` could not be written although jobs succeeded.
    pub assembly_error: Option<String>,
    pub success: bool,
    pub output_root: PathBuf,
    pub source: SourceMedia,
    pub timings: StepTimings,
}

impl ConversionResult {
    /// Failed jobs with their reasons.
    pub fn failures(&self) -> Vec<JobFailure> {
        self.jobs
            .iter()
            .filter_map(|j| {
                j.failure_reason().map(|reason| JobFailure {
                    label: j.label.clone(),
                    reason: reason.to_string(),
                })
            })
            .collect()
    }

    /// Labels of successful jobs of one kind.
    pub fn succeeded(&self, kind: JobKind) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|j| j.kind() == kind && j.is_succeeded())
            .map(|j| j.label.as_str())
            .collect()
    }

    /// Turn an unsuccessful run into an error: [`Error::Internal`] when
    /// assembly failed, [`Error::AllVideoRenditionsFailed`] otherwise.
    pub fn into_result(self) -> hf_core::Result<Self> {
        if self.success {
            return Ok(self);
        }
        match &self.assembly_error {
            Some(reason) => Err(Error::Internal(format!("playlist assembly failed: {reason}"))),
            None => Err(Error::AllVideoRenditionsFailed {
                failures: self.failures(),
            }),
        }
    }
}
