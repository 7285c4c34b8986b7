//! Failure policy: decides whether a run succeeded from its job outcomes.
//!
//! Video failures escalate; audio and subtitle failures never do.

use hf_core::JobFailure;

use crate::job::{JobKind, RenditionJob};

/// Verdict over a finished set of jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Whether a playable package can be assembled.
    pub success: bool,
    /// Labels of failed video rungs left out of the package.
    pub dropped_rungs: Vec<String>,
    /// Every failed job, in slot order.
    pub failures: Vec<JobFailure>,
}

/// Outcome of the video jobs alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoVerdict {
    /// No video jobs were planned.
    NoVideo,
    AllSucceeded,
    Partial { dropped: Vec<String> },
    AllFailed,
}

/// Apply the video rule.
pub fn video_verdict(jobs: &[RenditionJob]) -> VideoVerdict {
    let video: Vec<&RenditionJob> = jobs.iter().filter(|j| j.kind() == JobKind::Video).collect();
    if video.is_empty() {
        return VideoVerdict::NoVideo;
    }
    let dropped: Vec<String> = video
        .iter()
        .filter(|j| !j.is_succeeded())
        .map(|j| j.label.clone())
        .collect();
    if dropped.is_empty() {
        VideoVerdict::AllSucceeded
    } else if dropped.len() == video.len() {
        VideoVerdict::AllFailed
    } else {
        VideoVerdict::Partial { dropped }
    }
}

/// Number of successful jobs of a best-effort kind.
pub fn enrichment_successes(jobs: &[RenditionJob], kind: JobKind) -> usize {
    jobs.iter().filter(|j| j.kind() == kind && j.is_succeeded()).count()
}

/// Combine the per-kind rules into a run verdict.
///
/// A source without video succeeds when at least one audio job does.
pub fn evaluate(jobs: &[RenditionJob]) -> PolicyDecision {
    let failures: Vec<JobFailure> = jobs
        .iter()
        .filter(|j| !j.is_succeeded())
        .map(|j| JobFailure {
            label: j.label.clone(),
            reason: j.failure_reason().unwrap_or("not run").to_string(),
        })
        .collect();

    for kind in [JobKind::Audio, JobKind::Subtitle] {
        let failed = jobs.iter().filter(|j| j.kind() == kind && !j.is_succeeded()).count();
        if failed > 0 {
            tracing::warn!("{failed} {kind} job(s) failed; continuing without them");
        }
    }

    let (success, dropped_rungs) = match video_verdict(jobs) {
        VideoVerdict::AllSucceeded => (true, Vec::new()),
        VideoVerdict::Partial { dropped } => {
            tracing::warn!("Dropping failed rungs: {}", dropped.join(", "));
            (true, dropped)
        }
        VideoVerdict::AllFailed => (false, Vec::new()),
        VideoVerdict::NoVideo => (enrichment_successes(jobs, JobKind::Audio) > 0, Vec::new()),
    };

    PolicyDecision {
        success,
        dropped_rungs,
        failures,
    }
}
