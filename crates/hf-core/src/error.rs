//! Unified error type for the hlsforge workspace.
//!
//! All crates funnel their failures into [`Error`]. The variants mirror the
//! conversion lifecycle: pre-flight failures abort a run before any
//! subprocess is launched, per-job failures stay inside the job outcome, and
//! [`Error::AllVideoRenditionsFailed`] is raised only after scheduling.

use std::fmt;

use crate::media::MediaKind;

/// One failed rendition job, carried by [`Error::AllVideoRenditionsFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// Job label (rung name, `audio_<lang>`, subtitle language).
    pub label: String,
    /// Failure reason, including trailing encoder stderr when available.
    pub reason: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.reason)
    }
}

/// Unified error type covering all failure modes in hlsforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No encoder (hardware or software) is usable for a media kind.
    #[error("No {kind} encoder available")]
    NoEncoderAvailable {
        /// The media kind that has no usable encoder.
        kind: MediaKind,
    },

    /// The probing tool could not run or produced no usable output.
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    /// The probing tool ran but the input has no decodable streams.
    #[error("Unreadable media: {0}")]
    UnreadableMedia(String),

    /// A single rendition job failed.
    #[error("Rendition job [{label}] failed: {reason}")]
    RenditionJobFailed {
        /// Label of the failed job.
        label: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Every video rendition failed, so no master playlist can be produced.
    #[error("All video renditions failed ({} failures)", failures.len())]
    AllVideoRenditionsFailed {
        /// Per-job failure reasons for every failed job in the run.
        failures: Vec<JobFailure>,
    },

    /// Request data, ladder or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error aborts a run before any job is dispatched.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::NoEncoderAvailable { .. } | Error::ProbeFailed(_) | Error::UnreadableMedia(_)
        )
    }

    /// Process exit code used by the CLI for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::NoEncoderAvailable { .. } => 3,
            Error::ProbeFailed(_) | Error::UnreadableMedia(_) => 4,
            Error::AllVideoRenditionsFailed { .. } | Error::RenditionJobFailed { .. } => 5,
            Error::Io { .. } | Error::Tool { .. } | Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::RenditionJobFailed`].
    pub fn job_failed(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RenditionJobFailed {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_encoder_display() {
        let err = Error::NoEncoderAvailable {
            kind: MediaKind::Video,
        };
        assert_eq!(err.to_string(), "No video encoder available");
        assert!(err.is_preflight());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn probe_errors_are_preflight() {
        assert!(Error::ProbeFailed("ffprobe missing".into()).is_preflight());
        assert!(Error::UnreadableMedia("no streams".into()).is_preflight());
        assert_eq!(Error::ProbeFailed("x".into()).exit_code(), 4);
    }

    #[test]
    fn job_failed_display() {
        let err = Error::job_failed("720p", "exit status 1");
        assert_eq!(err.to_string(), "Rendition job [720p] failed: exit status 1");
        assert!(!err.is_preflight());
    }

    #[test]
    fn all_video_failed_counts_failures() {
        let err = Error::AllVideoRenditionsFailed {
            failures: vec![
                JobFailure {
                    label: "360p".into(),
                    reason: "boom".into(),
                },
                JobFailure {
                    label: "720p".into(),
                    reason: "boom".into(),
                },
            ],
        };
        assert_eq!(err.to_string(), "All video renditions failed (2 failures)");
        assert!(!err.is_preflight());
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn job_failure_display() {
        let f = JobFailure {
            label: "audio_eng".into(),
            reason: "timed out".into(),
        };
        assert_eq!(f.to_string(), "audio_eng: timed out");
    }
}
