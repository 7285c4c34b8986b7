//! # hf-pipeline
//!
//! The conversion engine: turns one analysed source into an HLS package.
//!
//! A run goes through these stages:
//!
//! 1. [`ladder`] picks the video rungs for the source.
//! 2. [`job`] expands the ladder and the source's tracks into
//!    [`RenditionJob`]s with stable, collision-free labels.
//! 3. [`scheduler::Scheduler`] runs the jobs through a
//!    [`RenditionExecutor`] with bounded concurrency.
//! 4. [`policy`] decides whether the outcomes form a playable package.
//! 5. [`assembler::Assembler`] rewrites rendition playlists and writes
//!    `master.m3u8` from the successful jobs only.
//!
//! [`Converter`] drives all of it.

pub mod assembler;
pub mod converter;
pub mod executor;
pub mod job;
pub mod ladder;
pub mod policy;
pub mod result;
pub mod scheduler;

pub use assembler::{Assembler, AssemblyOptions, MASTER_PLAYLIST};
pub use converter::Converter;
pub use executor::{FfmpegExecutor, JobContext, RenditionExecutor};
pub use job::{JobArtifact, JobKind, JobOutcome, JobSpec, RenditionJob};
pub use result::{ConversionResult, StepTimings};
pub use scheduler::Scheduler;
