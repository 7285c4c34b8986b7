//! # hf-av
//!
//! External tool plumbing for hlsforge.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- locate ffmpeg and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and streamed stderr.
//! - **Capability discovery** ([`CapabilityRegistry`]) -- which H.264 and
//!   AAC encoders this host can use, ranked best-first.
//! - **Source analysis** ([`SourceInspector`]) -- ffprobe JSON mapped into
//!   [`hf_core::SourceMedia`].
//! - **Command builders** ([`args`]) -- typed ffmpeg argument vectors.

pub mod args;
pub mod command;
pub mod encoders;
pub mod probe;
pub mod tools;

pub use args::EncodeOptions;
pub use command::{ToolCommand, ToolOutput};
pub use encoders::{CapabilityRegistry, CapabilitySet};
pub use probe::SourceInspector;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
