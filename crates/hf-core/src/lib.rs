//! hf-core: shared error type, configuration, and the media data model.
//!
//! This crate is the foundational dependency for all other hf-* crates,
//! providing a unified error type, the source/encoder model, bitrate
//! profiles, and application configuration.

pub mod config;
pub mod error;
pub mod media;
pub mod profile;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, JobFailure, Result};
pub use media::*;
pub use profile::{default_catalog, BitrateProfile};
