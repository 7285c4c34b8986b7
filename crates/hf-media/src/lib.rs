//! hf-media: HLS playlist model, generation, and parsing.
//!
//! # Modules
//!
//! - [`hls`] - master and media playlists (M3U8)

pub mod hls;

// Re-export commonly used items at the crate root.
pub use hls::{
    generate_master_playlist, generate_media_playlist, parse_media_playlist, referenced_uris,
    MasterPlaylist, MediaPlaylist, MediaRendition, MediaType, PlaylistType, Segment, Variant,
};
