//! HLS playlist generation and parsing.
//!
//! Master playlists carry `#EXT-X-MEDIA` audio/subtitle groups and
//! `#EXT-X-STREAM-INF` variants; media playlists carry the segment list.
//! The parser reads back what the encoder wrote so the engine can re-emit
//! it with verified segments.

mod generator;
mod parser;
mod types;

pub use generator::{generate_master_playlist, generate_media_playlist};
pub use parser::{parse_media_playlist, referenced_uris};
pub use types::{
    MasterPlaylist, MediaPlaylist, MediaRendition, MediaType, PlaylistType, Segment, Variant,
};
