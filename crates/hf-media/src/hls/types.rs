//! HLS playlist types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value of `#EXT-X-PLAYLIST-TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    Vod,
    Event,
}

impl PlaylistType {
    /// Parse the tag value, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vod" => Some(Self::Vod),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vod => write!(f, "VOD"),
            Self::Event => write!(f, "EVENT"),
        }
    }
}

/// `TYPE` of an `#EXT-X-MEDIA` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Subtitles,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "AUDIO"),
            Self::Subtitles => write!(f, "SUBTITLES"),
        }
    }
}

/// An alternative rendition (`#EXT-X-MEDIA`) in a master playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRendition {
    pub media_type: MediaType,
    /// Group the variants refer to (e.g. "audio").
    pub group_id: String,
    /// Human-readable name; usually the language label.
    pub name: String,
    /// RFC 5646 / ISO 639 language tag.
    pub language: Option<String>,
    pub default: bool,
    pub autoselect: bool,
    /// URI of the rendition's media playlist.
    pub uri: String,
}

/// A stream variant in a master playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Peak bandwidth in bits per second.
    pub bandwidth: u64,
    /// Optional resolution as (width, height).
    pub resolution: Option<(u32, u32)>,
    /// Codec string (e.g. "avc1.640029,mp4a.40.2").
    pub codecs: String,
    /// Audio group ID this variant plays with.
    pub audio_group: Option<String>,
    /// Subtitle group ID this variant offers.
    pub subtitle_group: Option<String>,
    /// URI to the media playlist for this variant.
    pub uri: String,
}

/// A single segment in a media playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment duration in seconds.
    pub duration: f64,
    /// URI for this segment, relative to the playlist.
    pub uri: String,
    /// Optional human-readable title.
    pub title: Option<String>,
}

/// An HLS master playlist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MasterPlaylist {
    /// `#EXT-X-VERSION`.
    pub version: u8,
    /// Emit `#EXT-X-INDEPENDENT-SEGMENTS`.
    pub independent_segments: bool,
    /// Alternative renditions, emitted before the variants.
    pub media: Vec<MediaRendition>,
    /// Stream variants in output order.
    pub variants: Vec<Variant>,
}

impl MasterPlaylist {
    /// Every URI the playlist references, renditions first.
    pub fn uris(&self) -> Vec<&str> {
        self.media
            .iter()
            .map(|m| m.uri.as_str())
            .chain(self.variants.iter().map(|v| v.uri.as_str()))
            .collect()
    }
}

/// An HLS media playlist describing a sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPlaylist {
    /// `#EXT-X-VERSION`.
    pub version: u8,
    /// Maximum segment duration in integer seconds (rounded up).
    pub target_duration: u32,
    /// Sequence number of the first segment.
    pub media_sequence: u64,
    /// `#EXT-X-PLAYLIST-TYPE`, if any.
    pub playlist_type: Option<PlaylistType>,
    /// Emit `#EXT-X-INDEPENDENT-SEGMENTS`.
    pub independent_segments: bool,
    /// Ordered list of segments.
    pub segments: Vec<Segment>,
    /// Whether the playlist is complete. If true, `#EXT-X-ENDLIST` is emitted.
    pub ended: bool,
    /// Optional URI for the initialization segment (`#EXT-X-MAP`).
    pub init_segment_uri: Option<String>,
}

impl Default for MediaPlaylist {
    fn default() -> Self {
        Self {
            version: 3,
            target_duration: 0,
            media_sequence: 0,
            playlist_type: None,
            independent_segments: false,
            segments: Vec::new(),
            ended: false,
            init_segment_uri: None,
        }
    }
}

impl MediaPlaylist {
    /// Sum of all segment durations.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Longest segment rounded to the nearest second, the value
    /// `#EXT-X-TARGETDURATION` must not be below.
    pub fn longest_segment_secs(&self) -> u32 {
        self.segments
            .iter()
            .map(|s| s.duration.round() as u32)
            .max()
            .unwrap_or(0)
    }
}
