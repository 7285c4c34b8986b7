//! Minimal M3U8 reader for playlists written by the encoder.
//!
//! Only the tags needed to re-emit a VOD media playlist are interpreted;
//! anything else is skipped.

use super::types::{MediaPlaylist, PlaylistType, Segment};

fn invalid(msg: impl Into<String>) -> hf_core::Error {
    hf_core::Error::Validation(format!("invalid playlist: {}", msg.into()))
}

/// Parse a media playlist.
///
/// # Errors
///
/// Returns [`hf_core::Error::Validation`] when the `#EXTM3U` header is
/// missing, a numeric tag value is malformed, or an `#EXTINF` is not
/// followed by a segment URI.
pub fn parse_media_playlist(text: &str) -> hf_core::Result<MediaPlaylist> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err(invalid("missing #EXTM3U header"));
    }

    let mut playlist = MediaPlaylist::default();
    let mut pending: Option<(f64, Option<String>)> = None;

    for line in lines {
        if let Some(value) = line.strip_prefix("#EXTINF:") {
            let (duration, title) = value.split_once(',').unwrap_or((value, ""));
            let duration = duration
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(format!("bad #EXTINF duration '{duration}'")))?;
            let title = Some(title.trim()).filter(|t| !t.is_empty()).map(str::to_string);
            pending = Some((duration, title));
        } else if let Some(value) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.version = parse_number(value, "#EXT-X-VERSION")?;
        } else if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = parse_number(value, "#EXT-X-TARGETDURATION")?;
        } else if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            playlist.media_sequence = parse_number(value, "#EXT-X-MEDIA-SEQUENCE")?;
        } else if let Some(value) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
            playlist.playlist_type = PlaylistType::parse(value);
        } else if let Some(value) = line.strip_prefix("#EXT-X-MAP:") {
            playlist.init_segment_uri = quoted_attribute(value, "URI");
        } else if line == "#EXT-X-INDEPENDENT-SEGMENTS" {
            playlist.independent_segments = true;
        } else if line == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if line.starts_with('#') {
            continue;
        } else {
            let (duration, title) = pending
                .take()
                .ok_or_else(|| invalid(format!("segment '{line}' has no #EXTINF")))?;
            playlist.segments.push(Segment {
                duration,
                uri: line.to_string(),
                title,
            });
        }
    }

    if pending.is_some() {
        return Err(invalid("trailing #EXTINF without a segment URI"));
    }
    Ok(playlist)
}

/// Every URI a playlist references: plain URI lines and `URI="..."`
/// attributes, in order of appearance.
pub fn referenced_uris(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            if line.starts_with('#') {
                quoted_attribute(line, "URI")
            } else {
                Some(line.to_string())
            }
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(value: &str, tag: &str) -> hf_core::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("bad {tag} value '{}'", value.trim())))
}

/// Extract `NAME="value"` from an attribute list.
fn quoted_attribute(attrs: &str, name: &str) -> Option<String> {
    let key = format!("{name}=\"");
    let mut search = attrs;
    loop {
        let start = search.find(&key)?;
        // Require an attribute boundary so `URI` does not match `XURI`.
        let boundary = start == 0 || matches!(search.as_bytes()[start - 1], b',' | b':');
        let rest = &search[start + key.len()..];
        if boundary {
            let end = rest.find('"')?;
            return Some(rest[..end].to_string());
        }
        search = rest;
    }
}
