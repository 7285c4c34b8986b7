//! HLS playlist generation functions.

use super::types::{MasterPlaylist, MediaPlaylist, MediaRendition};
use std::fmt::{self, Write};

/// Generate an HLS master playlist (M3U8) from a [`MasterPlaylist`].
///
/// Output includes the `#EXTM3U` header, one `#EXT-X-MEDIA` line per
/// alternative rendition and `#EXT-X-STREAM-INF` for each variant.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_master(&mut out, playlist);
    out
}

/// Generate an HLS media playlist (M3U8) from a [`MediaPlaylist`].
///
/// Output includes:
/// - `#EXTM3U` header and `#EXT-X-VERSION`
/// - `#EXT-X-TARGETDURATION` and `#EXT-X-MEDIA-SEQUENCE`
/// - Optional `#EXT-X-PLAYLIST-TYPE` and `#EXT-X-INDEPENDENT-SEGMENTS`
/// - Optional `#EXT-X-MAP` for an initialization segment
/// - `#EXTINF` for each segment
/// - Optional `#EXT-X-ENDLIST` for finished playlists
pub fn generate_media_playlist(playlist: &MediaPlaylist) -> String {
    let mut out = String::new();
    let _ = write_media(&mut out, playlist);
    out
}

fn write_master(out: &mut String, playlist: &MasterPlaylist) -> fmt::Result {
    writeln!(out, "#EXTM3U")?;
    writeln!(out, "#EXT-X-VERSION:{}", playlist.version)?;
    if playlist.independent_segments {
        writeln!(out, "#EXT-X-INDEPENDENT-SEGMENTS")?;
    }

    if !playlist.media.is_empty() {
        writeln!(out)?;
        for media in &playlist.media {
            write_media_tag(out, media)?;
        }
    }

    for variant in &playlist.variants {
        writeln!(out)?;
        write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth)?;

        if let Some((w, h)) = variant.resolution {
            write!(out, ",RESOLUTION={w}x{h}")?;
        }
        if !variant.codecs.is_empty() {
            write!(out, ",CODECS=\"{}\"", variant.codecs)?;
        }
        if let Some(ref group) = variant.audio_group {
            write!(out, ",AUDIO=\"{group}\"")?;
        }
        if let Some(ref group) = variant.subtitle_group {
            write!(out, ",SUBTITLES=\"{group}\"")?;
        }

        writeln!(out)?;
        writeln!(out, "{}", variant.uri)?;
    }

    Ok(())
}

fn write_media_tag(out: &mut String, media: &MediaRendition) -> fmt::Result {
    write!(
        out,
        "#EXT-X-MEDIA:TYPE={},GROUP-ID=\"{}\",NAME=\"{}\"",
        media.media_type, media.group_id, media.name
    )?;
    if let Some(ref lang) = media.language {
        write!(out, ",LANGUAGE=\"{lang}\"")?;
    }
    write!(
        out,
        ",DEFAULT={},AUTOSELECT={}",
        yes_no(media.default),
        yes_no(media.autoselect)
    )?;
    writeln!(out, ",URI=\"{}\"", media.uri)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "YES"
    } else {
        "NO"
    }
}

fn write_media(out: &mut String, playlist: &MediaPlaylist) -> fmt::Result {
    writeln!(out, "#EXTM3U")?;
    writeln!(out, "#EXT-X-VERSION:{}", playlist.version)?;
    writeln!(out, "#EXT-X-TARGETDURATION:{}", playlist.target_duration)?;
    writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", playlist.media_sequence)?;

    if let Some(kind) = playlist.playlist_type {
        writeln!(out, "#EXT-X-PLAYLIST-TYPE:{kind}")?;
    }
    if playlist.independent_segments {
        writeln!(out, "#EXT-X-INDEPENDENT-SEGMENTS")?;
    }
    if let Some(ref init_uri) = playlist.init_segment_uri {
        writeln!(out, "#EXT-X-MAP:URI=\"{init_uri}\"")?;
    }

    for segment in &playlist.segments {
        match segment.title {
            Some(ref title) => writeln!(out, "#EXTINF:{:.6},{}", segment.duration, title)?,
            None => writeln!(out, "#EXTINF:{:.6},", segment.duration)?,
        }
        writeln!(out, "{}", segment.uri)?;
    }

    if playlist.ended {
        writeln!(out, "#EXT-X-ENDLIST")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::types::{MediaType, PlaylistType, Segment, Variant};

    fn variant(bandwidth: u64, res: Option<(u32, u32)>, uri: &str) -> Variant {
        Variant {
            bandwidth,
            resolution: res,
            codecs: "avc1.640029,mp4a.40.2".to_string(),
            audio_group: None,
            subtitle_group: None,
            uri: uri.to_string(),
        }
    }

    #[test]
    fn master_with_variants() {
        let playlist = MasterPlaylist {
            version: 3,
            independent_segments: true,
            media: vec![],
            variants: vec![
                variant(2_660_000, Some((1280, 720)), "720p/playlist.m3u8"),
                variant(5_160_000, Some((1920, 1080)), "1080p/playlist.m3u8"),
            ],
        };

        let m3u8 = generate_master_playlist(&playlist);

        assert!(m3u8.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-INDEPENDENT-SEGMENTS\n"));
        assert!(m3u8.contains("BANDWIDTH=2660000,RESOLUTION=1280x720"));
        assert!(m3u8.contains("CODECS=\"avc1.640029,mp4a.40.2\""));
        assert!(!m3u8.contains("AUDIO="));
        assert!(!m3u8.contains("#EXT-X-MEDIA:"));
        let p720 = m3u8.find("720p/playlist.m3u8").unwrap();
        let p1080 = m3u8.find("1080p/playlist.m3u8").unwrap();
        assert!(p720 < p1080);
    }

    #[test]
    fn master_with_audio_and_subtitle_groups() {
        let mut v = variant(2_660_000, Some((1280, 720)), "720p/playlist.m3u8");
        v.audio_group = Some("audio".into());
        v.subtitle_group = Some("subs".into());
        let playlist = MasterPlaylist {
            version: 3,
            independent_segments: false,
            media: vec![
                MediaRendition {
                    media_type: MediaType::Audio,
                    group_id: "audio".into(),
                    name: "eng".into(),
                    language: Some("eng".into()),
                    default: true,
                    autoselect: true,
                    uri: "audio_eng/playlist.m3u8".into(),
                },
                MediaRendition {
                    media_type: MediaType::Subtitles,
                    group_id: "subs".into(),
                    name: "fre".into(),
                    language: Some("fre".into()),
                    default: false,
                    autoselect: true,
                    uri: "subs_fre.m3u8".into(),
                },
            ],
            variants: vec![v],
        };

        let m3u8 = generate_master_playlist(&playlist);

        assert!(m3u8.contains(
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"audio\",NAME=\"eng\",LANGUAGE=\"eng\",DEFAULT=YES,AUTOSELECT=YES,URI=\"audio_eng/playlist.m3u8\"\n"
        ));
        assert!(m3u8.contains("TYPE=SUBTITLES,GROUP-ID=\"subs\""));
        assert!(m3u8.contains("DEFAULT=NO"));
        assert!(m3u8.contains(",AUDIO=\"audio\",SUBTITLES=\"subs\"\n720p/playlist.m3u8"));
        assert_eq!(
            playlist.uris(),
            vec!["audio_eng/playlist.m3u8", "subs_fre.m3u8", "720p/playlist.m3u8"]
        );
    }

    #[test]
    fn master_audio_only_variant_has_no_resolution() {
        let mut v = variant(160_000, None, "audio_eng/playlist.m3u8");
        v.codecs = "mp4a.40.2".into();
        let playlist = MasterPlaylist {
            version: 3,
            variants: vec![v],
            ..MasterPlaylist::default()
        };

        let m3u8 = generate_master_playlist(&playlist);
        assert!(m3u8.contains("BANDWIDTH=160000,CODECS=\"mp4a.40.2\""));
        assert!(!m3u8.contains("RESOLUTION"));
    }

    #[test]
    fn media_playlist_exact_format() {
        let playlist = MediaPlaylist {
            version: 3,
            target_duration: 2,
            media_sequence: 0,
            playlist_type: Some(PlaylistType::Vod),
            independent_segments: true,
            segments: vec![
                Segment {
                    duration: 2.002,
                    uri: "chunk_000.ts".to_string(),
                    title: None,
                },
                Segment {
                    duration: 0.5,
                    uri: "chunk_001.ts".to_string(),
                    title: None,
                },
            ],
            ended: true,
            init_segment_uri: None,
        };

        let expected = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:2
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-INDEPENDENT-SEGMENTS
#EXTINF:2.002000,
chunk_000.ts
#EXTINF:0.500000,
chunk_001.ts
#EXT-X-ENDLIST
";
        assert_eq!(generate_media_playlist(&playlist), expected);
    }

    #[test]
    fn open_playlist_has_no_endlist() {
        let playlist = MediaPlaylist {
            target_duration: 4,
            media_sequence: 100,
            segments: vec![Segment {
                duration: 4.0,
                uri: "seg100.ts".to_string(),
                title: Some("Scene 1".to_string()),
            }],
            ended: false,
            init_segment_uri: Some("init.mp4".to_string()),
            ..MediaPlaylist::default()
        };

        let m3u8 = generate_media_playlist(&playlist);

        assert!(m3u8.contains("#EXT-X-MEDIA-SEQUENCE:100"));
        assert!(m3u8.contains("#EXT-X-MAP:URI=\"init.mp4\""));
        assert!(m3u8.contains("#EXTINF:4.000000,Scene 1"));
        assert!(!m3u8.contains("#EXT-X-PLAYLIST-TYPE"));
        assert!(!m3u8.contains("#EXT-X-ENDLIST"));
    }
}
