//! Ladder planning: which renditions to encode for a given source.
//!
//! The adaptive path trims the catalog so nothing is upscaled and caps rung
//! bitrates at the source's declared bitrate. The explicit path takes a
//! caller's ladder and applies an [`UpscalePolicy`].

use std::collections::HashSet;

use hf_core::config::UpscalePolicy;
use hf_core::{BitrateProfile, Error, SourceMedia};

/// Sort rungs ascending by height, then pixel count.
fn sort_ascending(ladder: &mut [BitrateProfile]) {
    ladder.sort_by_key(|p| (p.height, p.pixels()));
}

/// Build the adaptive ladder for `source` from `catalog`.
///
/// Returns an empty ladder for audio-only sources or an empty catalog.
/// Otherwise the result is non-empty, ascending, and never taller than the
/// source unless the source is smaller than every rung, in which case only
/// the smallest rung is returned.
pub fn build_ladder(
    source: &SourceMedia,
    catalog: &[BitrateProfile],
    floor_kbps: u32,
) -> Vec<BitrateProfile> {
    let Some(video) = source.video.as_ref() else {
        return Vec::new();
    };
    if catalog.is_empty() {
        return Vec::new();
    }

    let mut sorted = catalog.to_vec();
    sort_ascending(&mut sorted);

    let effective = sorted
        .iter()
        .rposition(|p| p.height <= video.height)
        .unwrap_or(0);
    sorted.truncate(effective + 1);

    if let Some(source_kbps) = video.bitrate_kbps.filter(|k| *k > 0) {
        for rung in &mut sorted {
            scale_to_source(rung, source_kbps, floor_kbps);
        }
    }

    tracing::debug!(
        "Planned ladder for {}x{}: {}",
        video.width,
        video.height,
        sorted.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    sorted
}

/// Cap a rung at the source bitrate (but not below `floor_kbps`), scaling
/// its minimum by the same ratio.
fn scale_to_source(rung: &mut BitrateProfile, source_kbps: u32, floor_kbps: u32) {
    if source_kbps >= rung.max_video_kbps || rung.max_video_kbps == 0 {
        return;
    }
    let new_max = source_kbps.max(floor_kbps).min(rung.max_video_kbps);
    let new_min =
        (u64::from(rung.min_video_kbps) * u64::from(new_max) / u64::from(rung.max_video_kbps)) as u32;

    rung.max_video_kbps = new_max;
    rung.min_video_kbps = new_min.min(new_max);
}

/// Apply `policy` to a caller-supplied ladder.
///
/// # Errors
///
/// [`Error::Validation`] under [`UpscalePolicy::Reject`] when any rung is
/// taller than the source.
pub fn resolve_explicit(
    ladder: Vec<BitrateProfile>,
    source: &SourceMedia,
    policy: UpscalePolicy,
) -> hf_core::Result<Vec<BitrateProfile>> {
    let Some(video) = source.video.as_ref() else {
        return Ok(ladder);
    };

    let taller: Vec<&str> = ladder
        .iter()
        .filter(|p| p.height > video.height)
        .map(|p| p.name.as_str())
        .collect();
    if taller.is_empty() {
        return Ok(ladder);
    }

    match policy {
        UpscalePolicy::Honor => {
            tracing::warn!(
                "Explicit ladder upscales {}p source to: {}",
                video.height,
                taller.join(", ")
            );
            Ok(ladder)
        }
        UpscalePolicy::Reject => Err(Error::Validation(format!(
            "ladder rungs exceed source height {}: {}",
            video.height,
            taller.join(", ")
        ))),
        UpscalePolicy::Clamp => {
            let mut sorted = ladder;
            sort_ascending(&mut sorted);
            let smallest = sorted.first().cloned();
            let mut kept: Vec<BitrateProfile> =
                sorted.into_iter().filter(|p| p.height <= video.height).collect();
            if kept.is_empty() {
                kept.extend(smallest);
            }
            tracing::info!("Clamped explicit ladder to {} rung(s)", kept.len());
            Ok(kept)
        }
    }
}

/// Pick catalog rungs by name (e.g. `["720p", "1080p"]`).
///
/// # Errors
///
/// [`Error::Validation`] for an unknown name or an empty selection.
pub fn select_named(
    catalog: &[BitrateProfile],
    names: &[String],
) -> hf_core::Result<Vec<BitrateProfile>> {
    let mut selected = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let rung = catalog
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let known: Vec<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
                Error::Validation(format!(
                    "unknown resolution '{name}' (available: {})",
                    known.join(", ")
                ))
            })?;
        if !selected.iter().any(|p: &BitrateProfile| p.name == rung.name) {
            selected.push(rung.clone());
        }
    }
    if selected.is_empty() {
        return Err(Error::Validation("no resolutions selected".into()));
    }
    validate_ladder(selected)
}

/// Check ladder invariants and return it sorted ascending.
///
/// # Errors
///
/// [`Error::Validation`] for an empty ladder, a zero dimension,
/// `min_video_kbps > max_video_kbps`, or a duplicate name.
pub fn validate_ladder(mut ladder: Vec<BitrateProfile>) -> hf_core::Result<Vec<BitrateProfile>> {
    if ladder.is_empty() {
        return Err(Error::Validation("ladder is empty".into()));
    }

    let mut names = HashSet::new();
    for p in &ladder {
        if p.width == 0 || p.height == 0 {
            return Err(Error::Validation(format!(
                "rung '{}' has zero dimension {}x{}",
                p.name, p.width, p.height
            )));
        }
        if p.min_video_kbps > p.max_video_kbps {
            return Err(Error::Validation(format!(
                "rung '{}' has min bitrate {}k above max {}k",
                p.name, p.min_video_kbps, p.max_video_kbps
            )));
        }
        if !names.insert(p.name.as_str()) {
            return Err(Error::Validation(format!("duplicate rung name '{}'", p.name)));
        }
    }

    sort_ascending(&mut ladder);
    Ok(ladder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::{default_catalog, VideoStream};

    fn source(width: u32, height: u32, bitrate_kbps: Option<u32>) -> SourceMedia {
        SourceMedia {
            video: Some(VideoStream {
                width,
                height,
                duration_secs: 60.0,
                frame_rate: 24.0,
                bitrate_kbps,
                codec_name: Some("h264".into()),
            }),
            ..SourceMedia::default()
        }
    }

    fn six_rung_catalog() -> Vec<BitrateProfile> {
        vec![
            BitrateProfile::new("360p", 640, 360, 1200, 800),
            BitrateProfile::new("480p", 854, 480, 2000, 1400),
            BitrateProfile::new("720p", 1280, 720, 4000, 2800),
            BitrateProfile::new("1080p", 1920, 1080, 8000, 5600),
            BitrateProfile::new("1440p", 2560, 1440, 11000, 8000),
            BitrateProfile::new("2160p", 3840, 2160, 16000, 12000),
        ]
    }

    fn names(ladder: &[BitrateProfile]) -> Vec<&str> {
        ladder.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn uhd_source_keeps_every_rung_unscaled() {
        let catalog = six_rung_catalog();
        let ladder = build_ladder(&source(3840, 2160, Some(16000)), &catalog, 200);
        assert_eq!(ladder, catalog);
    }

    #[test]
    fn hd_source_stops_at_720p_and_caps_bitrate() {
        let ladder = build_ladder(&source(1280, 720, Some(1500)), &six_rung_catalog(), 200);
        assert_eq!(names(&ladder), vec!["360p", "480p", "720p"]);

        assert_eq!(ladder[0].max_video_kbps, 1200);
        assert_eq!(ladder[0].min_video_kbps, 800);

        let top = &ladder[2];
        assert_eq!(top.max_video_kbps, 1500);
        assert_eq!(top.min_video_kbps, 2800 * 1500 / 4000);
        assert!(top.min_video_kbps <= top.max_video_kbps);
    }

    #[test]
    fn tiny_source_gets_smallest_rung() {
        let ladder = build_ladder(&source(160, 90, None), &default_catalog(), 200);
        assert_eq!(names(&ladder), vec!["144p"]);
    }

    #[test]
    fn exact_match_includes_rung() {
        let ladder = build_ladder(&source(854, 480, None), &default_catalog(), 200);
        assert_eq!(ladder.last().unwrap().name, "480p");
    }

    #[test]
    fn zero_bitrate_skips_scaling() {
        let ladder = build_ladder(&source(1920, 1080, Some(0)), &default_catalog(), 200);
        assert_eq!(ladder, default_catalog()[..6].to_vec());
    }

    #[test]
    fn floor_limits_scaling() {
        let ladder = build_ladder(&source(1280, 720, Some(50)), &default_catalog(), 200);
        for rung in &ladder {
            assert_eq!(rung.max_video_kbps, 200, "{}", rung.name);
            assert!(rung.min_video_kbps <= rung.max_video_kbps);
        }
    }

    #[test]
    fn audio_only_source_has_no_ladder() {
        let audio_only = SourceMedia::default();
        assert!(build_ladder(&audio_only, &default_catalog(), 200).is_empty());
    }

    #[test]
    fn unsorted_catalog_is_sorted() {
        let mut catalog = six_rung_catalog();
        catalog.reverse();
        let ladder = build_ladder(&source(1920, 1080, None), &catalog, 200);
        assert_eq!(names(&ladder), vec!["360p", "480p", "720p", "1080p"]);
    }

    #[test]
    fn ladder_properties_hold_across_sources() {
        let catalog = default_catalog();
        for &(w, h) in &[(320, 180), (640, 480), (1280, 544), (1920, 800), (4096, 2160)] {
            for bitrate in [None, Some(300), Some(2200), Some(9000)] {
                let ladder = build_ladder(&source(w, h, bitrate), &catalog, 200);
                assert!(!ladder.is_empty());
                let mut seen = HashSet::new();
                for pair in ladder.windows(2) {
                    assert!(pair[0].height < pair[1].height);
                }
                for rung in &ladder {
                    assert!(seen.insert(rung.name.clone()));
                    assert!(rung.min_video_kbps <= rung.max_video_kbps);
                }
                let top = ladder.last().unwrap();
                assert!(top.height <= h || ladder.len() == 1);
            }
        }
    }

    #[test]
    fn explicit_ladder_honored_by_default() {
        let ladder = six_rung_catalog();
        let out = resolve_explicit(ladder.clone(), &source(1280, 720, None), UpscalePolicy::Honor)
            .unwrap();
        assert_eq!(out, ladder);
    }

    #[test]
    fn explicit_ladder_clamped() {
        let out = resolve_explicit(
            six_rung_catalog(),
            &source(1280, 720, None),
            UpscalePolicy::Clamp,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["360p", "480p", "720p"]);

        let out = resolve_explicit(
            six_rung_catalog(),
            &source(320, 180, None),
            UpscalePolicy::Clamp,
        )
        .unwrap();
        assert_eq!(names(&out), vec!["360p"]);
    }

    #[test]
    fn explicit_ladder_rejected() {
        let err = resolve_explicit(
            six_rung_catalog(),
            &source(1280, 720, None),
            UpscalePolicy::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("1080p"));
    }

    #[test]
    fn select_named_sorts_and_rejects_unknown() {
        let catalog = default_catalog();
        let ladder = select_named(&catalog, &["1080p".into(), "480P".into()]).unwrap();
        assert_eq!(names(&ladder), vec!["480p", "1080p"]);

        let err = select_named(&catalog, &["999p".into()]).unwrap_err();
        assert!(err.to_string().contains("999p"));
        assert!(select_named(&catalog, &[]).is_err());
    }

    #[test]
    fn validate_ladder_catches_bad_rungs() {
        assert!(validate_ladder(vec![]).is_err());
        assert!(validate_ladder(vec![BitrateProfile::new("x", 0, 720, 100, 50)]).is_err());
        assert!(validate_ladder(vec![BitrateProfile::new("x", 1280, 720, 100, 500)]).is_err());
        let dup = vec![
            BitrateProfile::new("hd", 1280, 720, 2500, 1800),
            BitrateProfile::new("hd", 1920, 1080, 5000, 3500),
        ];
        assert!(validate_ladder(dup).is_err());
    }
}
