//! Encoder capability discovery and ranking.
//!
//! [`CapabilityRegistry`] asks ffmpeg which H.264 and AAC encoders it was
//! built with, confirms hardware candidates with a tiny synthetic encode,
//! and caches the ranked result. Selection prefers the platform's native
//! accelerator, then any other hardware encoder, then software.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hf_core::{EncoderCapability, Error, MediaKind};
use parking_lot::RwLock;

use crate::args::{self, DEFAULT_VAAPI_DEVICE};
use crate::command::ToolCommand;

/// Timeout for `ffmpeg -encoders`.
const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for each hardware test encode.
const TEST_ENCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Codec family produced for each media kind.
pub fn codec_for(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "h264",
        MediaKind::Audio => "aac",
    }
}

struct KnownEncoder {
    name: &'static str,
    kind: MediaKind,
    hardware: bool,
    display_name: &'static str,
    /// `std::env::consts::OS` value where this is the native accelerator.
    native_os: Option<&'static str>,
}

/// Known implementations in tie-break priority order.
const KNOWN_ENCODERS: &[KnownEncoder] = &[
    KnownEncoder { name: "h264_videotoolbox", kind: MediaKind::Video, hardware: true, display_name: "Apple VideoToolbox", native_os: Some("macos") },
    KnownEncoder { name: "h264_nvenc", kind: MediaKind::Video, hardware: true, display_name: "NVIDIA NVENC", native_os: None },
    KnownEncoder { name: "h264_qsv", kind: MediaKind::Video, hardware: true, display_name: "Intel Quick Sync", native_os: None },
    KnownEncoder { name: "h264_vaapi", kind: MediaKind::Video, hardware: true, display_name: "VA-API", native_os: Some("linux") },
    KnownEncoder { name: "h264_amf", kind: MediaKind::Video, hardware: true, display_name: "AMD AMF", native_os: None },
    KnownEncoder { name: "h264_mf", kind: MediaKind::Video, hardware: true, display_name: "Media Foundation", native_os: Some("windows") },
    KnownEncoder { name: "libx264", kind: MediaKind::Video, hardware: false, display_name: "x264", native_os: None },
    KnownEncoder { name: "libopenh264", kind: MediaKind::Video, hardware: false, display_name: "OpenH264", native_os: None },
    KnownEncoder { name: "aac_at", kind: MediaKind::Audio, hardware: true, display_name: "Apple AudioToolbox AAC", native_os: Some("macos") },
    KnownEncoder { name: "libfdk_aac", kind: MediaKind::Audio, hardware: false, display_name: "Fraunhofer FDK AAC", native_os: None },
    KnownEncoder { name: "aac", kind: MediaKind::Audio, hardware: false, display_name: "FFmpeg AAC", native_os: None },
];

fn known(name: &str) -> Option<(usize, &'static KnownEncoder)> {
    KNOWN_ENCODERS.iter().enumerate().find(|(_, k)| k.name == name)
}

/// Build the capability record for a known encoder name.
pub fn capability_for(name: &str) -> Option<EncoderCapability> {
    known(name).map(|(_, k)| EncoderCapability {
        media_kind: k.kind,
        codec_id: codec_for(k.kind).to_string(),
        implementation_id: k.name.to_string(),
        hardware: k.hardware,
        display_name: k.display_name.to_string(),
    })
}

/// Extract encoder names from `ffmpeg -encoders` output.
///
/// The listing starts with a legend terminated by a ` ------` line; each
/// following line is `<flags> <name> <description>`.
pub fn parse_encoder_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _flags = parts.next()?;
            parts.next().map(str::to_string)
        })
        .collect()
}

/// Sort key: native hardware, other hardware, software; then fixed priority.
fn rank_key(cap: &EncoderCapability, os: &str) -> (u8, usize) {
    let (priority, native) = match known(&cap.implementation_id) {
        Some((i, k)) => (i, k.native_os == Some(os)),
        None => (usize::MAX, false),
    };
    let class = match (cap.hardware, native) {
        (true, true) => 0,
        (true, false) => 1,
        (false, _) => 2,
    };
    (class, priority)
}

/// Order capabilities best-first for the given operating system.
pub fn rank(caps: &mut [EncoderCapability], os: &str) {
    caps.sort_by_key(|c| rank_key(c, os));
}

/// Ranked encoders grouped by codec family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySet {
    by_codec: BTreeMap<String, Vec<EncoderCapability>>,
}

impl CapabilitySet {
    /// Group and rank the given capabilities for `os`.
    pub fn from_capabilities(caps: Vec<EncoderCapability>, os: &str) -> Self {
        let mut by_codec: BTreeMap<String, Vec<EncoderCapability>> = BTreeMap::new();
        for cap in caps {
            by_codec.entry(cap.codec_id.clone()).or_default().push(cap);
        }
        for list in by_codec.values_mut() {
            rank(list, os);
        }
        Self { by_codec }
    }

    /// Ranked encoders for a codec family.
    pub fn get(&self, codec_id: &str) -> &[EncoderCapability] {
        self.by_codec.get(codec_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ranked encoders producing `kind`.
    pub fn for_kind(&self, kind: MediaKind) -> impl Iterator<Item = &EncoderCapability> {
        self.by_codec
            .values()
            .flatten()
            .filter(move |c| c.media_kind == kind)
    }

    /// Every capability, grouped by codec.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<EncoderCapability>)> {
        self.by_codec.iter()
    }

    /// Whether no encoder was found at all.
    pub fn is_empty(&self) -> bool {
        self.by_codec.values().all(Vec::is_empty)
    }

    /// Pick the best encoder for `kind`, optionally skipping hardware.
    pub fn select_best(
        &self,
        kind: MediaKind,
        force_software: bool,
    ) -> hf_core::Result<EncoderCapability> {
        self.get(codec_for(kind))
            .iter()
            .find(|c| !(force_software && c.hardware))
            .cloned()
            .ok_or(Error::NoEncoderAvailable { kind })
    }
}

/// Discovers and caches the encoders usable on this host.
#[derive(Debug)]
pub struct CapabilityRegistry {
    ffmpeg: PathBuf,
    verify_hardware: bool,
    force_software: bool,
    vaapi_device: String,
    cache: RwLock<Option<Arc<CapabilitySet>>>,
}

impl CapabilityRegistry {
    /// Create a registry that queries the given ffmpeg binary.
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self {
            ffmpeg,
            verify_hardware: true,
            force_software: false,
            vaapi_device: DEFAULT_VAAPI_DEVICE.to_string(),
            cache: RwLock::new(None),
        }
    }

    /// Create a registry whose cache is already filled; nothing is executed.
    pub fn from_capabilities(caps: Vec<EncoderCapability>) -> Self {
        let registry = Self::new(PathBuf::from("ffmpeg"));
        *registry.cache.write() = Some(Arc::new(CapabilitySet::from_capabilities(
            caps,
            std::env::consts::OS,
        )));
        registry
    }

    /// Apply the encoder-related settings from the conversion config.
    pub fn with_config(mut self, conv: &hf_core::config::ConversionConfig) -> Self {
        self.verify_hardware = conv.verify_hardware_encoders;
        self.force_software = conv.force_software_encoding;
        self
    }

    /// Return the cached capability set, running discovery on first use or
    /// when `force_refresh` is set.
    ///
    /// A missing or failing ffmpeg yields an empty set; selection then
    /// reports [`Error::NoEncoderAvailable`].
    pub async fn discover(&self, force_refresh: bool) -> Arc<CapabilitySet> {
        if !force_refresh {
            let cached = self.cache.read().clone();
            if let Some(set) = cached {
                return set;
            }
        }

        let set = Arc::new(self.probe().await);
        *self.cache.write() = Some(Arc::clone(&set));
        set
    }

    /// Best encoder for `kind` honouring `force_software_encoding`.
    pub async fn select_best(&self, kind: MediaKind) -> hf_core::Result<EncoderCapability> {
        let set = self.discover(false).await;
        let choice = set.select_best(kind, self.force_software)?;
        tracing::info!("Selected {kind} encoder: {choice}");
        Ok(choice)
    }

    async fn probe(&self) -> CapabilitySet {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(args::encoder_listing_args()).timeout(LISTING_TIMEOUT);

        let listing = match cmd.execute().await {
            Ok(out) => out.stdout,
            Err(e) => {
                tracing::warn!("Encoder discovery failed: {e}");
                return CapabilitySet::default();
            }
        };

        let mut caps = Vec::new();
        for name in parse_encoder_listing(&listing) {
            let Some(cap) = capability_for(&name) else {
                continue;
            };
            if cap.hardware && self.verify_hardware && !self.test_encode(&cap).await {
                tracing::debug!("{} is listed but failed its test encode", cap.implementation_id);
                continue;
            }
            caps.push(cap);
        }

        let set = CapabilitySet::from_capabilities(caps, std::env::consts::OS);
        for (codec, list) in set.iter() {
            let names: Vec<&str> = list.iter().map(|c| c.implementation_id.as_str()).collect();
            tracing::info!("Available {codec} encoders: {}", names.join(", "));
        }
        set
    }

    async fn test_encode(&self, cap: &EncoderCapability) -> bool {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(args::hardware_test_args(cap, &self.vaapi_device))
            .timeout(TEST_ENCODE_TIMEOUT);
        cmd.execute().await.is_ok()
    }
}
