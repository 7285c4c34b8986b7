//! External tool detection.
//!
//! The [`ToolRegistry`] resolves the locations of `ffmpeg` and `ffprobe`
//! once and hands out [`ToolCommand`] builders pointing at them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// Tool names the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

impl ToolConfig {
    /// Start a command for this tool with the given timeout.
    pub fn command(&self, timeout: Duration) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.path.clone());
        cmd.timeout(timeout);
        cmd
    }
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// First line of `-version` output, if the tool ran.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used when it exists; otherwise [`which::which`]
    /// locates the tool. Tools that are not found are omitted.
    pub fn discover(tools_config: &hf_core::config::ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!("Found {name} at {}", path.display());
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                        },
                    );
                }
                None => tracing::debug!("{name} not found"),
            }
        }

        Self { tools }
    }

    /// Build a registry from explicit paths, bypassing `PATH` lookup.
    pub fn with_paths(ffmpeg: impl AsRef<Path>, ffprobe: impl AsRef<Path>) -> Self {
        let mut tools = HashMap::new();
        for (name, path) in [("ffmpeg", ffmpeg.as_ref()), ("ffprobe", ffprobe.as_ref())] {
            tools.insert(
                name.to_string(),
                ToolConfig {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                },
            );
        }
        Self { tools }
    }

    /// Return the [`ToolConfig`] for the given tool, or an
    /// [`hf_core::Error::Tool`] if it was not found during discovery.
    pub fn require(&self, name: &str) -> hf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            hf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
