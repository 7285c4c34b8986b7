//! CLI end-to-end tests
//!
//! Tests for the hlsforge command-line interface. Conversion runs use small
//! shell scripts standing in for ffmpeg and ffprobe.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the hlsforge binary
#[allow(deprecated)]
fn hlsforge_cmd() -> Command {
    let mut cmd = Command::cargo_bin("hlsforge").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = hlsforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = hlsforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("hlsforge"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = hlsforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = hlsforge_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")));
}

#[test]
fn test_cli_convert_help() {
    let mut cmd = hlsforge_cmd();
    cmd.args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Convert a file"))
        .stdout(predicate::str::contains("--segment-duration"));
}

#[test]
fn test_cli_convert_missing_input() {
    let dir = tempdir().unwrap();
    let mut cmd = hlsforge_cmd();
    cmd.args(["convert"])
        .arg(dir.path().join("missing.mkv"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_convert_unknown_resolution() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("movie.mkv");
    fs::write(&input, b"x").unwrap();

    let mut cmd = hlsforge_cmd();
    cmd.arg("convert")
        .arg(&input)
        .args(["-r", "720p,999p"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown resolution '999p'"));
}

#[test]
fn test_cli_analyze_missing_file() {
    let mut cmd = hlsforge_cmd();
    cmd.args(["analyze", "/nonexistent/file.mkv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_config_save_then_validate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/hlsforge.json");

    let mut cmd = hlsforge_cmd();
    cmd.args(["config", "save"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));

    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.contains("\"segment_duration\": 2.0"));

    let mut cmd = hlsforge_cmd();
    cmd.arg("-c")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_cli_config_validate_reports_warnings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"conversion": {"crf": 99, "preset": "warp"}}"#).unwrap();

    let mut cmd = hlsforge_cmd();
    cmd.arg("-c")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("outside 0-51"))
        .stdout(predicate::str::contains("'warp'"));
}

#[test]
fn test_cli_config_validate_malformed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let mut cmd = hlsforge_cmd();
    cmd.arg("-c")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config parse error"));
}

// ---------------------------------------------------------------------------
// Conversions with stand-in tools
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod convert {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FFPROBE: &str = r#"#!/bin/sh
cat <<'EOF'
{"format":{"format_name":"matroska,webm","duration":"12.0","size":"1000"},
 "streams":[
  {"codec_type":"video","codec_name":"h264","width":1280,"height":720,"duration":"12.0","avg_frame_rate":"25/1","bit_rate":"3000000"},
  {"codec_type":"audio","codec_name":"ac3","channels":6,"bit_rate":"384000","tags":{"language":"eng"}},
  {"codec_type":"subtitle","codec_name":"subrip","tags":{"language":"eng"}}
 ]}
EOF
"#;

    /// Lists libx264 and aac, then writes one segment per rendition. Any
    /// output path matching `$FAIL_PATTERN` fails.
    const FFMPEG: &str = r#"#!/bin/sh
for a in "$@"; do
  if [ "$a" = "-encoders" ]; then
    printf 'Encoders:\n V..... = Video\n ------\n V....D libx264   H.264\n A....D aac       AAC\n'
    exit 0
  fi
  last="$a"
done
case "$last" in
  FAIL_PATTERN) echo "simulated encoder failure" >&2; exit 1 ;;
esac
case "$last" in
  *.m3u8)
    dir=$(dirname "$last")
    : > "$dir/chunk_000.ts"
    printf '#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXTINF:2.000000,\nchunk_000.ts\n#EXT-X-ENDLIST\n' > "$last"
    ;;
  *.vtt) printf 'WEBVTT\n' > "$last" ;;
esac
exit 0
"#;

    struct Tools {
        dir: TempDir,
        config: PathBuf,
        input: PathBuf,
    }

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn setup(fail_pattern: &str) -> Tools {
        let dir = tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");
        write_script(&ffmpeg, &FFMPEG.replace("FAIL_PATTERN", fail_pattern));
        write_script(&ffprobe, FFPROBE);

        let config = dir.path().join("config.json");
        let json = config_json(&ffmpeg, &ffprobe);
        fs::write(&config, json).unwrap();

        let input = dir.path().join("movie.mkv");
        fs::write(&input, b"not really a movie").unwrap();
        Tools { dir, config, input }
    }

    fn config_json(ffmpeg: &Path, ffprobe: &Path) -> String {
        format!(
            r#"{{
  "tools": {{"ffmpeg_path": "{}", "ffprobe_path": "{}"}},
  "conversion": {{
    "max_workers": 2,
    "bitrate_profiles": [
      {{"name": "360p", "width": 640, "height": 360, "max_video_kbps": 800, "min_video_kbps": 600}},
      {{"name": "720p", "width": 1280, "height": 720, "max_video_kbps": 2500, "min_video_kbps": 1800}}
    ]
  }}
}}"#,
            ffmpeg.display(),
            ffprobe.display()
        )
    }

    #[test]
    fn test_cli_convert_writes_package() {
        let tools = setup("*/never/*");

        let mut cmd = hlsforge_cmd();
        cmd.arg("-c")
            .arg(&tools.config)
            .arg("convert")
            .arg(&tools.input)
            .assert()
            .success()
            .stdout(predicate::str::contains("Master playlist:"));

        let out = tools.dir.path().join("movie");
        let master = fs::read_to_string(out.join("master.m3u8")).unwrap();
        assert!(master.contains("360p/playlist.m3u8"));
        assert!(master.contains("720p/playlist.m3u8"));
        assert!(master.contains("audio_eng/playlist.m3u8"));
        assert!(master.contains("subs_eng.m3u8"));
        assert!(out.join("eng.vtt").exists());
    }

    #[test]
    fn test_cli_convert_all_video_failed() {
        let tools = setup("*p/playlist.m3u8");
        let out = tools.dir.path().join("out");

        let mut cmd = hlsforge_cmd();
        cmd.arg("-c")
            .arg(&tools.config)
            .arg("convert")
            .arg(&tools.input)
            .arg("-o")
            .arg(&out)
            .assert()
            .code(5)
            .stdout(predicate::str::contains("No master playlist written"));

        assert!(!out.join("master.m3u8").exists());
        assert!(!out.join("360p").exists());
    }

    #[test]
    fn test_cli_analyze_json() {
        let tools = setup("*/never/*");

        let mut cmd = hlsforge_cmd();
        let output = cmd
            .arg("-c")
            .arg(&tools.config)
            .args(["analyze", "--json"])
            .arg(&tools.input)
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.contains("\"width\": 1280"));
        assert!(stdout.contains("\"language\": \"eng\""));
    }

    #[test]
    fn test_cli_encoders_lists_software() {
        let tools = setup("*/never/*");

        let mut cmd = hlsforge_cmd();
        cmd.arg("-c")
            .arg(&tools.config)
            .arg("encoders")
            .assert()
            .success()
            .stdout(predicate::str::contains("libx264"))
            .stdout(predicate::str::contains("aac"));
    }
}
