mod cli;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction, ConvertArgs, UpscaleArg};
use hf_av::{CapabilityRegistry, SourceInspector, ToolRegistry};
use hf_core::config::{Config, ConversionConfig, UpscalePolicy};
use hf_core::{MediaKind, SourceMedia};
use hf_pipeline::ladder::select_named;
use hf_pipeline::{ConversionResult, Converter, JobKind};

const CRATES: &[&str] = &["hlsforge", "hf_core", "hf_av", "hf_media", "hf_pipeline"];

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<hf_core::Error>()
                .map(hf_core::Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// `RUST_LOG` wins; otherwise the verbosity flags pick a level for our crates.
fn init_logging(verbose: u8, quiet: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
        directives.push("warn".into());
        directives.join(",")
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Convert(args) => convert(args, Config::load_or_default(config_path)),
        Commands::Encoders { no_verify } => {
            let mut config = Config::load_or_default(config_path);
            if no_verify {
                config.conversion.verify_hardware_encoders = false;
            }
            block_on(list_encoders(config))?
        }
        Commands::Analyze { input, json } => {
            block_on(analyze(&input, json, Config::load_or_default(config_path)))?
        }
        Commands::CheckTools => check_tools(&Config::load_or_default(config_path)),
        Commands::Config { action } => match action {
            ConfigAction::Save { path } => save_config(&path, config_path),
            ConfigAction::Validate => validate_config(config_path),
        },
        Commands::Version => {
            println!("hlsforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    Ok(rt.block_on(future))
}

/// Fold command-line flags over the loaded config.
fn apply_overrides(conv: &mut ConversionConfig, args: &ConvertArgs) -> Result<()> {
    if let Some(names) = &args.resolutions {
        conv.ladder = Some(select_named(&conv.catalog(), names)?);
    }
    if let Some(upscale) = args.upscale {
        conv.upscale_policy = match upscale {
            UpscaleArg::Honor => UpscalePolicy::Honor,
            UpscaleArg::Clamp => UpscalePolicy::Clamp,
            UpscaleArg::Reject => UpscalePolicy::Reject,
        };
    }
    if let Some(preset) = &args.preset {
        conv.preset = preset.clone();
    }
    if let Some(crf) = args.crf {
        conv.crf = crf;
    }
    if let Some(workers) = args.workers {
        conv.max_workers = Some(workers);
    }
    if let Some(secs) = args.segment_duration {
        conv.segment_duration = secs;
    }
    if let Some(gop) = args.gop_size {
        conv.keyframe_interval = gop;
    }
    if let Some(timeout) = args.timeout {
        conv.job_timeout_secs = Some(timeout);
    }
    if args.no_subtitles {
        conv.convert_subtitles = false;
    }
    if args.include_bitmap_subtitles {
        conv.include_bitmap_subtitles = true;
    }
    if args.software {
        conv.force_software_encoding = true;
    }
    Ok(())
}

/// The input path without its extension, or with `_hls` appended when it
/// has none so the package never lands on the input itself.
fn default_output_dir(input: &Path) -> PathBuf {
    if input.extension().is_some() {
        return input.with_extension("");
    }
    let mut name = input.file_name().unwrap_or_default().to_os_string();
    name.push("_hls");
    input.with_file_name(name)
}

fn convert(args: ConvertArgs, mut config: Config) -> Result<()> {
    apply_overrides(&mut config.conversion, &args)?;
    for warning in config.validate() {
        tracing::warn!("{warning}");
    }
    if !args.input.is_file() {
        return Err(hf_core::Error::Validation(format!(
            "input file does not exist: {}",
            args.input.display()
        ))
        .into());
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.input));

    let converter = Converter::from_config(&config)?;
    let result = block_on(converter.convert(&args.input, &output, &config.conversion))??;
    print_summary(&result);
    result.into_result()?;
    Ok(())
}

fn print_summary(result: &ConversionResult) {
    println!();
    match &result.master_playlist {
        Some(master) => println!("Master playlist: {}", master.display()),
        None => println!("No master playlist written"),
    }
    for kind in [JobKind::Video, JobKind::Audio, JobKind::Subtitle] {
        let done = result.succeeded(kind);
        if !done.is_empty() {
            println!("  {kind}: {}", done.join(", "));
        }
    }
    if !result.dropped_rungs.is_empty() {
        println!("  dropped: {}", result.dropped_rungs.join(", "));
    }
    for failure in result.failures() {
        println!("  failed {failure}");
    }
    if let Some(reason) = &result.assembly_error {
        println!("  assembly failed: {reason}");
    }
    println!("Total time: {:.1}s", result.timings.total().as_secs_f64());
}

async fn list_encoders(config: Config) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools.require("ffmpeg")?.path.clone();
    let registry = CapabilityRegistry::new(ffmpeg).with_config(&config.conversion);
    let set = registry.discover(false).await;

    if set.is_empty() {
        println!("No H.264 or AAC encoders found.");
        return Ok(());
    }
    for kind in [MediaKind::Video, MediaKind::Audio] {
        println!("{kind}:");
        let best = set
            .select_best(kind, config.conversion.force_software_encoding)
            .ok();
        for cap in set.for_kind(kind) {
            let marker = if best.as_ref() == Some(cap) { "*" } else { " " };
            println!("  {marker} {cap}");
        }
    }
    Ok(())
}

async fn analyze(input: &Path, json: bool, config: Config) -> Result<()> {
    if !input.exists() {
        return Err(hf_core::Error::Validation(format!(
            "file does not exist: {}",
            input.display()
        ))
        .into());
    }
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require("ffprobe")?.path.clone();
    let source = SourceInspector::new(ffprobe).analyze(input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&source)?);
    } else {
        print_source(input, &source);
    }
    Ok(())
}

fn print_source(input: &Path, source: &SourceMedia) {
    println!("File: {}", input.display());
    if let Some(format) = &source.format_name {
        println!("Container: {format}");
    }
    if let Some(size) = source.file_size {
        println!("Size: {size} bytes");
    }

    match &source.video {
        Some(video) => {
            let secs = video.duration_secs as u64;
            println!(
                "\nVideo: {}x{} {:.3} fps, {:02}:{:02}:{:02}",
                video.width,
                video.height,
                video.frame_rate,
                secs / 3600,
                secs / 60 % 60,
                secs % 60
            );
            if let Some(kbps) = video.bitrate_kbps {
                println!("  {kbps} kbps");
            }
        }
        None => println!("\nVideo: none"),
    }

    println!("\nAudio Tracks: {}", source.audio_tracks.len());
    for track in &source.audio_tracks {
        print!("  [{}] {}", track.index, track.language);
        if let Some(codec) = &track.codec_name {
            print!(" {codec}");
        }
        if let Some(channels) = track.channels {
            print!(" {channels}ch");
        }
        if let Some(kbps) = track.bitrate_kbps {
            print!(" {kbps} kbps");
        }
        println!();
    }

    println!("\nSubtitle Tracks: {}", source.subtitle_tracks.len());
    for track in &source.subtitle_tracks {
        print!("  [{}] {} {}", track.index, track.language, track.codec_name);
        if track.bitmap {
            print!(" [bitmap]");
        }
        println!();
    }
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };
        print!("{status} {}", tool.name);
        if let Some(version) = &tool.version {
            print!(" ({version})");
        }
        if let Some(path) = &tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing; conversion needs both ffmpeg and ffprobe.");
    }
    Ok(())
}

fn save_config(dest: &Path, source: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(source);
    config.save(dest)?;
    println!("Configuration written to {}", dest.display());
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            Config::load(p)?
        }
        None => {
            println!("No config file specified, checking defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        for warning in &warnings {
            println!("⚠ {warning}");
        }
    }
    let conv = &config.conversion;
    println!("  Segment duration: {}s", conv.segment_duration);
    println!("  Preset: {} (crf {})", conv.preset, conv.crf);
    match &conv.ladder {
        Some(ladder) => println!("  Explicit ladder: {} rung(s)", ladder.len()),
        None => println!("  Catalog: {} rung(s)", conv.catalog().len()),
    }
    Ok(())
}
