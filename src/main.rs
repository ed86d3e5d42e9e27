use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use voxpitch::audio::{AudioSource, WavAudioSource};
use voxpitch::cli::{Cli, Commands, ConfigAction};
use voxpitch::config::Config;
use voxpitch::output::format_frame_line;
use voxpitch::pipeline::PitchPipeline;

/// Meter refresh period for `listen`.
#[cfg(feature = "cpal-audio")]
const METER_REFRESH: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!("voxpitch {}", voxpitch::version_string());

    match cli.command {
        Commands::Analyze {
            input,
            json,
            strength,
            lock_frames,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_analyze(
                config,
                &input,
                json,
                strength,
                lock_frames,
                cli.quiet,
                cli.verbose,
            )?;
        }
        Commands::Listen {
            device,
            duration,
            strength,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_listen(config, device, duration, strength, cli.quiet)?;
        }
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `-q` shows errors only and each `-v` raises
/// the level from warnings.
fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 | 1 => "warn",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxpitch={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxpitch/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides apply on top; the result is validated.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => Config::default(),
        }
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Analyse a WAV file frame by frame and print the session summary.
fn run_analyze(
    config: Config,
    input: &Path,
    json: bool,
    strength: Option<f32>,
    lock_frames: Option<u32>,
    quiet: bool,
    verbose: u8,
) -> Result<()> {
    let frame_size = config.audio.frame_size;
    let mut source = if input == Path::new("-") {
        WavAudioSource::from_stdin(frame_size)?
    } else {
        WavAudioSource::open(input, frame_size)
            .with_context(|| format!("Failed to open {}", input.display()))?
    };

    let mut pipeline_config = config.pipeline_config();
    pipeline_config.sample_rate = source.sample_rate();
    if let Some(strength) = strength {
        pipeline_config.noise.strength = strength;
    }
    let mut pipeline = PitchPipeline::new(pipeline_config)?;
    if let Some(frames) = lock_frames {
        pipeline.set_required_frames(frames)?;
    }

    tracing::info!(
        frames = source.frame_count(),
        duration = ?source.duration(),
        sample_rate = source.sample_rate(),
        "analysing"
    );

    let frame_secs = frame_size as f64 / source.sample_rate() as f64;
    source.start()?;
    while let Some(frame) = source.read_frame()? {
        let report = pipeline.process_frame(&frame);
        if verbose > 0 && !quiet {
            eprintln!("{}", format_frame_line(&report, frame_secs));
        }
    }
    source.stop()?;

    let summary = pipeline.session_summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !quiet {
        summary.print_summary();
    }

    Ok(())
}

/// Track the microphone until Enter, the duration elapses, or capture fails.
#[cfg(feature = "cpal-audio")]
fn run_listen(
    config: Config,
    device: Option<String>,
    duration: Option<Duration>,
    strength: Option<f32>,
    quiet: bool,
) -> Result<()> {
    use std::io::IsTerminal;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Instant;
    use voxpitch::audio::capture::CpalAudioSource;
    use voxpitch::output::{clear_line, render_meter};
    use voxpitch::pipeline::PipelineRunner;
    use voxpitch::tracking::EqualTemperament;

    let device = device.or_else(|| config.audio.device.clone());
    let mut source = CpalAudioSource::new(
        device.as_deref(),
        config.audio.sample_rate,
        config.audio.frame_size,
    )?;
    // The device may only run at its native rate; the pipeline follows it.
    source.start()?;

    let mut pipeline_config = config.pipeline_config();
    pipeline_config.sample_rate = source.sample_rate();
    if let Some(strength) = strength {
        pipeline_config.noise.strength = strength;
    }
    let pipeline = PitchPipeline::new(pipeline_config)?;
    let handle = PipelineRunner::new(config.runner_config()).start(pipeline, Box::new(source))?;

    let stop_requested = Arc::new(AtomicBool::new(false));
    if std::io::stdin().is_terminal() {
        let flag = Arc::clone(&stop_requested);
        thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_ok() {
                flag.store(true, Ordering::Relaxed);
            }
        });
        if !quiet {
            eprintln!("Listening at {} Hz, press Enter to stop", pipeline_config.sample_rate);
        }
    }

    let scale = EqualTemperament::default();
    let stats = handle.stats();
    let started = Instant::now();
    while handle.is_running() && !stop_requested.load(Ordering::Relaxed) {
        if let Some(limit) = duration
            && started.elapsed() >= limit
        {
            break;
        }
        if !quiet {
            render_meter(&stats.snapshot(), &scale);
        }
        thread::sleep(METER_REFRESH);
    }
    if !quiet {
        clear_line();
    }

    let runner_stats = handle.runner_stats();
    let Some(summary) = handle.stop() else {
        bail!("Pipeline thread panicked");
    };
    tracing::debug!(?runner_stats, "listen finished");

    if !quiet {
        summary.print_summary();
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn run_listen(
    _config: Config,
    _device: Option<String>,
    _duration: Option<Duration>,
    _strength: Option<f32>,
    _quiet: bool,
) -> Result<()> {
    bail!("Microphone input requires the 'cpal-audio' feature")
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = voxpitch::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    bail!("Device listing requires the 'cpal-audio' feature")
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Path => match Config::resolve_path(custom_path) {
            Some(path) => println!("{}", path.display()),
            None => bail!("Could not determine config directory"),
        },
    }
    Ok(())
}
