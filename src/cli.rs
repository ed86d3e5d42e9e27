//! Command-line interface for voxpitch
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Real-time pitch tracking for voice training
#[derive(Parser, Debug)]
#[command(
    name = "voxpitch",
    version,
    about = "Real-time pitch tracking for voice training"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-frame lines, -vv: debug logging)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a session length such as `30s`, `5m` or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a filter strength in [0, 1].
fn parse_strength(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("strength must be between 0 and 1, got {value}"))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse a WAV file offline and print a session summary
    Analyze {
        /// WAV file to analyse ("-" reads from stdin)
        #[arg(value_name = "WAV")]
        input: PathBuf,

        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Noise filter strength override (0.0 to 1.0)
        #[arg(long, value_name = "STRENGTH", value_parser = parse_strength)]
        strength: Option<f32>,

        /// Consecutive stable frames required to lock a note
        #[arg(long, value_name = "FRAMES")]
        lock_frames: Option<u32>,
    },

    /// Track pitch from the microphone with a live meter
    Listen {
        /// Audio input device (e.g., hw:0)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Stop after this long (e.g., 30s, 5m). Runs until Enter otherwise
        #[arg(long, short = 'd', value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Noise filter strength override (0.0 to 1.0)
        #[arg(long, value_name = "STRENGTH", value_parser = parse_strength)]
        strength: Option<f32>,
    },

    /// List available audio input devices
    Devices,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration inspection actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["voxpitch", "analyze", "take1.wav"]).unwrap();
        match cli.command {
            Commands::Analyze {
                input,
                json,
                strength,
                lock_frames,
            } => {
                assert_eq!(input, PathBuf::from("take1.wav"));
                assert!(!json);
                assert!(strength.is_none());
                assert!(lock_frames.is_none());
            }
            _ => panic!("Expected Analyze command"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_analyze_with_options() {
        let cli = Cli::try_parse_from([
            "voxpitch",
            "analyze",
            "-",
            "--json",
            "--strength",
            "0.5",
            "--lock-frames",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                input,
                json,
                strength,
                lock_frames,
            } => {
                assert_eq!(input, PathBuf::from("-"));
                assert!(json);
                assert_eq!(strength, Some(0.5));
                assert_eq!(lock_frames, Some(4));
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_parse_strength_out_of_range_rejected() {
        let result = Cli::try_parse_from(["voxpitch", "analyze", "a.wav", "--strength", "1.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_listen_duration() {
        let cli =
            Cli::try_parse_from(["voxpitch", "listen", "--device", "hw:1", "-d", "1m30s"]).unwrap();
        match cli.command {
            Commands::Listen {
                device, duration, ..
            } => {
                assert_eq!(device.as_deref(), Some("hw:1"));
                assert_eq!(duration, Some(Duration::from_secs(90)));
            }
            _ => panic!("Expected Listen command"),
        }
    }

    #[test]
    fn test_parse_listen_bare_seconds() {
        let cli = Cli::try_parse_from(["voxpitch", "listen", "--duration", "45"]).unwrap();
        match cli.command {
            Commands::Listen { duration, .. } => {
                assert_eq!(duration, Some(Duration::from_secs(45)));
            }
            _ => panic!("Expected Listen command"),
        }
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["voxpitch", "devices"]).unwrap();
        assert!(matches!(cli.command, Commands::Devices));
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["voxpitch", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));

        let cli = Cli::try_parse_from(["voxpitch", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Path
            }
        ));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voxpitch",
            "devices",
            "--config",
            "/path/to/config.toml",
            "-vv",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["voxpitch"]).is_err());
    }
}
