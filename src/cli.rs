//! Command-line interface for kira
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Push-to-talk voice assistant
#[derive(Parser, Debug)]
#[command(
    name = "kira",
    version,
    about = "Push-to-talk voice assistant: record, transcribe, answer, speak"
)]
pub struct Cli {
    /// Subcommand to execute (default: start the conversation loop)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device name (see `kira devices`)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Directory for per-turn recordings and speech files
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Longest wait for a transcript. Examples: 90s, 3m, 1m30s
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub max_wait: Option<Duration>,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`, plus bare numbers
/// as seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Check external tools and services
    Check,

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["kira"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.device.is_none());
        assert!(cli.scratch_dir.is_none());
        assert!(cli.max_wait.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["kira", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["kira", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "kira",
            "--device",
            "MacBook Pro Microphone",
            "--scratch-dir",
            "/tmp/kira",
            "--max-wait",
            "1m30s",
        ])
        .unwrap();

        assert_eq!(cli.device.as_deref(), Some("MacBook Pro Microphone"));
        assert_eq!(cli.scratch_dir, Some(PathBuf::from("/tmp/kira")));
        assert_eq!(cli.max_wait, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_max_wait_accepts_bare_seconds() {
        let cli = Cli::try_parse_from(["kira", "--max-wait", "45"]).unwrap();
        assert_eq!(cli.max_wait, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_max_wait_rejects_garbage() {
        assert!(Cli::try_parse_from(["kira", "--max-wait", "soon"]).is_err());
    }

    #[test]
    fn test_parse_devices() {
        let cli = Cli::try_parse_from(["kira", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["kira", "check"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_parse_config_without_action() {
        let cli = Cli::try_parse_from(["kira", "config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { action: None })));
    }

    #[test]
    fn test_parse_config_init_force() {
        let cli = Cli::try_parse_from(["kira", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: Some(ConfigAction::Init { force: true })
            })
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["kira", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Zsh })
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from(["kira", "devices", "--config", "/tmp/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
    }

    #[test]
    fn test_parse_quiet_short_flag() {
        let cli = Cli::try_parse_from(["kira", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["kira", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["kira", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
