use anyhow::Result;
use clap::{CommandFactory, Parser};
use kira::app::{RunOptions, build_live_stages, run_conversation};
use kira::audio::capture::{list_devices, quiet_audio_backends};
use kira::cli::{Cli, Commands, ConfigAction};
use kira::config::Config;
use kira::diagnostics::check_dependencies;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How long Ctrl+C waits for an active capture to release the device.
const CAPTURE_RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command.take() {
        None => run_assistant(&cli).await?,
        Some(Commands::Devices) => {
            quiet_audio_backends();
            list_audio_devices()?;
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            println!("{} {}\n", "kira".bold(), kira::version_string().dimmed());
            tokio::task::spawn_blocking(move || check_dependencies(&config)).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "kira", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_logging(quiet: bool, verbose: u8) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "warn,kira=info",
        (false, 2) => "warn,kira=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from the custom path, or the default path if present.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// Run the push-to-talk loop until input closes or Ctrl+C.
async fn run_assistant(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(dir) = &cli.scratch_dir {
        config.scratch.dir = Some(dir.clone());
    }
    if let Err(e) = config.validate() {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }

    quiet_audio_backends();

    let options = RunOptions {
        quiet: cli.quiet,
        max_wait: cli.max_wait,
    };
    // The HTTP clients are blocking and must not be built on a runtime thread.
    let stages = match tokio::task::spawn_blocking(move || build_live_stages(&config, &options))
        .await?
    {
        Ok(stages) => stages,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            eprintln!("Application stopping.");
            std::process::exit(1);
        }
    };

    let active = stages.active_capture();
    let quiet = cli.quiet;
    let conversation = tokio::task::spawn_blocking(move || run_conversation(stages, quiet));

    tokio::select! {
        result = conversation => {
            result??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            if !active.stop_and_wait(CAPTURE_RELEASE_TIMEOUT) {
                tracing::warn!("capture did not close in time");
            }
            println!("\nClosing. Goodbye!");
            // The loop thread may be parked on stdin; the runtime would wait for it.
            std::process::exit(0);
        }
    }

    Ok(())
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

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

/// Hide credentials when printing configuration.
fn redacted(mut config: Config) -> Config {
    for key in [&mut config.transcription.api_key, &mut config.weather.api_key] {
        if !key.is_empty() {
            *key = "********".to_string();
        }
    }
    config
}

fn handle_config_command(action: Option<ConfigAction>, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        None => {
            let config = load_config(custom_path)?;
            print!("{}", redacted(config).to_toml()?);
        }
        Some(ConfigAction::Init { force }) => {
            if config_path.exists() && !force {
                eprintln!(
                    "{}",
                    format!(
                        "Error: {} already exists (use --force to overwrite)",
                        config_path.display()
                    )
                    .red()
                );
                std::process::exit(1);
            }
            Config::default().save(&config_path)?;
            println!(
                "{}",
                format!("Wrote default configuration to {}", config_path.display()).green()
            );
        }
        Some(ConfigAction::Path) => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}
