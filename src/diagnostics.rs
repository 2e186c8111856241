//! System diagnostics and dependency checking.
//!
//! Verifies that the external tools and services a turn relies on are
//! installed and reachable.

use crate::answer::OllamaClient;
use crate::config::Config;
use crate::playback::Player;
use crate::process;
use crate::speech::backends::{ESPEAK, NETWORK, NETWORK_SHORT, SAY};

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues (e.g., server not running)
    Warning(String),
}

/// Check that a program is on PATH.
fn check_program(program: &str) -> CheckResult {
    if process::is_available(program) {
        CheckResult::Ok
    } else {
        CheckResult::NotFound
    }
}

/// Program a speech backend needs, if any.
fn backend_program(backend: &str) -> Option<&'static str> {
    match backend {
        SAY => Some("say"),
        ESPEAK => Some("espeak-ng"),
        _ => None,
    }
}

fn check_ollama(config: &Config) -> CheckResult {
    match OllamaClient::new(&config.answer).and_then(|client| client.check_status()) {
        Ok(()) => CheckResult::Ok,
        Err(e) => CheckResult::Warning(e.to_string()),
    }
}

fn check_key(value: &str, env: &str) -> CheckResult {
    if value.is_empty() {
        CheckResult::Warning(format!("not set (config file or {})", env))
    } else {
        CheckResult::Ok
    }
}

fn print_result(label: &str, result: &CheckResult, missing_hint: &str) -> bool {
    print!("{:<28}", format!("{}:", label));
    match result {
        CheckResult::Ok => {
            println!("✓ OK");
            true
        }
        CheckResult::NotFound => {
            println!("✗ NOT FOUND");
            if !missing_hint.is_empty() {
                println!("  {}", missing_hint);
            }
            false
        }
        CheckResult::Warning(msg) => {
            println!("⚠ WARNING: {}", msg);
            false
        }
    }
}

/// Run all dependency checks and print results.
pub fn check_dependencies(config: &Config) {
    println!("Checking system dependencies...\n");

    let ffmpeg = print_result(
        "ffmpeg (transcoding)",
        &check_program("ffmpeg"),
        "Install: brew install ffmpeg  or  sudo apt install ffmpeg",
    );

    println!();
    println!("Speech backends (in order):");
    let mut speech_ready = false;
    for backend in &config.synthesis.backends {
        let result = match backend_program(backend) {
            Some(program) => check_program(program),
            None if backend == NETWORK || backend == NETWORK_SHORT => CheckResult::Ok,
            None => CheckResult::Warning("unknown backend".to_string()),
        };
        speech_ready |= print_result(&format!("  {}", backend), &result, "");
    }

    println!();
    println!("Audio players (in order):");
    let mut player_ready = false;
    for player in config.playback.players.iter().filter_map(|p| Player::from_command(p)) {
        player_ready |= print_result(
            &format!("  {}", player.program()),
            &check_program(player.program()),
            "",
        );
    }

    println!();
    println!("Services:");
    let ollama = print_result(
        &format!("  ollama ({})", config.answer.model),
        &check_ollama(config),
        "",
    );
    print_result(
        "  transcription API key",
        &check_key(&config.transcription.api_key, "KIRA_TRANSCRIPTION_API_KEY"),
        "",
    );
    print_result(
        "  weather API key",
        &check_key(&config.weather.api_key, "KIRA_WEATHER_API_KEY"),
        "",
    );

    println!();
    if !ffmpeg {
        println!("⚠ Recordings cannot be prepared for upload without ffmpeg.");
    }
    if !speech_ready {
        println!("⚠ No local speech backend found; replies rely on the network backend.");
    }
    if !player_ready {
        println!("⚠ No audio player found; replies cannot be played.");
    }
    if !ollama {
        println!("⚠ Start the answer server with: ollama serve");
    }
    if ffmpeg && player_ready && ollama {
        println!("✓ Ready for conversation.");
    }
}
