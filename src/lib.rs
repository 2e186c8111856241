//! kira - push-to-talk voice assistant
//!
//! One turn records a spoken question, transcribes it remotely, asks a local
//! model for a reply and speaks the reply through the first speech backend
//! and audio player that work on this host.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod answer;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod context;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
pub mod fallback;
pub mod http;
pub mod playback;
pub mod process;
pub mod scratch;
pub mod speech;
pub mod transcribe;
pub mod turn;

// Composition root: live collaborators and the conversation loop
#[cfg(feature = "cli")]
pub mod app;

// Seams (stage -> collaborator)
pub use answer::AnswerProvider;
pub use audio::recorder::AudioSource;
pub use context::WeatherSource;
pub use process::{CommandExecutor, SystemCommandExecutor};
pub use speech::SpeechBackend;
pub use transcribe::TranscriptionService;

// Turn
pub use turn::{ConversationTurn, Orchestrator, TurnFailure, TurnStages, TurnState};

// Error handling
pub use error::{KiraError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
