//! Playback through whichever audio player the host has.

use crate::audio::sniffer::AudioArtifact;
use crate::config::PlaybackConfig;
use crate::error::{KiraError, Result};
use crate::fallback::{AttemptOutcome, Named, OrderedFallback};
use crate::process::CommandExecutor;
use std::path::Path;
use std::sync::Arc;

/// A player program and the arguments that go before the file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    /// `None` for an empty entry.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Named for Player {
    fn name(&self) -> &str {
        &self.program
    }
}

pub struct PlaybackSelector {
    players: OrderedFallback<Player>,
    executor: Arc<dyn CommandExecutor>,
}

impl PlaybackSelector {
    pub fn new(players: Vec<Player>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            players: OrderedFallback::new(players),
            executor,
        }
    }

    pub fn from_config(config: &PlaybackConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let players = config
            .players
            .iter()
            .filter_map(|entry| Player::from_command(entry))
            .collect();
        Self::new(players, executor)
    }

    /// Play the file at `path` with the first player that works.
    ///
    /// The file is sniffed again first: it may have changed since synthesis.
    /// Returns the program that played it.
    pub fn play(&self, path: &Path) -> Result<String> {
        let artifact = AudioArtifact::inspect(path).map_err(|e| KiraError::PlaybackFailed {
            message: e.to_string(),
        })?;
        let file = artifact.path().to_string_lossy().into_owned();

        let run = self.players.run(|player| {
            if !self.executor.is_available(&player.program) {
                return Err(AttemptOutcome::Unavailable);
            }
            let mut args: Vec<&str> = player.args.iter().map(String::as_str).collect();
            args.push(&file);

            tracing::debug!(player = %player.program, "playing reply");
            self.executor
                .execute(&player.program, &args)
                .map(|_| player.program.clone())
                .map_err(|e| {
                    tracing::warn!(player = %player.program, error = %e, "player failed");
                    AttemptOutcome::BackendError(e.to_string())
                })
        });

        run.value.ok_or_else(|| {
            let tried = run
                .attempts
                .iter()
                .filter(|a| a.outcome != AttemptOutcome::Unavailable)
                .count();
            KiraError::PlaybackFailed {
                message: if tried == 0 {
                    "no audio player found".to_string()
                } else {
                    format!("all {} available players failed", tried)
                },
            }
        })
    }
}
