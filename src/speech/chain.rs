use crate::audio::sniffer::AudioArtifact;
use crate::error::{KiraError, Result};
use crate::fallback::{Attempt, AttemptOutcome, OrderedFallback};
use crate::scratch::ScratchDir;
use crate::speech::SpeechBackend;

/// Outcome of a successful synthesis.
#[derive(Debug)]
pub struct SynthesisReport {
    /// Validated audio at the scratch reply path.
    pub artifact: AudioArtifact,
    /// Every backend tried, in order; the last one succeeded.
    pub attempts: Vec<Attempt>,
}

impl SynthesisReport {
    pub fn backend(&self) -> &str {
        self.attempts.last().map(|a| a.name.as_str()).unwrap_or_default()
    }
}

/// Tries backends in order until one leaves valid audio behind.
pub struct SynthesisChain {
    backends: OrderedFallback<Box<dyn SpeechBackend>>,
    scratch: ScratchDir,
}

impl SynthesisChain {
    pub fn new(backends: Vec<Box<dyn SpeechBackend>>, scratch: ScratchDir) -> Self {
        Self {
            backends: OrderedFallback::new(backends),
            scratch,
        }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.candidates().iter().map(|b| b.name()).collect()
    }

    /// Synthesize `text` to the scratch reply path.
    ///
    /// Stale speech output is purged before the first backend runs and again
    /// before each retry, so a file can only be promoted by the backend that
    /// wrote it.
    ///
    /// # Errors
    /// `KiraError::SynthesisExhausted` when no backend produced valid audio.
    pub fn synthesize(&self, text: &str) -> Result<SynthesisReport> {
        self.scratch.purge_speech()?;
        let out_dir = self.scratch.speech_dir();

        let run = self.backends.run(|backend| {
            if !backend.is_available() {
                return Err(AttemptOutcome::Unavailable);
            }
            self.scratch
                .purge_speech()
                .map_err(|e| AttemptOutcome::BackendError(e.to_string()))?;

            let prepared = backend.prepare(text);
            backend.synthesize(&prepared, &out_dir).map_err(|e| {
                tracing::warn!(backend = backend.name(), error = %e, "speech backend failed");
                AttemptOutcome::BackendError(e.to_string())
            })?;

            self.scratch.promote_newest_valid().map_err(|e| {
                tracing::warn!(backend = backend.name(), error = %e, "speech backend produced unusable audio");
                AttemptOutcome::InvalidOutput(e.to_string())
            })
        });

        match run.value {
            Some(artifact) => {
                tracing::info!(
                    backend = run.attempts.last().map(|a| a.name.as_str()).unwrap_or_default(),
                    bytes = artifact.size_bytes(),
                    "reply synthesized"
                );
                Ok(SynthesisReport {
                    artifact,
                    attempts: run.attempts,
                })
            }
            None => Err(KiraError::SynthesisExhausted {
                attempts: run.attempts.len(),
            }),
        }
    }
}
