//! One conversation turn: record a question, transcribe it, answer it and
//! speak the answer.
//!
//! The orchestrator only sequences stages and tracks state; the stages
//! themselves live behind [`TurnStages`] so tests can fail any one of them.

use crate::error::{KiraError, Result};
use crate::speech::SynthesisReport;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the orchestrator is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Capturing,
    Transcoding,
    Transcribing,
    Answering,
    Synthesizing,
    Playing,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Capturing => "capturing",
            TurnState::Transcoding => "transcoding",
            TurnState::Transcribing => "transcribing",
            TurnState::Answering => "answering",
            TurnState::Synthesizing => "synthesizing",
            TurnState::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// The work behind each state.
pub trait TurnStages {
    /// Record the question; returns the raw capture.
    fn capture(&mut self) -> Result<PathBuf>;

    /// Convert the raw capture into the upload format.
    fn transcode(&mut self, raw: &Path) -> Result<PathBuf>;

    fn transcribe(&mut self, upload: &Path) -> Result<String>;

    fn answer(&mut self, question: &str) -> Result<String>;

    fn synthesize(&mut self, reply: &str) -> Result<SynthesisReport>;

    /// Play the reply; returns the player that succeeded.
    fn play(&mut self, speech: &SynthesisReport) -> Result<String>;
}

/// A completed turn.
#[derive(Debug)]
pub struct ConversationTurn {
    pub sequence: u64,
    pub transcript: String,
    pub reply: String,
    pub speech: SynthesisReport,
    pub player: String,
}

/// A turn that stopped at `stage`.
#[derive(Debug)]
pub struct TurnFailure {
    pub sequence: u64,
    pub stage: TurnState,
    pub error: KiraError,
}

impl fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turn {} failed while {}: {}",
            self.sequence, self.stage, self.error
        )
    }
}

impl std::error::Error for TurnFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

type StateObserver = Box<dyn FnMut(u64, TurnState) + Send>;

/// Drives [`TurnStages`] through one turn at a time.
pub struct Orchestrator<S> {
    stages: S,
    sequence: u64,
    state: TurnState,
    observer: Option<StateObserver>,
}

impl<S: TurnStages> Orchestrator<S> {
    pub fn new(stages: S) -> Self {
        Self {
            stages,
            sequence: 0,
            state: TurnState::Idle,
            observer: None,
        }
    }

    /// Call `observer` with `(sequence, state)` on every transition.
    pub fn with_observer(mut self, observer: impl FnMut(u64, TurnState) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Number of turns started so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut S {
        &mut self.stages
    }

    /// Run one full turn. The state is `Idle` again when this returns,
    /// whatever the outcome.
    pub fn run_turn(&mut self) -> std::result::Result<ConversationTurn, TurnFailure> {
        self.sequence += 1;
        let sequence = self.sequence;
        let _span = tracing::info_span!("turn", sequence).entered();

        let result = self.walk_stages();
        self.enter(TurnState::Idle);

        match result {
            Ok(turn) => {
                tracing::info!(
                    backend = turn.speech.backend(),
                    player = %turn.player,
                    "turn complete"
                );
                Ok(turn)
            }
            Err((stage, error)) => {
                tracing::warn!(%stage, error = %error, "turn failed");
                Err(TurnFailure {
                    sequence,
                    stage,
                    error,
                })
            }
        }
    }

    fn walk_stages(&mut self) -> std::result::Result<ConversationTurn, (TurnState, KiraError)> {
        let raw = self.step(TurnState::Capturing, |s| s.capture())?;
        let upload = self.step(TurnState::Transcoding, |s| s.transcode(&raw))?;

        let transcript = self.step(TurnState::Transcribing, |s| {
            let text = s.transcribe(&upload)?;
            let text = text.trim();
            if text.is_empty() {
                return Err(KiraError::EmptyTranscript);
            }
            Ok(text.to_string())
        })?;
        tracing::info!(%transcript, "question");

        let reply = self.step(TurnState::Answering, |s| s.answer(&transcript))?;
        tracing::info!(%reply, "reply");

        let speech = self.step(TurnState::Synthesizing, |s| s.synthesize(&reply))?;
        let player = self.step(TurnState::Playing, |s| s.play(&speech))?;

        Ok(ConversationTurn {
            sequence: self.sequence,
            transcript,
            reply,
            speech,
            player,
        })
    }

    fn step<T>(
        &mut self,
        stage: TurnState,
        run: impl FnOnce(&mut S) -> Result<T>,
    ) -> std::result::Result<T, (TurnState, KiraError)> {
        self.enter(stage);
        run(&mut self.stages).map_err(|e| (stage, e))
    }

    fn enter(&mut self, state: TurnState) {
        self.state = state;
        tracing::debug!(%state, "turn state");
        if let Some(observer) = self.observer.as_mut() {
            observer(self.sequence, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sniffer::AudioArtifact;
    use crate::fallback::{Attempt, AttemptOutcome};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct ScriptedStages {
        dir: TempDir,
        fail_at: Option<TurnState>,
        transcript: String,
        calls: Vec<TurnState>,
    }

    impl ScriptedStages {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                fail_at: None,
                transcript: "What time is it?".to_string(),
                calls: Vec::new(),
            }
        }

        fn failing_at(stage: TurnState) -> Self {
            Self {
                fail_at: Some(stage),
                ..Self::new()
            }
        }

        fn check(&mut self, stage: TurnState) -> Result<()> {
            self.calls.push(stage);
            if self.fail_at == Some(stage) {
                return Err(KiraError::Other(format!("{} broke", stage)));
            }
            Ok(())
        }
    }

    impl TurnStages for ScriptedStages {
        fn capture(&mut self) -> Result<PathBuf> {
            self.check(TurnState::Capturing)?;
            Ok(self.dir.path().join("capture.wav"))
        }

        fn transcode(&mut self, raw: &Path) -> Result<PathBuf> {
            self.check(TurnState::Transcoding)?;
            Ok(raw.with_extension("m4a"))
        }

        fn transcribe(&mut self, _upload: &Path) -> Result<String> {
            self.check(TurnState::Transcribing)?;
            Ok(self.transcript.clone())
        }

        fn answer(&mut self, question: &str) -> Result<String> {
            self.check(TurnState::Answering)?;
            Ok(format!("You asked: {}", question))
        }

        fn synthesize(&mut self, _reply: &str) -> Result<SynthesisReport> {
            self.check(TurnState::Synthesizing)?;
            let path = self.dir.path().join("reply.wav");
            let mut bytes = b"RIFF".to_vec();
            bytes.resize(2048, 0);
            std::fs::write(&path, bytes)?;
            Ok(SynthesisReport {
                artifact: AudioArtifact::inspect(&path)?,
                attempts: vec![Attempt {
                    name: "fake".to_string(),
                    position: 0,
                    outcome: AttemptOutcome::Success,
                }],
            })
        }

        fn play(&mut self, _speech: &SynthesisReport) -> Result<String> {
            self.check(TurnState::Playing)?;
            Ok("afplay".to_string())
        }
    }

    const STAGES: [TurnState; 6] = [
        TurnState::Capturing,
        TurnState::Transcoding,
        TurnState::Transcribing,
        TurnState::Answering,
        TurnState::Synthesizing,
        TurnState::Playing,
    ];

    #[test]
    fn successful_turn_walks_every_stage() {
        let mut orchestrator = Orchestrator::new(ScriptedStages::new());

        let turn = orchestrator.run_turn().unwrap();

        assert_eq!(turn.sequence, 1);
        assert_eq!(turn.transcript, "What time is it?");
        assert_eq!(turn.reply, "You asked: What time is it?");
        assert_eq!(turn.speech.backend(), "fake");
        assert_eq!(turn.player, "afplay");
        assert_eq!(orchestrator.stages().calls, STAGES.to_vec());
        assert_eq!(orchestrator.state(), TurnState::Idle);
    }

    #[test]
    fn any_failing_stage_returns_to_idle() {
        for (i, stage) in STAGES.iter().enumerate() {
            let mut orchestrator = Orchestrator::new(ScriptedStages::failing_at(*stage));

            let failure = orchestrator.run_turn().unwrap_err();

            assert_eq!(failure.stage, *stage);
            assert_eq!(failure.sequence, 1);
            assert_eq!(orchestrator.state(), TurnState::Idle);
            assert_eq!(orchestrator.sequence(), 1);
            // Nothing after the failing stage ran.
            assert_eq!(orchestrator.stages().calls, STAGES[..=i].to_vec());
        }
    }

    #[test]
    fn blank_transcript_fails_transcribing() {
        let mut stages = ScriptedStages::new();
        stages.transcript = "  \n ".to_string();
        let mut orchestrator = Orchestrator::new(stages);

        let failure = orchestrator.run_turn().unwrap_err();

        assert_eq!(failure.stage, TurnState::Transcribing);
        assert!(matches!(failure.error, KiraError::EmptyTranscript));
        assert!(!orchestrator.stages().calls.contains(&TurnState::Answering));
    }

    #[test]
    fn transcript_is_trimmed() {
        let mut stages = ScriptedStages::new();
        stages.transcript = "  Hello there \n".to_string();
        let mut orchestrator = Orchestrator::new(stages);

        let turn = orchestrator.run_turn().unwrap();

        assert_eq!(turn.transcript, "Hello there");
    }

    #[test]
    fn sequence_counts_failed_and_successful_turns() {
        let mut orchestrator = Orchestrator::new(ScriptedStages::failing_at(TurnState::Answering));

        assert!(orchestrator.run_turn().is_err());
        orchestrator.stages.fail_at = None;
        let turn = orchestrator.run_turn().unwrap();

        assert_eq!(turn.sequence, 2);
        assert_eq!(orchestrator.sequence(), 2);
    }

    #[test]
    fn observer_sees_every_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut orchestrator = Orchestrator::new(ScriptedStages::failing_at(TurnState::Answering))
            .with_observer(move |seq, state| sink.lock().unwrap().push((seq, state)));

        assert!(orchestrator.run_turn().is_err());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, TurnState::Capturing),
                (1, TurnState::Transcoding),
                (1, TurnState::Transcribing),
                (1, TurnState::Answering),
                (1, TurnState::Idle),
            ]
        );
    }

    #[test]
    fn failure_message_names_stage() {
        let failure = TurnFailure {
            sequence: 3,
            stage: TurnState::Synthesizing,
            error: KiraError::SynthesisExhausted { attempts: 4 },
        };
        let text = failure.to_string();
        assert!(text.starts_with("turn 3 failed while synthesizing:"));
    }
}
