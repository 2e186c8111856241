//! The live assistant: real collaborators behind [`TurnStages`] and the
//! push-to-talk conversation loop.

use crate::answer::AnswerProvider;
use crate::audio::recorder::{AudioSource, AudioSourceConfig};
use crate::audio::session::{CaptureControl, CaptureSession, transcode_to_upload};
use crate::audio::wav::WavEncoder;
use crate::context::ContextProvider;
use crate::error::{KiraError, Result};
use crate::playback::PlaybackSelector;
use crate::process::CommandExecutor;
use crate::scratch::ScratchDir;
use crate::speech::{SynthesisChain, SynthesisReport, shorten::shorten_reply};
use crate::transcribe::TranscriptionPoller;
use crate::turn::{Orchestrator, TurnFailure, TurnStages, TurnState};
use owo_colors::OwoColorize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[cfg(feature = "cpal-audio")]
use crate::config::Config;

/// Opens a fresh audio source for each capture.
pub type SourceFactory = Box<dyn FnMut() -> Result<Box<dyn AudioSource>> + Send>;

/// Blocks until the user presses Enter.
pub trait Prompt: Send {
    /// Show `message` and wait. `Ok(false)` means input is closed.
    fn wait_for_enter(&mut self, message: &str) -> Result<bool>;
}

pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn wait_for_enter(&mut self, message: &str) -> Result<bool> {
        println!("{}", message);
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok(read > 0)
    }
}

/// The capture in progress, reachable from the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct ActiveCapture(Arc<Mutex<Option<CaptureControl>>>);

impl ActiveCapture {
    fn set(&self, control: Option<CaptureControl>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = control;
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Stop the capture in progress and wait for the device to be released.
    ///
    /// Returns `false` if a capture was running and did not close within
    /// `timeout`.
    pub fn stop_and_wait(&self, timeout: Duration) -> bool {
        let control = self.0.lock().ok().and_then(|mut slot| slot.take());
        match control {
            Some(control) => {
                control.request_stop();
                control.wait_closed(timeout)
            }
            None => true,
        }
    }
}

/// Collaborators used by one live turn.
pub struct LiveStages {
    scratch: ScratchDir,
    audio: AudioSourceConfig,
    open_source: SourceFactory,
    prompt: Box<dyn Prompt>,
    active: ActiveCapture,
    executor: Arc<dyn CommandExecutor>,
    poller: TranscriptionPoller,
    context: ContextProvider,
    answer: Arc<dyn AnswerProvider>,
    synthesis: SynthesisChain,
    playback: PlaybackSelector,
    quiet: bool,
}

impl LiveStages {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scratch: ScratchDir,
        audio: AudioSourceConfig,
        open_source: SourceFactory,
        prompt: Box<dyn Prompt>,
        executor: Arc<dyn CommandExecutor>,
        poller: TranscriptionPoller,
        context: ContextProvider,
        answer: Arc<dyn AnswerProvider>,
        synthesis: SynthesisChain,
        playback: PlaybackSelector,
    ) -> Self {
        Self {
            scratch,
            audio,
            open_source,
            prompt,
            active: ActiveCapture::default(),
            executor,
            poller,
            context,
            answer,
            synthesis,
            playback,
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Handle for stopping a capture from another thread.
    pub fn active_capture(&self) -> ActiveCapture {
        self.active.clone()
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    fn wait_for_enter(&mut self, message: &str) -> Result<bool> {
        self.prompt.wait_for_enter(message)
    }
}

impl TurnStages for LiveStages {
    fn capture(&mut self) -> Result<PathBuf> {
        let path = self.scratch.capture_path();
        let source = (self.open_source)()?;
        let encoder = WavEncoder::create(&path, self.audio.sample_rate, self.audio.channels)?;
        let session = CaptureSession::start(source, Box::new(encoder), &path)?;
        self.active.set(Some(session.control()));

        let waited = self.prompt.wait_for_enter("Recording... Press Enter to stop.");
        self.active.set(None);
        let summary = session.stop()?;
        waited?;

        if summary.samples_written == 0 {
            tracing::warn!("capture finished without any samples");
        }
        tracing::info!(
            samples = summary.samples_written,
            buffers = summary.buffers_written,
            "capture saved"
        );
        Ok(summary.path)
    }

    fn transcode(&mut self, raw: &Path) -> Result<PathBuf> {
        let upload = self.scratch.upload_path();
        transcode_to_upload(self.executor.as_ref(), raw, &upload)?;
        Ok(upload)
    }

    fn transcribe(&mut self, upload: &Path) -> Result<String> {
        let text = self.poller.transcribe(upload)?;
        if !self.quiet && !text.trim().is_empty() {
            println!("{} {}", "You:".bold(), text.trim());
        }
        Ok(text)
    }

    fn answer(&mut self, question: &str) -> Result<String> {
        let context = self.context.full_context(question);
        let reply = self.answer.ask(question, &context)?;
        if !self.quiet {
            println!("{} {}", "Reply:".bold(), reply.trim());
        }
        Ok(reply)
    }

    fn synthesize(&mut self, reply: &str) -> Result<SynthesisReport> {
        let spoken = shorten_reply(reply);
        tracing::debug!(chars = spoken.len(), text = %spoken, "speaking");
        let report = self.synthesis.synthesize(&spoken)?;
        for attempt in &report.attempts {
            tracing::debug!(backend = %attempt.name, outcome = %attempt.outcome, "speech attempt");
        }
        Ok(report)
    }

    fn play(&mut self, speech: &SynthesisReport) -> Result<String> {
        self.playback.play(speech.artifact.path())
    }
}

fn announce(state: TurnState) {
    let message = match state {
        TurnState::Transcoding => "Converting audio...",
        TurnState::Transcribing => "Transcribing audio...",
        TurnState::Answering => "Thinking...",
        TurnState::Synthesizing => "Generating audio...",
        TurnState::Playing => "Playing reply...",
        TurnState::Idle | TurnState::Capturing => return,
    };
    eprintln!("{}", message.dimmed());
}

fn failure_hint(failure: &TurnFailure) -> &'static str {
    match &failure.error {
        KiraError::EmptyTranscript => "Nothing was heard. Speak a little longer and try again.",
        KiraError::TranscriptionTimeout { .. } => {
            "Transcription took too long. Try a shorter question."
        }
        KiraError::ToolNotFound { tool } if tool == "ffmpeg" => {
            "ffmpeg is required to prepare the recording. Install it and retry."
        }
        KiraError::SynthesisExhausted { .. } => {
            "No speech backend worked. Run `kira check` to see what is installed."
        }
        _ => "Ready for the next question.",
    }
}

/// Push-to-talk loop: one turn per Enter until input closes.
///
/// Turn failures are reported and the loop continues; only a failure to read
/// the prompt ends it early.
pub fn run_conversation(stages: LiveStages, quiet: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new(stages).with_observer(move |_, state| {
        if !quiet {
            announce(state);
        }
    });

    println!("{}", "Conversation mode. Press Ctrl+C to exit.".green());

    loop {
        let next = orchestrator.sequence() + 1;
        println!("\n{}", format!("Conversation #{}", next).bold());
        if !orchestrator
            .stages_mut()
            .wait_for_enter("Press Enter to start recording...")?
        {
            tracing::info!("input closed");
            return Ok(());
        }

        match orchestrator.run_turn() {
            Ok(turn) => {
                if !quiet {
                    println!(
                        "{} {}",
                        "Done".green(),
                        format!("(voice: {}, player: {})", turn.speech.backend(), turn.player)
                            .dimmed()
                    );
                }
            }
            Err(failure) => {
                eprintln!("{}", failure.to_string().red());
                eprintln!("{}", failure_hint(&failure).dimmed());
            }
        }
    }
}

/// Options from the command line that shape the live stages.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub quiet: bool,
    /// Overrides the transcription polling budget.
    pub max_wait: Option<Duration>,
}

/// Wire the live stages from configuration.
///
/// The answer server must be reachable; everything else is checked lazily,
/// turn by turn.
#[cfg(feature = "cpal-audio")]
pub fn build_live_stages(config: &Config, options: &RunOptions) -> Result<LiveStages> {
    use crate::answer::OllamaClient;
    use crate::audio::capture::CpalAudioSource;
    use crate::context::OpenWeatherClient;
    use crate::process::SystemCommandExecutor;
    use crate::speech::backends;
    use crate::transcribe::{AssemblyAiClient, PollPolicy};

    if !options.quiet {
        eprintln!("Checking that Ollama is available...");
    }
    let ollama = OllamaClient::new(&config.answer)?;
    ollama.check_status()?;
    if !options.quiet {
        eprintln!("{} (model: {})", "Ollama is up".green(), ollama.model());
    }

    if config.transcription.api_key.is_empty() {
        tracing::warn!("transcription.api_key is not set; transcription requests will fail");
    }

    let scratch = ScratchDir::create(&config.scratch_dir())?;
    tracing::debug!(dir = %scratch.root().display(), "scratch directory");

    let executor: Arc<dyn CommandExecutor> = Arc::new(SystemCommandExecutor::new());

    let audio = AudioSourceConfig {
        sample_rate: config.audio.sample_rate,
        channels: config.audio.channels,
    };
    let device = config.audio.device.clone();
    let source_config = audio.clone();
    let open_source: SourceFactory = Box::new(move || {
        let source = CpalAudioSource::open(device.as_deref(), source_config.clone())?;
        Ok(Box::new(source) as Box<dyn AudioSource>)
    });

    let mut policy = PollPolicy::from_config(&config.transcription);
    if let Some(total) = options.max_wait {
        policy = policy.with_max_wait(total);
    }
    let poller = TranscriptionPoller::new(
        Arc::new(AssemblyAiClient::new(&config.transcription)?),
        policy,
    );

    let context = ContextProvider::new(
        Arc::new(OpenWeatherClient::new(&config.weather)?),
        &config.weather.default_city,
        &config.answer.assistant_name,
    );

    let synthesis = SynthesisChain::new(
        backends::from_config(&config.synthesis, executor.clone())?,
        scratch.clone(),
    );
    tracing::debug!(backends = ?synthesis.backend_names(), "speech backends");

    let playback = PlaybackSelector::from_config(&config.playback, executor.clone());

    Ok(LiveStages::new(
        scratch,
        audio,
        open_source,
        Box::new(StdinPrompt),
        executor,
        poller,
        context,
        Arc::new(ollama),
        synthesis,
        playback,
    )
    .quiet(options.quiet))
}
