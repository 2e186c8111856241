//! Built-in speech backends.

use crate::config::SynthesisConfig;
use crate::error::{KiraError, Result};
use crate::http;
use crate::process::CommandExecutor;
use crate::speech::shorten::first_words;
use crate::speech::SpeechBackend;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const SAY: &str = "say";
pub const ESPEAK: &str = "espeak";
pub const NETWORK_SHORT: &str = "network-short";
pub const NETWORK: &str = "network";

/// Names accepted in `synthesis.backends`.
pub const KNOWN_BACKENDS: &[&str] = &[SAY, ESPEAK, NETWORK_SHORT, NETWORK];

/// Build the configured backends in order.
pub fn from_config(
    config: &SynthesisConfig,
    executor: Arc<dyn CommandExecutor>,
) -> Result<Vec<Box<dyn SpeechBackend>>> {
    config
        .backends
        .iter()
        .map(|name| -> Result<Box<dyn SpeechBackend>> {
            match name.as_str() {
                SAY => Ok(Box::new(SayBackend::new(
                    Arc::clone(&executor),
                    &config.voice,
                    config.rate,
                ))),
                ESPEAK => Ok(Box::new(EspeakBackend::new(
                    Arc::clone(&executor),
                    &config.language,
                ))),
                NETWORK_SHORT => Ok(Box::new(NetworkBackend::new(config, true)?)),
                NETWORK => Ok(Box::new(NetworkBackend::new(config, false)?)),
                other => Err(KiraError::ConfigInvalidValue {
                    key: "synthesis.backends".to_string(),
                    message: format!("unknown backend '{}'", other),
                }),
            }
        })
        .collect()
}

/// macOS `say`, converted to MP3 when ffmpeg is around.
pub struct SayBackend {
    executor: Arc<dyn CommandExecutor>,
    voice: String,
    rate: u32,
}

impl SayBackend {
    pub fn new(executor: Arc<dyn CommandExecutor>, voice: &str, rate: u32) -> Self {
        Self {
            executor,
            voice: voice.to_string(),
            rate,
        }
    }
}

impl SpeechBackend for SayBackend {
    fn name(&self) -> &str {
        SAY
    }

    fn is_available(&self) -> bool {
        self.executor.is_available("say")
    }

    fn synthesize(&self, text: &str, out_dir: &Path) -> Result<()> {
        let aiff = out_dir.join("say.aiff");
        let aiff_arg = aiff.to_string_lossy();
        let rate = self.rate.to_string();

        self.executor.execute(
            "say",
            &["-v", &self.voice, "-r", &rate, "-o", &aiff_arg, text],
        )?;

        if !self.executor.is_available("ffmpeg") {
            // AIFF plays fine with afplay.
            return Ok(());
        }

        let mp3 = out_dir.join("say.mp3");
        let mp3_arg = mp3.to_string_lossy();
        let converted = self.executor.execute(
            "ffmpeg",
            &[
                "-y", "-i", &aiff_arg, "-codec:a", "libmp3lame", "-b:a", "128k", &mp3_arg,
            ],
        );
        if let Err(e) = fs::remove_file(&aiff) {
            tracing::debug!(error = %e, "intermediate AIFF not removed");
        }
        converted.map(|_| ())
    }
}

/// `espeak-ng` writing WAV.
pub struct EspeakBackend {
    executor: Arc<dyn CommandExecutor>,
    voice: String,
}

impl EspeakBackend {
    pub fn new(executor: Arc<dyn CommandExecutor>, voice: &str) -> Self {
        Self {
            executor,
            voice: voice.to_string(),
        }
    }
}

impl SpeechBackend for EspeakBackend {
    fn name(&self) -> &str {
        ESPEAK
    }

    fn is_available(&self) -> bool {
        self.executor.is_available("espeak-ng")
    }

    fn synthesize(&self, text: &str, out_dir: &Path) -> Result<()> {
        let wav = out_dir.join("espeak.wav");
        let wav_arg = wav.to_string_lossy();
        self.executor
            .execute("espeak-ng", &["-v", &self.voice, "-w", &wav_arg, text])
            .map(|_| ())
    }
}

/// Google Translate's speech endpoint.
///
/// The endpoint answers some requests with an HTML page and a 200, so the
/// body is written as-is and left for the sniffer to judge.
pub struct NetworkBackend {
    client: reqwest::blocking::Client,
    url: String,
    language: String,
    short: bool,
}

impl NetworkBackend {
    /// `short` cuts long inputs to their first words before sending.
    pub fn new(config: &SynthesisConfig, short: bool) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.network_url.clone(),
            language: config.language.clone(),
            short,
        })
    }

    fn request_url(&self, text: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(
            &self.url,
            &[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", text),
            ],
        )
        .map_err(|e| KiraError::ConfigInvalidValue {
            key: "synthesis.network_url".to_string(),
            message: e.to_string(),
        })
    }
}

impl SpeechBackend for NetworkBackend {
    fn name(&self) -> &str {
        if self.short { NETWORK_SHORT } else { NETWORK }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn prepare(&self, text: &str) -> String {
        if self.short {
            first_words(text)
        } else {
            text.to_string()
        }
    }

    fn synthesize(&self, text: &str, out_dir: &Path) -> Result<()> {
        let url = self.request_url(text)?;
        let response = self.client.get(url).send()?;
        let bytes = http::ensure_success("speech endpoint", response)?.bytes()?;

        let file_name = if self.short { "network-short.mp3" } else { "network.mp3" };
        fs::write(out_dir.join(file_name), &bytes)?;
        Ok(())
    }
}
