use crate::defaults;
use crate::error::{KiraError, Result};
use crate::speech::backends::KNOWN_BACKENDS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub scratch: ScratchConfig,
    pub transcription: TranscriptionConfig,
    pub answer: AnswerConfig,
    pub weather: WeatherConfig,
    pub synthesis: SynthesisConfig,
    pub playback: PlaybackConfig,
}

/// Microphone capture
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Where per-turn files are written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ScratchConfig {
    /// Defaults to `<cache dir>/kira`.
    pub dir: Option<PathBuf>,
}

/// Remote speech-to-text service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub upload_url: String,
    pub transcript_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

/// Reply generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnswerConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub assistant_name: String,
}

/// Weather lookups for weather questions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub default_city: String,
}

/// Speech synthesis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Backends in the order they are tried.
    pub backends: Vec<String>,
    /// Voice for the `say` backend.
    pub voice: String,
    /// Words per minute for the `say` backend.
    pub rate: u32,
    /// Language for the network and espeak backends.
    pub language: String,
    pub network_url: String,
    pub timeout_secs: u64,
}

/// Audio players
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Each entry is a program followed by its leading arguments; the file
    /// path is appended.
    pub players: Vec<Vec<String>>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://api.assemblyai.com/v2/upload".to_string(),
            transcript_url: "https://api.assemblyai.com/v2/transcript".to_string(),
            api_key: String::new(),
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            max_poll_attempts: defaults::MAX_POLL_ATTEMPTS,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: defaults::ANSWER_MODEL.to_string(),
            timeout_secs: 120,
            assistant_name: defaults::ASSISTANT_NAME.to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openweathermap.org/data/2.5/forecast".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
            default_city: defaults::DEFAULT_CITY.to_string(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backends: defaults::SPEECH_BACKENDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            voice: "Samantha".to_string(),
            rate: 180,
            language: "en".to_string(),
            network_url: "https://translate.google.com/translate_tts".to_string(),
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            players: defaults::PLAYERS
                .iter()
                .map(|entry| entry.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KiraError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                KiraError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file is missing.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(KiraError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - KIRA_TRANSCRIPTION_API_KEY → transcription.api_key
    /// - KIRA_WEATHER_API_KEY → weather.api_key
    /// - KIRA_ANSWER_MODEL → answer.model
    /// - KIRA_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_env("KIRA_TRANSCRIPTION_API_KEY") {
            self.transcription.api_key = key;
        }
        if let Some(key) = non_empty_env("KIRA_WEATHER_API_KEY") {
            self.weather.api_key = key;
        }
        if let Some(model) = non_empty_env("KIRA_ANSWER_MODEL") {
            self.answer.model = model;
        }
        if let Some(device) = non_empty_env("KIRA_AUDIO_DEVICE") {
            self.audio.device = Some(device);
        }
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.channels == 0 {
            return Err(invalid("audio.channels", "must be positive"));
        }
        if self.transcription.max_poll_attempts == 0 {
            return Err(invalid("transcription.max_poll_attempts", "must be positive"));
        }
        if self.synthesis.backends.is_empty() {
            return Err(invalid("synthesis.backends", "at least one backend is required"));
        }
        if let Some(unknown) = self
            .synthesis
            .backends
            .iter()
            .find(|name| !KNOWN_BACKENDS.contains(&name.as_str()))
        {
            return Err(invalid(
                "synthesis.backends",
                &format!(
                    "unknown backend '{}' (expected one of: {})",
                    unknown,
                    KNOWN_BACKENDS.join(", ")
                ),
            ));
        }
        if self.playback.players.iter().any(|entry| entry.is_empty()) {
            return Err(invalid("playback.players", "every entry needs a program"));
        }
        Ok(())
    }

    /// Scratch directory, falling back to `<cache dir>/kira`.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("kira")
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| KiraError::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Write the configuration, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/kira/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kira")
            .join("config.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn invalid(key: &str, message: &str) -> KiraError {
    KiraError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_kira_env() {
        remove_env("KIRA_TRANSCRIPTION_API_KEY");
        remove_env("KIRA_WEATHER_API_KEY");
        remove_env("KIRA_ANSWER_MODEL");
        remove_env("KIRA_AUDIO_DEVICE");
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 1);

        assert_eq!(config.transcription.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.transcription.max_poll_attempts, 180);
        assert!(config.transcription.api_key.is_empty());

        assert_eq!(config.answer.model, "llama3.2");
        assert_eq!(config.answer.assistant_name, "Kira");
        assert_eq!(config.weather.default_city, "Bucharest");

        assert_eq!(
            config.synthesis.backends,
            vec!["say", "network-short", "network", "espeak"]
        );
        assert_eq!(config.playback.players[0], vec!["afplay"]);
        assert_eq!(
            config.playback.players[1],
            vec!["ffplay", "-nodisp", "-autoexit"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [audio]
            device = "MacBook Pro Microphone"
            sample_rate = 48000

            [transcription]
            api_key = "secret"
            max_poll_attempts = 30

            [weather]
            default_city = "Cluj-Napoca"

            [synthesis]
            backends = ["espeak", "network"]
            voice = "Alex"

            [playback]
            players = [["mpv", "--no-video"]]
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.device.as_deref(), Some("MacBook Pro Microphone"));
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.transcription.api_key, "secret");
        assert_eq!(config.transcription.max_poll_attempts, 30);
        assert_eq!(config.weather.default_city, "Cluj-Napoca");
        assert_eq!(config.synthesis.backends, vec!["espeak", "network"]);
        assert_eq!(config.synthesis.voice, "Alex");
        assert_eq!(config.synthesis.rate, 180);
        assert_eq!(config.playback.players, vec![vec!["mpv", "--no-video"]]);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [answer]
            model = "mistral"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.answer.model, "mistral");
        assert_eq!(config.answer.url, "http://localhost:11434");
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.synthesis, SynthesisConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_kira_env();

        set_env("KIRA_TRANSCRIPTION_API_KEY", "aai-key");
        set_env("KIRA_WEATHER_API_KEY", "owm-key");
        set_env("KIRA_ANSWER_MODEL", "qwen2.5");
        set_env("KIRA_AUDIO_DEVICE", "pulse");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.transcription.api_key, "aai-key");
        assert_eq!(config.weather.api_key, "owm-key");
        assert_eq!(config.answer.model, "qwen2.5");
        assert_eq!(config.audio.device, Some("pulse".to_string()));

        clear_kira_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_kira_env();

        set_env("KIRA_ANSWER_MODEL", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.answer.model, "llama3.2");

        clear_kira_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [audio
            device = "broken
        "#,
        );

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(KiraError::Config(_))
        ));
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_kira_config_12345.toml");

        assert!(matches!(
            Config::load(missing_path),
            Err(KiraError::ConfigFileNotFound { .. })
        ));
        assert_eq!(Config::load_or_default(missing_path).unwrap(), Config::default());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = Config::default();
        config.synthesis.backends = vec!["say".to_string(), "festival".to_string()];

        match config.validate() {
            Err(KiraError::ConfigInvalidValue { key, message }) => {
                assert_eq!(key, "synthesis.backends");
                assert!(message.contains("festival"));
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transcription.max_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.playback.players.push(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_then_load_keeps_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.scratch.dir = Some(PathBuf::from("/tmp/kira-scratch"));
        config.synthesis.backends = vec!["espeak".to_string()];

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_scratch_dir_fallback() {
        let config = Config::default();
        assert!(config.scratch_dir().ends_with("kira"));

        let mut config = Config::default();
        config.scratch.dir = Some(PathBuf::from("/tmp/elsewhere"));
        assert_eq!(config.scratch_dir(), PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn test_default_path_ends_with_kira_config() {
        let path = Config::default_path();
        assert!(path.ends_with("kira/config.toml"));
    }
}
