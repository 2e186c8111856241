//! Error types for kira.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KiraError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio encoding failed: {message}")]
    AudioEncode { message: String },

    // External process errors
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    CommandFailed { tool: String, message: String },

    // Remote service errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {body}")]
    ServiceStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {service}: {message}")]
    MalformedResponse { service: String, message: String },

    // Transcription errors
    #[error("Transcription job {job_id} failed: {message}")]
    TranscriptionFailed { job_id: String, message: String },

    #[error("Transcription job {job_id} not finished after {attempts} status checks")]
    TranscriptionTimeout { job_id: String, attempts: u32 },

    #[error("Transcript is empty")]
    EmptyTranscript,

    // Synthesis and playback errors
    #[error("Invalid audio file {path}: {reason}")]
    InvalidAudio { path: String, reason: String },

    #[error("All speech backends failed ({attempts} attempts)")]
    SynthesisExhausted { attempts: usize },

    #[error("Audio playback failed: {message}")]
    PlaybackFailed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl KiraError {
    /// Build a `MalformedResponse` for the named service.
    pub fn malformed(service: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, KiraError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = KiraError::ConfigInvalidValue {
            key: "audio.sample_rate".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.sample_rate: must be positive"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = KiraError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_command_failed_display() {
        let error = KiraError::CommandFailed {
            tool: "ffmpeg".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(error.to_string(), "ffmpeg failed: exit status 1");
    }

    #[test]
    fn test_malformed_helper() {
        let error = KiraError::malformed("assemblyai", "missing status");
        assert_eq!(
            error.to_string(),
            "Malformed response from assemblyai: missing status"
        );
    }

    #[test]
    fn test_transcription_timeout_display() {
        let error = KiraError::TranscriptionTimeout {
            job_id: "abc".to_string(),
            attempts: 3,
        };
        assert_eq!(
            error.to_string(),
            "Transcription job abc not finished after 3 status checks"
        );
    }

    #[test]
    fn test_synthesis_exhausted_display() {
        let error = KiraError::SynthesisExhausted { attempts: 4 };
        assert_eq!(error.to_string(), "All speech backends failed (4 attempts)");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: KiraError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: KiraError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: KiraError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KiraError>();
        assert_sync::<KiraError>();
    }
}
