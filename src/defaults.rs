//! Default configuration constants for kira.
//!
//! Shared by the configuration types and the components that fall back to
//! them when a value is not configured.

/// Capture sample rate in Hz.
///
/// The recording is transcoded and uploaded, so there is no need to match a
/// local speech model; CD rate keeps the upload faithful.
pub const SAMPLE_RATE: u32 = 44_100;

/// Capture channel count (mono).
pub const CHANNELS: u16 = 1;

/// Files smaller than this are never treated as playable audio.
pub const MIN_AUDIO_BYTES: u64 = 1000;

/// Number of leading bytes the sniffer inspects.
pub const HEADER_BYTES: usize = 100;

/// Delay between transcription status checks.
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Status checks before a transcription job is abandoned (about three minutes
/// at the default interval).
pub const MAX_POLL_ATTEMPTS: u32 = 180;

/// Timeout for a single HTTP request to any remote collaborator.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Replies longer than this are packed down before synthesis.
pub const LONG_REPLY_CHARS: usize = 250;

/// Character budget for the packed reply, before the ellipsis.
pub const PACKED_REPLY_CHARS: usize = 147;

/// Marker appended to a packed reply.
pub const ELLIPSIS: &str = "...";

/// Weather replies keep at most this many sentences.
pub const WEATHER_SENTENCES: usize = 3;

/// Inputs longer than this are cut by the short network backend.
pub const SHORT_INPUT_CHARS: usize = 100;

/// Word budget of the short network backend.
pub const SHORT_INPUT_WORDS: usize = 15;

/// City used when a weather question names none.
pub const DEFAULT_CITY: &str = "Bucharest";

/// Name the assistant introduces itself with.
pub const ASSISTANT_NAME: &str = "Kira";

/// Default answer model served by Ollama.
pub const ANSWER_MODEL: &str = "llama3.2";

/// Default speech backend order.
pub const SPEECH_BACKENDS: &[&str] = &["say", "network-short", "network", "espeak"];

/// Default player order. The first element of each entry is the program.
pub const PLAYERS: &[&[&str]] = &[
    &["afplay"],
    &["ffplay", "-nodisp", "-autoexit"],
    &["mpg123"],
    &["open"],
];
