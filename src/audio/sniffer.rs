//! Binary header classification for candidate audio files.
//!
//! Speech backends are unreliable: a network backend may save an HTML error
//! page under an `.mp3` name and still report success. Everything that is
//! handed to the player goes through [`AudioArtifact::inspect`] first.

use crate::defaults::{HEADER_BYTES, MIN_AUDIO_BYTES};
use crate::error::{KiraError, Result};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Container recognised from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mpeg,
    Aiff,
    Wav,
    /// No known signature, accepted by the permissive default.
    Unknown,
}

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    TooSmall,
    HtmlPayload,
    Empty,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::TooSmall => write!(f, "smaller than {} bytes", MIN_AUDIO_BYTES),
            InvalidReason::HtmlPayload => write!(f, "contains an HTML document"),
            InvalidReason::Empty => write!(f, "no readable header"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid(AudioFormat),
    Invalid(InvalidReason),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid(_))
    }
}

const HTML_MARKERS: &[&str] = &["<!doctype", "<html"];

/// Classify a file from its leading bytes and total size.
///
/// Order matters: the size floor and the HTML check run before any signature
/// match so an error page can never pass as audio.
pub fn classify(header: &[u8], size: u64) -> Verdict {
    if size < MIN_AUDIO_BYTES {
        return Verdict::Invalid(InvalidReason::TooSmall);
    }
    if header.is_empty() {
        return Verdict::Invalid(InvalidReason::Empty);
    }

    let text = String::from_utf8_lossy(header).to_lowercase();
    if HTML_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Verdict::Invalid(InvalidReason::HtmlPayload);
    }

    Verdict::Valid(signature(header).unwrap_or(AudioFormat::Unknown))
}

fn signature(header: &[u8]) -> Option<AudioFormat> {
    match header {
        // 11-bit MPEG audio frame sync
        [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(AudioFormat::Mpeg),
        [b'I', b'D', b'3', ..] => Some(AudioFormat::Mpeg),
        [b'F', b'O', b'R', b'M', ..] => Some(AudioFormat::Aiff),
        [b'R', b'I', b'F', b'F', ..] => Some(AudioFormat::Wav),
        _ => None,
    }
}

/// Read the size and first [`HEADER_BYTES`] of a file and classify it.
pub fn sniff_file(path: &Path) -> Result<(Verdict, u64, Vec<u8>)> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut header = Vec::with_capacity(HEADER_BYTES);
    file.by_ref()
        .take(HEADER_BYTES as u64)
        .read_to_end(&mut header)?;

    Ok((classify(&header, size), size, header))
}

/// A file that passed sniffing.
///
/// Fields are private: the only way to obtain one is [`AudioArtifact::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    path: PathBuf,
    size_bytes: u64,
    header: Vec<u8>,
    format: AudioFormat,
}

impl AudioArtifact {
    /// Validate the file at `path`.
    ///
    /// # Errors
    /// `KiraError::InvalidAudio` if the sniffer rejects it, `KiraError::Io` if
    /// it cannot be read.
    pub fn inspect(path: &Path) -> Result<Self> {
        let (verdict, size_bytes, header) = sniff_file(path)?;
        match verdict {
            Verdict::Valid(format) => Ok(Self {
                path: path.to_path_buf(),
                size_bytes,
                header,
                format,
            }),
            Verdict::Invalid(reason) => Err(KiraError::InvalidAudio {
                path: path.display().to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

/// True when the file exists and passes [`classify`].
pub fn is_valid_audio_file(path: &Path) -> bool {
    matches!(sniff_file(path), Ok((verdict, _, _)) if verdict.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn padded(prefix: &[u8], size: usize) -> Vec<u8> {
        let mut data = prefix.to_vec();
        data.resize(size, 0x55);
        data
    }

    #[test]
    fn test_small_inputs_are_invalid_whatever_the_signature() {
        for prefix in [&b"RIFF"[..], b"FORM", &[0xFF, 0xFB], b"hello"] {
            for size in [0u64, 1, 500, 999] {
                assert_eq!(
                    classify(prefix, size),
                    Verdict::Invalid(InvalidReason::TooSmall),
                    "prefix {:?} size {}",
                    prefix,
                    size
                );
            }
        }
    }

    #[test]
    fn test_html_is_invalid_regardless_of_size() {
        let pages: [&[u8]; 4] = [
            b"<!DOCTYPE html><html><body>quota</body></html>",
            b"<html><head><title>Error 403</title>",
            b"\n\n  <HTML>",
            b"RIFF....<html>",
        ];
        for page in pages {
            for size in [1000u64, 5000, 10_000_000] {
                assert_eq!(
                    classify(page, size),
                    Verdict::Invalid(InvalidReason::HtmlPayload)
                );
            }
        }
    }

    #[test]
    fn test_known_signatures_are_valid() {
        assert_eq!(
            classify(&padded(b"RIFF", 100), 1000),
            Verdict::Valid(AudioFormat::Wav)
        );
        assert_eq!(
            classify(&padded(b"FORM", 100), 4096),
            Verdict::Valid(AudioFormat::Aiff)
        );
        assert_eq!(
            classify(&padded(&[0xFF, 0xFB, 0x90], 100), 2000),
            Verdict::Valid(AudioFormat::Mpeg)
        );
        assert_eq!(
            classify(&padded(&[0xFF, 0xF3], 100), 2000),
            Verdict::Valid(AudioFormat::Mpeg)
        );
        assert_eq!(
            classify(&padded(b"ID3", 100), 2000),
            Verdict::Valid(AudioFormat::Mpeg)
        );
    }

    #[test]
    fn test_ff_without_frame_sync_is_not_mpeg() {
        assert_eq!(
            classify(&padded(&[0xFF, 0x10], 100), 2000),
            Verdict::Valid(AudioFormat::Unknown)
        );
    }

    #[test]
    fn test_unknown_non_html_content_is_accepted() {
        assert_eq!(
            classify(&padded(b"OggS", 100), 2000),
            Verdict::Valid(AudioFormat::Unknown)
        );
    }

    #[test]
    fn test_empty_header_with_large_size_is_invalid() {
        assert_eq!(
            classify(&[], 5000),
            Verdict::Invalid(InvalidReason::Empty)
        );
    }

    #[test]
    fn test_inspect_reads_header_and_size() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&padded(b"RIFF", 4000)).unwrap();

        let artifact = AudioArtifact::inspect(file.path()).unwrap();
        assert_eq!(artifact.size_bytes(), 4000);
        assert_eq!(artifact.header().len(), HEADER_BYTES);
        assert_eq!(artifact.format(), AudioFormat::Wav);
        assert_eq!(artifact.path(), file.path());
    }

    #[test]
    fn test_inspect_rejects_error_page() {
        let mut file = NamedTempFile::new().unwrap();
        let mut page = b"<!DOCTYPE html><html>".to_vec();
        page.resize(3000, b' ');
        file.write_all(&page).unwrap();

        match AudioArtifact::inspect(file.path()) {
            Err(KiraError::InvalidAudio { reason, .. }) => {
                assert!(reason.contains("HTML"));
            }
            other => panic!("Expected InvalidAudio, got {:?}", other),
        }
        assert!(!is_valid_audio_file(file.path()));
    }

    #[test]
    fn test_missing_file_is_not_valid() {
        assert!(!is_valid_audio_file(Path::new("/nonexistent/reply.mp3")));
        assert!(matches!(
            AudioArtifact::inspect(Path::new("/nonexistent/reply.mp3")),
            Err(KiraError::Io(_))
        ));
    }
}
