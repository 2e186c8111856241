//! Per-turn scratch files.
//!
//! Everything a turn writes lives under one directory and is overwritten by
//! the next turn:
//!
//! ```text
//! <root>/capture.wav   raw microphone capture
//! <root>/upload.m4a    transcoded upload
//! <root>/speech/       whatever speech backends produce
//! <root>/reply.mp3     the promoted, validated reply
//! ```

use crate::audio::sniffer::{AudioArtifact, is_valid_audio_file};
use crate::error::{KiraError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const CAPTURE_FILE: &str = "capture.wav";
const UPLOAD_FILE: &str = "upload.m4a";
const SPEECH_DIR: &str = "speech";
const REPLY_FILE: &str = "reply.mp3";

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create the directory layout under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(SPEECH_DIR))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capture_path(&self) -> PathBuf {
        self.root.join(CAPTURE_FILE)
    }

    pub fn upload_path(&self) -> PathBuf {
        self.root.join(UPLOAD_FILE)
    }

    pub fn speech_dir(&self) -> PathBuf {
        self.root.join(SPEECH_DIR)
    }

    pub fn reply_path(&self) -> PathBuf {
        self.root.join(REPLY_FILE)
    }

    /// Remove speech output left by an earlier turn, including the reply.
    pub fn purge_speech(&self) -> Result<()> {
        let speech = self.speech_dir();
        if speech.exists() {
            fs::remove_dir_all(&speech)?;
        }
        fs::create_dir_all(&speech)?;

        match fs::remove_file(self.reply_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the newest valid file from the speech directory to the reply
    /// path. Every other file there is deleted.
    pub fn promote_newest_valid(&self) -> Result<AudioArtifact> {
        promote_newest_valid(&self.speech_dir(), &self.reply_path())
    }
}

/// Newest first by modification time; file name breaks ties.
fn newest_first(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    files.sort_by(|(ta, pa), (tb, pb)| tb.cmp(ta).then_with(|| pa.cmp(pb)));
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// See [`ScratchDir::promote_newest_valid`].
///
/// # Errors
/// `KiraError::InvalidAudio` when no file in `dir` passes the sniffer.
pub fn promote_newest_valid(dir: &Path, canonical: &Path) -> Result<AudioArtifact> {
    let mut promoted = None;

    for path in newest_first(dir)? {
        if promoted.is_none() && is_valid_audio_file(&path) {
            fs::rename(&path, canonical)?;
            promoted = Some(path);
            continue;
        }
        tracing::debug!(path = %path.display(), "discarding speech output");
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not delete speech output");
        }
    }

    match promoted {
        Some(source) => {
            tracing::debug!(from = %source.display(), to = %canonical.display(), "promoted reply audio");
            AudioArtifact::inspect(canonical)
        }
        None => Err(KiraError::InvalidAudio {
            path: dir.display().to_string(),
            reason: "no valid audio produced".to_string(),
        }),
    }
}
