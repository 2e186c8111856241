//! Text-to-speech through an ordered chain of unreliable backends.

pub mod backends;
pub mod chain;
pub mod shorten;

pub use chain::{SynthesisChain, SynthesisReport};

use crate::error::Result;
use crate::fallback::Named;
use std::path::Path;

/// One way of turning text into an audio file.
///
/// A backend writes whatever it produces into `out_dir`; the chain decides
/// afterwards whether any of it is usable.
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap host probe (program on PATH and the like).
    fn is_available(&self) -> bool;

    /// Backend-specific input shaping. Must only cut on word boundaries.
    fn prepare(&self, text: &str) -> String {
        text.to_string()
    }

    fn synthesize(&self, text: &str, out_dir: &Path) -> Result<()>;
}

impl Named for Box<dyn SpeechBackend> {
    fn name(&self) -> &str {
        (**self).name()
    }
}
