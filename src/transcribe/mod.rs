//! Remote transcription of the recorded question.

pub mod assemblyai;
pub mod poller;
pub mod service;

pub use assemblyai::AssemblyAiClient;
pub use poller::{PollPolicy, TranscriptionPoller};
pub use service::{JobStatus, MockTranscriptionService, TranscriptionService};
