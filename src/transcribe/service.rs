use crate::error::{KiraError, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Status of a remote transcription job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed(String),
    /// The service gave up on the job; carries its error message.
    Error(String),
    /// A status string this client does not know.
    Other(String),
}

/// Remote speech-to-text service with asynchronous jobs.
pub trait TranscriptionService: Send + Sync {
    /// Upload the audio at `path` and start a job. Returns the job id.
    fn submit(&self, path: &Path) -> Result<String>;

    /// Current status of `job_id`.
    fn status(&self, job_id: &str) -> Result<JobStatus>;
}

/// Interpret a job status document.
///
/// `status` must be a string, and a completed job must carry string `text`.
pub fn parse_status(service: &str, body: &Value) -> Result<JobStatus> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| KiraError::malformed(service, "missing or non-string 'status'"))?;

    Ok(match status {
        "queued" => JobStatus::Queued,
        "processing" => JobStatus::Processing,
        "completed" => {
            let text = body
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| KiraError::malformed(service, "completed job without 'text'"))?;
            JobStatus::Completed(text.to_string())
        }
        "error" => JobStatus::Error(
            body.get("error")
                .and_then(Value::as_str)
                .unwrap_or("no error message")
                .to_string(),
        ),
        other => JobStatus::Other(other.to_string()),
    })
}

/// Scripted transcription service for tests.
///
/// Status results are returned in order; once the script runs out every
/// further check reports `Processing`.
#[derive(Debug)]
pub struct MockTranscriptionService {
    job_id: String,
    submit_error: Mutex<Option<KiraError>>,
    statuses: Mutex<VecDeque<Result<JobStatus>>>,
    submitted: Mutex<Vec<PathBuf>>,
    status_checks: Mutex<u32>,
}

impl MockTranscriptionService {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            submit_error: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            status_checks: Mutex::new(0),
        }
    }

    pub fn with_status(self, status: JobStatus) -> Self {
        if let Ok(mut queue) = self.statuses.lock() {
            queue.push_back(Ok(status));
        }
        self
    }

    pub fn with_status_error(self, error: KiraError) -> Self {
        if let Ok(mut queue) = self.statuses.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    pub fn with_submit_error(self, error: KiraError) -> Self {
        if let Ok(mut slot) = self.submit_error.lock() {
            *slot = Some(error);
        }
        self
    }

    pub fn status_checks(&self) -> u32 {
        self.status_checks.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<PathBuf> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TranscriptionService for MockTranscriptionService {
    fn submit(&self, path: &Path) -> Result<String> {
        if let Some(error) = self.submit_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(error);
        }
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(path.to_path_buf());
        }
        Ok(self.job_id.clone())
    }

    fn status(&self, _job_id: &str) -> Result<JobStatus> {
        if let Ok(mut checks) = self.status_checks.lock() {
            *checks += 1;
        }
        self.statuses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(Ok(JobStatus::Processing))
    }
}
