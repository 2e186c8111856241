use crate::config::TranscriptionConfig;
use crate::error::{KiraError, Result};
use crate::transcribe::service::{JobStatus, TranscriptionService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How long to keep asking about a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }

    /// Replace the attempt budget so polling lasts about `total`.
    pub fn with_max_wait(self, total: Duration) -> Self {
        let per_attempt = self.interval.max(Duration::from_millis(1));
        let attempts = (total.as_millis() / per_attempt.as_millis()).max(1);
        Self {
            max_attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            ..self
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&TranscriptionConfig::default())
    }
}

/// Blocking poll loop over a [`TranscriptionService`].
pub struct TranscriptionPoller {
    service: Arc<dyn TranscriptionService>,
    policy: PollPolicy,
}

impl TranscriptionPoller {
    pub fn new(service: Arc<dyn TranscriptionService>, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submit `path` and wait for its transcript.
    pub fn transcribe(&self, path: &Path) -> Result<String> {
        let job_id = self.service.submit(path)?;
        tracing::debug!(job_id = %job_id, "transcription submitted");
        self.poll(&job_id)
    }

    /// Wait for `job_id` to complete.
    ///
    /// Queued, processing and unknown statuses are retried after the policy
    /// interval. A service error, a malformed status or a transport failure
    /// ends the wait at once.
    pub fn poll(&self, job_id: &str) -> Result<String> {
        for attempt in 1..=self.policy.max_attempts {
            match self.service.status(job_id)? {
                JobStatus::Completed(text) => {
                    tracing::debug!(job_id, attempt, "transcription completed");
                    return Ok(text);
                }
                JobStatus::Error(message) => {
                    return Err(KiraError::TranscriptionFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                JobStatus::Queued | JobStatus::Processing => {
                    tracing::trace!(job_id, attempt, "transcription pending");
                }
                JobStatus::Other(status) => {
                    tracing::warn!(job_id, attempt, %status, "unknown transcription status");
                }
            }

            if attempt < self.policy.max_attempts {
                std::thread::sleep(self.policy.interval);
            }
        }

        Err(KiraError::TranscriptionTimeout {
            job_id: job_id.to_string(),
            attempts: self.policy.max_attempts,
        })
    }
}
