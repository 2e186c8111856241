//! AssemblyAI client: upload, create transcript, read transcript.

use crate::config::TranscriptionConfig;
use crate::error::Result;
use crate::http;
use crate::transcribe::service::{JobStatus, TranscriptionService, parse_status};
use reqwest::blocking::Client;
use serde::Serialize;
use std::fs;
use std::path::Path;

const SERVICE: &str = "assemblyai";

#[derive(Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
}

pub struct AssemblyAiClient {
    client: Client,
    upload_url: String,
    transcript_url: String,
    api_key: String,
}

impl AssemblyAiClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            upload_url: config.upload_url.clone(),
            transcript_url: config.transcript_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Upload raw bytes; returns the service-side URL of the upload.
    pub fn upload(&self, path: &Path) -> Result<String> {
        let data = fs::read(path)?;
        tracing::debug!(bytes = data.len(), "uploading audio");

        let response = self
            .client
            .post(&self.upload_url)
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(data)
            .send()?;
        let body = http::json_body(SERVICE, response)?;
        Ok(http::string_field(SERVICE, &body, "upload_url")?.to_string())
    }

    /// Start a transcript for an uploaded file; returns the job id.
    pub fn create_transcript(&self, audio_url: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.transcript_url)
            .header("authorization", &self.api_key)
            .json(&TranscriptRequest { audio_url })
            .send()?;
        let body = http::json_body(SERVICE, response)?;
        Ok(http::string_field(SERVICE, &body, "id")?.to_string())
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.transcript_url, job_id)
    }
}

impl TranscriptionService for AssemblyAiClient {
    fn submit(&self, path: &Path) -> Result<String> {
        let audio_url = self.upload(path)?;
        self.create_transcript(&audio_url)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .header("authorization", &self.api_key)
            .send()?;
        let body = http::json_body(SERVICE, response)?;
        parse_status(SERVICE, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_url_joins_without_double_slash() {
        let config = TranscriptionConfig {
            transcript_url: "https://api.assemblyai.com/v2/transcript/".to_string(),
            ..TranscriptionConfig::default()
        };
        let client = AssemblyAiClient::new(&config).unwrap();

        assert_eq!(
            client.job_url("5551722-f677"),
            "https://api.assemblyai.com/v2/transcript/5551722-f677"
        );
    }

    #[test]
    fn transcript_request_shape() {
        let body = serde_json::to_value(TranscriptRequest {
            audio_url: "https://cdn.assemblyai.com/upload/x",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"audio_url": "https://cdn.assemblyai.com/upload/x"})
        );
    }

    #[test]
    fn upload_of_missing_file_is_io_error() {
        let client = AssemblyAiClient::new(&TranscriptionConfig::default()).unwrap();
        assert!(matches!(
            client.upload(Path::new("/nonexistent/upload.m4a")),
            Err(crate::error::KiraError::Io(_))
        ));
    }
}
