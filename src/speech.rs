//! Transcription service adapter.
//!
//! Converts an audio byte stream into a plain-text transcript through an
//! external speech-to-text service. The audio is staged in a scoped
//! temporary file that is removed on every exit path. Service failure is
//! never fatal: the adapter logs a warning and returns an empty
//! transcript so later stages can still run.

use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Cannot reach speech service at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Speech service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Speech-to-text service abstraction (allows mocking).
pub trait SpeechClient: Send + Sync {
    /// Transcribe the audio file at `path` in a single blocking call.
    fn transcribe_file(&self, path: &Path) -> Result<String, TranscriptionError>;
}

/// OpenAI-compatible transcription client posting multipart audio.
pub struct OpenAiSpeechClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiSpeechClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.speech_model.clone(),
            client,
            timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Response body from /audio/transcriptions
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl SpeechClient for OpenAiSpeechClient {
    fn transcribe_file(&self, path: &Path) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let form = reqwest::blocking::multipart::Form::new()
            .text("model", self.model.clone())
            .file("file", path)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    TranscriptionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    TranscriptionError::Timeout(self.timeout_secs)
                } else {
                    TranscriptionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranscriptionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .map_err(|e| TranscriptionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.text)
    }
}

/// Mock speech client for testing — returns a configurable transcript or failure.
pub struct MockSpeechClient {
    reply: Result<String, String>,
}

impl MockSpeechClient {
    pub fn new(transcript: &str) -> Self {
        Self {
            reply: Ok(transcript.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
        }
    }
}

impl SpeechClient for MockSpeechClient {
    fn transcribe_file(&self, _path: &Path) -> Result<String, TranscriptionError> {
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(TranscriptionError::HttpClient(msg.clone())),
        }
    }
}

/// Wraps a [`SpeechClient`] with the temp-file staging and the
/// never-fails contract the pipeline relies on.
pub struct TranscriptionAdapter {
    client: Box<dyn SpeechClient>,
}

impl TranscriptionAdapter {
    pub fn new(client: Box<dyn SpeechClient>) -> Self {
        Self { client }
    }

    /// Transcribe raw audio bytes.
    ///
    /// On any failure, logs a warning and returns `""` — an empty
    /// transcript is a valid degenerate input for every later stage.
    pub fn transcribe(&self, audio: &[u8]) -> String {
        match self.try_transcribe(audio) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed, continuing with empty transcript");
                String::new()
            }
        }
    }

    fn try_transcribe(&self, audio: &[u8]) -> Result<String, TranscriptionError> {
        // NamedTempFile removes the file when dropped, on success and
        // failure alike.
        let mut staged = tempfile::Builder::new().suffix(".wav").tempfile()?;
        staged.write_all(audio)?;
        staged.flush()?;
        self.client.transcribe_file(staged.path())
    }
}
