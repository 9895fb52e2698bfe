use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart::Form;

use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::speech_to_text::{SpeechToText, TranscriptionResponse};

use super::openai_http::{check_status, transport_error, OpenAiHttp};

/// Long enough for a full-size upload on a slow link, short enough that one
/// stuck request cannot hold the batch forever.
pub const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(600);

/// Whisper-style `audio/transcriptions` endpoint.
pub struct OpenAiSpeechToText {
    http: OpenAiHttp,
    model: String,
}

impl OpenAiSpeechToText {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: OpenAiHttp::new(api_key, base_url, TRANSCRIPTION_TIMEOUT)?,
            model: model.to_string(),
        })
    }
}

impl SpeechToText for OpenAiSpeechToText {
    fn verify_credentials(&self) -> Result<(), ApiError> {
        self.http.verify_credentials()
    }

    fn transcribe(&self, audio: &Path) -> Result<TranscriptionResponse, ApiError> {
        let form = Form::new()
            .file("file", audio)
            .map_err(|e| {
                ApiError::unexpected(format!("failed to read {}: {e}", audio.display()))
            })?
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .http
            .post("audio/transcriptions")
            .multipart(form)
            .send()
            .map_err(transport_error)?;
        let payload: serde_json::Value = check_status(response)?.json().map_err(transport_error)?;
        parse_transcription(payload)
    }
}

fn parse_transcription(payload: serde_json::Value) -> Result<TranscriptionResponse, ApiError> {
    let text = payload["text"]
        .as_str()
        .ok_or_else(|| ApiError::unexpected("transcription response has no text field"))?
        .to_string();
    Ok(TranscriptionResponse { text, payload })
}
