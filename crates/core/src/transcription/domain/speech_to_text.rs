use std::path::Path;

use super::api_error::ApiError;

/// Text plus the full structured response it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptionResponse {
    pub text: String,
    pub payload: serde_json::Value,
}

/// Domain interface for the remote speech-recognition capability.
pub trait SpeechToText: Send {
    /// Cheap authenticated call used once before any file is processed.
    fn verify_credentials(&self) -> Result<(), ApiError> {
        Ok(())
    }

    fn transcribe(&self, audio: &Path) -> Result<TranscriptionResponse, ApiError>;
}
