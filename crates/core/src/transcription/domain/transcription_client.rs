use serde_json::{json, Value};

use crate::chunking::domain::audio_chunk::AudioChunk;

use super::api_error::{ApiError, ErrorKind};
use super::chunk_result::ChunkResult;
use super::speech_to_text::SpeechToText;

/// One transcription call for one chunk, with the outcome classified.
///
/// Never retries; the coordinator owns the retry loop.
pub struct TranscriptionClient {
    backend: Box<dyn SpeechToText>,
}

impl TranscriptionClient {
    pub fn new(backend: Box<dyn SpeechToText>) -> Self {
        Self { backend }
    }

    pub fn verify_credentials(&self) -> Result<(), ApiError> {
        self.backend.verify_credentials()
    }

    pub fn transcribe_chunk(&self, chunk: &AudioChunk) -> ChunkResult {
        if !chunk.path.is_file() {
            return ChunkResult::failed(
                chunk.index,
                ErrorKind::Unexpected,
                format!("chunk file not found: {}", chunk.path.display()),
            );
        }

        match self.backend.transcribe(&chunk.path) {
            Ok(response) => {
                log::debug!(
                    "Chunk {} transcribed: {} characters",
                    chunk.index,
                    response.text.len()
                );
                let payload = with_file_info(response.payload, &response.text, chunk);
                ChunkResult::success(chunk.index, response.text, payload)
            }
            Err(e) => ChunkResult::failed(chunk.index, e.kind, e.message),
        }
    }
}

/// Attaches chunk provenance to the raw response. Non-object payloads are
/// wrapped so the provenance always has somewhere to live.
fn with_file_info(payload: Value, text: &str, chunk: &AudioChunk) -> Value {
    let info = json!({
        "chunk_filename": chunk.file_name(),
        "file_size": chunk.size_bytes,
        "chunk_index": chunk.index,
    });
    match payload {
        Value::Object(mut map) => {
            map.insert("file_info".to_string(), info);
            Value::Object(map)
        }
        _ => json!({ "text": text, "file_info": info }),
    }
}
