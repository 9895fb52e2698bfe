use serde_json::{json, Value};
use thiserror::Error;

use crate::transcription::domain::chunk_result::{
    ChunkOutcome, FileTranscription, TranscriptionStatus,
};

#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("cannot assemble {file}: every chunk failed")]
    NothingTranscribed { file: String },
}

/// Per-file artifacts derived from one [`FileTranscription`].
#[derive(Clone, Debug, PartialEq)]
pub struct AssembledTranscript {
    /// Lossy view: successful chunk texts in index order.
    pub raw_text: String,
    /// Durable record: every chunk with its status and raw response or error.
    pub json_payload: Value,
}

pub struct TranscriptAssembler;

impl TranscriptAssembler {
    /// Joins successful chunk texts by index with a single space. Failed
    /// chunks contribute no text; they show up in `failed_chunks` and in the
    /// per-chunk list of the payload.
    pub fn assemble(transcription: &FileTranscription) -> Result<AssembledTranscript, AssemblyError> {
        if transcription.status() == TranscriptionStatus::Failed {
            return Err(AssemblyError::NothingTranscribed {
                file: transcription.source().to_string(),
            });
        }

        let mut ordered: Vec<_> = transcription.results().iter().collect();
        ordered.sort_by_key(|r| r.index);

        let raw_text = ordered
            .iter()
            .filter_map(|r| r.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let chunks: Vec<Value> = ordered
            .iter()
            .map(|r| match &r.outcome {
                ChunkOutcome::Success { text, raw_payload } => json!({
                    "index": r.index,
                    "status": "success",
                    "attempts": r.attempts,
                    "text": text,
                    "response": raw_payload,
                }),
                ChunkOutcome::Failed {
                    error_kind,
                    message,
                } => json!({
                    "index": r.index,
                    "status": "failed",
                    "attempts": r.attempts,
                    "error": { "kind": error_kind, "message": message },
                }),
            })
            .collect();

        let json_payload = json!({
            "source": transcription.source(),
            "status": transcription.status(),
            "chunk_count": ordered.len(),
            "failed_chunks": transcription.failed_indices(),
            "text": raw_text,
            "chunks": chunks,
        });

        Ok(AssembledTranscript {
            raw_text,
            json_payload,
        })
    }

    /// Merges already-refined chunk texts by sequence index, separated by a
    /// blank line. Input order is irrelevant; blank parts are dropped.
    pub fn merge(mut parts: Vec<(usize, String)>) -> String {
        parts.sort_by_key(|(index, _)| *index);
        parts
            .iter()
            .map(|(_, text)| text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
