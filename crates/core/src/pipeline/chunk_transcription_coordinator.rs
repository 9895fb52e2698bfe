use std::time::Duration;

use thiserror::Error;

use crate::chunking::domain::audio_chunk::AudioChunk;
use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::chunk_result::{
    ChunkOutcome, ChunkResult, FileTranscription, TranscriptionStatus,
};
use crate::transcription::domain::retry_scheduler::RetryScheduler;
use crate::transcription::domain::transcription_client::TranscriptionClient;

use super::retrying::{thread_sleeper, with_retry, Sleeper};

#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("chunk {index} rejected: {error}")]
    Authentication { index: usize, error: ApiError },
    #[error("{file}: all {chunks} chunks failed")]
    AllChunksFailed {
        file: String,
        chunks: usize,
        transcription: FileTranscription,
    },
    #[error("{file}: no chunks to transcribe")]
    NoChunks { file: String },
}

/// Transcribes the chunks of one file strictly in index order.
///
/// Each chunk is retried with class-specific backoff up to `max_attempts`.
/// A fixed delay separates consecutive chunks whatever their outcome.
/// Authentication failures stop the file at once; any other chunk failure is
/// absorbed unless every chunk of the file fails.
pub struct ChunkTranscriptionCoordinator {
    client: TranscriptionClient,
    scheduler: RetryScheduler,
    max_attempts: u32,
    inter_chunk_delay: Duration,
    sleeper: Sleeper,
}

impl ChunkTranscriptionCoordinator {
    pub fn new(
        client: TranscriptionClient,
        scheduler: RetryScheduler,
        max_attempts: u32,
        inter_chunk_delay: Duration,
    ) -> Self {
        Self {
            client,
            scheduler,
            max_attempts: max_attempts.max(1),
            inter_chunk_delay,
            sleeper: thread_sleeper(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn verify_credentials(&self) -> Result<(), ApiError> {
        self.client.verify_credentials()
    }

    pub fn transcribe_file(
        &self,
        file: &str,
        chunks: &[AudioChunk],
    ) -> Result<FileTranscription, CoordinationError> {
        if chunks.is_empty() {
            return Err(CoordinationError::NoChunks {
                file: file.to_string(),
            });
        }

        let mut ordered: Vec<&AudioChunk> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.index);

        let mut results = Vec::with_capacity(ordered.len());
        for (position, chunk) in ordered.iter().enumerate() {
            if position > 0 && !self.inter_chunk_delay.is_zero() {
                (self.sleeper)(self.inter_chunk_delay);
            }

            log::info!(
                "{file}: transcribing chunk {}/{} ({})",
                position + 1,
                ordered.len(),
                chunk.file_name()
            );

            let result = self.transcribe_with_retry(file, chunk);
            if let ChunkOutcome::Failed {
                error_kind,
                message,
            } = &result.outcome
            {
                if !error_kind.is_retryable() {
                    return Err(CoordinationError::Authentication {
                        index: chunk.index,
                        error: ApiError::new(*error_kind, message.clone()),
                    });
                }
            }
            results.push(result);
        }

        let transcription = FileTranscription::from_results(file, results);
        if transcription.status() == TranscriptionStatus::Failed {
            return Err(CoordinationError::AllChunksFailed {
                file: file.to_string(),
                chunks: transcription.results().len(),
                transcription,
            });
        }
        Ok(transcription)
    }

    fn transcribe_with_retry(&self, file: &str, chunk: &AudioChunk) -> ChunkResult {
        let label = format!("{file} chunk {}", chunk.index);
        let (outcome, attempts) = with_retry(
            &self.scheduler,
            self.max_attempts,
            self.sleeper.as_ref(),
            &label,
            || {
                let result = self.client.transcribe_chunk(chunk);
                match result.outcome {
                    ChunkOutcome::Success { text, raw_payload } => Ok((text, raw_payload)),
                    ChunkOutcome::Failed {
                        error_kind,
                        message,
                    } => Err(ApiError::new(error_kind, message)),
                }
            },
        );

        let result = match outcome {
            Ok((text, payload)) => ChunkResult::success(chunk.index, text, payload),
            Err(e) => ChunkResult::failed(chunk.index, e.kind, e.message),
        };
        result.with_attempts(attempts)
    }
}
