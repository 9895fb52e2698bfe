use std::path::PathBuf;

use thiserror::Error;

use crate::chunking::domain::audio_splitter::SplitError;
use crate::chunking::domain::chunk_plan::PlanningError;
use crate::transcript::domain::transcript_assembler::AssemblyError;
use crate::transcript::infrastructure::transcript_store::StoreError;
use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::chunk_result::FileTranscription;

use super::chunk_transcription_coordinator::CoordinationError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Aborts the whole run, not just the current file.
    #[error("authentication failed: {0}")]
    Authentication(ApiError),
    #[error("cannot read input directory {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Planning(#[from] PlanningError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Coordination(CoordinationError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("refinement of chunk {index} failed: {error}")]
    Refinement { index: usize, error: ApiError },
    #[error("{file} would overwrite the artifacts of {first} (both named {stem:?})")]
    NameCollision {
        file: String,
        stem: String,
        first: String,
    },
}

impl PipelineError {
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Whether another whole-file attempt might help: only when every chunk
    /// failed with a retryable error.
    pub fn is_all_chunks_failed(&self) -> bool {
        matches!(
            self,
            Self::Coordination(CoordinationError::AllChunksFailed { .. })
        )
    }

    pub fn failed_transcription(&self) -> Option<&FileTranscription> {
        match self {
            Self::Coordination(CoordinationError::AllChunksFailed { transcription, .. }) => {
                Some(transcription)
            }
            _ => None,
        }
    }
}

impl From<CoordinationError> for PipelineError {
    fn from(err: CoordinationError) -> Self {
        match err {
            CoordinationError::Authentication { error, .. } => Self::Authentication(error),
            other => Self::Coordination(other),
        }
    }
}
