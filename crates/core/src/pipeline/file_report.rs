use std::fmt;
use std::time::Duration;

use crate::transcription::domain::api_error::ErrorKind;
use crate::transcription::domain::chunk_result::{
    ChunkOutcome, FileTranscription, TranscriptionStatus,
};

use super::pipeline_error::PipelineError;

/// Terminal state of one source file within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Complete,
    Partial,
    Failed,
    /// Already transcribed by an earlier run.
    Skipped,
}

impl From<TranscriptionStatus> for FileStatus {
    fn from(status: TranscriptionStatus) -> Self {
        match status {
            TranscriptionStatus::Complete => Self::Complete,
            TranscriptionStatus::Partial => Self::Partial,
            TranscriptionStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChunkFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileReport {
    pub file: String,
    pub status: FileStatus,
    pub chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    pub cleaned: bool,
    pub error: Option<String>,
    /// Refinement failed after the transcript was saved; `status` still
    /// describes the transcription and a later clean run resumes it.
    pub clean_error: Option<String>,
    pub elapsed: Duration,
}

impl FileReport {
    pub fn new(file: &str, status: FileStatus) -> Self {
        Self {
            file: file.to_string(),
            status,
            chunks: 0,
            failed_chunks: Vec::new(),
            cleaned: false,
            error: None,
            clean_error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn from_transcription(file: &str, transcription: &FileTranscription) -> Self {
        Self {
            chunks: transcription.results().len(),
            failed_chunks: transcription
                .results()
                .iter()
                .filter_map(|r| match &r.outcome {
                    ChunkOutcome::Failed {
                        error_kind,
                        message,
                    } => Some(ChunkFailure {
                        index: r.index,
                        kind: *error_kind,
                        message: message.clone(),
                        attempts: r.attempts,
                    }),
                    ChunkOutcome::Success { .. } => None,
                })
                .collect(),
            ..Self::new(file, transcription.status().into())
        }
    }

    pub fn failed(file: &str, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(file, FileStatus::Failed)
        }
    }

    /// Failed report for `error`, keeping per-chunk detail when every chunk
    /// of the file was attempted and failed.
    pub fn from_error(file: &str, error: &PipelineError) -> Self {
        match error.failed_transcription() {
            Some(transcription) => Self {
                status: FileStatus::Failed,
                error: Some(error.to_string()),
                ..Self::from_transcription(file, transcription)
            },
            None => Self::failed(file, error),
        }
    }
}

/// Outcome of one batch run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub reports: Vec<FileReport>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn count(&self, status: FileStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(FileStatus::Failed) > 0
    }
}
