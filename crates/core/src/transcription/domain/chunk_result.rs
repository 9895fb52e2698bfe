use std::fmt;

use serde::Serialize;

use super::api_error::ErrorKind;

#[derive(Clone, Debug, PartialEq)]
pub enum ChunkOutcome {
    Success {
        text: String,
        raw_payload: serde_json::Value,
    },
    Failed {
        error_kind: ErrorKind,
        message: String,
    },
}

/// Outcome of transcribing one chunk, tagged with its sequence index.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub outcome: ChunkOutcome,
    pub attempts: u32,
}

impl ChunkResult {
    pub fn success(index: usize, text: impl Into<String>, raw_payload: serde_json::Value) -> Self {
        Self {
            index,
            outcome: ChunkOutcome::Success {
                text: text.into(),
                raw_payload,
            },
            attempts: 1,
        }
    }

    pub fn failed(index: usize, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            index,
            outcome: ChunkOutcome::Failed {
                error_kind,
                message: message.into(),
            },
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Success { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ChunkOutcome::Success { text, .. } => Some(text),
            ChunkOutcome::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            ChunkOutcome::Failed { error_kind, .. } => Some(*error_kind),
            ChunkOutcome::Success { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    Complete,
    Partial,
    Failed,
}

impl fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        })
    }
}

/// All chunk outcomes of one source file, ordered by sequence index.
#[derive(Clone, Debug, PartialEq)]
pub struct FileTranscription {
    source: String,
    results: Vec<ChunkResult>,
    status: TranscriptionStatus,
}

impl FileTranscription {
    /// Sorts `results` by index and derives the aggregate status.
    /// No results at all counts as `Failed`.
    pub fn from_results(source: impl Into<String>, mut results: Vec<ChunkResult>) -> Self {
        results.sort_by_key(|r| r.index);
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let status = if succeeded == 0 {
            TranscriptionStatus::Failed
        } else if succeeded == results.len() {
            TranscriptionStatus::Complete
        } else {
            TranscriptionStatus::Partial
        };
        Self {
            source: source.into(),
            results,
            status,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn results(&self) -> &[ChunkResult] {
        &self.results
    }

    pub fn status(&self) -> TranscriptionStatus {
        self.status
    }

    /// `(index, kind, message)` of every failed chunk, in order.
    pub fn failures(&self) -> Vec<(usize, ErrorKind, String)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                ChunkOutcome::Failed {
                    error_kind,
                    message,
                } => Some((r.index, *error_kind, message.clone())),
                ChunkOutcome::Success { .. } => None,
            })
            .collect()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures().into_iter().map(|(i, _, _)| i).collect()
    }
}
