use crate::transcript::domain::transcript_assembler::TranscriptAssembler;
use crate::transcript::infrastructure::transcript_store::TranscriptStore;
use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::retry_scheduler::RetryScheduler;
use crate::transcription::domain::text_refiner::TextRefiner;

use super::pipeline_error::PipelineError;
use super::retrying::{thread_sleeper, with_retry, Sleeper};

/// Refines a transcript chunk by chunk and merges the result.
///
/// Every refined chunk is persisted on its own before the next request, so
/// an interrupted or failed run resumes where it stopped. The merged
/// `.clean.txt` is written only once every chunk is refined.
pub struct TranscriptCleaner {
    refiner: Box<dyn TextRefiner>,
    scheduler: RetryScheduler,
    max_attempts: u32,
    sleeper: Sleeper,
}

impl TranscriptCleaner {
    pub fn new(refiner: Box<dyn TextRefiner>, scheduler: RetryScheduler, max_attempts: u32) -> Self {
        Self {
            refiner,
            scheduler,
            max_attempts: max_attempts.max(1),
            sleeper: thread_sleeper(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn verify_credentials(&self) -> Result<(), ApiError> {
        self.refiner.verify_credentials()
    }

    /// Returns `false` when a clean transcript already existed.
    pub fn clean(
        &self,
        store: &TranscriptStore,
        stem: &str,
        parts: &[(usize, String)],
    ) -> Result<bool, PipelineError> {
        if store.has_clean(stem) {
            log::info!("{stem}: clean transcript exists, skipping refinement");
            return Ok(false);
        }

        let mut ordered: Vec<&(usize, String)> = parts.iter().collect();
        ordered.sort_by_key(|(index, _)| *index);

        for (position, (index, text)) in ordered.iter().enumerate() {
            if text.trim().is_empty() || store.load_partial_clean(stem, *index).is_some() {
                continue;
            }

            log::info!(
                "{stem}: refining chunk {}/{} ({} characters)",
                position + 1,
                ordered.len(),
                text.len()
            );
            let label = format!("{stem} refinement {index}");
            let (refined, _) = with_retry(
                &self.scheduler,
                self.max_attempts,
                self.sleeper.as_ref(),
                &label,
                || self.refiner.refine(text),
            );
            let refined = refined.map_err(|error| {
                if error.is_retryable() {
                    PipelineError::Refinement {
                        index: *index,
                        error,
                    }
                } else {
                    PipelineError::Authentication(error)
                }
            })?;
            store.save_partial_clean(stem, *index, &refined)?;
        }

        let wanted: Vec<usize> = ordered.iter().map(|(index, _)| *index).collect();
        let refined: Vec<(usize, String)> = store
            .collect_partial_cleans(stem)?
            .into_iter()
            .filter(|(index, _)| wanted.contains(index))
            .collect();

        store.save_clean(stem, &TranscriptAssembler::merge(refined))?;
        Ok(true)
    }
}
