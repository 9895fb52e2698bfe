use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::transcript::infrastructure::transcript_store::TranscriptStore;

use super::file_report::{FileReport, FileStatus, RunSummary};
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::transcript_cleaner::TranscriptCleaner;

/// Refines every stored transcript that has no clean version yet.
pub struct CleanTranscriptsUseCase {
    cleaner: TranscriptCleaner,
    store: TranscriptStore,
}

impl CleanTranscriptsUseCase {
    pub fn new(cleaner: TranscriptCleaner, store: TranscriptStore) -> Self {
        Self { cleaner, store }
    }

    pub fn execute(
        &self,
        logger: &mut dyn PipelineLogger,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        self.cleaner
            .verify_credentials()
            .map_err(PipelineError::Authentication)?;

        let stems = self.store.list_uncleaned()?;
        logger.info(&format!("{} transcript(s) need cleaning", stems.len()));

        let mut summary = RunSummary::default();
        for (i, stem) in stems.iter().enumerate() {
            if cancelled
                .as_ref()
                .is_some_and(|c| c.load(Ordering::Relaxed))
            {
                logger.info("Interrupted, stopping before the next transcript");
                summary.cancelled = true;
                break;
            }

            logger.file_started(stem, i + 1, stems.len());
            let file_start = Instant::now();

            let outcome = self
                .store
                .load_chunk_texts(stem)
                .map_err(PipelineError::from)
                .and_then(|parts| self.cleaner.clean(&self.store, stem, &parts));

            let mut report = match outcome {
                Ok(cleaned) => FileReport {
                    cleaned,
                    ..FileReport::new(stem, FileStatus::Complete)
                },
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => FileReport::failed(stem, e),
            };
            report.elapsed = file_start.elapsed();
            logger.timing("clean", report.elapsed.as_secs_f64() * 1000.0);

            logger.file_finished(&report);
            summary.reports.push(report);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::project_paths::ProjectPaths;
    use crate::transcript::domain::transcript_assembler::AssembledTranscript;
    use crate::transcription::domain::api_error::ApiError;
    use crate::transcription::domain::retry_scheduler::RetryScheduler;
    use crate::transcription::domain::text_refiner::TextRefiner;
    use serde_json::json;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubRefiner {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<(String, ApiError)>,
    }

    impl TextRefiner for StubRefiner {
        fn refine(&self, text: &str) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push(text.to_string());
            match &self.fail_on {
                Some((t, e)) if t == text => Err(e.clone()),
                _ => Ok(text.to_uppercase()),
            }
        }
    }

    fn setup(
        fail_on: Option<(&str, ApiError)>,
    ) -> (TempDir, TranscriptStore, CleanTranscriptsUseCase, Arc<Mutex<Vec<String>>>) {
        let tmp = TempDir::new().unwrap();
        let paths = ProjectPaths::under(tmp.path());
        paths.ensure().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let cleaner = TranscriptCleaner::new(
            Box::new(StubRefiner {
                calls: calls.clone(),
                fail_on: fail_on.map(|(t, e)| (t.to_string(), e)),
            }),
            RetryScheduler::default(),
            1,
        )
        .with_sleeper(Box::new(|_| {}));
        let uc = CleanTranscriptsUseCase::new(cleaner, TranscriptStore::new(&paths));
        (tmp, TranscriptStore::new(&paths), uc, calls)
    }

    fn save_chunked(store: &TranscriptStore, stem: &str, texts: &[&str]) {
        let chunks: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| json!({"index": i, "status": "success", "text": t}))
            .collect();
        store
            .save(
                stem,
                &AssembledTranscript {
                    raw_text: texts.join(" "),
                    json_payload: json!({ "chunks": chunks }),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_cleans_only_uncleaned_transcripts() {
        let (_tmp, store, uc, calls) = setup(None);
        save_chunked(&store, "a", &["one", "two"]);
        save_chunked(&store, "b", &["three"]);
        store.save_clean("b", "THREE").unwrap();

        let summary = uc.execute(&mut NullPipelineLogger, None).unwrap();
        assert_eq!(summary.reports.len(), 1);
        assert!(summary.reports[0].cleaned);
        assert_eq!(*calls.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(fs::read_to_string(store.clean_path("a")).unwrap(), "ONE\n\nTWO");
    }

    #[test]
    fn test_one_failure_does_not_stop_the_rest() {
        let (_tmp, store, uc, _) = setup(Some(("bad", ApiError::general("500"))));
        save_chunked(&store, "a", &["bad"]);
        save_chunked(&store, "b", &["good"]);

        let summary = uc.execute(&mut NullPipelineLogger, None).unwrap();
        assert_eq!(summary.reports[0].status, FileStatus::Failed);
        assert_eq!(summary.reports[1].status, FileStatus::Complete);
        assert!(!store.has_clean("a"));
        assert!(store.has_clean("b"));
    }

    #[test]
    fn test_authentication_aborts() {
        let (_tmp, store, uc, _) = setup(Some(("x", ApiError::authentication("401"))));
        save_chunked(&store, "a", &["x"]);
        save_chunked(&store, "b", &["y"]);

        assert!(uc.execute(&mut NullPipelineLogger, None).unwrap_err().aborts_run());
        assert!(!store.has_clean("b"));
    }

    #[test]
    fn test_nothing_to_do() {
        let (_tmp, _store, uc, calls) = setup(None);
        let summary = uc.execute(&mut NullPipelineLogger, None).unwrap();
        assert!(summary.reports.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }
}
