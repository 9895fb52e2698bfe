use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::chunking::domain::audio_chunk::AudioChunk;
use crate::chunking::domain::audio_splitter::AudioSplitter;
use crate::chunking::domain::chunk_plan::ChunkPlan;
use crate::shared::audio_file::{base_name, discover_audio_files, AudioFile};
use crate::shared::constants::MEGABYTE;
use crate::transcript::domain::transcript_assembler::TranscriptAssembler;
use crate::transcript::infrastructure::transcript_store::TranscriptStore;
use crate::transcription::domain::chunk_result::FileTranscription;

use super::chunk_transcription_coordinator::ChunkTranscriptionCoordinator;
use super::file_report::{FileReport, FileStatus, RunSummary};
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::transcript_cleaner::TranscriptCleaner;

/// Knobs for one batch run.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscribeOptions {
    /// Byte ceiling handed to the planner (already reduced by headroom).
    pub plan_size_ceiling: u64,
    pub duration_ceiling: f64,
    /// Whole-file attempts when every chunk of a file failed.
    pub file_attempts: u32,
    pub delete_sources: bool,
}

struct TranscribedFile {
    source: AudioFile,
    plan: ChunkPlan,
    chunks: Vec<AudioChunk>,
    transcription: FileTranscription,
}

/// Batch orchestrator: discover, split, transcribe, persist, refine.
///
/// Files are processed one at a time. A file whose transcript already exists
/// is not transcribed again; one file's failure never stops the batch. Only
/// rejected credentials abort the run.
pub struct TranscribeFilesUseCase {
    splitter: AudioSplitter,
    coordinator: ChunkTranscriptionCoordinator,
    cleaner: Option<TranscriptCleaner>,
    store: TranscriptStore,
    options: TranscribeOptions,
}

impl TranscribeFilesUseCase {
    pub fn new(
        splitter: AudioSplitter,
        coordinator: ChunkTranscriptionCoordinator,
        cleaner: Option<TranscriptCleaner>,
        store: TranscriptStore,
        options: TranscribeOptions,
    ) -> Self {
        Self {
            splitter,
            coordinator,
            cleaner,
            store,
            options,
        }
    }

    pub fn execute(
        &self,
        incoming: &Path,
        logger: &mut dyn PipelineLogger,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();

        self.coordinator
            .verify_credentials()
            .map_err(PipelineError::Authentication)?;
        if let Some(cleaner) = &self.cleaner {
            cleaner
                .verify_credentials()
                .map_err(PipelineError::Authentication)?;
        }

        let files = discover_audio_files(incoming).map_err(|e| PipelineError::Discovery {
            path: incoming.to_path_buf(),
            source: e,
        })?;
        if files.is_empty() {
            logger.info(&format!("No audio files found in {}", incoming.display()));
        }

        let mut summary = RunSummary::default();
        let mut claimed: HashMap<String, String> = HashMap::new();
        for (i, path) in files.iter().enumerate() {
            if cancelled
                .as_ref()
                .is_some_and(|c| c.load(Ordering::Relaxed))
            {
                logger.info("Interrupted, stopping before the next file");
                summary.cancelled = true;
                break;
            }

            let file_name = display_name(path);
            logger.file_started(&file_name, i + 1, files.len());
            let file_start = Instant::now();

            let stem = base_name(path);
            let outcome = match claimed.get(&stem) {
                Some(first) => Err(PipelineError::NameCollision {
                    file: file_name.clone(),
                    stem,
                    first: first.clone(),
                }),
                None => {
                    claimed.insert(stem, file_name.clone());
                    self.process_file(path, logger)
                }
            };
            let mut report = match outcome {
                Ok(report) => report,
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => FileReport::from_error(&file_name, &e),
            };
            report.elapsed = file_start.elapsed();

            logger.file_finished(&report);
            summary.reports.push(report);
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn process_file(
        &self,
        path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FileReport, PipelineError> {
        let file_name = display_name(path);
        let stem = base_name(path);

        if self.store.has_transcript(&stem) {
            logger.info(&format!("{file_name}: transcript exists, skipping transcription"));
            let mut report = FileReport::new(&file_name, FileStatus::Skipped);
            if let Some(cleaner) = self.cleaner.as_ref().filter(|_| !self.store.has_clean(&stem)) {
                let parts = self.store.load_chunk_texts(&stem)?;
                self.clean_into(&mut report, cleaner, &stem, &parts, logger)?;
            }
            return Ok(report);
        }

        let done = self.transcribe_with_file_retry(path, logger)?;

        let assembled = TranscriptAssembler::assemble(&done.transcription)?;
        self.store.save(&stem, &assembled)?;
        let mut report = FileReport::from_transcription(&file_name, &done.transcription);

        if self.options.delete_sources {
            self.splitter
                .release_source(&done.source, &done.plan, &done.chunks)?;
        }

        if let Some(cleaner) = &self.cleaner {
            let parts: Vec<(usize, String)> = done
                .transcription
                .results()
                .iter()
                .filter_map(|r| r.text().map(|t| (r.index, t.to_string())))
                .collect();
            self.clean_into(&mut report, cleaner, &stem, &parts, logger)?;
        }

        Ok(report)
    }

    /// Refines a saved transcript. Only an authentication failure escapes;
    /// anything else is recorded on the report and leaves its status alone.
    fn clean_into(
        &self,
        report: &mut FileReport,
        cleaner: &TranscriptCleaner,
        stem: &str,
        parts: &[(usize, String)],
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), PipelineError> {
        match self.timed(logger, "clean", || cleaner.clean(&self.store, stem, parts)) {
            Ok(cleaned) => report.cleaned = cleaned,
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => report.clean_error = Some(e.to_string()),
        }
        Ok(())
    }

    fn transcribe_with_file_retry(
        &self,
        path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<TranscribedFile, PipelineError> {
        let attempts = self.options.file_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transcribe_once(path, logger) {
                Err(e) if e.is_all_chunks_failed() && attempt < attempts => {
                    log::warn!(
                        "{}: {e}; retrying whole file (attempt {}/{attempts})",
                        display_name(path),
                        attempt + 1
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn transcribe_once(
        &self,
        path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<TranscribedFile, PipelineError> {
        let source = self.timed(logger, "probe", || self.splitter.inspect(path))?;
        // Plan from what will actually be cut: conversion changes the size.
        let prepared = self.timed(logger, "convert", || self.splitter.prepare(&source))?;
        let plan = ChunkPlan::plan(
            prepared.size_bytes,
            prepared.duration_seconds,
            self.options.plan_size_ceiling,
            self.options.duration_ceiling,
        )?;
        log::info!(
            "{}: {:.1} MB, {:.0}s, {} chunk(s)",
            prepared.file_name(),
            prepared.size_bytes as f64 / MEGABYTE as f64,
            prepared.duration_seconds,
            plan.len()
        );

        let chunks = self.timed(logger, "split", || self.splitter.split(&prepared, &plan))?;
        let transcription = self.timed(logger, "transcribe", || {
            self.coordinator.transcribe_file(&source.stem(), &chunks)
        })?;

        Ok(TranscribedFile {
            source,
            plan,
            chunks,
            transcription,
        })
    }

    fn timed<T, E>(
        &self,
        logger: &mut dyn PipelineLogger,
        stage: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, PipelineError>
    where
        PipelineError: From<E>,
    {
        let start = Instant::now();
        let result = f();
        logger.timing(stage, start.elapsed().as_secs_f64() * 1000.0);
        result.map_err(PipelineError::from)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::domain::chunk_plan::ChunkSegment;
    use crate::chunking::domain::media_converter::{MediaConverter, MediaInfo};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::constants::SPLIT_HEADROOM;
    use crate::shared::project_paths::ProjectPaths;
    use crate::transcription::domain::api_error::{ApiError, ErrorKind};
    use crate::transcription::domain::retry_scheduler::RetryScheduler;
    use crate::transcription::domain::speech_to_text::{SpeechToText, TranscriptionResponse};
    use crate::transcription::domain::text_refiner::TextRefiner;
    use crate::transcription::domain::transcription_client::TranscriptionClient;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const MB: u64 = 1024 * 1024;

    // ─── Stubs ───

    /// Durations keyed by file name; cut outputs get a fixed size.
    struct StubMedia {
        durations: HashMap<String, f64>,
        converted_bytes: usize,
    }

    impl MediaConverter for StubMedia {
        fn probe(&self, path: &Path) -> Result<MediaInfo, Box<dyn std::error::Error>> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            let stem = name.split('.').next().unwrap_or_default().to_string();
            let duration = self
                .durations
                .get(&name)
                .or_else(|| self.durations.get(&stem))
                .copied()
                .ok_or("no such file")?;
            Ok(MediaInfo {
                duration_seconds: duration,
                bit_rate: None,
            })
        }

        fn convert(&self, _: &Path, target: &Path) -> Result<(), Box<dyn std::error::Error>> {
            fs::write(target, vec![1u8; self.converted_bytes])?;
            Ok(())
        }

        fn cut(
            &self,
            _: &Path,
            _: &[ChunkSegment],
            outputs: &[PathBuf],
        ) -> Result<(), Box<dyn std::error::Error>> {
            for out in outputs {
                fs::write(out, b"chunk")?;
            }
            Ok(())
        }
    }

    /// Transcribes every chunk as its own file name unless listed in `fail`;
    /// chunks listed in `silent` transcribe to nothing.
    struct StubSpeech {
        fail: Vec<(String, ApiError)>,
        silent: Vec<String>,
        calls: Arc<Mutex<Vec<String>>>,
        verify: Result<(), ApiError>,
    }

    impl SpeechToText for StubSpeech {
        fn verify_credentials(&self) -> Result<(), ApiError> {
            self.verify.clone()
        }

        fn transcribe(&self, audio: &Path) -> Result<TranscriptionResponse, ApiError> {
            let name = audio.file_name().unwrap().to_string_lossy().into_owned();
            self.calls.lock().unwrap().push(name.clone());
            if let Some((_, err)) = self.fail.iter().find(|(prefix, _)| name.starts_with(prefix)) {
                return Err(err.clone());
            }
            let text = if self.silent.iter().any(|prefix| name.starts_with(prefix)) {
                String::new()
            } else {
                name
            };
            Ok(TranscriptionResponse {
                payload: json!({ "text": text.clone() }),
                text,
            })
        }
    }

    struct StubRefiner {
        calls: Arc<Mutex<Vec<String>>>,
        error: Option<ApiError>,
    }

    impl TextRefiner for StubRefiner {
        fn refine(&self, text: &str) -> Result<String, ApiError> {
            self.calls.lock().unwrap().push(text.to_string());
            match &self.error {
                Some(err) => Err(err.clone()),
                None => Ok(format!("clean({text})")),
            }
        }
    }

    struct Scenario<'a> {
        durations: &'a [(&'a str, f64)],
        fail: Vec<(&'a str, ApiError)>,
        silent: Vec<&'a str>,
        verify: Result<(), ApiError>,
        clean: bool,
        refine_error: Option<ApiError>,
        converted_bytes: usize,
        max_chunk_bytes: u64,
    }

    impl<'a> Scenario<'a> {
        fn new(durations: &'a [(&'a str, f64)]) -> Self {
            Self {
                durations,
                fail: vec![],
                silent: vec![],
                verify: Ok(()),
                clean: false,
                refine_error: None,
                converted_bytes: 9,
                max_chunk_bytes: 25 * MB,
            }
        }
    }

    struct Fixture {
        _tmp: TempDir,
        paths: ProjectPaths,
        speech_calls: Arc<Mutex<Vec<String>>>,
        refine_calls: Arc<Mutex<Vec<String>>>,
    }

    impl Fixture {
        fn new(files: &[&str]) -> Self {
            let tmp = TempDir::new().unwrap();
            let paths = ProjectPaths::under(tmp.path());
            paths.ensure().unwrap();
            for name in files {
                fs::write(paths.incoming.join(name), vec![0u8; 64]).unwrap();
            }
            Self {
                _tmp: tmp,
                paths,
                speech_calls: Arc::new(Mutex::new(Vec::new())),
                refine_calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn use_case(
            &self,
            durations: &[(&str, f64)],
            fail: Vec<(&str, ApiError)>,
            verify: Result<(), ApiError>,
            clean: bool,
        ) -> TranscribeFilesUseCase {
            self.build(Scenario {
                fail,
                verify,
                clean,
                ..Scenario::new(durations)
            })
        }

        fn build(&self, scenario: Scenario) -> TranscribeFilesUseCase {
            let media = StubMedia {
                durations: scenario
                    .durations
                    .iter()
                    .map(|(n, d)| (n.to_string(), *d))
                    .collect(),
                converted_bytes: scenario.converted_bytes,
            };
            let splitter = AudioSplitter::new(
                Box::new(media),
                &self.paths.splits,
                scenario.max_chunk_bytes,
            );
            let client = TranscriptionClient::new(Box::new(StubSpeech {
                fail: scenario
                    .fail
                    .into_iter()
                    .map(|(p, e)| (p.to_string(), e))
                    .collect(),
                silent: scenario.silent.iter().map(|p| p.to_string()).collect(),
                calls: self.speech_calls.clone(),
                verify: scenario.verify,
            }));
            let coordinator = ChunkTranscriptionCoordinator::new(
                client,
                RetryScheduler::default(),
                2,
                Duration::ZERO,
            )
            .with_sleeper(Box::new(|_| {}));
            let refine_error = scenario.refine_error;
            let cleaner = scenario.clean.then(|| {
                TranscriptCleaner::new(
                    Box::new(StubRefiner {
                        calls: self.refine_calls.clone(),
                        error: refine_error,
                    }),
                    RetryScheduler::default(),
                    2,
                )
                .with_sleeper(Box::new(|_| {}))
            });
            TranscribeFilesUseCase::new(
                splitter,
                coordinator,
                cleaner,
                TranscriptStore::new(&self.paths),
                TranscribeOptions {
                    plan_size_ceiling: (scenario.max_chunk_bytes as f64 * SPLIT_HEADROOM) as u64,
                    duration_ceiling: 600.0,
                    file_attempts: 2,
                    delete_sources: false,
                },
            )
        }

        fn store(&self) -> TranscriptStore {
            TranscriptStore::new(&self.paths)
        }

        fn run(&self, uc: &TranscribeFilesUseCase) -> RunSummary {
            uc.execute(&self.paths.incoming, &mut NullPipelineLogger, None)
                .unwrap()
        }
    }

    #[test]
    fn test_short_file_end_to_end() {
        let fx = Fixture::new(&["memo.mp3"]);
        let uc = fx.use_case(&[("memo.mp3", 30.0)], vec![], Ok(()), true);

        let summary = fx.run(&uc);
        assert_eq!(summary.count(FileStatus::Complete), 1);
        assert!(summary.reports[0].cleaned);

        let store = fx.store();
        assert_eq!(
            fs::read_to_string(store.transcript_path("memo")).unwrap(),
            "memo.mp3"
        );
        assert_eq!(
            fs::read_to_string(store.clean_path("memo")).unwrap(),
            "clean(memo.mp3)"
        );
        assert!(fx.paths.incoming.join("memo.mp3").exists());
    }

    #[test]
    fn test_long_file_is_split_and_reassembled_in_order() {
        let fx = Fixture::new(&["lecture.wav"]);
        let uc = fx.use_case(&[("lecture.wav", 1500.0)], vec![], Ok(()), true);

        fx.run(&uc);
        let store = fx.store();
        assert_eq!(
            fs::read_to_string(store.transcript_path("lecture")).unwrap(),
            "lecture_part000.wav lecture_part001.wav lecture_part002.wav"
        );
        assert_eq!(
            fs::read_to_string(store.clean_path("lecture")).unwrap(),
            "clean(lecture_part000.wav)\n\nclean(lecture_part001.wav)\n\nclean(lecture_part002.wav)"
        );
    }

    #[test]
    fn test_second_run_skips_transcription_and_refinement() {
        let fx = Fixture::new(&["memo.mp3"]);
        let uc = fx.use_case(&[("memo.mp3", 30.0)], vec![], Ok(()), true);
        fx.run(&uc);
        let speech_before = fx.speech_calls.lock().unwrap().len();
        let refine_before = fx.refine_calls.lock().unwrap().len();

        let summary = fx.run(&uc);
        assert_eq!(summary.count(FileStatus::Skipped), 1);
        assert!(!summary.reports[0].cleaned);
        assert_eq!(fx.speech_calls.lock().unwrap().len(), speech_before);
        assert_eq!(fx.refine_calls.lock().unwrap().len(), refine_before);
    }

    #[test]
    fn test_existing_transcript_is_cleaned_without_retranscribing() {
        let fx = Fixture::new(&["memo.mp3"]);
        let store = fx.store();
        fs::write(store.transcript_path("memo"), "raw words").unwrap();

        let uc = fx.use_case(&[("memo.mp3", 30.0)], vec![], Ok(()), true);
        let summary = fx.run(&uc);

        assert_eq!(summary.reports[0].status, FileStatus::Skipped);
        assert!(summary.reports[0].cleaned);
        assert!(fx.speech_calls.lock().unwrap().is_empty());
        assert_eq!(*fx.refine_calls.lock().unwrap(), vec!["raw words"]);
    }

    #[test]
    fn test_partial_file_is_persisted_with_gap() {
        let fx = Fixture::new(&["lecture.mp3"]);
        let uc = fx.use_case(
            &[("lecture.mp3", 1500.0)],
            vec![("lecture_part001", ApiError::general("502"))],
            Ok(()),
            false,
        );

        let summary = fx.run(&uc);
        let report = &summary.reports[0];
        assert_eq!(report.status, FileStatus::Partial);
        assert_eq!(report.failed_chunks.len(), 1);
        assert_eq!(report.failed_chunks[0].index, 1);

        let store = fx.store();
        assert_eq!(
            fs::read_to_string(store.transcript_path("lecture")).unwrap(),
            "lecture_part000.mp3 lecture_part002.mp3"
        );
        let payload: serde_json::Value =
            serde_json::from_slice(&fs::read(store.payload_path("lecture")).unwrap()).unwrap();
        assert_eq!(payload["chunks"][1]["status"], "failed");
        // Partial results are never retried at file level: 2 chunk attempts only.
        let calls = fx.speech_calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.starts_with("lecture_part001")).count(), 2);
    }

    #[test]
    fn test_failed_file_is_retried_then_batch_continues() {
        let fx = Fixture::new(&["a_bad.mp3", "b_good.mp3"]);
        let uc = fx.use_case(
            &[("a_bad.mp3", 30.0), ("b_good.mp3", 30.0)],
            vec![("a_bad", ApiError::rate_limit("429"))],
            Ok(()),
            false,
        );

        let summary = fx.run(&uc);
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].status, FileStatus::Failed);
        assert!(summary.reports[0]
            .error
            .as_deref()
            .unwrap()
            .contains("all 1 chunks failed"));
        assert_eq!(summary.reports[1].status, FileStatus::Complete);
        assert!(summary.has_failures());

        // 2 whole-file attempts x 2 chunk attempts
        let calls = fx.speech_calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.starts_with("a_bad")).count(), 4);

        let store = fx.store();
        assert!(!store.transcript_path("a_bad").exists());
        assert!(!store.payload_path("a_bad").exists());
    }

    #[test]
    fn test_bad_credentials_abort_before_any_file() {
        let fx = Fixture::new(&["memo.mp3"]);
        let uc = fx.use_case(
            &[("memo.mp3", 30.0)],
            vec![],
            Err(ApiError::authentication("401")),
            false,
        );

        let err = uc
            .execute(&fx.paths.incoming, &mut NullPipelineLogger, None)
            .unwrap_err();
        assert!(err.aborts_run());
        assert!(fx.speech_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_authentication_mid_run_aborts_batch() {
        let fx = Fixture::new(&["a.mp3", "b.mp3"]);
        let uc = fx.use_case(
            &[("a.mp3", 30.0), ("b.mp3", 30.0)],
            vec![("a", ApiError::authentication("key revoked"))],
            Ok(()),
            false,
        );

        let err = uc
            .execute(&fx.paths.incoming, &mut NullPipelineLogger, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Authentication(_)));
        assert_eq!(*fx.speech_calls.lock().unwrap(), vec!["a.mp3"]);
    }

    #[test]
    fn test_probe_failure_fails_only_that_file() {
        let fx = Fixture::new(&["a.mp3", "b.mp3"]);
        let uc = fx.use_case(&[("b.mp3", 30.0)], vec![], Ok(()), false);

        let summary = fx.run(&uc);
        assert_eq!(summary.reports[0].status, FileStatus::Failed);
        assert_eq!(summary.reports[1].status, FileStatus::Complete);
    }

    #[test]
    fn test_m4a_is_converted_before_transcription() {
        let fx = Fixture::new(&["voice.m4a"]);
        let uc = fx.use_case(&[("voice", 30.0)], vec![], Ok(()), false);

        fx.run(&uc);
        assert!(fx.paths.splits.join("voice.mp3").exists());
        assert_eq!(*fx.speech_calls.lock().unwrap(), vec!["voice.mp3"]);
        assert!(fx.store().has_transcript("voice"));
    }

    #[test]
    fn test_delete_sources_after_split() {
        let fx = Fixture::new(&["lecture.mp3"]);
        let mut uc = fx.use_case(&[("lecture.mp3", 1500.0)], vec![], Ok(()), false);
        uc.options.delete_sources = true;

        fx.run(&uc);
        assert!(!fx.paths.incoming.join("lecture.mp3").exists());
        assert!(fx.paths.splits.join("lecture_part002.mp3").exists());
    }

    #[test]
    fn test_cancellation_stops_between_files() {
        let fx = Fixture::new(&["a.mp3", "b.mp3"]);
        let uc = fx.use_case(&[("a.mp3", 30.0), ("b.mp3", 30.0)], vec![], Ok(()), false);
        let flag = Arc::new(AtomicBool::new(true));

        let summary = uc
            .execute(&fx.paths.incoming, &mut NullPipelineLogger, Some(flag))
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.reports.is_empty());
        assert!(fx.speech_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_silent_recording_is_not_transcribed_twice() {
        let fx = Fixture::new(&["silence.mp3"]);
        let uc = fx.build(Scenario {
            silent: vec!["silence"],
            clean: true,
            ..Scenario::new(&[("silence.mp3", 30.0)])
        });

        assert_eq!(fx.run(&uc).reports[0].status, FileStatus::Complete);
        let store = fx.store();
        assert_eq!(fs::read_to_string(store.transcript_path("silence")).unwrap(), "");
        assert!(store.has_clean("silence"));

        let second = fx.run(&uc);
        assert_eq!(second.reports[0].status, FileStatus::Skipped);
        assert_eq!(fx.speech_calls.lock().unwrap().len(), 1);
        assert!(fx.refine_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_all_chunks_failed_report_lists_every_chunk() {
        let fx = Fixture::new(&["bad.mp3"]);
        let uc = fx.use_case(
            &[("bad.mp3", 1500.0)],
            vec![("bad", ApiError::rate_limit("429"))],
            Ok(()),
            false,
        );

        let summary = fx.run(&uc);
        let report = &summary.reports[0];
        assert_eq!(report.status, FileStatus::Failed);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.error.as_deref(), Some("bad: all 3 chunks failed"));
        let detail: Vec<_> = report
            .failed_chunks
            .iter()
            .map(|f| (f.index, f.kind, f.attempts, f.message.as_str()))
            .collect();
        assert_eq!(
            detail,
            vec![
                (0, ErrorKind::RateLimit, 2, "429"),
                (1, ErrorKind::RateLimit, 2, "429"),
                (2, ErrorKind::RateLimit, 2, "429"),
            ]
        );
    }

    #[test]
    fn test_refinement_failure_keeps_transcription_status() {
        let fx = Fixture::new(&["memo.mp3"]);
        let uc = fx.build(Scenario {
            clean: true,
            refine_error: Some(ApiError::general("502")),
            ..Scenario::new(&[("memo.mp3", 30.0)])
        });

        let summary = fx.run(&uc);
        let report = &summary.reports[0];
        assert_eq!(report.status, FileStatus::Complete);
        assert!(!report.cleaned);
        assert!(report.error.is_none());
        assert!(report.clean_error.as_deref().unwrap().contains("502"));
        assert!(!summary.has_failures());
        assert!(fx.store().has_transcript("memo"));
        assert!(!fx.store().has_clean("memo"));

        // A later run with a working refiner finishes the cleaning only.
        let retry = fx.use_case(&[("memo.mp3", 30.0)], vec![], Ok(()), true);
        let summary = fx.run(&retry);
        assert_eq!(summary.reports[0].status, FileStatus::Skipped);
        assert!(summary.reports[0].cleaned);
        assert_eq!(fx.speech_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_m4a_that_grows_on_conversion_is_planned_from_the_mp3() {
        let fx = Fixture::new(&["voice.m4a"]);
        let uc = fx.build(Scenario {
            converted_bytes: 3000,
            max_chunk_bytes: 1000,
            ..Scenario::new(&[("voice", 30.0)])
        });

        let summary = fx.run(&uc);
        let report = &summary.reports[0];
        assert_eq!(report.status, FileStatus::Complete, "{:?}", report.error);
        assert_eq!(report.chunks, 4);
        assert!(fx
            .speech_calls
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.starts_with("voice_part")));
    }

    #[test]
    fn test_same_stem_in_one_batch_is_reported_not_skipped() {
        let fx = Fixture::new(&["talk.mp3", "talk.wav"]);
        let uc = fx.use_case(&[("talk.mp3", 30.0), ("talk.wav", 30.0)], vec![], Ok(()), false);

        let summary = fx.run(&uc);
        assert_eq!(summary.reports[0].status, FileStatus::Complete);
        assert_eq!(summary.reports[1].status, FileStatus::Failed);
        let error = summary.reports[1].error.as_deref().unwrap();
        assert!(error.contains("talk.wav") && error.contains("talk.mp3"));
        assert_eq!(*fx.speech_calls.lock().unwrap(), vec!["talk.mp3"]);
    }
}
