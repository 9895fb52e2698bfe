use std::collections::HashMap;
use std::time::Instant;

use super::file_report::{FileReport, FileStatus};

/// Cross-cutting logger for batch orchestration events.
///
/// Decouples use cases from specific output mechanisms so callers can
/// observe the run without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// A file is about to be processed (`position` is 1-indexed).
    fn file_started(&mut self, file: &str, position: usize, total: usize);

    /// A file reached a terminal state.
    fn file_finished(&mut self, report: &FileReport);

    /// Record how long a named stage took for one file.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn file_started(&mut self, _file: &str, _position: usize, _total: usize) {}
    fn file_finished(&mut self, _report: &FileReport) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Reports through the `log` facade and keeps enough state for a summary:
/// per-file outcomes, failed chunks with reasons, and per-stage timings.
pub struct LogPipelineLogger {
    timings: HashMap<String, Vec<f64>>,
    reports: Vec<FileReport>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            reports: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if no file was seen.
    pub fn summary_string(&self) -> Option<String> {
        if self.reports.is_empty() {
            return None;
        }

        let count = |status: FileStatus| self.reports.iter().filter(|r| r.status == status).count();
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Run summary ({} files, {elapsed:.1}s total): {} complete, {} partial, {} failed, {} skipped",
            self.reports.len(),
            count(FileStatus::Complete),
            count(FileStatus::Partial),
            count(FileStatus::Failed),
            count(FileStatus::Skipped),
        )];

        for report in &self.reports {
            if let Some(err) = &report.error {
                lines.push(format!("  {}: {}: {err}", report.file, report.status));
            }
            for failure in &report.failed_chunks {
                lines.push(format!(
                    "  {}: chunk {} failed after {} attempt(s) ({}): {}",
                    report.file, failure.index, failure.attempts, failure.kind, failure.message
                ));
            }
            if let Some(err) = &report.clean_error {
                lines.push(format!("  {}: not cleaned: {err}", report.file));
            }
        }

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len() as f64;
            lines.push(format!(
                "  {stage:12}: avg {:7.1}s  total {:8.1}s",
                avg_ms / 1000.0,
                total_ms / 1000.0
            ));
        }

        Some(lines.join("\n"))
    }

    #[cfg(test)]
    fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    #[cfg(test)]
    fn reports(&self) -> &[FileReport] {
        &self.reports
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn file_started(&mut self, file: &str, position: usize, total: usize) {
        log::info!("[{position}/{total}] Processing {file}");
    }

    fn file_finished(&mut self, report: &FileReport) {
        match report.status {
            FileStatus::Failed => log::error!(
                "{}: failed: {}",
                report.file,
                report.error.as_deref().unwrap_or("unknown error")
            ),
            FileStatus::Partial => {
                let indices: Vec<String> = report
                    .failed_chunks
                    .iter()
                    .map(|f| f.index.to_string())
                    .collect();
                log::warn!(
                    "{}: partial, {} of {} chunks failed (chunks {})",
                    report.file,
                    report.failed_chunks.len(),
                    report.chunks,
                    indices.join(", ")
                );
            }
            FileStatus::Complete | FileStatus::Skipped => {
                log::info!("{}: {}", report.file, report.status)
            }
        }
        if let Some(err) = &report.clean_error {
            log::warn!("{}: transcript saved but not cleaned: {err}", report.file);
        }
        self.reports.push(report.clone());
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
