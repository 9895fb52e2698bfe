use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory layout of one data root.
///
/// - `incoming`: untouched source recordings
/// - `splits`: converted files, chunks and per-chunk refined partials
/// - `transcripts`: per-file assembled artifacts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    pub incoming: PathBuf,
    pub splits: PathBuf,
    pub transcripts: PathBuf,
}

impl ProjectPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            incoming: root.join("original"),
            splits: root.join("splits"),
            transcripts: root.join("transcripts"),
        }
    }

    /// Creates every directory. Called once before any component runs.
    pub fn ensure(&self) -> io::Result<()> {
        for (label, dir) in [
            ("incoming", &self.incoming),
            ("splits", &self.splits),
            ("transcripts", &self.transcripts),
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                log::error!("Could not create {label} directory {}: {e}", dir.display());
                e
            })?;
            log::debug!("Verified {label} directory {}", dir.display());
        }
        Ok(())
    }
}
