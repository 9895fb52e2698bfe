use std::path::{Path, PathBuf};

use super::chunk_plan::ChunkSegment;

/// Stream-level facts about a recording, as reported by the media tool.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub bit_rate: Option<u64>,
}

/// Domain interface for the external media tool.
///
/// Implementations must never modify `source`, and must only expose an
/// output under its final name once it is completely written.
pub trait MediaConverter: Send {
    /// Read duration (and bitrate when available) without decoding.
    fn probe(&self, path: &Path) -> Result<MediaInfo, Box<dyn std::error::Error>>;

    /// Re-encode `source` into the container implied by `target`'s extension.
    fn convert(&self, source: &Path, target: &Path) -> Result<(), Box<dyn std::error::Error>>;

    /// Write one file per segment; `outputs[i]` receives `segments[i]`.
    fn cut(
        &self,
        source: &Path,
        segments: &[ChunkSegment],
        outputs: &[PathBuf],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
