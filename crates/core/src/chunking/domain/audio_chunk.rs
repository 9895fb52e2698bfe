use std::path::{Path, PathBuf};

use crate::shared::constants::CHUNK_INFIX;

/// A physical chunk derived from one plan segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioChunk {
    /// Base name of the source recording the chunk belongs to.
    pub parent: String,
    pub index: usize,
    pub size_bytes: u64,
    pub path: PathBuf,
}

impl AudioChunk {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Deterministic chunk location: `<dir>/<stem>_part<NNN>.<ext>`.
pub fn chunk_path(dir: &Path, stem: &str, index: usize, extension: &str) -> PathBuf {
    dir.join(format!("{stem}{CHUNK_INFIX}{index:03}.{extension}"))
}

/// Recovers the sequence index from a chunk-derived file name such as
/// `talk_part012.mp3` or `talk_part012.clean.txt`. Returns `None` when the
/// name does not belong to `stem`.
pub fn parse_chunk_index(file_name: &str, stem: &str) -> Option<usize> {
    let rest = file_name.strip_prefix(stem)?.strip_prefix(CHUNK_INFIX)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !rest[digits.len()..].starts_with('.') {
        return None;
    }
    digits.parse().ok()
}
