use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::audio_file::{AudioFile, AudioFormat};

use super::audio_chunk::{chunk_path, AudioChunk};
use super::chunk_plan::{ChunkPlan, ChunkSegment};
use super::media_converter::MediaConverter;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("chunk {index} is {size_bytes} bytes, above the {ceiling} byte ceiling")]
    ChunkTooLarge {
        index: usize,
        size_bytes: u64,
        ceiling: u64,
    },
    #[error("chunk {index} missing after split: {}", .path.display())]
    MissingChunk { index: usize, path: PathBuf },
    #[error("failed to probe {}: {message}", .path.display())]
    Probe { path: PathBuf, message: String },
    #[error("failed to convert {}: {message}", .path.display())]
    Conversion { path: PathBuf, message: String },
    #[error("failed to split {}: {message}", .path.display())]
    Cut { path: PathBuf, message: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Materialises a chunk plan on disk.
///
/// Chunks land in `work_dir` under names derived from the source stem and a
/// zero-padded index, so a rerun finds what a previous run produced and only
/// cuts what is missing. Every chunk is size-checked against
/// `max_chunk_bytes` after it exists; an oversized chunk is a planning
/// mismatch and is never retried.
pub struct AudioSplitter {
    media: Box<dyn MediaConverter>,
    work_dir: PathBuf,
    max_chunk_bytes: u64,
}

impl AudioSplitter {
    pub fn new(media: Box<dyn MediaConverter>, work_dir: &Path, max_chunk_bytes: u64) -> Self {
        Self {
            media,
            work_dir: work_dir.to_path_buf(),
            max_chunk_bytes,
        }
    }

    pub fn inspect(&self, path: &Path) -> Result<AudioFile, SplitError> {
        AudioFile::inspect(path, self.media.as_ref()).map_err(|e| SplitError::Probe {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Returns a file the transcription endpoint accepts as-is, converting
    /// the source to MP3 once if its container is not natively supported.
    /// An existing converted file is reused.
    pub fn prepare(&self, source: &AudioFile) -> Result<AudioFile, SplitError> {
        if source.format.is_natively_accepted() {
            return Ok(source.clone());
        }

        let target = self
            .work_dir
            .join(format!("{}.{}", source.stem(), AudioFormat::Mp3.extension()));

        if non_empty(&target) {
            log::info!(
                "Converted file already exists for {}, skipping conversion",
                source.file_name()
            );
        } else {
            log::info!("Converting {} to MP3", source.file_name());
            self.ensure_work_dir()?;
            if let Err(e) = self.media.convert(&source.path, &target) {
                let _ = fs::remove_file(&target);
                return Err(SplitError::Conversion {
                    path: source.path.clone(),
                    message: e.to_string(),
                });
            }
        }

        self.inspect(&target)
    }

    /// Produces the ordered chunk set for `source` according to `plan`.
    ///
    /// The trivial plan yields the (prepared) source itself as chunk 0
    /// without cutting anything.
    pub fn split(&self, source: &AudioFile, plan: &ChunkPlan) -> Result<Vec<AudioChunk>, SplitError> {
        let stem = source.stem();
        let prepared = self.prepare(source)?;

        if plan.is_trivial() {
            let chunk = self.verify(&stem, 0, &prepared.path)?;
            return Ok(vec![chunk]);
        }

        let extension = prepared.format.extension();
        let expected: Vec<PathBuf> = plan
            .segments()
            .iter()
            .map(|seg| chunk_path(&self.work_dir, &stem, seg.index, extension))
            .collect();

        let missing: Vec<(ChunkSegment, PathBuf)> = plan
            .segments()
            .iter()
            .zip(&expected)
            .filter(|(_, path)| !non_empty(path))
            .map(|(seg, path)| (*seg, path.clone()))
            .collect();

        if missing.is_empty() {
            log::info!(
                "Found all {} chunks for {}, skipping split",
                expected.len(),
                source.file_name()
            );
        } else {
            log::info!(
                "Splitting {} into {} chunks ({} to cut)",
                source.file_name(),
                expected.len(),
                missing.len()
            );
            self.ensure_work_dir()?;
            let (segments, outputs): (Vec<ChunkSegment>, Vec<PathBuf>) =
                missing.into_iter().unzip();
            self.media
                .cut(&prepared.path, &segments, &outputs)
                .map_err(|e| SplitError::Cut {
                    path: prepared.path.clone(),
                    message: e.to_string(),
                })?;
        }

        expected
            .iter()
            .enumerate()
            .map(|(index, path)| self.verify(&stem, index, path))
            .collect()
    }

    /// Deletes the original recording once every chunk is confirmed on disk.
    ///
    /// Returns `false` without touching anything when the chunk set is not
    /// complete or when a chunk is the source itself.
    pub fn release_source(
        &self,
        source: &AudioFile,
        plan: &ChunkPlan,
        chunks: &[AudioChunk],
    ) -> Result<bool, SplitError> {
        if chunks.len() != plan.len() {
            return Ok(false);
        }
        if chunks
            .iter()
            .any(|c| c.path == source.path || !non_empty(&c.path))
        {
            return Ok(false);
        }
        fs::remove_file(&source.path).map_err(|e| SplitError::Io {
            path: source.path.clone(),
            source: e,
        })?;
        log::info!("Removed source {} after splitting", source.file_name());
        Ok(true)
    }

    fn verify(&self, stem: &str, index: usize, path: &Path) -> Result<AudioChunk, SplitError> {
        let size_bytes = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(SplitError::MissingChunk {
                    index,
                    path: path.to_path_buf(),
                })
            }
        };
        if size_bytes > self.max_chunk_bytes {
            return Err(SplitError::ChunkTooLarge {
                index,
                size_bytes,
                ceiling: self.max_chunk_bytes,
            });
        }
        Ok(AudioChunk {
            parent: stem.to_string(),
            index,
            size_bytes,
            path: path.to_path_buf(),
        })
    }

    fn ensure_work_dir(&self) -> Result<(), SplitError> {
        fs::create_dir_all(&self.work_dir).map_err(|e| SplitError::Io {
            path: self.work_dir.clone(),
            source: e,
        })
    }
}

fn non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
