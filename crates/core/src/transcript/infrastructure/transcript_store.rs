use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::chunking::domain::audio_chunk::{chunk_path, parse_chunk_index};
use crate::shared::constants::{CLEAN_TRANSCRIPT_SUFFIX, PAYLOAD_EXTENSION, TRANSCRIPT_EXTENSION};
use crate::shared::project_paths::ProjectPaths;
use crate::transcript::domain::transcript_assembler::AssembledTranscript;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed transcript payload {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },
}

/// Filesystem layout of per-file artifacts.
///
/// Every artifact is written under a `.part` name and renamed into place, so
/// a file under its final name is complete even when it is empty (a silent
/// recording transcribes to nothing). `<stem>.txt` is written before
/// `<stem>.json`. Refined per-chunk text lives next to the chunks as
/// `<stem>_partNNN.clean.txt` until merged into `<stem>.clean.txt`.
pub struct TranscriptStore {
    transcripts: PathBuf,
    splits: PathBuf,
}

impl TranscriptStore {
    pub fn new(paths: &ProjectPaths) -> Self {
        Self {
            transcripts: paths.transcripts.clone(),
            splits: paths.splits.clone(),
        }
    }

    pub fn transcript_path(&self, stem: &str) -> PathBuf {
        self.transcripts.join(format!("{stem}.{TRANSCRIPT_EXTENSION}"))
    }

    pub fn payload_path(&self, stem: &str) -> PathBuf {
        self.transcripts.join(format!("{stem}.{PAYLOAD_EXTENSION}"))
    }

    pub fn clean_path(&self, stem: &str) -> PathBuf {
        self.transcripts.join(format!("{stem}{CLEAN_TRANSCRIPT_SUFFIX}"))
    }

    pub fn partial_clean_path(&self, stem: &str, index: usize) -> PathBuf {
        chunk_path(&self.splits, stem, index, CLEAN_TRANSCRIPT_SUFFIX.trim_start_matches('.'))
    }

    /// Presence, not content: an empty transcript is a finished one.
    pub fn has_transcript(&self, stem: &str) -> bool {
        self.transcript_path(stem).is_file() || self.payload_path(stem).is_file()
    }

    pub fn has_clean(&self, stem: &str) -> bool {
        self.clean_path(stem).is_file()
    }

    pub fn save(&self, stem: &str, transcript: &AssembledTranscript) -> Result<(), StoreError> {
        let payload_path = self.payload_path(stem);
        let json = serde_json::to_vec_pretty(&transcript.json_payload).map_err(|e| {
            StoreError::Malformed {
                path: payload_path.clone(),
                message: e.to_string(),
            }
        })?;
        write_atomic(&self.transcript_path(stem), transcript.raw_text.as_bytes())?;
        write_atomic(&payload_path, &json)?;
        log::info!("Saved transcript {}", self.transcript_path(stem).display());
        Ok(())
    }

    pub fn save_clean(&self, stem: &str, text: &str) -> Result<(), StoreError> {
        write_atomic(&self.clean_path(stem), text.as_bytes())?;
        log::info!("Saved clean transcript {}", self.clean_path(stem).display());
        Ok(())
    }

    pub fn save_partial_clean(&self, stem: &str, index: usize, text: &str) -> Result<(), StoreError> {
        write_atomic(&self.partial_clean_path(stem, index), text.as_bytes())
    }

    pub fn load_partial_clean(&self, stem: &str, index: usize) -> Option<String> {
        fs::read_to_string(self.partial_clean_path(stem, index)).ok()
    }

    /// Refined chunk texts on disk for `stem`, keyed by the index parsed from
    /// each file name. Directory listing order is not meaningful.
    pub fn collect_partial_cleans(&self, stem: &str) -> Result<Vec<(usize, String)>, StoreError> {
        let entries = match fs::read_dir(&self.splits) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.splits, e)),
        };

        let mut parts = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(CLEAN_TRANSCRIPT_SUFFIX) {
                continue;
            }
            let Some(index) = parse_chunk_index(&name, stem) else {
                continue;
            };
            let path = entry.path();
            let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            parts.push((index, text));
        }
        Ok(parts)
    }

    /// Texts to refine for an already-transcribed file: the successful
    /// chunk texts from the payload, or the whole `.txt` as a single block
    /// when the payload is missing or carries no chunk texts.
    pub fn load_chunk_texts(&self, stem: &str) -> Result<Vec<(usize, String)>, StoreError> {
        let payload_path = self.payload_path(stem);
        if let Ok(raw) = fs::read(&payload_path) {
            let payload: serde_json::Value =
                serde_json::from_slice(&raw).map_err(|e| StoreError::Malformed {
                    path: payload_path.clone(),
                    message: e.to_string(),
                })?;
            let parts = chunk_texts(&payload);
            if !parts.is_empty() {
                return Ok(parts);
            }
        }

        let txt_path = self.transcript_path(stem);
        let text = fs::read_to_string(&txt_path).map_err(|e| io_error(&txt_path, e))?;
        Ok(vec![(0, text)])
    }

    /// Stems of transcripts in the final directory lacking a clean version,
    /// sorted.
    pub fn list_uncleaned(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.transcripts).map_err(|e| io_error(&self.transcripts, e))?;
        let suffix = format!(".{TRANSCRIPT_EXTENSION}");

        let mut stems: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.ends_with(CLEAN_TRANSCRIPT_SUFFIX))
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .filter(|stem| self.has_transcript(stem) && !self.has_clean(stem))
            .collect();
        stems.sort();
        Ok(stems)
    }
}

fn chunk_texts(payload: &serde_json::Value) -> Vec<(usize, String)> {
    payload["chunks"]
        .as_array()
        .map(|chunks| {
            chunks
                .iter()
                .filter(|c| c["status"] == "success")
                .filter_map(|c| {
                    let index = c["index"].as_u64()? as usize;
                    let text = c["text"].as_str()?;
                    Some((index, text.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!("{file_name}.part"));

    let mut file = fs::File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| io_error(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error(path, e)
    })
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
