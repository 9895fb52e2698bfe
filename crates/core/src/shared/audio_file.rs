use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunking::domain::media_converter::MediaConverter;

use super::constants::AUDIO_EXTENSIONS;

/// Container formats the pipeline accepts as input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
}

impl AudioFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "m4a" => Some(Self::M4a),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }

    /// Whether the transcription endpoint takes this container as-is.
    /// Anything else is converted to MP3 before splitting.
    pub fn is_natively_accepted(self) -> bool {
        matches!(self, Self::Mp3 | Self::Wav)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A probed source recording. Size and duration are always known.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_seconds: f64,
    pub format: AudioFormat,
}

impl AudioFile {
    /// Reads the on-disk size and asks the media tool for the duration.
    pub fn inspect(
        path: &Path,
        media: &dyn MediaConverter,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let format = AudioFormat::from_path(path)
            .ok_or_else(|| format!("Unsupported audio format: {}", path.display()))?;
        let size_bytes = fs::metadata(path)?.len();
        let info = media.probe(path)?;
        if !info.duration_seconds.is_finite() || info.duration_seconds <= 0.0 {
            return Err(format!(
                "Invalid duration {} for {}",
                info.duration_seconds,
                path.display()
            )
            .into());
        }
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            duration_seconds: info.duration_seconds,
            format,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without its final extension. Inner dots are kept, so
    /// `File 09 (1.33).wav` becomes `File 09 (1.33)`.
    pub fn stem(&self) -> String {
        base_name(&self.path)
    }
}

pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists supported recordings directly inside `dir`, sorted by file name.
pub fn discover_audio_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_supported_audio(p))
        .collect();
    files.sort();
    Ok(files)
}
