use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::constants::{
    DEFAULT_FILE_ATTEMPTS, DEFAULT_INTER_CHUNK_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_CHUNK_SECONDS, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_REFINEMENT_MODEL,
    DEFAULT_TRANSCRIPTION_MODEL, MEGABYTE, SPLIT_HEADROOM,
};
use super::project_paths::ProjectPaths;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_FFMPEG_PATH: &str = "FFMPEG_PATH";
pub const ENV_FFPROBE_PATH: &str = "FFPROBE_PATH";
pub const ENV_DATA_DIR: &str = "AUDIOSCRIBE_DATA_DIR";
pub const ENV_MAX_UPLOAD_MB: &str = "AUDIOSCRIBE_MAX_UPLOAD_MB";
pub const ENV_MAX_CHUNK_SECONDS: &str = "AUDIOSCRIBE_MAX_CHUNK_SECONDS";
pub const ENV_TRANSCRIPTION_MODEL: &str = "AUDIOSCRIBE_TRANSCRIPTION_MODEL";
pub const ENV_REFINEMENT_MODEL: &str = "AUDIOSCRIBE_REFINEMENT_MODEL";
pub const ENV_MAX_ATTEMPTS: &str = "AUDIOSCRIBE_MAX_ATTEMPTS";
pub const ENV_DELETE_SOURCES: &str = "AUDIOSCRIBE_DELETE_SOURCES";

#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("{0} not found in environment variables")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Everything the pipeline needs to know before touching any file.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub data_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_chunk_seconds: f64,
    pub transcription_model: String,
    pub refinement_model: String,
    pub max_attempts: u32,
    pub file_attempts: u32,
    pub inter_chunk_delay: Duration,
    pub delete_sources: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_API_KEY).ok_or(SettingsError::Missing(ENV_API_KEY))?;

        let max_upload_bytes = match get(ENV_MAX_UPLOAD_MB) {
            Some(raw) => {
                let mb: f64 = parse(ENV_MAX_UPLOAD_MB, &raw)?;
                (mb * MEGABYTE as f64) as u64
            }
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let max_chunk_seconds = match get(ENV_MAX_CHUNK_SECONDS) {
            Some(raw) => parse(ENV_MAX_CHUNK_SECONDS, &raw)?,
            None => DEFAULT_MAX_CHUNK_SECONDS,
        };
        let max_attempts = match get(ENV_MAX_ATTEMPTS) {
            Some(raw) => parse(ENV_MAX_ATTEMPTS, &raw)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let delete_sources = match get(ENV_DELETE_SOURCES) {
            Some(raw) => parse_flag(ENV_DELETE_SOURCES, &raw)?,
            None => false,
        };

        let settings = Self {
            api_key: api_key.trim().to_string(),
            ffmpeg_path: get(ENV_FFMPEG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe_path: get(ENV_FFPROBE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffprobe")),
            data_dir: get(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            max_upload_bytes,
            max_chunk_seconds,
            transcription_model: get(ENV_TRANSCRIPTION_MODEL)
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            refinement_model: get(ENV_REFINEMENT_MODEL)
                .unwrap_or_else(|| DEFAULT_REFINEMENT_MODEL.to_string()),
            max_attempts,
            file_attempts: DEFAULT_FILE_ATTEMPTS,
            inter_chunk_delay: Duration::from_millis(DEFAULT_INTER_CHUNK_DELAY_MS),
            delete_sources,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.api_key.trim().is_empty() {
            return Err(SettingsError::Missing(ENV_API_KEY));
        }
        if self.max_upload_bytes == 0 {
            return Err(SettingsError::Invalid {
                var: ENV_MAX_UPLOAD_MB,
                value: self.max_upload_bytes.to_string(),
                reason: "must be positive",
            });
        }
        if self.split_size_ceiling() == 0 {
            return Err(SettingsError::Invalid {
                var: ENV_MAX_UPLOAD_MB,
                value: self.max_upload_bytes.to_string(),
                reason: "too small to leave room for split headroom",
            });
        }
        if !(self.max_chunk_seconds.is_finite() && self.max_chunk_seconds > 0.0) {
            return Err(SettingsError::Invalid {
                var: ENV_MAX_CHUNK_SECONDS,
                value: self.max_chunk_seconds.to_string(),
                reason: "must be positive",
            });
        }
        if self.max_attempts == 0 {
            return Err(SettingsError::Invalid {
                var: ENV_MAX_ATTEMPTS,
                value: "0".to_string(),
                reason: "at least one attempt is required",
            });
        }
        Ok(())
    }

    /// Size ceiling handed to the planner: the upload limit minus headroom.
    pub fn split_size_ceiling(&self) -> u64 {
        (self.max_upload_bytes as f64 * SPLIT_HEADROOM) as u64
    }

    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::under(&self.data_dir)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::Invalid {
        var,
        value: raw.to_string(),
        reason: "not a number",
    })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let s = Settings::from_lookup(lookup(&[(ENV_API_KEY, "sk-test")])).unwrap();
        assert_eq!(s.api_key, "sk-test");
        assert_eq!(s.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(s.max_chunk_seconds, 600.0);
        assert_eq!(s.transcription_model, "whisper-1");
        assert_eq!(s.refinement_model, "gpt-4o-mini");
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.file_attempts, 2);
        assert_eq!(s.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(s.data_dir, PathBuf::from("data"));
        assert!(!s.delete_sources);
    }

    #[test]
    fn test_missing_api_key() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, SettingsError::Missing(ENV_API_KEY));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let err = Settings::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert_eq!(err, SettingsError::Missing(ENV_API_KEY));
    }

    #[test]
    fn test_blank_model_falls_back_to_default() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "sk"),
            (ENV_REFINEMENT_MODEL, ""),
            (ENV_TRANSCRIPTION_MODEL, "gpt-4o-transcribe"),
        ]))
        .unwrap();
        assert_eq!(s.refinement_model, "gpt-4o-mini");
        assert_eq!(s.transcription_model, "gpt-4o-transcribe");
    }

    #[test]
    fn test_overrides_are_parsed() {
        let s = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "sk"),
            (ENV_MAX_UPLOAD_MB, "10"),
            (ENV_MAX_CHUNK_SECONDS, "120.5"),
            (ENV_MAX_ATTEMPTS, "5"),
            (ENV_DELETE_SOURCES, "yes"),
            (ENV_FFMPEG_PATH, "/opt/bin/ffmpeg"),
            (ENV_DATA_DIR, "/srv/audio"),
        ]))
        .unwrap();
        assert_eq!(s.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(s.max_chunk_seconds, 120.5);
        assert_eq!(s.max_attempts, 5);
        assert!(s.delete_sources);
        assert_eq!(s.ffmpeg_path, PathBuf::from("/opt/bin/ffmpeg"));
        assert_eq!(s.paths().splits, PathBuf::from("/srv/audio/splits"));
    }

    #[test]
    fn test_non_numeric_ceiling_rejected() {
        let err =
            Settings::from_lookup(lookup(&[(ENV_API_KEY, "sk"), (ENV_MAX_UPLOAD_MB, "big")]))
                .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { var, .. } if var == ENV_MAX_UPLOAD_MB));
    }

    #[test]
    fn test_upload_limit_without_headroom_rejected() {
        let err = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "sk"),
            (ENV_MAX_UPLOAD_MB, "0.000001"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid { var, reason, .. }
                if var == ENV_MAX_UPLOAD_MB && reason.contains("headroom")
        ));
    }

    #[test]
    fn test_non_positive_duration_ceiling_rejected() {
        let err = Settings::from_lookup(lookup(&[
            (ENV_API_KEY, "sk"),
            (ENV_MAX_CHUNK_SECONDS, "-1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { var, .. } if var == ENV_MAX_CHUNK_SECONDS));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = Settings::from_lookup(lookup(&[(ENV_API_KEY, "sk"), (ENV_MAX_ATTEMPTS, "0")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { var, .. } if var == ENV_MAX_ATTEMPTS));
    }

    #[test]
    fn test_split_ceiling_keeps_headroom() {
        let s = Settings::from_lookup(lookup(&[(ENV_API_KEY, "sk"), (ENV_MAX_UPLOAD_MB, "20")]))
            .unwrap();
        assert!(s.split_size_ceiling() < s.max_upload_bytes);
        assert_eq!(s.split_size_ceiling(), (20.0 * 1024.0 * 1024.0 * 0.95) as u64);
    }
}
