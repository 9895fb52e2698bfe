use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;

use crate::chunking::domain::chunk_plan::ChunkSegment;
use crate::chunking::domain::media_converter::{MediaConverter, MediaInfo};
use crate::shared::constants::MEDIA_COMMAND_TIMEOUT_SECS;

const ALLOWED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum MediaCommandError {
    #[error("refusing to run {0:?}: only ffmpeg and ffprobe are allowed")]
    DisallowedTool(PathBuf),
    #[error("failed to start {}: {source}", .tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} timed out after {}s", .tool.display(), .timeout.as_secs())]
    TimedOut { tool: PathBuf, timeout: Duration },
    #[error("{} exited with {status}: {stderr}", .tool.display())]
    Failed {
        tool: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("could not parse ffprobe output: {0}")]
    Parse(String),
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize, Default)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    bit_rate: Option<String>,
}

/// [`MediaConverter`] backed by the `ffmpeg` and `ffprobe` executables.
///
/// Only those two tools may be configured. Each invocation runs without a
/// shell, with stdin closed and a bounded wall-clock time. Outputs are
/// written under a temporary sibling name and renamed into place.
pub struct FfmpegCli {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfmpegCli {
    pub fn new(ffmpeg: &Path, ffprobe: &Path) -> Result<Self, MediaCommandError> {
        Ok(Self {
            ffmpeg: validate_tool(ffmpeg)?,
            ffprobe: validate_tool(ffprobe)?,
            timeout: Duration::from_secs(MEDIA_COMMAND_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, tool: &Path, args: &[String]) -> Result<Vec<u8>, MediaCommandError> {
        log::debug!("Running {} {}", tool.display(), args.join(" "));

        let mut child = Command::new(tool)
            .args(args)
            .env_clear()
            .envs(std::env::var_os("PATH").map(|p| ("PATH", p)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediaCommandError::Spawn {
                tool: tool.to_path_buf(),
                source: e,
            })?;

        // Drain both pipes on their own threads so a chatty child cannot block.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(MediaCommandError::TimedOut {
                        tool: tool.to_path_buf(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(MediaCommandError::Spawn {
                        tool: tool.to_path_buf(),
                        source: e,
                    });
                }
            }
        };

        let out = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let err = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

        if !status.success() {
            return Err(MediaCommandError::Failed {
                tool: tool.to_path_buf(),
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
            });
        }
        Ok(out)
    }

    fn ffmpeg_to(&self, mut args: Vec<String>, target: &Path) -> Result<(), MediaCommandError> {
        let staging = staging_path(target);
        args.push(staging.to_string_lossy().into_owned());

        let mut full = vec![
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        full.extend(args);

        match self.run(&self.ffmpeg, &full) {
            Ok(_) => fs::rename(&staging, target).map_err(|e| MediaCommandError::Spawn {
                tool: self.ffmpeg.clone(),
                source: e,
            }),
            Err(e) => {
                let _ = fs::remove_file(&staging);
                Err(e)
            }
        }
    }
}

impl MediaConverter for FfmpegCli {
    fn probe(&self, path: &Path) -> Result<MediaInfo, Box<dyn std::error::Error>> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration:stream=bit_rate".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().into_owned(),
        ];
        let out = self.run(&self.ffprobe, &args)?;
        Ok(parse_probe_output(&out)?)
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let args = vec![
            "-i".to_string(),
            source.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            "2".to_string(),
        ];
        self.ffmpeg_to(args, target)?;
        Ok(())
    }

    fn cut(
        &self,
        source: &Path,
        segments: &[ChunkSegment],
        outputs: &[PathBuf],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if segments.len() != outputs.len() {
            return Err(format!(
                "{} segments but {} output paths",
                segments.len(),
                outputs.len()
            )
            .into());
        }
        for (seg, out) in segments.iter().zip(outputs) {
            log::debug!(
                "Cutting segment {} [{:.3}s, {:.3}s) -> {}",
                seg.index,
                seg.start_seconds(),
                seg.end_seconds(),
                out.display()
            );
            let args = vec![
                "-i".to_string(),
                source.to_string_lossy().into_owned(),
                "-ss".to_string(),
                format!("{:.3}", seg.start_seconds()),
                "-to".to_string(),
                format!("{:.3}", seg.end_seconds()),
                "-vn".to_string(),
                "-c".to_string(),
                "copy".to_string(),
            ];
            self.ffmpeg_to(args, out)?;
        }
        Ok(())
    }
}

fn validate_tool(path: &Path) -> Result<PathBuf, MediaCommandError> {
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase());
    match name {
        Some(n) if ALLOWED_TOOLS.contains(&n.as_str()) => Ok(path.to_path_buf()),
        _ => Err(MediaCommandError::DisallowedTool(path.to_path_buf())),
    }
}

/// `talk_part001.mp3` -> `talk_part001.tmp.mp3`; the extension is kept so
/// ffmpeg still infers the container.
fn staging_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}.tmp.{}", ext.to_string_lossy()),
        None => format!("{stem}.tmp"),
    };
    target.with_file_name(name)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn parse_probe_output(raw: &[u8]) -> Result<MediaInfo, MediaCommandError> {
    let parsed: ProbeOutput =
        serde_json::from_slice(raw).map_err(|e| MediaCommandError::Parse(e.to_string()))?;

    let duration_seconds = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| MediaCommandError::Parse("missing format duration".to_string()))?;

    let bit_rate = parsed
        .streams
        .iter()
        .filter_map(|s| s.bit_rate.as_deref())
        .find_map(|b| b.trim().parse::<u64>().ok());

    Ok(MediaInfo {
        duration_seconds,
        bit_rate,
    })
}
