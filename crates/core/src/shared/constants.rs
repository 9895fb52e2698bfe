pub const MEGABYTE: u64 = 1024 * 1024;

/// Upload ceiling of the remote transcription endpoint.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * MEGABYTE;

/// Ten minutes per chunk keeps individual requests well inside the call timeout.
pub const DEFAULT_MAX_CHUNK_SECONDS: f64 = 600.0;

/// Fraction of the upload ceiling the planner aims for; the remainder absorbs
/// bitrate variance that the constant-bitrate estimate cannot see.
pub const SPLIT_HEADROOM: f64 = 0.95;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_FILE_ATTEMPTS: u32 = 2;
pub const DEFAULT_INTER_CHUNK_DELAY_MS: u64 = 1_000;

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_REFINEMENT_MODEL: &str = "gpt-4o-mini";

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Extensions accepted by the directory scan (lowercase, without dot).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

pub const CHUNK_INFIX: &str = "_part";
pub const TRANSCRIPT_EXTENSION: &str = "txt";
pub const CLEAN_TRANSCRIPT_SUFFIX: &str = ".clean.txt";
pub const PAYLOAD_EXTENSION: &str = "json";

/// Upper bound for a single ffmpeg/ffprobe invocation.
pub const MEDIA_COMMAND_TIMEOUT_SECS: u64 = 300;
