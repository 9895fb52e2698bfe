use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};

use audioscribe_core::chunking::domain::audio_splitter::AudioSplitter;
use audioscribe_core::chunking::infrastructure::ffmpeg_cli::FfmpegCli;
use audioscribe_core::pipeline::chunk_transcription_coordinator::ChunkTranscriptionCoordinator;
use audioscribe_core::pipeline::clean_transcripts_use_case::CleanTranscriptsUseCase;
use audioscribe_core::pipeline::file_report::RunSummary;
use audioscribe_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use audioscribe_core::pipeline::transcribe_files_use_case::{
    TranscribeFilesUseCase, TranscribeOptions,
};
use audioscribe_core::pipeline::transcript_cleaner::TranscriptCleaner;
use audioscribe_core::shared::constants::{MEGABYTE, OPENAI_API_BASE};
use audioscribe_core::shared::settings::Settings;
use audioscribe_core::transcript::infrastructure::transcript_store::TranscriptStore;
use audioscribe_core::transcription::domain::retry_scheduler::RetryScheduler;
use audioscribe_core::transcription::domain::transcription_client::TranscriptionClient;
use audioscribe_core::transcription::infrastructure::openai_speech_to_text::OpenAiSpeechToText;
use audioscribe_core::transcription::infrastructure::openai_text_refiner::OpenAiTextRefiner;

/// Exit status when the run finished but at least one file failed.
const EXIT_FILE_FAILURES: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "audioscribe",
    version,
    about = "Transcribe long audio recordings in upload-sized chunks"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Data directory holding original/, splits/ and transcripts/.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Attempts per chunk (and per refinement request) before giving up.
    #[arg(long, global = true)]
    max_attempts: Option<u32>,
    /// Upload size limit of the transcription service, in megabytes.
    #[arg(long, global = true)]
    max_upload_mb: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe every audio file in the incoming directory (default).
    Transcribe {
        /// Skip the refinement pass.
        #[arg(long)]
        no_clean: bool,
        /// Delete source audio once all of its chunks transcribed.
        #[arg(long)]
        delete_sources: bool,
    },
    /// Refine stored transcripts that have no clean version yet.
    Clean,
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(summary) if summary.has_failures() => process::exit(EXIT_FILE_FAILURES),
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<RunSummary, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let paths = settings.paths();
    paths.ensure()?;

    let cancelled = install_interrupt_handler()?;
    let mut logger = LogPipelineLogger::new();

    let summary = match cli.command.unwrap_or(Command::Transcribe {
        no_clean: false,
        delete_sources: false,
    }) {
        Command::Transcribe {
            no_clean,
            delete_sources,
        } => {
            let cleaner = if no_clean {
                None
            } else {
                Some(build_cleaner(&settings)?)
            };
            let options = TranscribeOptions {
                plan_size_ceiling: settings.split_size_ceiling(),
                duration_ceiling: settings.max_chunk_seconds,
                file_attempts: settings.file_attempts,
                delete_sources: settings.delete_sources || delete_sources,
            };
            let media = FfmpegCli::new(&settings.ffmpeg_path, &settings.ffprobe_path)?;
            let splitter =
                AudioSplitter::new(Box::new(media), &paths.splits, settings.max_upload_bytes);
            let use_case = TranscribeFilesUseCase::new(
                splitter,
                build_coordinator(&settings)?,
                cleaner,
                TranscriptStore::new(&paths),
                options,
            );
            log::info!(
                "Transcribing files in {} (upload limit {:.1} MB)",
                paths.incoming.display(),
                settings.max_upload_bytes as f64 / MEGABYTE as f64
            );
            use_case.execute(&paths.incoming, &mut logger, Some(cancelled))?
        }
        Command::Clean => {
            let use_case =
                CleanTranscriptsUseCase::new(build_cleaner(&settings)?, TranscriptStore::new(&paths));
            use_case.execute(&mut logger, Some(cancelled))?
        }
    };

    logger.summary();
    if summary.cancelled {
        log::warn!("Run interrupted; rerun to continue where it stopped");
    }
    Ok(summary)
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::from_env()?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(attempts) = cli.max_attempts {
        settings.max_attempts = attempts;
    }
    if let Some(mb) = cli.max_upload_mb {
        settings.max_upload_bytes = (mb * MEGABYTE as f64) as u64;
    }
    settings.validate()?;
    Ok(settings)
}

fn build_coordinator(
    settings: &Settings,
) -> Result<ChunkTranscriptionCoordinator, Box<dyn std::error::Error>> {
    let speech = OpenAiSpeechToText::new(
        &settings.api_key,
        OPENAI_API_BASE,
        &settings.transcription_model,
    )?;
    Ok(ChunkTranscriptionCoordinator::new(
        TranscriptionClient::new(Box::new(speech)),
        RetryScheduler::default(),
        settings.max_attempts,
        settings.inter_chunk_delay,
    ))
}

fn build_cleaner(settings: &Settings) -> Result<TranscriptCleaner, Box<dyn std::error::Error>> {
    let refiner =
        OpenAiTextRefiner::new(&settings.api_key, OPENAI_API_BASE, &settings.refinement_model)?;
    Ok(TranscriptCleaner::new(
        Box::new(refiner),
        RetryScheduler::default(),
        settings.max_attempts,
    ))
}

/// First Ctrl-C stops the run before the next file; a second one exits.
fn install_interrupt_handler() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let flag = cancelled.clone();
    thread::spawn(move || {
        runtime.block_on(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                if flag.swap(true, Ordering::SeqCst) {
                    eprintln!("\nInterrupted again, exiting");
                    process::exit(EXIT_INTERRUPTED);
                }
                eprintln!("\nInterrupt received, finishing the current file (Ctrl-C again to exit)");
            }
        });
    });
    Ok(cancelled)
}
