pub mod chunking {
    pub mod domain {
        pub mod audio_chunk;
        pub mod audio_splitter;
        pub mod chunk_plan;
        pub mod media_converter;
    }
    pub mod infrastructure;
}

pub mod transcription {
    pub mod domain {
        pub mod api_error;
        pub mod chunk_result;
        pub mod retry_scheduler;
        pub mod speech_to_text;
        pub mod text_refiner;
        pub mod transcription_client;
    }
    pub mod infrastructure;
}

pub mod transcript {
    pub mod domain {
        pub mod transcript_assembler;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod chunk_transcription_coordinator;
    pub mod clean_transcripts_use_case;
    pub mod file_report;
    pub mod pipeline_error;
    pub mod pipeline_logger;
    pub mod retrying;
    pub mod transcribe_files_use_case;
    pub mod transcript_cleaner;
}

pub mod shared {
    pub mod audio_file;
    pub mod constants;
    pub mod project_paths;
    pub mod settings;
}
