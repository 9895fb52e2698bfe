pub mod ffmpeg_cli;
