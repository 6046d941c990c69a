use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vidscribe",
    about = "Extract and transcribe audio from video files using a remote speech-to-text service",
    version,
    long_about = "Extracts the audio track from a local video (or takes a bare audio file), \
splits it to fit the transcription service's upload limit, transcribes every segment, and \
writes the assembled transcript to a text file. Optionally asks a language model for a \
summary in a target language."
)]
pub struct Cli {
    /// Path to the input video or audio file
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Destination for the transcript (defaults to the input path with a .txt extension)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Declared language of the audio, passed to the transcription service
    #[arg(long, value_name = "CODE", default_value = "en")]
    pub audio_language: String,

    /// Requested transcript language; informational only, the service does not translate
    #[arg(long, value_name = "CODE")]
    pub transcript_language: Option<String>,

    /// Produce a summary in this language (a bare flag means "en")
    #[arg(
        long,
        value_name = "CODE",
        num_args = 0..=1,
        default_missing_value = "en"
    )]
    pub summary_language: Option<String>,

    /// Keep the extracted audio file next to the input
    #[arg(long)]
    pub keep_audio: bool,

    /// Suppress progress output and the console echo of the transcript
    #[arg(short, long)]
    pub quiet: bool,
}
