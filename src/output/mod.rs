//! Writing the transcript and summary to their destinations.

use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::transcript::Transcript;
use crate::Result;

/// Default transcript destination: the input path with a `.txt` extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("txt")
}

/// Destination for the optional summary, next to the transcript.
pub fn summary_path(transcript_path: &Path) -> PathBuf {
    let stem = transcript_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript");
    transcript_path.with_file_name(format!("{stem}.summary.txt"))
}

/// Write the assembled transcript, echoing it to the console when the run
/// did not name an explicit output file.
pub fn write_transcript(config: &RunConfig, transcript: &Transcript) -> Result<PathBuf> {
    fs_err::write(&config.output, &transcript.text)?;

    if config.echo_to_console {
        println!("\n--- Audio Transcription ---");
        println!("{}", transcript.text);
    }

    Ok(config.output.clone())
}

/// Write the summary next to the transcript.
pub fn write_summary(config: &RunConfig, summary: &str) -> Result<PathBuf> {
    let path = summary_path(&config.output);
    fs_err::write(&path, summary)?;

    if config.echo_to_console {
        println!("\n--- Summary ---");
        println!("{summary}");
    }

    Ok(path)
}
