//! The orchestrator: extract, segment, transcribe, assemble, summarize.
//!
//! Stages run strictly forward on one logical thread of control; retries live
//! inside the remote clients, never here. Transcription is all-or-nothing: a
//! fatal failure on any segment aborts the run before anything is written, so
//! a gap can never silently corrupt the output. A summarization failure, by
//! contrast, degrades to a warning once the transcript exists.

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;

use crate::api::{
    self, ChatSummarizer, RetryPolicy, SpeechToText, Summarizer, WhisperClient,
};
use crate::config::{ConfigError, RunConfig};
use crate::extract::AudioExtractor;
use crate::output;
use crate::segment::{AudioSegment, Segmenter};
use crate::transcript::{self, Transcript, TranscriptFragment};
use crate::utils;
use crate::{Error, Result};

/// Pipeline stages, named for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Segmenting,
    Transcribing,
    Assembling,
    Summarizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "extracting",
            Stage::Segmenting => "segmenting",
            Stage::Transcribing => "transcribing",
            Stage::Assembling => "assembling",
            Stage::Summarizing => "summarizing",
        }
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub transcript_path: PathBuf,
    pub transcript: Transcript,
    pub summary_path: Option<PathBuf>,
    /// Set when summarization failed; the transcript output is still valid.
    pub summary_warning: Option<String>,
}

/// One run of the extract-segment-transcribe-summarize sequence.
///
/// Owns the temporary directory every intermediate artifact (demuxed audio,
/// segment files) is written into, so cleanup happens on every exit path when
/// the pipeline drops.
pub struct Pipeline {
    config: RunConfig,
    transcriber: Box<dyn SpeechToText>,
    summarizer: Box<dyn Summarizer>,
    temp_dir: TempDir,
}

impl Pipeline {
    /// Build a pipeline with the production HTTP clients.
    pub fn new(config: RunConfig) -> Result<Self> {
        let transcriber = WhisperClient::new(
            &config.api_base,
            &config.api_key,
            &config.transcription_model,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let summarizer =
            ChatSummarizer::new(&config.api_base, &config.api_key, &config.summary_model)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Self::with_clients(config, Box::new(transcriber), Box::new(summarizer))
    }

    /// Build a pipeline with caller-supplied service clients. Tests use this
    /// to substitute deterministic fakes for the remote services.
    pub fn with_clients(
        config: RunConfig,
        transcriber: Box<dyn SpeechToText>,
        summarizer: Box<dyn Summarizer>,
    ) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        Ok(Self {
            config,
            transcriber,
            summarizer,
            temp_dir,
        })
    }

    /// Run the whole pipeline for the configured input.
    pub async fn run(&self) -> Result<RunOutcome> {
        tracing::info!(
            stage = Stage::Extracting.as_str(),
            "Processing {}",
            self.config.input.display()
        );
        let extractor = AudioExtractor::new();
        let stream = extractor
            .extract(&self.config.input, self.temp_dir.path())
            .await?;

        if self.config.keep_audio && stream.path != self.config.input {
            let kept = self.config.input.with_extension(stream.format.as_str());
            fs_err::copy(&stream.path, &kept)?;
            tracing::info!("Extracted audio kept at {}", kept.display());
        }

        tracing::info!(
            stage = Stage::Segmenting.as_str(),
            "Audio stream is {} over {}",
            utils::format_file_size(stream.byte_size),
            utils::format_duration(stream.duration.as_secs_f64())
        );
        let segmenter = Segmenter::new(self.config.max_upload_bytes);
        let segments = segmenter.split(&stream, self.temp_dir.path()).await?;

        let fragments = self.transcribe_segments(&segments).await?;
        self.finish(fragments).await
    }

    /// Transcribe every segment in ascending ordinal order, one at a time.
    /// The first fatal error (or retry exhaustion) aborts the remaining
    /// segments; earlier successes are discarded with it, never written.
    pub async fn transcribe_segments(
        &self,
        segments: &[AudioSegment],
    ) -> Result<Vec<TranscriptFragment>> {
        let progress = self.progress_bar(segments.len() as u64);
        let language = self.config.audio_language.as_deref();
        let retry = self.retry_policy();

        let mut fragments = Vec::with_capacity(segments.len());
        for segment in segments {
            tracing::info!(
                stage = Stage::Transcribing.as_str(),
                "Transcribing segment {} of {}",
                segment.index + 1,
                segments.len()
            );
            progress.set_message(format!("segment {} of {}", segment.index + 1, segments.len()));

            let (attempts, result) = api::with_retries(retry, || {
                self.transcriber.transcribe(&segment.path, language)
            })
            .await;

            match result {
                Ok(text) => {
                    fragments.push(TranscriptFragment {
                        index: segment.index,
                        text,
                    });
                    progress.inc(1);
                }
                Err(source) => {
                    progress.abandon_with_message(format!(
                        "failed at segment {}",
                        segment.index
                    ));
                    return Err(Error::Transcription {
                        segment: segment.index,
                        attempts,
                        source,
                    });
                }
            }
        }

        progress.finish_with_message("transcription complete");
        Ok(fragments)
    }

    /// Assemble the fragments, write the transcript, then attempt the
    /// optional summary. A summary failure is reported in the outcome but
    /// never invalidates the transcript that was already written.
    pub async fn finish(&self, fragments: Vec<TranscriptFragment>) -> Result<RunOutcome> {
        tracing::info!(
            stage = Stage::Assembling.as_str(),
            "Assembling {} fragment(s)",
            fragments.len()
        );
        let transcript = transcript::assemble(fragments);
        let transcript_path = output::write_transcript(&self.config, &transcript)?;

        let (summary_path, summary_warning) = match &self.config.summary_language {
            None => (None, None),
            Some(target_language) => {
                tracing::info!(
                    stage = Stage::Summarizing.as_str(),
                    "Requesting summary in '{}'",
                    target_language
                );
                let retry = self.retry_policy();
                let (_, result) = api::with_retries(retry, || {
                    self.summarizer.summarize(&transcript.text, target_language)
                })
                .await;

                match result {
                    Ok(summary) => (Some(output::write_summary(&self.config, &summary)?), None),
                    Err(err) => {
                        tracing::warn!(
                            "summarization failed, transcript is unaffected: {}",
                            err
                        );
                        (None, Some(err.to_string()))
                    }
                }
            }
        };

        Ok(RunOutcome {
            transcript_path,
            transcript,
            summary_path,
            summary_warning,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.retry_attempts,
            backoff: std::time::Duration::from_millis(self.config.retry_backoff_ms),
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.config.quiet {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap(),
        );
        progress
    }
}
