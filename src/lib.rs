//! Vidscribe - a CLI tool for turning the audio track of a video file into text
//!
//! This library extracts the audio stream from a local video (or accepts a bare
//! audio file), splits it into segments that fit the transcription service's
//! upload limit, submits each segment to a remote speech-to-text API, and
//! reassembles the results into a single transcript. Optionally the transcript
//! is condensed into a summary by a remote language model.

pub mod api;
pub mod cli;
pub mod config;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod transcript;
pub mod utils;

pub use cli::Cli;
pub use config::{Config, RunConfig};
pub use pipeline::{Pipeline, RunOutcome};
pub use transcript::{Transcript, TranscriptFragment};

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::extract::ExtractionError;
use crate::segment::SegmentationError;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for a single run, one variant per pipeline stage
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("audio extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("audio segmentation failed: {0}")]
    Segmentation(#[from] SegmentationError),

    #[error("transcription of segment {segment} failed after {attempts} attempt(s): {source}")]
    Transcription {
        segment: usize,
        attempts: u32,
        source: ApiError,
    },

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Distinct process exit code per fatal category, for scripting.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Extraction(ExtractionError::NotFound { .. }) => 3,
            Error::Extraction(ExtractionError::UnsupportedFormat { .. }) => 4,
            Error::Extraction(ExtractionError::DecodeFailed { .. }) => 5,
            Error::Segmentation(_) => 6,
            Error::Transcription { source, .. } => match source {
                ApiError::AuthenticationFailed(_) => 7,
                ApiError::RateLimited { .. } => 8,
                ApiError::ConnectionFailed(_) | ApiError::ServiceUnavailable { .. } => 9,
                ApiError::InvalidRequest(_) | ApiError::UnexpectedResponse(_) => 10,
            },
            Error::Io(_) => 1,
        }
    }
}
