//! Audio extraction: turn the input media file into one canonical audio stream.
//!
//! Bare audio files pass through unchanged after validation; video containers
//! are demuxed with ffmpeg into an MP3 inside the pipeline's temporary
//! directory, so the stream disappears with the run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

/// Video containers we demux. Anything outside this set and the audio set is
/// rejected as unsupported.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "flv", "wmv"];

/// Bitrate used when demuxing video audio tracks; keeps size/duration math
/// predictable for the segmenter.
const EXPORT_BITRATE: &str = "128k";
const EXPORT_SAMPLE_RATE: &str = "44100";

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("input file not found or unreadable: {path}")]
    NotFound { path: PathBuf },

    #[error("unsupported or unrecognized media format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to decode media: {reason}")]
    DecodeFailed { reason: String },
}

/// Supported bare-audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            _ => None,
        }
    }

    /// MIME type used when uploading to the transcription service.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
        }
    }
}

/// How an input file will be treated, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    VideoContainer,
    Audio(AudioFormat),
}

impl SourceKind {
    pub fn detect(path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceKind::VideoContainer)
        } else {
            AudioFormat::from_extension(&ext).map(SourceKind::Audio)
        }
    }
}

/// The canonical audio produced by extraction, with the measurements the
/// segmenter needs.
#[derive(Debug, Clone)]
pub struct AudioStream {
    pub path: PathBuf,
    pub byte_size: u64,
    pub duration: Duration,
    pub format: AudioFormat,
}

pub struct AudioExtractor;

impl AudioExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract a single audio stream from `media_path`. Temporary demux
    /// output lands in `temp_dir`, whose owner is responsible for cleanup.
    pub async fn extract(
        &self,
        media_path: &Path,
        temp_dir: &Path,
    ) -> Result<AudioStream, ExtractionError> {
        self.validate_file(media_path)?;

        let kind = SourceKind::detect(media_path).ok_or_else(|| {
            ExtractionError::UnsupportedFormat {
                path: media_path.to_path_buf(),
            }
        })?;

        match kind {
            SourceKind::Audio(format) => {
                let duration = self.probe(media_path).await?;
                let byte_size = fs_err::metadata(media_path)
                    .map_err(|e| ExtractionError::DecodeFailed {
                        reason: e.to_string(),
                    })?
                    .len();

                tracing::info!(
                    "Input is already audio ({}), passing through unchanged",
                    format.as_str()
                );
                Ok(AudioStream {
                    path: media_path.to_path_buf(),
                    byte_size,
                    duration,
                    format,
                })
            }
            SourceKind::VideoContainer => {
                tracing::info!("Extracting audio track from {}", media_path.display());
                self.probe(media_path).await?;

                let target = temp_dir.join(format!(
                    "audio_{}.mp3",
                    &uuid::Uuid::new_v4().to_string()[..8]
                ));
                self.demux_to_mp3(media_path, &target).await?;

                let duration = self.probe(&target).await?;
                let byte_size = fs_err::metadata(&target)
                    .map_err(|e| ExtractionError::DecodeFailed {
                        reason: e.to_string(),
                    })?
                    .len();

                tracing::info!(
                    "Audio extracted to {} ({} bytes, {:.1}s)",
                    target.display(),
                    byte_size,
                    duration.as_secs_f64()
                );
                Ok(AudioStream {
                    path: target,
                    byte_size,
                    duration,
                    format: AudioFormat::Mp3,
                })
            }
        }
    }

    /// Check the file exists, is a regular file, and is not empty.
    fn validate_file(&self, path: &Path) -> Result<(), ExtractionError> {
        let not_found = || ExtractionError::NotFound {
            path: path.to_path_buf(),
        };

        if !path.is_file() {
            return Err(not_found());
        }
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > 0 => Ok(()),
            _ => Err(not_found()),
        }
    }

    /// Validate the file with ffprobe and read the audio duration. A file
    /// with a recognized extension but no decodable audio stream fails here.
    async fn probe(&self, path: &Path) -> Result<Duration, ExtractionError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| ExtractionError::DecodeFailed {
                reason: format!("failed to run ffprobe: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::DecodeFailed {
                reason: format!("ffprobe rejected {}: {}", path.display(), stderr.trim()),
            });
        }

        let info: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|e| ExtractionError::DecodeFailed {
                reason: format!("unparseable ffprobe output: {e}"),
            })?;

        let empty = vec![];
        let streams = info["streams"].as_array().unwrap_or(&empty);
        let has_audio = streams
            .iter()
            .any(|stream| stream["codec_type"].as_str() == Some("audio"));
        if !has_audio {
            return Err(ExtractionError::DecodeFailed {
                reason: format!("no audio stream in {}", path.display()),
            });
        }

        info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(|| ExtractionError::DecodeFailed {
                reason: format!("no duration reported for {}", path.display()),
            })
    }

    /// Demux the audio track to MP3, discarding video.
    async fn demux_to_mp3(&self, source: &Path, target: &Path) -> Result<(), ExtractionError> {
        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &source.to_string_lossy(),
                "-vn",
                "-acodec",
                "libmp3lame",
                "-ab",
                EXPORT_BITRATE,
                "-ar",
                EXPORT_SAMPLE_RATE,
                "-y",
                &target.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| ExtractionError::DecodeFailed {
                reason: format!("failed to run ffmpeg: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::DecodeFailed {
                reason: format!("ffmpeg failed on {}: {}", source.display(), stderr.trim()),
            });
        }

        Ok(())
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}
