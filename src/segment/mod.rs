//! Audio segmentation: partition an extracted stream into upload-sized pieces.
//!
//! Split policy: equal duration. The segment count is the smallest `n` with
//! `ceil(byte_size / n)` under the size target (bumped while the predicted
//! per-segment byte size still overshoots), and every segment gets
//! `ceil(duration / n)` milliseconds except the last, which takes the
//! remainder. Cutting uses ffmpeg stream copy, which lands on codec frame
//! boundaries, never mid-sample. A 5000-byte safety margin is held back from
//! the service limit so container overhead cannot push an exported chunk past
//! the ceiling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::extract::AudioStream;

/// Bytes held back from the service limit when sizing segments.
pub const SAFETY_MARGIN_BYTES: u64 = 5_000;

#[derive(thiserror::Error, Debug)]
pub enum SegmentationError {
    #[error("invalid segmentation input: {0}")]
    InvalidInput(String),

    #[error(
        "segment {index} is {byte_size} bytes, over the {max_bytes}-byte service limit, \
         and cannot be split further"
    )]
    SegmentTooLarge {
        index: usize,
        byte_size: u64,
        max_bytes: u64,
    },

    #[error("failed to cut segment {index}: {reason}")]
    ExportFailed { index: usize, reason: String },
}

/// One contiguous, upload-sized slice of the extracted audio.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Position in chronological order; assembly keys on this.
    pub index: usize,
    pub path: PathBuf,
    pub byte_size: u64,
    pub start: Duration,
    pub duration: Duration,
}

/// A planned cut: start offset and length in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Compute the equal-duration split plan. Pure: no filesystem, no ffmpeg.
///
/// The returned spans are ordered, contiguous from zero, non-overlapping, and
/// cover the whole duration. A stream already within `max_bytes` yields a
/// single span for the whole stream.
pub fn plan(
    byte_size: u64,
    duration_ms: u64,
    max_bytes: u64,
) -> Result<Vec<SegmentSpan>, SegmentationError> {
    if max_bytes == 0 {
        return Err(SegmentationError::InvalidInput(
            "maximum segment size must be positive".to_string(),
        ));
    }
    if byte_size == 0 || duration_ms == 0 {
        return Err(SegmentationError::InvalidInput(
            "audio stream is empty".to_string(),
        ));
    }

    if byte_size <= max_bytes {
        return Ok(vec![SegmentSpan {
            start_ms: 0,
            duration_ms,
        }]);
    }

    // One millisecond of audio is the smallest unit we can cut; if even that
    // exceeds the limit, no valid partition exists.
    let bytes_per_ms = div_ceil(byte_size, duration_ms);
    if bytes_per_ms > max_bytes {
        return Err(SegmentationError::SegmentTooLarge {
            index: 0,
            byte_size: bytes_per_ms,
            max_bytes,
        });
    }

    let mut count = div_ceil(byte_size, max_bytes);
    let span_ms = loop {
        let span_ms = div_ceil(duration_ms, count);
        if predicted_span_bytes(byte_size, duration_ms, span_ms) <= max_bytes {
            break span_ms;
        }
        count += 1;
    };

    let mut spans = Vec::with_capacity(count as usize);
    let mut start_ms = 0;
    while start_ms < duration_ms {
        let len = span_ms.min(duration_ms - start_ms);
        spans.push(SegmentSpan {
            start_ms,
            duration_ms: len,
        });
        start_ms += len;
    }
    Ok(spans)
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Byte size a span of `span_ms` is expected to occupy, assuming the stream's
/// average byte rate.
fn predicted_span_bytes(total_bytes: u64, total_ms: u64, span_ms: u64) -> u64 {
    let bytes = (total_bytes as u128 * span_ms as u128 + total_ms as u128 - 1) / total_ms as u128;
    bytes as u64
}

/// Cuts an [`AudioStream`] into segments that satisfy the service limit.
pub struct Segmenter {
    max_upload_bytes: u64,
}

impl Segmenter {
    pub fn new(max_upload_bytes: u64) -> Self {
        Self { max_upload_bytes }
    }

    /// Split the stream. A stream already within the limit passes through as
    /// a single segment, byte-identical to its source file. Otherwise the
    /// plan is exported with ffmpeg stream copy into `temp_dir` and every
    /// exported size is verified against the limit.
    pub async fn split(
        &self,
        stream: &AudioStream,
        temp_dir: &Path,
    ) -> Result<Vec<AudioSegment>, SegmentationError> {
        if self.max_upload_bytes == 0 {
            return Err(SegmentationError::InvalidInput(
                "maximum segment size must be positive".to_string(),
            ));
        }

        if stream.byte_size > 0 && stream.byte_size <= self.max_upload_bytes {
            tracing::info!(
                "Stream is within the {} byte limit, no split needed",
                self.max_upload_bytes
            );
            return Ok(vec![AudioSegment {
                index: 0,
                path: stream.path.clone(),
                byte_size: stream.byte_size,
                start: Duration::ZERO,
                duration: stream.duration,
            }]);
        }

        let duration_ms = stream.duration.as_millis() as u64;
        let target = self
            .max_upload_bytes
            .saturating_sub(SAFETY_MARGIN_BYTES)
            .max(1);
        let spans = plan(stream.byte_size, duration_ms, target)?;

        tracing::info!(
            "Splitting {} ({} bytes) into {} segments",
            stream.path.display(),
            stream.byte_size,
            spans.len()
        );

        let stem = stream
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");

        let mut segments = Vec::with_capacity(spans.len());
        for (index, span) in spans.iter().enumerate() {
            let path = temp_dir.join(format!(
                "{}_part{:03}.{}",
                stem,
                index,
                stream.format.as_str()
            ));
            self.cut(&stream.path, &path, span, index).await?;

            let byte_size = fs_err::metadata(&path)
                .map_err(|e| SegmentationError::ExportFailed {
                    index,
                    reason: e.to_string(),
                })?
                .len();
            if byte_size > self.max_upload_bytes {
                return Err(SegmentationError::SegmentTooLarge {
                    index,
                    byte_size,
                    max_bytes: self.max_upload_bytes,
                });
            }

            tracing::debug!(
                "Exported segment {} ({:.2}s - {:.2}s, {} bytes)",
                index,
                span.start_ms as f64 / 1000.0,
                (span.start_ms + span.duration_ms) as f64 / 1000.0,
                byte_size
            );
            segments.push(AudioSegment {
                index,
                path,
                byte_size,
                start: Duration::from_millis(span.start_ms),
                duration: Duration::from_millis(span.duration_ms),
            });
        }

        Ok(segments)
    }

    /// Stream-copy one span out of the source file; no re-encode, so cut
    /// points fall on codec frame boundaries.
    async fn cut(
        &self,
        source: &Path,
        target: &Path,
        span: &SegmentSpan,
        index: usize,
    ) -> Result<(), SegmentationError> {
        let start = format!("{:.3}", span.start_ms as f64 / 1000.0);
        let length = format!("{:.3}", span.duration_ms as f64 / 1000.0);

        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &source.to_string_lossy(),
                "-ss",
                &start,
                "-t",
                &length,
                "-c",
                "copy",
                "-y",
                &target.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| SegmentationError::ExportFailed {
                index,
                reason: format!("failed to run ffmpeg: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SegmentationError::ExportFailed {
                index,
                reason: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}
