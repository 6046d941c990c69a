//! Orchestration behavior, driven with deterministic fake service clients so
//! no network (and no ffmpeg) is involved.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vidscribe::api::{ApiError, SpeechToText, Summarizer};
use vidscribe::config::RunConfig;
use vidscribe::output;
use vidscribe::segment::AudioSegment;
use vidscribe::transcript::TranscriptFragment;
use vidscribe::{Error, Pipeline};

enum TranscriberBehavior {
    Succeed,
    AuthFailureAt(usize),
    AlwaysRateLimited,
}

/// Fake speech-to-text client that answers from the segment file name.
struct FakeTranscriber {
    behavior: TranscriberBehavior,
    calls: Arc<AtomicUsize>,
}

impl FakeTranscriber {
    fn new(behavior: TranscriberBehavior) -> (Box<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Self {
                behavior,
                calls: calls.clone(),
            }),
            calls,
        )
    }
}

#[async_trait]
impl SpeechToText for FakeTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        _language: Option<&str>,
    ) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = segment_index(audio_path);
        match self.behavior {
            TranscriberBehavior::Succeed => Ok(format!("fragment {index}")),
            TranscriberBehavior::AuthFailureAt(fail_at) if index == fail_at => {
                Err(ApiError::AuthenticationFailed("invalid api key".into()))
            }
            TranscriberBehavior::AuthFailureAt(_) => Ok(format!("fragment {index}")),
            TranscriberBehavior::AlwaysRateLimited => {
                Err(ApiError::RateLimited { retry_after: None })
            }
        }
    }
}

enum SummarizerBehavior {
    Succeed,
    AlwaysRateLimited,
}

struct FakeSummarizer {
    behavior: SummarizerBehavior,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(
        &self,
        _transcript_text: &str,
        target_language: &str,
    ) -> Result<String, ApiError> {
        match self.behavior {
            SummarizerBehavior::Succeed => Ok(format!("summary in {target_language}")),
            SummarizerBehavior::AlwaysRateLimited => {
                Err(ApiError::RateLimited { retry_after: None })
            }
        }
    }
}

fn segment_index(path: &Path) -> usize {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.trim_start_matches("part").parse().ok())
        .expect("segment files are named part<N>")
}

fn fake_segments(dir: &Path, count: usize) -> anyhow::Result<Vec<AudioSegment>> {
    (0..count)
        .map(|index| {
            let path = dir.join(format!("part{index}.mp3"));
            fs_err::write(&path, format!("audio bytes {index}"))?;
            Ok(AudioSegment {
                index,
                path,
                byte_size: 16,
                start: Duration::from_secs(index as u64 * 10),
                duration: Duration::from_secs(10),
            })
        })
        .collect()
}

fn test_config(dir: &Path) -> RunConfig {
    RunConfig {
        input: dir.join("input.mp4"),
        output: dir.join("transcript.txt"),
        echo_to_console: false,
        quiet: true,
        audio_language: Some("en".to_string()),
        summary_language: None,
        keep_audio: false,
        api_key: "sk-test".to_string(),
        api_base: "http://127.0.0.1:9".to_string(),
        transcription_model: "whisper-1".to_string(),
        summary_model: "test-model".to_string(),
        max_upload_bytes: 25 * 1024 * 1024,
        retry_attempts: 3,
        retry_backoff_ms: 1,
    }
}

fn ok_summarizer() -> Box<FakeSummarizer> {
    Box::new(FakeSummarizer {
        behavior: SummarizerBehavior::Succeed,
    })
}

#[tokio::test]
async fn segments_transcribe_and_assemble_in_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let segments = fake_segments(dir.path(), 3)?;
    let config = test_config(dir.path());
    let output_path = config.output.clone();

    let (transcriber, _) = FakeTranscriber::new(TranscriberBehavior::Succeed);
    let pipeline = Pipeline::with_clients(config, transcriber, ok_summarizer())?;

    let fragments = pipeline.transcribe_segments(&segments).await?;
    let outcome = pipeline.finish(fragments).await?;

    assert_eq!(outcome.transcript_path, output_path);
    assert_eq!(
        fs_err::read_to_string(&output_path)?,
        "fragment 0\nfragment 1\nfragment 2"
    );
    assert!(outcome.summary_path.is_none());
    assert!(outcome.summary_warning.is_none());
    Ok(())
}

#[tokio::test]
async fn fatal_failure_discards_earlier_successes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let segments = fake_segments(dir.path(), 4)?;
    let config = test_config(dir.path());
    let output_path = config.output.clone();

    let (transcriber, calls) = FakeTranscriber::new(TranscriberBehavior::AuthFailureAt(2));
    let pipeline = Pipeline::with_clients(config, transcriber, ok_summarizer())?;

    let err = pipeline.transcribe_segments(&segments).await.unwrap_err();
    match err {
        Error::Transcription {
            segment,
            attempts,
            source,
        } => {
            assert_eq!(segment, 2);
            assert_eq!(attempts, 1, "authentication failures are not retried");
            assert!(matches!(source, ApiError::AuthenticationFailed(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Segments 0 and 1 succeeded, 2 failed, 3 was never attempted.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(
        !output_path.exists(),
        "no transcript may be written for a failed run"
    );
    Ok(())
}

#[tokio::test]
async fn retry_exhaustion_reports_the_attempt_count() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let segments = fake_segments(dir.path(), 1)?;
    let config = test_config(dir.path());

    let (transcriber, calls) = FakeTranscriber::new(TranscriberBehavior::AlwaysRateLimited);
    let pipeline = Pipeline::with_clients(config, transcriber, ok_summarizer())?;

    let err = pipeline.transcribe_segments(&segments).await.unwrap_err();
    match err {
        Error::Transcription {
            segment,
            attempts,
            source,
        } => {
            assert_eq!(segment, 0);
            assert_eq!(attempts, 3);
            assert!(matches!(source, ApiError::RateLimited { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn out_of_order_fragments_assemble_chronologically() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());
    let output_path = config.output.clone();

    let (transcriber, _) = FakeTranscriber::new(TranscriberBehavior::Succeed);
    let pipeline = Pipeline::with_clients(config, transcriber, ok_summarizer())?;

    let fragments = vec![
        TranscriptFragment {
            index: 2,
            text: "third".to_string(),
        },
        TranscriptFragment {
            index: 0,
            text: "first".to_string(),
        },
        TranscriptFragment {
            index: 1,
            text: "second".to_string(),
        },
    ];
    pipeline.finish(fragments).await?;

    assert_eq!(
        fs_err::read_to_string(&output_path)?,
        "first\nsecond\nthird"
    );
    Ok(())
}

#[tokio::test]
async fn summary_failure_leaves_the_transcript_intact() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.summary_language = Some("en".to_string());
    let output_path = config.output.clone();
    let summary_file = output::summary_path(&output_path);

    let (transcriber, _) = FakeTranscriber::new(TranscriberBehavior::Succeed);
    let summarizer = Box::new(FakeSummarizer {
        behavior: SummarizerBehavior::AlwaysRateLimited,
    });
    let pipeline = Pipeline::with_clients(config, transcriber, summarizer)?;

    let fragments = vec![TranscriptFragment {
        index: 0,
        text: "hello world".to_string(),
    }];
    let outcome = pipeline.finish(fragments).await?;

    assert!(outcome.summary_warning.is_some());
    assert!(outcome.summary_path.is_none());
    assert_eq!(fs_err::read_to_string(&output_path)?, "hello world");
    assert!(!summary_file.exists());
    Ok(())
}

#[tokio::test]
async fn successful_summary_is_written_next_to_the_transcript() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = test_config(dir.path());
    config.summary_language = Some("es".to_string());
    let output_path = config.output.clone();

    let (transcriber, _) = FakeTranscriber::new(TranscriberBehavior::Succeed);
    let pipeline = Pipeline::with_clients(config, transcriber, ok_summarizer())?;

    let fragments = vec![TranscriptFragment {
        index: 0,
        text: "hola".to_string(),
    }];
    let outcome = pipeline.finish(fragments).await?;

    let summary_path: PathBuf = outcome.summary_path.expect("summary should be written");
    assert_eq!(summary_path, output::summary_path(&output_path));
    assert_eq!(fs_err::read_to_string(&summary_path)?, "summary in es");
    assert!(outcome.summary_warning.is_none());
    Ok(())
}
