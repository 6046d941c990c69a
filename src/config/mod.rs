use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::{output, utils};

/// Hard ceiling the transcription service places on one uploaded request.
/// Kept as a single configurable value since the remote service may change it.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no API key found: set OPENAI_API_KEY or add api_key to the config file")]
    MissingApiKey,

    #[error("invalid language tag '{0}'")]
    InvalidLanguage(String),

    #[error("invalid API base URL '{0}'")]
    InvalidApiBase(String),

    #[error("failed to load config file: {0}")]
    Unreadable(String),

    #[error("{0}")]
    Invalid(String),
}

/// On-disk configuration: service endpoint, models, limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the transcription/summarization API
    pub api_base: String,

    /// API key; the OPENAI_API_KEY environment variable wins over this
    pub api_key: Option<String>,

    /// Speech-to-text model name
    pub transcription_model: String,

    /// Chat model used for summaries
    pub summary_model: String,

    /// Per-request upload ceiling imposed by the transcription service
    pub max_upload_bytes: u64,

    /// Total attempts per remote call (first call included)
    pub retry_attempts: u32,

    /// Fixed delay between attempts, unless the service suggests its own
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            transcription_model: "whisper-1".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            retry_attempts: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

impl Config {
    /// Load configuration from `config.yaml` in the working directory, then
    /// the platform config directory; defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };

        let content =
            fs_err::read_to_string(&path).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        // Current directory first, for easy testing
        let local = PathBuf::from("config.yaml");
        if local.exists() {
            return Some(local);
        }

        let path = dirs::config_dir()?.join("vidscribe").join("config.yaml");
        path.exists().then_some(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api_base)
            .map_err(|_| ConfigError::InvalidApiBase(self.api_base.clone()))?;
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the credential: the process environment wins over the file.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

/// Everything one invocation needs, resolved once and never mutated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Echo the transcript to the console (set when no --output was given)
    pub echo_to_console: bool,
    pub quiet: bool,
    pub audio_language: Option<String>,
    pub summary_language: Option<String>,
    pub keep_audio: bool,
    pub api_key: String,
    pub api_base: String,
    pub transcription_model: String,
    pub summary_model: String,
    pub max_upload_bytes: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl RunConfig {
    /// Combine the CLI surface with file/environment configuration.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self, ConfigError> {
        let languages = [
            Some(&cli.audio_language),
            cli.transcript_language.as_ref(),
            cli.summary_language.as_ref(),
        ];
        for tag in languages.into_iter().flatten() {
            if !utils::is_language_tag(tag) {
                return Err(ConfigError::InvalidLanguage(tag.clone()));
            }
        }

        // The service transcribes, it does not translate; a differing
        // transcript language is informational only.
        if let Some(requested) = &cli.transcript_language {
            if *requested != cli.audio_language {
                tracing::warn!(
                    "transcript language '{}' differs from audio language '{}'; \
                     the transcription service does not translate",
                    requested,
                    cli.audio_language
                );
            }
        }

        let api_key = config.resolve_api_key()?;
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| output::default_output_path(&cli.input));

        Ok(Self {
            input: cli.input.clone(),
            echo_to_console: cli.output.is_none() && !cli.quiet,
            quiet: cli.quiet,
            output,
            audio_language: Some(cli.audio_language.clone()),
            summary_language: cli.summary_language.clone(),
            keep_audio: cli.keep_audio,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            transcription_model: config.transcription_model.clone(),
            summary_model: config.summary_model.clone(),
            max_upload_bytes: config.max_upload_bytes,
            retry_attempts: config.retry_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }
}
