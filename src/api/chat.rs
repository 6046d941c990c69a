//! Summarization client backed by a chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiError, Summarizer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// HTTP client for the remote summarization model.
pub struct ChatSummarizer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ChatSummarizer {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(
        &self,
        transcript_text: &str,
        target_language: &str,
    ) -> Result<String, ApiError> {
        if transcript_text.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "transcript is empty, nothing to summarize".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format!(
                        "You write concise summaries of spoken-audio transcripts. \
                         Reply only with the summary, in the language with code '{}'.",
                        target_language
                    ),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Summarize the following transcript:\n\n{}", transcript_text),
                },
            ],
            temperature: 0.3,
        };

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!("Requesting summary from {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &headers, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApiError::UnexpectedResponse("response carried no choices".to_string()))
    }
}
