
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::LanguageModel;
use crate::config::{ConfigError, LlmConfig};
use crate::http::{HttpClient, ProviderError};

const SERVICE: &str = "anthropic";

/// Client for the Messages API
#[derive(Clone)]
pub struct AnthropicClient {
    messages_url: Url,
    model: String,
    api_key: String,
    api_version: String,
    http: HttpClient,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("messages_url", &self.messages_url.as_str())
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicClient {
    #[inline]
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, ConfigError> {
        let messages_url = config
            .base_url()?
            .join("/v1/messages")
            .map_err(|_| ConfigError::InvalidUrl(config.base_url.clone()))?;

        let http =
            HttpClient::new(SERVICE, config.timeout()).with_retry_attempts(config.retry_attempts);

        Ok(Self {
            messages_url,
            model: config.model.clone(),
            api_key,
            api_version: config.api_version.clone(),
            http,
        })
    }

    /// Build a client reading the key from the configured environment variable
    #[inline]
    pub fn from_env(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.http = self.http.with_backoff(backoff);
        self
    }

    /// Send one user message and block for the reply text
    #[inline]
    pub fn complete_blocking(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let body =
            serde_json::to_string(&request).map_err(|e| ProviderError::Request(e.to_string()))?;

        debug!(
            "Requesting completion from {} (prompt length: {}, max_tokens: {})",
            self.model,
            prompt.len(),
            max_tokens
        );

        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", self.api_version.as_str()),
        ];
        let response_text = self.http.post_json(&self.messages_url, &headers, &body)?;

        parse_completion(&response_text)
    }
}

/// Concatenate the text blocks of a Messages API response
fn parse_completion(response_text: &str) -> Result<String, ProviderError> {
    let response: MessagesResponse = serde_json::from_str(response_text)
        .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;

    let mut texts = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .peekable();

    if texts.peek().is_none() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(texts.collect())
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        let client = self.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || client.complete_blocking(&prompt, max_tokens))
            .await
            .map_err(|e| ProviderError::TaskFailed(e.to_string()))?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
