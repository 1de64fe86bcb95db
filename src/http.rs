//! Blocking HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Failure reported by an embedding or language model provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned an unexpected response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("could not build request: {0}")]
    Request(String),
    #[error("provider task failed: {0}")]
    TaskFailed(String),
}

impl ProviderError {
    #[inline]
    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }
}

/// Transport failures and 5xx responses are worth another attempt
#[inline]
pub fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

/// A `ureq` agent plus retry policy for one upstream service
#[derive(Debug, Clone)]
pub struct HttpClient {
    service: &'static str,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

impl HttpClient {
    #[inline]
    pub fn new(service: &'static str, timeout: Duration) -> Self {
        Self {
            service,
            agent: build_agent(timeout),
            retry_attempts: 3,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay for exponential backoff between attempts
    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get(&self, url: &Url) -> Result<String, ProviderError> {
        self.send_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    #[inline]
    pub fn post_json(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, ProviderError> {
        self.send_with_retry(|| {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn send_with_retry<F>(&self, mut request_fn: F) -> Result<String, ProviderError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "{} request attempt {}/{}",
                self.service, attempt, self.retry_attempts
            );

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        warn!("{} non-retryable error: {}", self.service, error);
                        return Err(self.classify(error));
                    }

                    warn!(
                        "{} error: {}, attempt {}/{}",
                        self.service, error, attempt, self.retry_attempts
                    );
                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for {}", self.service);

        Err(last_error.map_or_else(
            || ProviderError::Transport {
                service: self.service,
                message: "request failed after retries".to_string(),
            },
            |e| self.classify(e),
        ))
    }

    fn classify(&self, error: ureq::Error) -> ProviderError {
        match error {
            ureq::Error::StatusCode(status) => ProviderError::Status {
                service: self.service,
                status,
            },
            other => ProviderError::Transport {
                service: self.service,
                message: other.to_string(),
            },
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
