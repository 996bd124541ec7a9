//! Blocking Gemini client implementing [`VisualDescriber`].

use crate::error::{Result, VisionError};
use crate::models::{GenerateContentRequest, GenerateContentResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use deck_core::{DescribeError, VisualDescriber};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection and retry settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    /// Total attempts per image, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Delay before attempt `attempt` (1-based, so attempt 2 is the first retry).
    fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(2))
    }
}

/// Describes slide images with a Gemini model.
pub struct GeminiDescriber {
    config: GeminiConfig,
    client: Client,
}

impl GeminiDescriber {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(VisionError::MissingApiKey);
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn send(&self, request: &GenerateContentRequest) -> std::result::Result<String, DescribeError> {
        let response = self
            .client
            .post(self.config.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .map_err(|e| DescribeError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: GenerateContentResponse = response
            .json()
            .map_err(|e| DescribeError::Rejected(format!("unreadable response: {}", e)))?;
        response_text(body)
    }
}

impl VisualDescriber for GeminiDescriber {
    fn describe(&self, image: &Path, prompt: &str) -> std::result::Result<String, DescribeError> {
        let png = std::fs::read(image)?;
        let request = GenerateContentRequest::prompt_with_png(prompt, STANDARD.encode(png));

        let mut attempt = 1;
        loop {
            match self.send(&request) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    attempt += 1;
                    let delay = self.config.delay_before(attempt);
                    log::warn!(
                        "{} for {}; retrying in {:?} (attempt {}/{})",
                        e,
                        image.display(),
                        delay,
                        attempt,
                        self.config.max_attempts
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a non-success HTTP status to a retryable or permanent failure.
fn status_error(status: StatusCode, body: &str) -> DescribeError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        DescribeError::Transient(message)
    } else {
        DescribeError::Rejected(message)
    }
}

fn response_text(body: GenerateContentResponse) -> std::result::Result<String, DescribeError> {
    if let Some(reason) = body.block_reason() {
        return Err(DescribeError::Rejected(format!("prompt blocked: {}", reason)));
    }
    Ok(body.text().unwrap_or_default())
}
