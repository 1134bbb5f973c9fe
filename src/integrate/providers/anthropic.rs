//! Anthropic messages API provider.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, transport_error};
use crate::error::{GenerationError, Result};
use crate::integrate::generator::{Generation, GenerationRequest, TextGenerator, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Model name
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Create a configuration for a model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Generator backed by the Anthropic messages API.
pub struct AnthropicGenerator {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicGenerator {
    /// Create a generator.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn generate(&self, request: &GenerationRequest) -> std::result::Result<Generation, GenerationError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, self.config.timeout))?;
        let parsed: MessagesResponse = check_status(response)?
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(GenerationError::Malformed(
                "response has no text content".to_string(),
            ));
        }

        let mut generation = Generation::new(text);
        if let Some(usage) = parsed.usage {
            generation = generation.with_usage(TokenUsage::reported(
                usage.input_tokens,
                usage.output_tokens,
            ));
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{"id":"msg_1","type":"message","content":[{"type":"text","text":"Body [31]."}],"usage":{"input_tokens":20,"output_tokens":5}}"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.content[0].text, "Body [31].");
        assert_eq!(parsed.usage.map(|u| u.output_tokens), Some(5));
    }
}
