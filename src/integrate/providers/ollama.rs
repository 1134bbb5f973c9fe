//! Local Ollama provider.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, transport_error};
use crate::error::{GenerationError, Result};
use crate::integrate::generator::{Generation, GenerationRequest, TextGenerator, TokenUsage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Model name
    pub model: String,
    /// Server URL
    pub base_url: String,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl OllamaConfig {
    /// Create a configuration for a model on the default local server.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the server URL.
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
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    config: OllamaConfig,
    client: Client,
}

impl OllamaGenerator {
    /// Create a generator.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate(&self, request: &GenerationRequest) -> std::result::Result<Generation, GenerationError> {
        let body = GenerateRequest {
            model: &self.config.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, self.config.timeout))?;
        let parsed: GenerateResponse = check_status(response)?
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let mut generation = Generation::new(parsed.response);
        if let (Some(prompt), Some(completion)) = (parsed.prompt_eval_count, parsed.eval_count) {
            generation = generation.with_usage(TokenUsage::reported(prompt, completion));
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{"model":"llama3.1","response":"Body [31].","done":true,"prompt_eval_count":30,"eval_count":6}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.response, "Body [31].");
        assert_eq!(parsed.eval_count, Some(6));
    }

    #[test]
    fn test_missing_counts_are_optional() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"response":"x"}"#).unwrap();
        assert!(parsed.prompt_eval_count.is_none());
    }
}
