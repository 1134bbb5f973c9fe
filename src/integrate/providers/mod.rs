//! HTTP text-generation providers.
//!
//! All providers use a blocking `reqwest` client with a request timeout and
//! map transport, status and payload problems onto [`GenerationError`].

mod anthropic;
mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use super::generator::TextGenerator;
use crate::error::{Error, GenerationError, Result};

pub use anthropic::{AnthropicConfig, AnthropicGenerator};
pub use ollama::{OllamaConfig, OllamaGenerator};
pub use openai::{OpenAiConfig, OpenAiGenerator};

/// Supported provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// Parse a provider name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "gpt" => Some(ProviderKind::OpenAi),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            "ollama" | "local" => Some(ProviderKind::Ollama),
            _ => None,
        }
    }

    /// Default model for the provider.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::Ollama => "llama3.1",
        }
    }
}

/// Settings shared by every provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Provider kind
    pub kind: ProviderKind,
    /// API key (not needed for Ollama)
    pub api_key: Option<String>,
    /// Model name; provider default when `None`
    pub model: Option<String>,
    /// Endpoint override
    pub base_url: Option<String>,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Settings for a provider kind with defaults.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: None,
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Build a generator from settings.
pub fn build_generator(settings: ProviderSettings) -> Result<Arc<dyn TextGenerator>> {
    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| settings.kind.default_model().to_string());
    let require_key = || {
        settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidOption(format!("{:?} provider needs an API key", settings.kind)))
    };

    let generator: Arc<dyn TextGenerator> = match settings.kind {
        ProviderKind::OpenAi => {
            let mut config = OpenAiConfig::new(require_key()?, model).with_timeout(settings.timeout);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url.clone());
            }
            Arc::new(OpenAiGenerator::new(config)?)
        }
        ProviderKind::Anthropic => {
            let mut config =
                AnthropicConfig::new(require_key()?, model).with_timeout(settings.timeout);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url.clone());
            }
            Arc::new(AnthropicGenerator::new(config)?)
        }
        ProviderKind::Ollama => {
            let mut config = OllamaConfig::new(model).with_timeout(settings.timeout);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url.clone());
            }
            Arc::new(OllamaGenerator::new(config)?)
        }
    };
    Ok(generator)
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Other(format!("HTTP client error: {}", e)))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout.as_millis() as u64)
    } else {
        GenerationError::Transport(err.to_string())
    }
}

/// Turn a non-success response into an error; pass successful ones through.
fn check_status(response: Response) -> std::result::Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: String = response.text().unwrap_or_default().chars().take(300).collect();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
            GenerationError::Quota(format!("{}: {}", status, body))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            GenerationError::Unavailable(format!("{}: {}", status, body))
        }
        _ => GenerationError::Transport(format!("{}: {}", status, body)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("claude"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("ollama"), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::parse("other"), None);
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = build_generator(ProviderSettings::new(ProviderKind::OpenAi));
        assert!(matches!(result, Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let generator = build_generator(ProviderSettings::new(ProviderKind::Ollama)).unwrap();
        assert_eq!(generator.name(), "ollama");
    }
}
