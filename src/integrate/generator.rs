//! Text-generation collaborator interface.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::model::ReferenceType;

/// One candidate as shown to the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Number the collaborator must use in the marker
    pub placeholder: u32,
    /// Candidate type tag
    #[serde(rename = "type")]
    pub type_tag: ReferenceType,
    /// Title
    pub title: String,
    /// Author line
    pub authors: String,
    /// Publication year
    pub year: Option<i32>,
    /// Truncated abstract
    pub snippet: String,
}

/// A single generation request for one section.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System instructions, including the prohibitions
    pub system: String,
    /// Fully rendered user prompt (catalog and body)
    pub prompt: String,
    /// Section heading title
    pub heading: String,
    /// Section body sent for enhancement
    pub section_body: String,
    /// Candidate catalog
    pub catalog: Vec<CatalogEntry>,
    /// Completion token budget
    pub max_tokens: u32,
}

/// Token accounting for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt (input) tokens
    pub prompt_tokens: u64,
    /// Completion (output) tokens
    pub completion_tokens: u64,
    /// True when the counts are estimated from text length
    #[serde(default)]
    pub estimated: bool,
}

impl TokenUsage {
    /// Usage reported by a provider.
    pub fn reported(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            estimated: false,
        }
    }

    /// Rough estimate of one token per four characters.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self {
            prompt_tokens: estimate_tokens(prompt),
            completion_tokens: estimate_tokens(completion),
            estimated: true,
        }
    }

    /// Sum of prompt and completion tokens.
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Add the usage of another call.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.estimated |= other.estimated;
    }
}

pub(crate) fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Collaborator response.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Generated text
    pub text: String,
    /// Provider-reported usage, if any
    pub usage: Option<TokenUsage>,
}

impl Generation {
    /// A response without usage information.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Attach provider-reported usage.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Reported usage, or an estimate from the request and response text.
    pub fn usage_or_estimate(&self, request: &GenerationRequest) -> TokenUsage {
        self.usage.unwrap_or_else(|| {
            let mut prompt = String::with_capacity(request.system.len() + request.prompt.len());
            prompt.push_str(&request.system);
            prompt.push_str(&request.prompt);
            TokenUsage::estimate(&prompt, &self.text)
        })
    }
}

/// Trait for text-generation providers.
///
/// Implementations must be thread-safe; calls may come from several worker
/// threads when sections are processed concurrently.
pub trait TextGenerator: Send + Sync {
    /// Provider name for logs and reports.
    fn name(&self) -> &str;

    /// Generate an enhanced section body.
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        (**self).generate(request)
    }
}

/// Returns the section body unchanged. Useful for dry runs: every section
/// then goes through the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

impl EchoGenerator {
    /// Create a new echo generator.
    pub fn new() -> Self {
        Self
    }
}

impl TextGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        Ok(Generation::new(request.section_body.clone()))
    }
}

/// Run one generation with a hard deadline.
///
/// The call runs on its own thread; if it has not answered when the deadline
/// passes, the result is abandoned and `GenerationError::Timeout` returned.
pub fn call_with_timeout(
    generator: Arc<dyn TextGenerator>,
    request: GenerationRequest,
    timeout: Duration,
) -> Result<Generation, GenerationError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let spawned = std::thread::Builder::new()
        .name(format!("citeweave-{}", generator.name()))
        .spawn(move || {
            let result = generator.generate(&request);
            // Receiver is gone once the deadline has passed.
            let _ = tx.send(result);
        });

    if let Err(e) = spawned {
        return Err(GenerationError::Unavailable(format!(
            "could not spawn generation thread: {}",
            e
        )));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
            Err(GenerationError::Timeout(timeout.as_millis() as u64))
        }
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(
            GenerationError::Malformed("generator panicked before answering".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy(Duration);

    impl TextGenerator for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
            std::thread::sleep(self.0);
            Ok(Generation::new(request.section_body.clone()))
        }
    }

    fn request(body: &str) -> GenerationRequest {
        GenerationRequest {
            system: "system".to_string(),
            prompt: "prompt".to_string(),
            heading: "Intro".to_string(),
            section_body: body.to_string(),
            catalog: Vec::new(),
            max_tokens: 100,
        }
    }

    #[test]
    fn test_echo_generator() {
        let result = EchoGenerator::new().generate(&request("Body [1].")).unwrap();
        assert_eq!(result.text, "Body [1].");
        assert!(result.usage.is_none());
    }

    #[test]
    fn test_timeout_is_enforced() {
        let generator: Arc<dyn TextGenerator> = Arc::new(Sleepy(Duration::from_millis(500)));
        let result = call_with_timeout(generator, request("x"), Duration::from_millis(20));
        assert_eq!(result, Err(GenerationError::Timeout(20)));
    }

    #[test]
    fn test_fast_call_completes() {
        let generator: Arc<dyn TextGenerator> = Arc::new(Sleepy(Duration::from_millis(1)));
        let result = call_with_timeout(generator, request("x"), Duration::from_secs(5));
        assert_eq!(result.unwrap().text, "x");
    }

    #[test]
    fn test_usage_estimate() {
        let usage = TokenUsage::estimate("abcdefgh", "abc");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 1);
        assert!(usage.estimated);
        assert_eq!(usage.total(), 3);
    }

    #[test]
    fn test_reported_usage_wins() {
        let generation = Generation::new("out").with_usage(TokenUsage::reported(10, 5));
        assert_eq!(generation.usage_or_estimate(&request("x")).total(), 15);
    }
}
