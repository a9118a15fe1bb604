//! Image provider port
//!
//! The pipeline only needs "prompt in, image bytes out"; the OpenAI client in
//! [`crate::openai`] is the production implementation and tests plug in fakes.

use async_trait::async_trait;

/// Errors reported by an image (or text) model provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider told us to slow down
    RateLimited,
    /// The request didn't finish in time
    Timeout,
    /// The request couldn't be sent or read
    Request(String),
    /// The provider answered with a non-success status
    Status(u16, String),
    /// The provider answered, but not with anything usable
    InvalidResponse(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited => write!(f, "Rate limit exceeded"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Request(message) => write!(f, "Request failed: {message}"),
            Self::Status(code, body) => write!(f, "Provider returned {code}: {body}"),
            Self::InvalidResponse(message) => write!(f, "Invalid provider response: {message}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Something that can paint a picture from a prompt.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Returns encoded image bytes (PNG, JPEG, ...) for the prompt.
    async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        negative_prompt: &str,
    ) -> Result<Vec<u8>, ProviderError>;
}
