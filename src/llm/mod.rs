//! LLM providers and client plumbing
//!
//! Provides a unified interface to the hosted model APIs (Gemini and the
//! OpenAI-compatible endpoints of NVIDIA, Groq and GitHub Models).

mod http_utils;
mod openai_compat;
/// Implementations of specific LLM providers
pub mod providers;
/// Static provider table and the runtime registry built from it
pub mod registry;

pub use registry::{ModelKey, ProviderRegistry, RegisteredModel, RequestShape};

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Rate limit exceeded (429), optionally with a wait time
    #[error("Rate limit exceeded: {message} (wait: {wait_secs:?}s)")]
    RateLimit {
        /// Retry-After duration in seconds, if provided by the server
        wait_secs: Option<u64>,
        /// Error message from the server
        message: String,
    },
    /// The provider did not answer within the configured bound
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// Reading the question image failed
    #[error("I/O error: {0}")]
    Io(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl LlmError {
    /// Short label for the error class, as shown to the user
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ApiError(_) => "API",
            Self::NetworkError(_) => "Network",
            Self::JsonError(_) => "JSON",
            Self::MissingConfig(_) => "Config",
            Self::RateLimit { .. } => "Rate Limit",
            Self::Timeout(_) => "Timeout",
            Self::Io(_) => "File",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// The error message without its class prefix
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::ApiError(m)
            | Self::NetworkError(m)
            | Self::JsonError(m)
            | Self::MissingConfig(m)
            | Self::Io(m)
            | Self::Unknown(m) => m.clone(),
            Self::RateLimit {
                wait_secs: Some(secs),
                message,
            } => format!("{message} (retry after {secs}s)"),
            Self::RateLimit { message, .. } => message.clone(),
            Self::Timeout(after) => format!("no response within {}s", after.as_secs()),
        }
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Interface for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-turn text completion
    async fn complete(
        &self,
        prompt: &str,
        model_id: &str,
        temperature: f32,
    ) -> Result<String, LlmError>;

    /// Answer `prompt` about an image
    async fn analyze_image(
        &self,
        image_bytes: Vec<u8>,
        mime_type: &str,
        prompt: &str,
        model_id: &str,
    ) -> Result<String, LlmError>;
}
