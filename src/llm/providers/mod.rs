mod gemini;
mod openai_compatible;

pub use gemini::GeminiProvider;
pub use openai_compatible::OpenAiCompatibleProvider;

use super::LlmProvider;
use reqwest::Client as HttpClient;
use std::sync::Arc;

/// Connection parameters for one provider endpoint
#[derive(Clone)]
pub struct Endpoint {
    /// Base URL of the API
    pub api_base: String,
    /// Credential sent with every request
    pub api_key: String,
    /// Shared HTTP connection pool
    pub http_client: HttpClient,
}

/// Builds a provider client for an endpoint
pub type ConnectFn = fn(Endpoint) -> Arc<dyn LlmProvider>;

/// Connect to a Gemini `generateContent` endpoint
#[must_use]
pub fn connect_gemini(endpoint: Endpoint) -> Arc<dyn LlmProvider> {
    Arc::new(GeminiProvider::new(endpoint))
}

/// Connect to an OpenAI-compatible chat completions endpoint
#[must_use]
pub fn connect_openai_compatible(endpoint: Endpoint) -> Arc<dyn LlmProvider> {
    Arc::new(OpenAiCompatibleProvider::new(endpoint))
}
