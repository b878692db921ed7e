//! OpenAI-compatible provider utilities
//!
//! Shared implementation for endpoints driven through the async-openai client
//! (NVIDIA, Groq, GitHub Models).

use super::LlmError;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};

/// Perform a single-turn chat completion using an OpenAI-compatible API
///
/// # Errors
///
/// Returns `LlmError::Unknown` if the request cannot be built, `LlmError::ApiError`
/// if the call fails or the response carries no content.
pub async fn chat_completion(
    client: &Client<OpenAIConfig>,
    prompt: &str,
    model_id: &str,
    temperature: f32,
) -> Result<String, LlmError> {
    let message = ChatCompletionRequestUserMessageArgs::default()
        .content(prompt)
        .build()
        .map_err(|e| LlmError::Unknown(e.to_string()))?;

    let request = CreateChatCompletionRequestArgs::default()
        .model(model_id)
        .messages(vec![message.into()])
        .temperature(temperature)
        .build()
        .map_err(|e| LlmError::Unknown(e.to_string()))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(|e| LlmError::ApiError(e.to_string()))?;

    response
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
}
