use super::Endpoint;
use crate::llm::http_utils::{extract_text_content, send_json_request};
use crate::llm::{openai_compat, LlmError, LlmProvider};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

/// Provider for any endpoint speaking the OpenAI chat completions protocol
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    http_client: HttpClient,
    completions_url: String,
    api_key: String,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider for `endpoint.api_base`
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        let api_base = endpoint.api_base.trim_end_matches('/').to_string();
        let config = OpenAIConfig::new()
            .with_api_key(endpoint.api_key.clone())
            .with_api_base(api_base.clone());
        Self {
            client: Client::with_config(config).with_http_client(endpoint.http_client.clone()),
            http_client: endpoint.http_client,
            completions_url: format!("{api_base}/chat/completions"),
            api_key: endpoint.api_key,
        }
    }
}

fn vision_body(model_id: &str, image_bytes: &[u8], mime_type: &str, prompt: &str) -> Value {
    let data_url = format!("data:{mime_type};base64,{}", BASE64.encode(image_bytes));

    json!({
        "model": model_id,
        "messages": [
            {
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {
                        "type": "image_url",
                        "image_url": {"url": data_url}
                    }
                ]
            }
        ]
    })
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        prompt: &str,
        model_id: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        openai_compat::chat_completion(&self.client, prompt, model_id, temperature).await
    }

    async fn analyze_image(
        &self,
        image_bytes: Vec<u8>,
        mime_type: &str,
        prompt: &str,
        model_id: &str,
    ) -> Result<String, LlmError> {
        let body = vision_body(model_id, &image_bytes, mime_type, prompt);
        let auth = format!("Bearer {}", self.api_key);
        let res_json =
            send_json_request(&self.http_client, &self.completions_url, &body, Some(&auth)).await?;
        extract_text_content(&res_json, &["choices", "0", "message", "content"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_body_sends_data_url() {
        let body = vision_body("gpt-4o", b"jpg", "image/jpeg", "Give only the answer");
        assert_eq!(body["model"], "gpt-4o");

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Give only the answer");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,anBn");
    }

    #[test]
    fn test_completions_url_ignores_trailing_slash() {
        let provider = OpenAiCompatibleProvider::new(Endpoint {
            api_base: "https://api.groq.com/openai/v1/".to_string(),
            api_key: "gsk_test".to_string(),
            http_client: HttpClient::new(),
        });
        assert_eq!(
            provider.completions_url,
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }
}
