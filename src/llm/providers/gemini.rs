use super::Endpoint;
use crate::llm::http_utils::{extract_text_content, send_json_request};
use crate::llm::{LlmError, LlmProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

const RESPONSE_TEXT_PATH: &[&str] = &["candidates", "0", "content", "parts", "0", "text"];

/// LLM provider implementation for Google Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_base: String,
    api_key: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            http_client: endpoint.http_client,
            api_base: endpoint.api_base.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key,
        }
    }

    fn url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{model_id}:generateContent?key={}",
            self.api_base, self.api_key
        )
    }

    async fn generate(&self, model_id: &str, body: &Value) -> Result<String, LlmError> {
        let res_json = send_json_request(&self.http_client, &self.url(model_id), body, None).await?;
        extract_text_content(&res_json, RESPONSE_TEXT_PATH)
    }
}

fn text_body(prompt: &str, temperature: f32) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt}]
        }],
        "generationConfig": {
            "temperature": temperature
        }
    })
}

fn vision_body(image_bytes: &[u8], mime_type: &str, prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                {"text": prompt},
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": BASE64.encode(image_bytes)
                    }
                }
            ]
        }]
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        prompt: &str,
        model_id: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.generate(model_id, &text_body(prompt, temperature)).await
    }

    async fn analyze_image(
        &self,
        image_bytes: Vec<u8>,
        mime_type: &str,
        prompt: &str,
        model_id: &str,
    ) -> Result<String, LlmError> {
        self.generate(model_id, &vision_body(&image_bytes, mime_type, prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_puts_model_and_key_in_place() {
        let provider = GeminiProvider::new(Endpoint {
            api_base: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            api_key: "secret".to_string(),
            http_client: HttpClient::new(),
        });

        assert_eq!(
            provider.url("gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent?key=secret"
        );
    }

    #[test]
    fn test_text_body_carries_prompt_and_temperature() {
        let body = text_body("Question: 2+2=?", 0.5);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Question: 2+2=?");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_vision_body_inlines_base64_image() {
        let body = vision_body(b"png", "image/png", "Extract all text");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Extract all text");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "cG5n");
    }
}
