//! HTTP utilities for LLM providers
//!
//! Common request/response handling for the providers that talk raw JSON.

use crate::llm::LlmError;
use crate::utils::truncate_str;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;

/// Longest error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Sends an HTTP POST request with JSON body and returns parsed JSON response.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues, `LlmError::RateLimit` on 429,
/// `LlmError::ApiError` on other non-success status codes, or `LlmError::JsonError`
/// if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let wait_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let error_text = response.text().await.unwrap_or_default();
        return Err(status_error(status, &error_text, wait_secs));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.without_url().to_string()))
}

/// Map a non-success response to an `LlmError`
pub fn status_error(status: StatusCode, body: &str, wait_secs: Option<u64>) -> LlmError {
    let trimmed = body.trim_start();
    // Nginx/proxy error pages
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    let message = if is_html {
        format!("{status} (Server returned HTML error page)")
    } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
        format!(
            "{status} - {}... (truncated)",
            truncate_str(body, MAX_ERROR_BODY_CHARS)
        )
    } else {
        format!("{status} - {body}")
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimit { wait_secs, message }
    } else {
        LlmError::ApiError(message)
    }
}

/// Extracts text content from a JSON response by navigating a path.
///
/// ```ignore
/// // Gemini: ["candidates", "0", "content", "parts", "0", "text"]
/// let content = extract_text_content(&response, &["choices", "0", "message", "content"])?;
/// ```
///
/// # Errors
///
/// Returns `LlmError::ApiError` if the path is invalid or the target is not a string.
pub fn extract_text_content(response: &Value, path: &[&str]) -> Result<String, LlmError> {
    let mut current = response;

    for segment in path {
        if let Ok(index) = segment.parse::<usize>() {
            current = current.get(index).ok_or_else(|| {
                LlmError::ApiError(format!("Invalid path: missing index {index}"))
            })?;
        } else {
            current = current.get(*segment).ok_or_else(|| {
                LlmError::ApiError(format!("Invalid path: missing key {segment}"))
            })?;
        }
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| LlmError::ApiError(format!("Expected string at path, got: {current:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_gemini_format() -> Result<(), LlmError> {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "Correct Answer: b)12"
                    }]
                }
            }]
        });

        let text = extract_text_content(
            &response,
            &["candidates", "0", "content", "parts", "0", "text"],
        )?;
        assert_eq!(text, "Correct Answer: b)12");
        Ok(())
    }

    #[test]
    fn test_extract_missing_path() {
        let response = json!({"candidates": []});
        let result = extract_text_content(&response, &["candidates", "0", "content"]);
        assert!(matches!(result, Err(LlmError::ApiError(m)) if m.contains("index 0")));
    }

    #[test]
    fn test_status_error_rate_limit() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "quota", Some(20));
        assert!(matches!(err, LlmError::RateLimit { wait_secs: Some(20), .. }));
    }

    #[test]
    fn test_status_error_hides_html_pages() {
        let err = status_error(
            StatusCode::BAD_GATEWAY,
            "<!DOCTYPE html><html>nginx</html>",
            None,
        );
        let text = err.to_string();
        assert!(text.contains("502"));
        assert!(!text.contains("nginx"));
    }

    #[test]
    fn test_status_error_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let err = status_error(StatusCode::BAD_REQUEST, &body, None);
        assert!(err.detail().ends_with("... (truncated)"));
        assert!(err.detail().len() < 600);
    }
}
