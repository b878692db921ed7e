//! Provider task adapters
//!
//! Each adapter wraps exactly one outbound model call. Failures never escape
//! an adapter: they become the task's [`ModelResult`], except for extraction,
//! whose failure the orchestrator handles.

use super::{ImageInput, ModelResult, SolveError};
use crate::config::{build_text_prompt, ANSWER_INSTRUCTION, EXTRACTION_INSTRUCTION, TEXT_ANSWER_TEMPERATURE};
use crate::llm::registry::{EXTRACTION_MODEL, VISION_ANSWER_MODEL};
use crate::llm::{LlmError, ModelKey, ProviderRegistry, RequestShape};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bound `call` by `limit`, if there is one
async fn with_timeout<F>(limit: Option<Duration>, call: F) -> Result<String, LlmError>
where
    F: Future<Output = Result<String, LlmError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| LlmError::Timeout(limit))?,
        None => call.await,
    }
}

async fn analyze(
    registry: &ProviderRegistry,
    key: ModelKey,
    image: &ImageInput,
    prompt: &str,
    limit: Option<Duration>,
) -> Result<String, LlmError> {
    let model = registry.resolve(key, RequestShape::Vision)?;
    let image_bytes = tokio::fs::read(&image.path).await?;
    debug!(model = %model.display_name, bytes = image_bytes.len(), "Sending image");

    with_timeout(
        limit,
        model
            .provider
            .analyze_image(image_bytes, &image.mime_type, prompt, &model.model_id),
    )
    .await
}

/// Ask the vision model for the answer straight from the image
pub async fn direct_vision(
    registry: Arc<ProviderRegistry>,
    image: ImageInput,
    limit: Option<Duration>,
) -> ModelResult {
    let model_name = registry.display_name(VISION_ANSWER_MODEL);
    let outcome = analyze(&registry, VISION_ANSWER_MODEL, &image, ANSWER_INSTRUCTION, limit).await;
    ModelResult::from_outcome(model_name, outcome)
}

/// Transcribe the question text from the image
///
/// # Errors
///
/// Returns `SolveError::ExtractionFailed` if the call fails or yields no text.
pub async fn extract_text(
    registry: &ProviderRegistry,
    image: &ImageInput,
    limit: Option<Duration>,
) -> Result<String, SolveError> {
    let text = analyze(registry, EXTRACTION_MODEL, image, EXTRACTION_INSTRUCTION, limit)
        .await
        .map_err(SolveError::ExtractionFailed)?;

    if text.trim().is_empty() {
        warn!("Extraction returned no text");
        return Err(SolveError::ExtractionFailed(LlmError::ApiError(
            "Empty transcription".to_string(),
        )));
    }
    Ok(text)
}

/// Ask the text model behind `key` to answer the extracted question
pub async fn text_answer(
    registry: Arc<ProviderRegistry>,
    key: ModelKey,
    question: Arc<str>,
    limit: Option<Duration>,
) -> ModelResult {
    let model_name = registry.display_name(key);
    let outcome = async {
        let model = registry.resolve(key, RequestShape::Text)?;
        let prompt = build_text_prompt(&question);
        with_timeout(
            limit,
            model
                .provider
                .complete(&prompt, &model.model_id, TEXT_ANSWER_TEMPERATURE),
        )
        .await
    }
    .await;
    ModelResult::from_outcome(model_name, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmProvider, RegisteredModel};
    use crate::solver::ScopedImage;
    use mockall::predicate::{always, eq};

    fn registry_with(key: ModelKey, mock: MockLlmProvider) -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::default();
        registry.register(
            key,
            RegisteredModel::new(
                key.display_name(),
                "test-model",
                key.spec().shape,
                Arc::new(mock),
            ),
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_text_answer_cleans_reply() {
        let mut mock = MockLlmProvider::new();
        mock.expect_complete()
            .with(always(), eq("test-model"), eq(TEXT_ANSWER_TEMPERATURE))
            .times(1)
            .returning(|prompt, _, _| {
                assert!(prompt.contains("Question: 2+2=?"));
                Ok("<think>easy</think>\nCorrect Answer: 4".to_string())
            });

        let registry = registry_with(ModelKey::Nvidia, mock);
        let result = text_answer(registry, ModelKey::Nvidia, Arc::from("2+2=?"), None).await;

        assert_eq!(result.model_name, "NVIDIA");
        assert_eq!(result.display_text, "Correct Answer: 4");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_text_answer_renders_provider_error() {
        let mut mock = MockLlmProvider::new();
        mock.expect_complete()
            .returning(|_, _, _| Err(LlmError::ApiError("401 - bad key".to_string())));

        let registry = registry_with(ModelKey::Gpt4o, mock);
        let result = text_answer(registry, ModelKey::Gpt4o, Arc::from("q"), None).await;

        assert_eq!(result.model_name, "GPT-4o");
        assert_eq!(result.display_text, "API Error: 401 - bad key");
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_unregistered_model_is_a_config_error() {
        let registry = Arc::new(ProviderRegistry::default());
        let result = text_answer(registry, ModelKey::Llama, Arc::from("q"), None).await;

        assert_eq!(result.model_name, "Llama");
        assert!(result.display_text.starts_with("Config Error: "));
    }

    #[tokio::test]
    async fn test_direct_vision_sends_image_bytes() -> std::io::Result<()> {
        let mut mock = MockLlmProvider::new();
        mock.expect_analyze_image()
            .with(eq(b"jpeg-bytes".to_vec()), eq("image/jpeg"), eq(ANSWER_INSTRUCTION), always())
            .times(1)
            .returning(|_, _, _, _| Ok("  a)19  ".to_string()));

        let image = ScopedImage::persist(b"jpeg-bytes", "image/jpeg").await?;
        let registry = registry_with(VISION_ANSWER_MODEL, mock);
        let result = direct_vision(registry, image.input(), None).await;

        assert_eq!(result.display_text, "a)19");
        image.remove()
    }

    #[tokio::test]
    async fn test_missing_image_file_is_reported() {
        let mut mock = MockLlmProvider::new();
        mock.expect_analyze_image().never();

        let registry = registry_with(VISION_ANSWER_MODEL, mock);
        let image = ImageInput {
            path: "/nonexistent/mcq.jpg".into(),
            mime_type: "image/jpeg".to_string(),
        };
        let result = direct_vision(registry, image, None).await;

        assert!(result.display_text.starts_with("File Error: "));
    }

    #[tokio::test]
    async fn test_blank_extraction_fails() -> std::io::Result<()> {
        let mut mock = MockLlmProvider::new();
        mock.expect_analyze_image()
            .returning(|_, _, _, _| Ok(" \n ".to_string()));

        let image = ScopedImage::persist(b"jpeg", "image/jpeg").await?;
        let registry = registry_with(EXTRACTION_MODEL, mock);
        let result = extract_text(&registry, &image.input(), None).await;

        assert!(matches!(result, Err(SolveError::ExtractionFailed(_))));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error_text() {
        let result = with_timeout(Some(Duration::from_secs(5)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        })
        .await;

        assert!(matches!(result, Err(LlmError::Timeout(d)) if d == Duration::from_secs(5)));
    }
}
