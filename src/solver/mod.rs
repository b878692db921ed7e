//! Scatter/gather orchestration
//!
//! [`Solver::solve`] fans one question image out to the vision model and,
//! once the question text has been extracted, to every text model. Each
//! answer is handed to a [`ResultRelay`] the moment its task finishes.

mod clean;
mod image;
pub mod tasks;

pub use clean::clean_response;
pub use image::{ImageInput, ScopedImage};

use crate::llm::registry::{EXTRACTION_MODEL, TEXT_MODELS, VISION_ANSWER_MODEL};
use crate::llm::{LlmError, ModelKey, ProviderRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Errors on the request path
#[derive(Debug, Error)]
pub enum SolveError {
    /// The message carried no usable image
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The attachment could not be fetched
    #[error("Download failed: {0}")]
    DownloadFailed(String),
    /// The question text could not be transcribed
    #[error("Text extraction failed: {0}")]
    ExtractionFailed(#[source] LlmError),
    /// The request was abandoned before all tasks finished
    #[error("Request cancelled")]
    Cancelled,
    /// A result could not be delivered
    #[error("Relay failed: {0}")]
    Relay(#[source] anyhow::Error),
}

/// One model's answer, ready to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResult {
    /// Label of the model that produced it
    pub model_name: String,
    /// Cleaned answer, or a `"<Kind> Error: <message>"` line
    pub display_text: String,
    /// Whether `display_text` describes a failure
    pub is_error: bool,
}

impl ModelResult {
    /// A cleaned answer
    #[must_use]
    pub fn answer(model_name: impl Into<String>, raw: &str) -> Self {
        Self {
            model_name: model_name.into(),
            display_text: clean_response(raw),
            is_error: false,
        }
    }

    /// A failure rendered as `"<kind> Error: <detail>"`
    #[must_use]
    pub fn failure(model_name: impl Into<String>, kind: &str, detail: &str) -> Self {
        Self {
            model_name: model_name.into(),
            display_text: format!("{kind} Error: {detail}"),
            is_error: true,
        }
    }

    /// Build the result of a provider call
    #[must_use]
    pub fn from_outcome(model_name: String, outcome: Result<String, LlmError>) -> Self {
        match outcome {
            Ok(raw) => Self::answer(model_name, &raw),
            Err(e) => {
                warn!(model = %model_name, error = %e, "Provider call failed");
                Self::failure(model_name, e.kind(), &e.detail())
            }
        }
    }
}

/// Receives results in completion order
#[async_trait]
pub trait ResultRelay: Send {
    /// Deliver one result
    async fn relay(&mut self, result: ModelResult) -> anyhow::Result<()>;
}

#[async_trait]
impl ResultRelay for Vec<ModelResult> {
    async fn relay(&mut self, result: ModelResult) -> anyhow::Result<()> {
        self.push(result);
        Ok(())
    }
}

/// How the extraction step went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Text was extracted and sent to the text models
    Extracted,
    /// Extraction failed; text models were skipped
    Failed(String),
}

/// Summary of one orchestration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveReport {
    /// Results handed to the relay
    pub relayed: usize,
    /// Text-model tasks dispatched
    pub text_tasks: usize,
    /// Outcome of the extraction step
    pub extraction: ExtractionStatus,
}

/// Outstanding provider tasks, tracked by model name
struct PendingTasks {
    set: JoinSet<ModelResult>,
    names: HashMap<Id, String>,
}

impl PendingTasks {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    fn spawn<F>(&mut self, model_name: String, task: F)
    where
        F: Future<Output = ModelResult> + Send + 'static,
    {
        let handle = self.set.spawn(task);
        self.names.insert(handle.id(), model_name);
    }

    /// Next finished task; a task that died still yields a result
    async fn next(&mut self) -> Option<ModelResult> {
        let joined = self.set.join_next_with_id().await?;
        Some(match joined {
            Ok((id, result)) => {
                self.names.remove(&id);
                result
            }
            Err(e) => {
                let model_name = self
                    .names
                    .remove(&e.id())
                    .unwrap_or_else(|| "Unknown".to_string());
                warn!(model = %model_name, error = %e, "Provider task died");
                ModelResult::failure(model_name, "Task", &e.to_string())
            }
        })
    }

    fn abort_all(&mut self) {
        self.set.abort_all();
    }
}

/// Fans a question out to every configured model
pub struct Solver {
    registry: Arc<ProviderRegistry>,
    text_models: Vec<ModelKey>,
    call_timeout: Option<Duration>,
}

impl Solver {
    /// Create a solver dispatching to [`TEXT_MODELS`]
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, call_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            text_models: TEXT_MODELS.to_vec(),
            call_timeout,
        }
    }

    /// Replace the ordered list of text models
    #[must_use]
    pub fn with_text_models(mut self, text_models: Vec<ModelKey>) -> Self {
        self.text_models = text_models;
        self
    }

    /// Run every model against `image`, relaying results as they finish.
    ///
    /// The direct-vision task and extraction start together; only extraction
    /// is awaited before the text models are dispatched. If extraction fails
    /// the text models are skipped but the vision answer is still relayed.
    /// Every dispatched task yields exactly one result.
    ///
    /// # Errors
    ///
    /// Returns `SolveError::Cancelled` if `cancel` fires, or `SolveError::Relay`
    /// if a result cannot be delivered. Outstanding tasks are aborted in both cases.
    #[instrument(skip_all, fields(image = %image.path.display()))]
    pub async fn solve<R>(
        &self,
        image: &ImageInput,
        relay: &mut R,
        cancel: &CancellationToken,
    ) -> Result<SolveReport, SolveError>
    where
        R: ResultRelay + ?Sized,
    {
        let mut pending = PendingTasks::new();
        pending.spawn(
            self.registry.display_name(VISION_ANSWER_MODEL),
            tasks::direct_vision(self.registry.clone(), image.clone(), self.call_timeout),
        );

        let extracted = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                pending.abort_all();
                return Err(SolveError::Cancelled);
            }
            extracted = tasks::extract_text(&self.registry, image, self.call_timeout) => extracted,
        };

        let extraction = match extracted {
            Ok(text) => {
                info!(
                    model = %self.registry.display_name(EXTRACTION_MODEL),
                    chars = text.chars().count(),
                    "Question text extracted"
                );
                let question: Arc<str> = Arc::from(text);
                for key in &self.text_models {
                    pending.spawn(
                        self.registry.display_name(*key),
                        tasks::text_answer(
                            self.registry.clone(),
                            *key,
                            question.clone(),
                            self.call_timeout,
                        ),
                    );
                }
                ExtractionStatus::Extracted
            }
            Err(e) => {
                warn!(error = %e, "Skipping text models");
                ExtractionStatus::Failed(e.to_string())
            }
        };
        let text_tasks = match extraction {
            ExtractionStatus::Extracted => self.text_models.len(),
            ExtractionStatus::Failed(_) => 0,
        };

        let mut relayed = 0;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    pending.abort_all();
                    return Err(SolveError::Cancelled);
                }
                next = pending.next() => next,
            };
            let Some(result) = next else { break };

            info!(model = %result.model_name, failed = result.is_error, "Relaying result");
            relay.relay(result).await.map_err(SolveError::Relay)?;
            relayed += 1;
        }

        Ok(SolveReport {
            relayed,
            text_tasks,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_format() {
        let result = ModelResult::failure("Deepseek", "Rate Limit", "slow down");
        assert_eq!(result.display_text, "Rate Limit Error: slow down");
        assert!(result.is_error);
    }

    #[test]
    fn test_from_outcome_cleans_success() {
        let result = ModelResult::from_outcome(
            "Llama".to_string(),
            Ok("<think>hmm</think>\ncorrect answer: b)2".to_string()),
        );
        assert_eq!(result.display_text, "correct answer: b)2");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_panicking_task_still_yields_one_result() {
        let mut pending = PendingTasks::new();
        pending.spawn("Broken".to_string(), async {
            panic!("provider client bug");
        });

        let first = pending.next().await;
        assert!(matches!(
            first,
            Some(ModelResult { ref model_name, is_error: true, .. }) if model_name == "Broken"
        ));
        assert!(pending.next().await.is_none());
    }
}
