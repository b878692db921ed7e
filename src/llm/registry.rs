//! Provider registry
//!
//! `PROVIDERS` is the static table describing every model the bot talks to.
//! Which endpoint, credential, model id and client a key maps to is data held
//! in that table; [`ProviderRegistry`] turns it into live clients once at
//! startup and is shared read-only afterwards.

use super::providers::{connect_gemini, connect_openai_compatible, ConnectFn, Endpoint};
use super::{LlmError, LlmProvider};
use crate::config::Settings;
use reqwest::Client as HttpClient;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const NVIDIA_API_BASE: &str = "https://integrate.api.nvidia.com/v1";
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const GITHUB_MODELS_API_BASE: &str = "https://models.inference.ai.azure.com";

/// Identifies one entry of the provider table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKey {
    /// Vision model answering straight from the image
    GeminiAnswer,
    /// Vision model transcribing the question
    GeminiText,
    /// NVIDIA Nemotron
    Nvidia,
    /// Llama on Groq
    Llama,
    /// GPT-4o on GitHub Models
    Gpt4o,
    /// Deepseek R1 distill on Groq
    Deepseek,
}

impl ModelKey {
    /// Static table entry for this key
    #[must_use]
    pub fn spec(self) -> &'static ProviderSpec {
        // Row order of PROVIDERS
        match self {
            Self::GeminiAnswer => &PROVIDERS[0],
            Self::GeminiText => &PROVIDERS[1],
            Self::Nvidia => &PROVIDERS[2],
            Self::Llama => &PROVIDERS[3],
            Self::Gpt4o => &PROVIDERS[4],
            Self::Deepseek => &PROVIDERS[5],
        }
    }

    /// Label shown next to this model's answer
    #[must_use]
    pub fn display_name(self) -> &'static str {
        self.spec().display_name
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Kind of request a model is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// Image plus instruction
    Vision,
    /// Prompt only
    Text,
}

impl fmt::Display for RequestShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vision => f.write_str("vision"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Which configured credential an endpoint authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSlot {
    /// `GEMINI_ANSWER`
    GeminiAnswer,
    /// `GEMINI_TEXT`
    GeminiText,
    /// `NVIDIA`
    Nvidia,
    /// `GROQ`
    Groq,
    /// `GITHUB`
    Github,
}

impl CredentialSlot {
    fn resolve(self, settings: &Settings) -> &str {
        match self {
            Self::GeminiAnswer => &settings.gemini_answer_key,
            Self::GeminiText => &settings.gemini_text_key,
            Self::Nvidia => &settings.nvidia_key,
            Self::Groq => &settings.groq_key,
            Self::Github => &settings.github_key,
        }
    }
}

/// One row of the provider table
pub struct ProviderSpec {
    /// Key selecting this row
    pub key: ModelKey,
    /// Label shown to the user
    pub display_name: &'static str,
    /// API base URL
    pub api_base: &'static str,
    /// Credential used against `api_base`
    pub credential: CredentialSlot,
    /// Model identifier sent to the provider
    pub model_id: &'static str,
    /// Request this model is used for
    pub shape: RequestShape,
    /// Client constructor for the API family
    pub connect: ConnectFn,
}

/// Every model the bot knows about
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        key: ModelKey::GeminiAnswer,
        display_name: "Gemini",
        api_base: GEMINI_API_BASE,
        credential: CredentialSlot::GeminiAnswer,
        model_id: "gemini-1.5-flash",
        shape: RequestShape::Vision,
        connect: connect_gemini,
    },
    ProviderSpec {
        key: ModelKey::GeminiText,
        display_name: "Gemini OCR",
        api_base: GEMINI_API_BASE,
        credential: CredentialSlot::GeminiText,
        model_id: "gemini-1.5-flash",
        shape: RequestShape::Vision,
        connect: connect_gemini,
    },
    ProviderSpec {
        key: ModelKey::Nvidia,
        display_name: "NVIDIA",
        api_base: NVIDIA_API_BASE,
        credential: CredentialSlot::Nvidia,
        model_id: "nvidia/nemotron-4-340b-instruct",
        shape: RequestShape::Text,
        connect: connect_openai_compatible,
    },
    ProviderSpec {
        key: ModelKey::Llama,
        display_name: "Llama",
        api_base: GROQ_API_BASE,
        credential: CredentialSlot::Groq,
        model_id: "llama-3.2-90b-vision-preview",
        shape: RequestShape::Text,
        connect: connect_openai_compatible,
    },
    ProviderSpec {
        key: ModelKey::Gpt4o,
        display_name: "GPT-4o",
        api_base: GITHUB_MODELS_API_BASE,
        credential: CredentialSlot::Github,
        model_id: "gpt-4o",
        shape: RequestShape::Text,
        connect: connect_openai_compatible,
    },
    ProviderSpec {
        key: ModelKey::Deepseek,
        display_name: "Deepseek",
        api_base: GROQ_API_BASE,
        credential: CredentialSlot::Groq,
        model_id: "deepseek-r1-distill-llama-70b",
        shape: RequestShape::Text,
        connect: connect_openai_compatible,
    },
];

/// Model answering directly from the image
pub const VISION_ANSWER_MODEL: ModelKey = ModelKey::GeminiAnswer;
/// Model transcribing the question text
pub const EXTRACTION_MODEL: ModelKey = ModelKey::GeminiText;
/// Text models, in dispatch order
pub const TEXT_MODELS: &[ModelKey] = &[
    ModelKey::Nvidia,
    ModelKey::Llama,
    ModelKey::Gpt4o,
    ModelKey::Deepseek,
];

/// A model ready to be called
#[derive(Clone)]
pub struct RegisteredModel {
    /// Label shown to the user
    pub display_name: String,
    /// Model identifier sent to the provider
    pub model_id: String,
    /// Request this model is used for
    pub shape: RequestShape,
    /// Client that performs the call
    pub provider: Arc<dyn LlmProvider>,
}

impl RegisteredModel {
    /// Create a registry entry
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        model_id: impl Into<String>,
        shape: RequestShape,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            model_id: model_id.into(),
            shape,
            provider,
        }
    }
}

/// Live clients for every configured model
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    models: HashMap<ModelKey, RegisteredModel>,
}

impl ProviderRegistry {
    /// Connect every row of [`PROVIDERS`] with the credentials from `settings`.
    ///
    /// All clients share one HTTP connection pool.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let http_client = HttpClient::new();
        let mut registry = Self::default();

        for spec in PROVIDERS {
            let endpoint = Endpoint {
                api_base: spec.api_base.to_string(),
                api_key: spec.credential.resolve(settings).to_string(),
                http_client: http_client.clone(),
            };
            debug!(model = spec.display_name, api_base = spec.api_base, "Registering provider");
            registry.register(
                spec.key,
                RegisteredModel::new(
                    spec.display_name,
                    spec.model_id,
                    spec.shape,
                    (spec.connect)(endpoint),
                ),
            );
        }

        registry
    }

    /// Register or replace the model behind `key`
    pub fn register(&mut self, key: ModelKey, model: RegisteredModel) {
        self.models.insert(key, model);
    }

    /// Label for `key`, falling back to the static table
    #[must_use]
    pub fn display_name(&self, key: ModelKey) -> String {
        self.models.get(&key).map_or_else(
            || key.display_name().to_string(),
            |model| model.display_name.clone(),
        )
    }

    /// Look up the model for `key` and check it serves `shape` requests
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingConfig` if nothing is registered under `key`
    /// or the registered model serves the other request shape.
    pub fn resolve(&self, key: ModelKey, shape: RequestShape) -> Result<&RegisteredModel, LlmError> {
        let model = self
            .models
            .get(&key)
            .ok_or_else(|| LlmError::MissingConfig(format!("{key} is not registered")))?;

        if model.shape != shape {
            return Err(LlmError::MissingConfig(format!(
                "{key} is registered for {} requests, not {shape}",
                model.shape
            )));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            allowed_users_str: None,
            gemini_answer_key: "answer-key".to_string(),
            gemini_text_key: "text-key".to_string(),
            nvidia_key: "nvapi-key".to_string(),
            groq_key: "gsk-key".to_string(),
            github_key: "ghp-key".to_string(),
            provider_timeout_secs: None,
        }
    }

    #[test]
    fn test_every_key_has_exactly_one_row() {
        let keys = [
            ModelKey::GeminiAnswer,
            ModelKey::GeminiText,
            ModelKey::Nvidia,
            ModelKey::Llama,
            ModelKey::Gpt4o,
            ModelKey::Deepseek,
        ];
        for key in keys {
            let rows = PROVIDERS.iter().filter(|spec| spec.key == key).count();
            assert_eq!(rows, 1, "{key:?} should appear once in PROVIDERS");
            assert_eq!(key.spec().key, key);
        }
        assert_eq!(PROVIDERS.len(), keys.len());
    }

    #[test]
    fn test_shapes_match_roles() {
        assert_eq!(VISION_ANSWER_MODEL.spec().shape, RequestShape::Vision);
        assert_eq!(EXTRACTION_MODEL.spec().shape, RequestShape::Vision);
        for key in TEXT_MODELS {
            assert_eq!(key.spec().shape, RequestShape::Text);
        }
    }

    #[test]
    fn test_credentials_resolve_per_family() {
        let settings = settings();
        assert_eq!(ModelKey::Llama.spec().credential.resolve(&settings), "gsk-key");
        assert_eq!(ModelKey::Deepseek.spec().credential.resolve(&settings), "gsk-key");
        assert_eq!(ModelKey::Gpt4o.spec().credential.resolve(&settings), "ghp-key");
        assert_eq!(ModelKey::GeminiText.spec().credential.resolve(&settings), "text-key");
    }

    #[test]
    fn test_from_settings_registers_every_row() -> Result<(), LlmError> {
        let registry = ProviderRegistry::from_settings(&settings());
        for spec in PROVIDERS {
            let model = registry.resolve(spec.key, spec.shape)?;
            assert_eq!(model.model_id, spec.model_id);
            assert_eq!(model.display_name, spec.display_name);
        }
        Ok(())
    }

    #[test]
    fn test_resolve_rejects_missing_and_wrong_shape() {
        let registry = ProviderRegistry::from_settings(&settings());
        assert!(matches!(
            registry.resolve(ModelKey::Nvidia, RequestShape::Vision),
            Err(LlmError::MissingConfig(_))
        ));

        let empty = ProviderRegistry::default();
        assert!(matches!(
            empty.resolve(ModelKey::Nvidia, RequestShape::Text),
            Err(LlmError::MissingConfig(_))
        ));
        assert_eq!(empty.display_name(ModelKey::Gpt4o), "GPT-4o");
    }
}
