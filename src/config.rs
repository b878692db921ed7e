//! Configuration and settings management
//!
//! Loads settings from environment variables and defines prompt and transport constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Placeholder used when no Gemini credential is configured
pub const GEMINI_PLACEHOLDER_KEY: &str = "Gemini_api_key";
/// Placeholder used when no NVIDIA credential is configured
pub const NVIDIA_PLACEHOLDER_KEY: &str = "Nvidia_api_key";
/// Placeholder used when no Groq credential is configured
pub const GROQ_PLACEHOLDER_KEY: &str = "Groq_api_key_for_deepseek";
/// Placeholder used when no GitHub Models credential is configured
pub const GITHUB_PLACEHOLDER_KEY: &str = "github_api_key_chat_gpt";

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of allowed user IDs (empty means everyone)
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Gemini key used for the direct-vision answer
    #[serde(rename = "gemini_answer", default = "default_gemini_key")]
    pub gemini_answer_key: String,
    /// Gemini key used for question text extraction
    #[serde(rename = "gemini_text", default = "default_gemini_key")]
    pub gemini_text_key: String,
    /// NVIDIA API catalog key
    #[serde(rename = "nvidia", default = "default_nvidia_key")]
    pub nvidia_key: String,
    /// Groq key (Llama and Deepseek models)
    #[serde(rename = "groq", default = "default_groq_key")]
    pub groq_key: String,
    /// GitHub Models key (GPT-4o)
    #[serde(rename = "github", default = "default_github_key")]
    pub github_key: String,

    /// Upper bound for a single provider call, in seconds. Unset or zero disables it.
    #[serde(default)]
    pub provider_timeout_secs: Option<u64>,
}

fn default_gemini_key() -> String {
    GEMINI_PLACEHOLDER_KEY.to_string()
}

fn default_nvidia_key() -> String {
    NVIDIA_PLACEHOLDER_KEY.to_string()
}

fn default_groq_key() -> String {
    GROQ_PLACEHOLDER_KEY.to_string()
}

fn default_github_key() -> String {
    GITHUB_PLACEHOLDER_KEY.to_string()
}

/// Build the layered configuration source shared by all settings loaders.
///
/// # Errors
///
/// Returns a `ConfigError` if a configuration file is malformed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__PROVIDER_TIMEOUT_SECS=30 ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Bare variables such as GEMINI_ANSWER or GROQ; empty ones count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mcq_solver_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or `TELEGRAM_TOKEN` is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns a set of Telegram IDs that are allowed to use the bot
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `user_id` may use the bot. An empty allow-list admits everyone.
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        let allowed = self.allowed_users();
        allowed.is_empty() || allowed.contains(&user_id)
    }

    /// Per-call provider timeout, if one is configured
    #[must_use]
    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Names of the credentials that still hold their placeholder value
    #[must_use]
    pub fn placeholder_credentials(&self) -> Vec<&'static str> {
        [
            ("GEMINI_ANSWER", &self.gemini_answer_key, GEMINI_PLACEHOLDER_KEY),
            ("GEMINI_TEXT", &self.gemini_text_key, GEMINI_PLACEHOLDER_KEY),
            ("NVIDIA", &self.nvidia_key, NVIDIA_PLACEHOLDER_KEY),
            ("GROQ", &self.groq_key, GROQ_PLACEHOLDER_KEY),
            ("GITHUB", &self.github_key, GITHUB_PLACEHOLDER_KEY),
        ]
        .into_iter()
        .filter(|(_, value, placeholder)| value.as_str() == *placeholder)
        .map(|(name, _, _)| name)
        .collect()
    }
}

/// Instruction sent with every answer request
pub const ANSWER_INSTRUCTION: &str =
    "Give only the correct answer to this question, no explanation, like 'the correct answer is: a)19'";

/// Instruction sent with the text extraction request
pub const EXTRACTION_INSTRUCTION: &str = "Extract all text exactly as it appears in the image";

/// Sampling temperature for text-completion providers
pub const TEXT_ANSWER_TEMPERATURE: f32 = 0.1;

/// Build the prompt sent to every text-completion provider
#[must_use]
pub fn build_text_prompt(question: &str) -> String {
    format!("Question: {question}\nplease {ANSWER_INSTRUCTION}")
}

// Telegram transport
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum attempts for a Telegram API operation
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Maximum message length for Telegram with safety margin
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            allowed_users_str: None,
            gemini_answer_key: default_gemini_key(),
            gemini_text_key: "real-gemini".to_string(),
            nvidia_key: default_nvidia_key(),
            groq_key: "gsk_real".to_string(),
            github_key: default_github_key(),
            provider_timeout_secs: None,
        }
    }

    #[test]
    fn test_list_parsing() {
        let mut settings = settings();

        settings.allowed_users_str = Some("333; 444, 555".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&333));
        assert!(allowed.contains(&444));
        assert!(allowed.contains(&555));
        assert_eq!(allowed.len(), 3);

        settings.allowed_users_str = Some("abc, 777".to_string());
        let allowed = settings.allowed_users();
        assert!(allowed.contains(&777));
        assert_eq!(allowed.len(), 1);
    }

    #[test]
    fn test_empty_allow_list_admits_everyone() {
        let mut settings = settings();
        assert!(settings.is_user_allowed(42));

        settings.allowed_users_str = Some("1,2".to_string());
        assert!(settings.is_user_allowed(2));
        assert!(!settings.is_user_allowed(42));
    }

    #[test]
    fn test_placeholder_credentials_are_reported() {
        let settings = settings();
        assert_eq!(
            settings.placeholder_credentials(),
            vec!["GEMINI_ANSWER", "NVIDIA", "GITHUB"]
        );
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let mut settings = settings();
        assert_eq!(settings.provider_timeout(), None);

        settings.provider_timeout_secs = Some(0);
        assert_eq!(settings.provider_timeout(), None);

        settings.provider_timeout_secs = Some(45);
        assert_eq!(settings.provider_timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_text_prompt_embeds_question() {
        let prompt = build_text_prompt("2+2=?");
        assert!(prompt.starts_with("Question: 2+2=?\n"));
        assert!(prompt.ends_with(ANSWER_INSTRUCTION));
    }

    #[test]
    fn test_missing_credentials_fall_back_to_placeholders() -> Result<(), Box<dyn std::error::Error>> {
        let settings: Settings = Config::builder()
            .set_override("telegram_token", "dummy")?
            .set_override("groq", "gsk_live")?
            .build()?
            .try_deserialize()?;

        assert_eq!(settings.groq_key, "gsk_live");
        assert_eq!(settings.gemini_answer_key, GEMINI_PLACEHOLDER_KEY);
        assert_eq!(settings.github_key, GITHUB_PLACEHOLDER_KEY);
        assert_eq!(settings.provider_timeout_secs, None);
        Ok(())
    }
}
