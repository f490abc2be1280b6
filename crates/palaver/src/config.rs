//! Settings for wiring an [`Invoker`] and a [`Memory`] from a TOML file.
//!
//! Loaded from `~/.config/palaver/config.toml` by default.
//!
//! ## Example Configuration
//!
//! ```toml
//! [model]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! temperature = 0.1
//! timeout_seconds = 60
//!
//! [memory]
//! store_path = "/var/lib/palaver/memory.json"
//! validate_tool_calls = false
//!
//! [prompt]
//! system_prompt_file = "/etc/palaver/system_prompt.md"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use palaver_client::LLMClient;
use palaver_common::{Config, RetryConfig};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::invocation::{DEFAULT_TEMPERATURE, Invoker};
use crate::memory::{JsonFileStore, Memory};

/// Top-level settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Model endpoint settings
    pub model: ModelSettings,

    /// Conversation store settings
    #[serde(default)]
    pub memory: MemorySettings,

    /// System prompt source
    #[serde(default)]
    pub prompt: PromptSettings,
}

/// Which endpoint and model to call, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Provider label (default: "openai")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Preferred model identifier
    pub model: String,

    /// Endpoint base URL; the public `OpenAI` API when absent
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key; no key is sent when absent
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Sampling temperature (default: 0.1)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout; none when absent
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// HTTP-level retries for transient failures (default: 0)
    #[serde(default)]
    pub max_retries: u32,
}

/// Where and how the conversation is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySettings {
    /// JSON store location (default: `<data_local_dir>/palaver/memory.json`)
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Reject tool responses for calls the model never made (default: false)
    #[serde(default)]
    pub validate_tool_calls: bool,
}

/// The system prompt, inline or from a file. Exactly one must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Prompt text, used as is.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// File whose whole contents become the prompt. Read when the invoker
    /// is built, relative to the working directory.
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

fn default_provider() -> String {
    "openai".to_string()
}

const fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Settings {
    /// Loads settings from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file doesn't exist or can't be read
    /// - Deserialization or validation fails
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("Failed to read config file: {e}")))?;

        debug!("Loaded settings from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Parses and validates settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)
            .map_err(|e| CoreError::Config(format!("Invalid TOML: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CoreError::Config("Failed to determine config directory".to_string()))?
            .join("palaver");

        Ok(config_dir.join("config.toml"))
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model name is empty
    /// - The temperature is outside 0.0 to 2.0
    /// - Zero or two prompt sources are given
    pub fn validate(&self) -> Result<()> {
        if self.model.model.trim().is_empty() {
            return Err(CoreError::Config("model.model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(CoreError::Config(format!(
                "model.temperature must be between 0.0 and 2.0, got {}",
                self.model.temperature
            )));
        }

        match (&self.prompt.system_prompt, &self.prompt.system_prompt_file) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(CoreError::Config(
                "Set only one of prompt.system_prompt and prompt.system_prompt_file".to_string(),
            )),
            (None, None) => Err(CoreError::Config(
                "One of prompt.system_prompt or prompt.system_prompt_file is required".to_string(),
            )),
        }
    }

    /// The system prompt text, read from disk if configured as a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt file cannot be read.
    pub fn system_prompt(&self) -> Result<String> {
        match (&self.prompt.system_prompt, &self.prompt.system_prompt_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => fs::read_to_string(path).map_err(|e| {
                CoreError::Config(format!(
                    "Failed to read system prompt {}: {e}",
                    path.display()
                ))
            }),
            (None, None) => Err(CoreError::Config("No system prompt configured".to_string())),
        }
    }

    /// Where the conversation store lives.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set and the data directory cannot be determined.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.memory.store_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| CoreError::Config("Failed to determine data directory".to_string()))?;
        Ok(data_dir.join("palaver").join("memory.json"))
    }

    /// Client configuration, with the API key read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_key_env` names a variable that is not set.
    pub fn client_config(&self) -> Result<Config> {
        self.client_config_with(|name| std::env::var(name).ok())
    }

    /// Client configuration, resolving the API key through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `api_key_env` names a variable `lookup` cannot resolve.
    pub fn client_config_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let model = &self.model;
        let mut config = Config::new(&model.provider, &model.model).with_retry_config(RetryConfig {
            max_retries: model.max_retries,
            ..RetryConfig::default()
        });

        if let Some(base_url) = &model.base_url {
            config = config.with_base_url(base_url);
        }
        if let Some(timeout) = model.timeout_seconds {
            config = config.with_timeout(timeout);
        }
        if let Some(var) = &model.api_key_env {
            let key = lookup(var).ok_or_else(|| {
                CoreError::Config(format!("Environment variable {var} is not set"))
            })?;
            config = config.with_api_key(key);
        }

        Ok(config)
    }

    /// Opens the configured JSON store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store path cannot be determined or created.
    pub async fn open_memory(&self) -> Result<Memory<JsonFileStore>> {
        let store = JsonFileStore::open(self.store_path()?).await?;
        Ok(Memory::new(store).with_tool_call_validation(self.memory.validate_tool_calls))
    }

    /// An invoker over `client` with the configured prompt, model, and temperature.
    ///
    /// # Errors
    ///
    /// Returns an error if the system prompt cannot be read.
    pub fn invoker<C: LLMClient>(&self, client: C) -> Result<Invoker<C>> {
        Ok(Invoker::new(client, self.system_prompt()?)
            .with_preferred_model(&self.model.model)
            .with_temperature(self.model.temperature))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use secrecy::ExposeSecret;

    use super::*;

    const MINIMAL: &str = r#"
        [model]
        model = "gpt-4o-mini"

        [prompt]
        system_prompt = "You are a helpful assistant."
    "#;

    #[test]
    fn test_minimal_settings_defaults() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();

        assert_eq!(settings.model.provider, "openai");
        assert!((settings.model.temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
        assert_eq!(settings.model.max_retries, 0);
        assert!(!settings.memory.validate_tool_calls);
        assert_eq!(settings.system_prompt().unwrap(), "You are a helpful assistant.");
    }

    #[test]
    fn test_full_settings() {
        let settings = Settings::from_toml_str(
            r#"
            [model]
            provider = "ollama"
            model = "llama3"
            base_url = "http://localhost:11434/v1"
            temperature = 0.5
            timeout_seconds = 120
            max_retries = 2

            [memory]
            store_path = "/tmp/palaver/memory.json"
            validate_tool_calls = true

            [prompt]
            system_prompt = "hi"
            "#,
        )
        .unwrap();

        let config = settings.client_config_with(|_| None).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.timeout_seconds, Some(120));
        assert_eq!(config.retry_config.max_retries, 2);
        assert!(config.api_key.is_none());
        assert_eq!(
            settings.store_path().unwrap(),
            PathBuf::from("/tmp/palaver/memory.json")
        );
    }

    #[test]
    fn test_api_key_from_environment() {
        let settings = Settings::from_toml_str(
            r#"
            [model]
            model = "gpt-4o"
            api_key_env = "PALAVER_TEST_KEY"

            [prompt]
            system_prompt = "hi"
            "#,
        )
        .unwrap();

        let config = settings
            .client_config_with(|name| (name == "PALAVER_TEST_KEY").then(|| "sk-test".to_string()))
            .unwrap();
        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-test");

        let err = settings.client_config_with(|_| None).unwrap_err();
        assert!(matches!(err, CoreError::Config(msg) if msg.contains("PALAVER_TEST_KEY")));
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        let err = Settings::from_toml_str(
            r#"
            [model]
            model = "gpt-4o"
            temperature = 2.5

            [prompt]
            system_prompt = "hi"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_requires_exactly_one_prompt_source() {
        let none = Settings::from_toml_str("[model]\nmodel = \"m\"\n");
        assert!(matches!(none, Err(CoreError::Config(_))));

        let both = Settings::from_toml_str(
            "[model]\nmodel = \"m\"\n[prompt]\nsystem_prompt = \"a\"\nsystem_prompt_file = \"b.md\"\n",
        );
        assert!(matches!(both, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_prompt_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("prompt.md");
        fs::write(&prompt_path, "Answer in haiku.").unwrap();

        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            format!(
                "[model]\nmodel = \"m\"\n[prompt]\nsystem_prompt_file = {:?}\n",
                prompt_path.display().to_string()
            ),
        )
        .unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.system_prompt().unwrap(), "Answer in haiku.");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Config(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_open_memory_honors_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("memory.json");
        let mut settings = Settings::from_toml_str(MINIMAL).unwrap();
        settings.memory.store_path = Some(store_path.clone());
        settings.memory.validate_tool_calls = true;

        let memory = settings.open_memory().await.unwrap();

        assert!(store_path.exists());
        assert!(matches!(
            memory.record_tool_response("call_1", "x").await,
            Err(CoreError::UnknownToolCall(_))
        ));
    }
}
