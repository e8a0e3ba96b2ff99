// src/config/ai.rs
use crate::error::ConfigError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";

/// Settings for the language-model extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    /// `None` installs the disabled extractor.
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

impl AiConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_OPENAI_API_KEY)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let model = match lookup(ENV_OPENAI_MODEL) {
            Some(m) if m.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    key: ENV_OPENAI_MODEL,
                    value: m,
                })
            }
            Some(m) => m.trim().to_string(),
            None => DEFAULT_OPENAI_MODEL.to_string(),
        };

        Ok(Self { api_key, model })
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
