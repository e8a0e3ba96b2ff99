//! Extractor: one language-model call per article that both classifies it
//! (is this a real bear sighting?) and pulls out prefecture, city, and summary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::ProviderError;
use crate::ingest::normalize_text;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Structured verdict returned by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SightingVerdict {
    pub is_sighting: bool,
    #[serde(default)]
    pub prefecture: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl SightingVerdict {
    pub fn negative() -> Self {
        Self::default()
    }

    /// Trim text fields and turn blanks (and the literal "null") into `None`.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        }
        Self {
            is_sighting: self.is_sighting,
            prefecture: clean(self.prefecture),
            city: clean(self.city),
            summary: clean(self.summary),
        }
    }
}

pub type ExtractFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SightingVerdict, ProviderError>> + Send + 'a>>;

/// Trait object used by the pipeline (and faked in tests).
pub trait SightingExtractor: Send + Sync {
    fn extract<'a>(&'a self, title: &'a str, description: &'a str) -> ExtractFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynExtractor = Arc<dyn SightingExtractor>;

/// Factory: the OpenAI extractor when a key is configured, otherwise the disabled one.
pub fn build_extractor(config: &AiConfig, http: reqwest::Client) -> DynExtractor {
    match &config.api_key {
        Some(key) => Arc::new(OpenAiExtractor::new(http, key.clone(), &config.model)),
        None => Arc::new(DisabledExtractor),
    }
}

// ------------------------------------------------------------
// Prompting + reply parsing
// ------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You read Japanese news articles and decide whether the article \
reports a concrete sighting of a wild bear (クマの出没・目撃・人身被害). Articles about bear \
policy, statistics, culling budgets, or zoo animals are NOT sightings. \
Reply with a single JSON object and nothing else, using exactly these keys: \
\"is_sighting\" (boolean), \
\"prefecture\" (string or null, e.g. \"秋田県\"), \
\"city\" (string or null, the municipality, e.g. \"鹿角市\"), \
\"summary\" (string or null, one short Japanese sentence describing when, where and what happened).";

const MAX_FIELD_CHARS: usize = 1_500;

pub fn build_user_prompt(title: &str, description: &str) -> String {
    let title = cap_chars(&normalize_text(title), MAX_FIELD_CHARS);
    let description = cap_chars(&normalize_text(description), MAX_FIELD_CHARS);
    format!("Title: {title}\nDescription: {description}")
}

fn cap_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parse the model's reply into a verdict. Tolerates a fenced ```json block.
pub fn parse_verdict(
    provider: &'static str,
    content: &str,
) -> Result<SightingVerdict, ProviderError> {
    let body = strip_code_fence(content.trim());
    if body.is_empty() {
        return Err(ProviderError::malformed(provider, "empty reply"));
    }
    serde_json::from_str::<SightingVerdict>(body)
        .map(SightingVerdict::normalized)
        .map_err(|e| ProviderError::malformed(provider, e))
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ------------------------------------------------------------
// OpenAI provider
// ------------------------------------------------------------

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completions in JSON mode.
pub struct OpenAiExtractor {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiExtractor {
    pub fn new(http: reqwest::Client, api_key: String, model: &str) -> Self {
        Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn extract_impl(
        &self,
        title: &str,
        description: &str,
    ) -> Result<SightingVerdict, ProviderError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let provider = self.provider_name();
        let user = build_user_prompt(title, description);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.0,
            max_tokens: 300,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ProviderError::malformed(provider, e))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        parse_verdict(provider, &content)
    }
}

impl SightingExtractor for OpenAiExtractor {
    fn extract<'a>(&'a self, title: &'a str, description: &'a str) -> ExtractFuture<'a> {
        Box::pin(self.extract_impl(title, description))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Installed when no API key is configured; every call fails with `Disabled`.
pub struct DisabledExtractor;

impl SightingExtractor for DisabledExtractor {
    fn extract<'a>(&'a self, _title: &'a str, _description: &'a str) -> ExtractFuture<'a> {
        Box::pin(async {
            Err(ProviderError::Disabled {
                provider: "extractor",
            })
        })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}
