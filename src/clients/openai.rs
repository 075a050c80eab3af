//! OpenAI pattern generator.
//!
//! Uses the Chat Completions API (`/v1/chat/completions`) with a strict
//! `json_schema` response format so the model's reply deserializes straight
//! into [`RawPattern`]s.
//!
//! # Examples
//!
//! ```rust,no_run
//! use patternpress::clients::{OpenAiGenerator, PatternGenerator};
//! use patternpress::config::{OpenAiSettings, TimeoutConfig};
//!
//! # async fn example() -> Result<(), patternpress::clients::CollaboratorError> {
//! let settings = OpenAiSettings {
//!     api_key: "sk-...".into(),
//!     ..OpenAiSettings::default()
//! };
//! let generator = OpenAiGenerator::new(settings, &TimeoutConfig::default())?;
//! let patterns = generator.generate("cats who code", 3).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{build_client, check_status, read_json, send_with_retry};
use super::{CollaboratorError, PatternGenerator, Result};
use crate::config::{OpenAiSettings, TimeoutConfig};
use crate::types::RawPattern;

const SERVICE: &str = "openai";

/// Retries after HTTP 429 on generation calls.
const GENERATION_RETRIES: u32 = 2;

const SYSTEM_PROMPT: &str = "You are a helpful chatbot";

/// Garment description appended to every prompt.
pub const GARMENT_DESCRIPTION: &str = "\
Garment: Unisex Gildan T-Shirt. Medium-weight fabric (5.3 oz/yd², 180 g/m²) \
of 100% cotton, comfortable year-round, durable and sustainable. Classic \
relaxed fit with a crew neckline that suits casual and semi-formal wear.";

/// Build the user prompt for `count` patterns about `idea`.
pub fn user_prompt(idea: &str, count: u32) -> String {
    format!(
        "I run a t-shirt shop and want creative, funny and original designs. \
Generate {count} patterns about this idea: {idea}. \
`product_name` is the listing title. \
`description` is a short, witty but classy listing description; you may borrow \
from the garment description below. \
`tshirt_text` is the text printed on the shirt; do not wrap it in quotes. \
`marketing_tags` are tags relevant to the idea that can be used to market the shirt. \
Make every pattern distinct.\n\n{GARMENT_DESCRIPTION}"
    )
}

/// Strict JSON schema for the model reply: `{"patterns": [RawPattern, ..]}`.
pub fn pattern_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "patterns": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "product_name": {"type": "string"},
                        "description": {"type": "string"},
                        "tshirt_text": {"type": "string"},
                        "marketing_tags": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["product_name", "description", "tshirt_text", "marketing_tags"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["patterns"],
        "additionalProperties": false
    })
}

/// Build the Chat Completions request body.
pub fn build_request_body(settings: &OpenAiSettings, idea: &str, count: u32) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": settings.model,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": user_prompt(idea, count)}
        ],
        "temperature": settings.temperature,
        "frequency_penalty": settings.frequency_penalty,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "pattern_list",
                "strict": true,
                "schema": pattern_schema()
            }
        }
    });
    if let (Some(max_tokens), Some(obj)) = (settings.max_tokens, body.as_object_mut()) {
        obj.insert("max_tokens".into(), serde_json::json!(max_tokens));
    }
    body
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PatternList {
    patterns: Vec<RawPattern>,
}

/// Parse the structured reply carried in the first choice.
pub fn parse_patterns(content: &str) -> Result<Vec<RawPattern>> {
    let list: PatternList = serde_json::from_str(content)
        .map_err(|e| CollaboratorError::decode(SERVICE, format!("pattern list: {e}")))?;
    for pattern in &list.patterns {
        pattern
            .validate()
            .map_err(|e| CollaboratorError::decode(SERVICE, e))?;
    }
    Ok(list.patterns)
}

/// OpenAI-backed [`PatternGenerator`].
pub struct OpenAiGenerator {
    settings: OpenAiSettings,
    client: reqwest::Client,
    health_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("model", &self.settings.model)
            .field("base_url", &self.settings.base_url)
            .finish()
    }
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings, timeouts: &TimeoutConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(SERVICE, Duration::from_secs(timeouts.request_timeout_secs))?,
            health_client: build_client(SERVICE, Duration::from_secs(timeouts.health_timeout_secs))?,
            settings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PatternGenerator for OpenAiGenerator {
    async fn generate(&self, idea: &str, count: u32) -> Result<Vec<RawPattern>> {
        let url = self.url("/v1/chat/completions");
        let body = build_request_body(&self.settings, idea, count);
        tracing::info!(model = %self.settings.model, count, "requesting patterns");

        let response = send_with_retry(SERVICE, GENERATION_RETRIES, None, || {
            self.client
                .post(&url)
                .bearer_auth(&self.settings.api_key)
                .json(&body)
        })
        .await?;
        let completion: CompletionResponse = read_json(SERVICE, response).await?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| CollaboratorError::decode(SERVICE, "response has no choices"))?;
        if let Some(refusal) = message.refusal {
            return Err(CollaboratorError::decode(SERVICE, format!("model refused: {refusal}")));
        }
        let content = message
            .content
            .ok_or_else(|| CollaboratorError::decode(SERVICE, "response has no content"))?;

        let patterns = parse_patterns(&content)?;
        tracing::info!(requested = count, received = patterns.len(), "patterns generated");
        Ok(patterns)
    }

    async fn status(&self) -> Result<()> {
        let response = self
            .health_client
            .get(self.url("/v1/models"))
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, &e))?;
        check_status(SERVICE, response).await.map(|_| ())
    }
}
