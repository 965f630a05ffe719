//! # Language Model Capability
//!
//! Agents ask a model for a structured JSON answer through [`LanguageModel`].
//! The default implementation talks to any OpenAI-compatible
//! chat-completions endpoint.

use crate::models::ModelConfig;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// "Ask the model to do X and return JSON"
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete_json(&self, system: &str, prompt: &str) -> anyhow::Result<Value>;
}

/// OpenAI-compatible chat-completions client
pub struct ChatCompletionsModel {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl ChatCompletionsModel {
    pub fn new(config: ModelConfig, api_key: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Read the API key from the provider's environment variable
    pub fn from_env(config: ModelConfig) -> anyhow::Result<Self> {
        let var = config.provider.api_key_env();
        let api_key = std::env::var(var).with_context(|| format!("{} is not set", var))?;
        Self::new(config, api_key, Duration::from_secs(120))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete_json(&self, system: &str, prompt: &str) -> anyhow::Result<Value> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint()))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LLM returned {}: {}", status, truncate(&text, 300)));
        }

        let reply: Value = response.json().await.context("LLM reply was not JSON")?;
        let content = reply
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow!("LLM reply has no message content"))?;

        parse_json_reply(content)
    }
}

/// Parse a model reply that should be a JSON object.
///
/// Tolerates markdown code fences and prose around the object.
pub fn parse_json_reply(content: &str) -> anyhow::Result<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str(&trimmed[s..=e])
            .with_context(|| format!("unparseable model output: {}", truncate(trimmed, 200))),
        _ => Err(anyhow!("model output holds no JSON object: {}", truncate(trimmed, 200))),
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_json_reply(r#"{"sector": "Technology"}"#).unwrap();
        assert_eq!(value["sector"], "Technology");
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "Here you go:\n```json\n{\"competitors\": [\"Globex\"]}\n```";
        let value = parse_json_reply(reply).unwrap();
        assert_eq!(value["competitors"][0], "Globex");
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_json_reply("I could not find anything.").is_err());
    }
}
