//! Persisted server configuration (`.scout/config.json`).
//!
//! Every field is optional; unset fields keep the runtime defaults. CLI
//! flags are applied on top of the file.

use scout_core::models::LlmProvider;
use scout_core::ScoutConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

pub const CONFIG_PATH: &str = ".scout/config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, ToSchema)]
pub struct PersistedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub provider: Option<LlmProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searxng_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_tasks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_deadline_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl PersistedConfig {
    pub fn path() -> PathBuf {
        PathBuf::from(CONFIG_PATH)
    }

    pub async fn load() -> Self {
        Self::load_from(&Self::path()).await
    }

    pub async fn load_from(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(path, content).await
    }

    /// Overwrite fields that are set in `other`
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.searxng_url.is_some() {
            self.searxng_url = other.searxng_url;
        }
        if other.max_concurrent_tasks.is_some() {
            self.max_concurrent_tasks = other.max_concurrent_tasks;
        }
        if other.stage_deadline_secs.is_some() {
            self.stage_deadline_secs = other.stage_deadline_secs;
        }
        if other.cache_ttl_secs.is_some() {
            self.cache_ttl_secs = other.cache_ttl_secs;
        }
    }

    /// Runtime configuration with these overrides applied
    pub fn to_runtime(&self) -> ScoutConfig {
        let mut config = ScoutConfig::default();
        if let Some(provider) = self.provider {
            config.model.provider = provider;
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if self.base_url.is_some() {
            config.model.base_url = self.base_url.clone();
        }
        if self.searxng_url.is_some() {
            config.tools.searxng_url = self.searxng_url.clone();
        }
        if let Some(n) = self.max_concurrent_tasks {
            config.coordinator.max_concurrent_tasks = n;
        }
        if let Some(secs) = self.stage_deadline_secs {
            config.coordinator.stage_deadline_secs = secs;
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.tools.cache_ttl_secs = secs;
        }
        config
    }
}
