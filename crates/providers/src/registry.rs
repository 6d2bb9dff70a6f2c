//! Model registry: maps public model ids to backend clients.
//!
//! Handles client creation from config and resolves the model a caller
//! asked for into the provider model name plus the client that serves it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};
use webagent_config::{AppConfig, ModelConfig, ProviderConfig};
use webagent_core::error::{Error, ModelError};
use webagent_core::model::ModelClient;

use crate::openai_compat::OpenAiCompatClient;

/// The model a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    /// Public registry id (e.g. "openrouter/qwen-3-32b")
    pub id: String,
    /// Name sent to the backend (e.g. "qwen/qwen3-32b")
    pub model_name: String,
    pub provider: String,
    /// Whether the run loop may use streaming mode.
    pub streaming: bool,
}

/// Routes model ids to the correct client.
#[derive(Clone)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
    providers: BTreeMap<String, ProviderConfig>,
    clients: BTreeMap<String, Arc<dyn ModelClient>>,
    default_model: String,
}

impl ModelRegistry {
    /// Build clients for every provider that has an API key.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            models: config.models.clone(),
            providers: config.providers.clone(),
            clients: BTreeMap::new(),
            default_model: config.default_model.clone(),
        };

        for (name, provider) in &config.providers {
            match provider.resolved_api_key() {
                Some(key) => {
                    debug!(provider = %name, base_url = %provider.base_url, "Registering model client");
                    registry.register(
                        name,
                        Arc::new(OpenAiCompatClient::new(name, &provider.base_url, key)),
                    );
                }
                None => warn!(
                    provider = %name,
                    envs = ?provider.api_key_envs,
                    "No API key configured; models on this provider are unavailable"
                ),
            }
        }

        registry
    }

    /// Register (or replace) the client serving a provider.
    pub fn register(&mut self, provider: impl Into<String>, client: Arc<dyn ModelClient>) {
        self.clients.insert(provider.into(), client);
    }

    pub fn with_client(mut self, provider: impl Into<String>, client: Arc<dyn ModelClient>) -> Self {
        self.register(provider, client);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn supported_ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }

    fn find(&self, selector: &str) -> Option<&ModelConfig> {
        self.models
            .iter()
            .find(|m| m.id == selector)
            .or_else(|| self.models.iter().find(|m| m.model_name == selector))
    }

    /// Resolve a model id (or backend model name). `None` means the default.
    pub fn resolve(
        &self,
        selector: Option<&str>,
    ) -> Result<(ModelSelection, Arc<dyn ModelClient>), Error> {
        let selector = selector
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_model);

        let model = self.find(selector).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Unsupported model '{selector}'. Supported models: {}",
                self.supported_ids().join(", ")
            ))
        })?;

        let provider = self.providers.get(&model.provider).ok_or_else(|| Error::Config {
            message: format!(
                "Model '{}' references unknown provider '{}'",
                model.id, model.provider
            ),
        })?;

        let client = self.clients.get(&model.provider).cloned().ok_or_else(|| {
            ModelError::NotConfigured(format!(
                "Provider '{}' has no API key (set one of: {})",
                model.provider,
                provider.api_key_envs.join(", ")
            ))
        })?;

        Ok((
            ModelSelection {
                id: model.id.clone(),
                model_name: model.model_name.clone(),
                provider: model.provider.clone(),
                streaming: model.streaming_enabled(provider),
            },
            client,
        ))
    }

    /// OpenAI-style model listing.
    pub fn models_payload(&self) -> serde_json::Value {
        let data: Vec<serde_json::Value> = self
            .models
            .iter()
            .map(|m| {
                let provider = self.providers.get(&m.provider);
                serde_json::json!({
                    "id": m.id,
                    "object": "model",
                    "owned_by": m.provider,
                    "display_name": m.display_name(),
                    "description": m.description,
                    "provider": provider.map(|p| p.label.as_str()).unwrap_or(m.provider.as_str()),
                    "model_name": m.model_name,
                    "supports_streaming": provider.map(|p| m.streaming_enabled(p)).unwrap_or(false),
                    "available": self.clients.contains_key(&m.provider),
                    "default": m.id == self.default_model,
                })
            })
            .collect();

        serde_json::json!({ "object": "list", "data": data })
    }
}
