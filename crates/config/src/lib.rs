//! Configuration loading, validation, and management for webagent.
//!
//! Loads configuration from `~/.webagent/config.toml` (or `$WEBAGENT_CONFIG`)
//! with environment variable overrides. Validates all settings at startup.
//! The resulting [`AppConfig`] is passed explicitly to whatever needs it;
//! nothing downstream reads the environment again except for API keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model registry id used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Run loop policy
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tool backends
    #[serde(default)]
    pub tools: ToolsConfig,

    /// OpenAI-compatible backends, keyed by provider id
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Selectable models, in listing order
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

fn default_model() -> String {
    "openrouter/qwen-3-32b".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_model", &self.default_model)
            .field("generation", &self.generation)
            .field("agent", &self.agent)
            .field("gateway", &self.gateway)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Cap for answer-producing calls
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Cap for reflection and summary calls
    #[serde(default = "default_auxiliary_max_tokens")]
    pub auxiliary_max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    0.95
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_auxiliary_max_tokens() -> u32 {
    1024
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            auxiliary_max_tokens: default_auxiliary_max_tokens(),
        }
    }
}

/// Run loop policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool-calling rounds allowed before the answer is forced (per reflection round)
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    #[serde(default = "default_max_reflection_rounds")]
    pub max_reflection_rounds: u32,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Tool output longer than this is cut and flagged `truncated`
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,

    /// Characters of each tool output shown to the reflection auditor
    #[serde(default = "default_tool_preview_chars")]
    pub tool_preview_chars: usize,

    #[serde(default = "default_summary_min_messages")]
    pub summary_min_messages: usize,

    #[serde(default = "default_summary_keep_recent_turns")]
    pub summary_keep_recent_turns: usize,

    #[serde(default = "default_summary_chunk_tokens")]
    pub summary_chunk_tokens: usize,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: usize,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Capacity of a turn's event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_tool_rounds() -> u32 {
    5
}
fn default_max_reflection_rounds() -> u32 {
    1
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_max_tool_output_chars() -> usize {
    12_000
}
fn default_tool_preview_chars() -> usize {
    500
}
fn default_summary_min_messages() -> usize {
    6
}
fn default_summary_keep_recent_turns() -> usize {
    2
}
fn default_summary_chunk_tokens() -> usize {
    4_000
}
fn default_summary_max_tokens() -> usize {
    // 30% of a 65536-token context window
    19_660
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_max_delay_ms() -> u64 {
    8_000
}
fn default_event_buffer() -> usize {
    128
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_reflection_rounds: default_max_reflection_rounds(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_tool_output_chars: default_max_tool_output_chars(),
            tool_preview_chars: default_tool_preview_chars(),
            summary_min_messages: default_summary_min_messages(),
            summary_keep_recent_turns: default_summary_keep_recent_turns(),
            summary_chunk_tokens: default_summary_chunk_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            event_buffer: default_event_buffer(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5173".into(),
        "http://localhost:5173".into(),
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Settings for the search/fetch backend shared by the web tools.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,

    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    #[serde(default = "default_num_results")]
    pub default_num_results: u32,

    #[serde(default = "default_fetch_max_characters")]
    pub fetch_max_characters: usize,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_search_base_url() -> String {
    "https://api.exa.ai".into()
}
fn default_num_results() -> u32 {
    5
}
fn default_fetch_max_characters() -> usize {
    8_000
}
fn default_http_timeout_secs() -> u64 {
    20
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("search_api_key", &redact(&self.search_api_key))
            .field("search_base_url", &self.search_base_url)
            .field("default_num_results", &self.default_num_results)
            .field("fetch_max_characters", &self.fetch_max_characters)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_api_key: None,
            search_base_url: default_search_base_url(),
            default_num_results: default_num_results(),
            fetch_max_characters: default_fetch_max_characters(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// One OpenAI-compatible backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub label: String,

    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variables consulted, in order, when `api_key` is unset
    #[serde(default)]
    pub api_key_envs: Vec<String>,

    #[serde(default = "default_true")]
    pub supports_streaming: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// Explicit key first, then the first non-empty environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_envs
            .iter()
            .filter_map(|name| lookup(name))
            .find(|v| !v.is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("label", &self.label)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_key_envs", &self.api_key_envs)
            .field("supports_streaming", &self.supports_streaming)
            .finish()
    }
}

/// One selectable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Registry id clients use (e.g. "openrouter/qwen-3-32b")
    pub id: String,

    /// Key into `providers`
    pub provider: String,

    /// Name the backend knows the model by
    pub model_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Overrides the provider's streaming flag when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_streaming: Option<bool>,
}

impl ModelConfig {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.model_name)
    }

    pub fn streaming_enabled(&self, provider: &ProviderConfig) -> bool {
        self.supports_streaming.unwrap_or(provider.supports_streaming)
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "openrouter".into(),
        ProviderConfig {
            label: "OpenRouter".into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: None,
            api_key_envs: vec!["OPENROUTER_API_KEY".into(), "OPENAI_API_KEY".into()],
            supports_streaming: true,
        },
    );
    providers.insert(
        "huggingface".into(),
        ProviderConfig {
            label: "Hugging Face Inference Router".into(),
            base_url: "https://router.huggingface.co/v1".into(),
            api_key: None,
            api_key_envs: vec!["HF_TOKEN".into(), "HUGGINGFACEHUB_API_TOKEN".into()],
            supports_streaming: true,
        },
    );
    providers
}

fn default_models() -> Vec<ModelConfig> {
    let model = |id: &str, provider: &str, name: &str, display: &str, description: &str| {
        ModelConfig {
            id: id.into(),
            provider: provider.into(),
            model_name: name.into(),
            display_name: Some(display.into()),
            description: Some(description.into()),
            supports_streaming: None,
        }
    };
    vec![
        model(
            "openrouter/qwen-3-32b",
            "openrouter",
            "qwen/qwen3-32b",
            "Qwen 3 32B (OpenRouter)",
            "General-purpose 32B model served via OpenRouter.",
        ),
        model(
            "huggingface/qwen3-32b-groq",
            "huggingface",
            "Qwen/Qwen3-32B:groq",
            "Qwen 3 32B (HF · Groq)",
            "Qwen 3 32B hosted on Hugging Face via the Groq backend.",
        ),
        model(
            "huggingface/qwen3-32b-cerebras",
            "huggingface",
            "Qwen/Qwen3-32B:cerebras",
            "Qwen 3 32B (HF · Cerebras)",
            "Qwen 3 32B hosted on Hugging Face via the Cerebras backend.",
        ),
    ]
}

impl AppConfig {
    /// Load configuration from `$WEBAGENT_CONFIG` or `~/.webagent/config.toml`,
    /// then apply environment overrides:
    /// - `WEB_AGENT_DEFAULT_MODEL`
    /// - `WEB_AGENT_CORS_ORIGINS` (comma separated)
    /// - `EXA_API_KEY`
    /// - `WEBAGENT_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WEBAGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));

        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("WEB_AGENT_DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
            let model = model.trim();
            if self.model(model).is_some() {
                self.default_model = model.to_string();
            } else {
                tracing::warn!(
                    model,
                    "WEB_AGENT_DEFAULT_MODEL not found in model registry, keeping {}",
                    self.default_model
                );
            }
        }

        if let Some(origins) = lookup("WEB_AGENT_CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.gateway.cors_origins = parsed;
            }
        }

        if self.tools.search_api_key.is_none() {
            self.tools.search_api_key = lookup("EXA_API_KEY").filter(|k| !k.is_empty());
        }

        if let Some(port) = lookup("WEBAGENT_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".webagent")
    }

    /// Find a model by registry id.
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one model must be configured".into(),
            ));
        }

        for model in &self.models {
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' references unknown provider '{}'",
                    model.id, model.provider
                )));
            }
        }

        if self.model(&self.default_model).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "default_model '{}' is not a configured model",
                self.default_model
            )));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.tool_timeout_secs must be > 0".into(),
            ));
        }

        if self.agent.max_tool_output_chars == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_output_chars must be > 0".into(),
            ));
        }

        if self.agent.summary_keep_recent_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.summary_keep_recent_turns must be >= 1".into(),
            ));
        }

        if self.agent.retry_max_attempts == 0 || self.agent.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "agent.retry_max_attempts and agent.event_buffer must be >= 1".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            generation: GenerationConfig::default(),
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
            tools: ToolsConfig::default(),
            providers: default_providers(),
            models: default_models(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_model, "openrouter/qwen-3-32b");
        assert_eq!(config.agent.max_reflection_rounds, 1);
        assert_eq!(config.agent.summary_min_messages, 6);
        assert_eq!(config.models.len(), 3);
        assert!(config.providers.contains_key("huggingface"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.models.len(), config.models.len());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[agent]
max_tool_rounds = 2

[gateway]
port = 9100
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.max_tool_rounds, 2);
        assert_eq!(config.agent.tool_timeout_secs, 30);
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.models.len(), 3);
    }

    #[test]
    fn custom_registry_parses() {
        let toml_str = r#"
default_model = "local/llama"

[providers.local]
label = "Local vLLM"
base_url = "http://localhost:8001/v1"
api_key = "none"
supports_streaming = false

[[models]]
id = "local/llama"
provider = "local"
model_name = "meta-llama/Llama-3.1-8B-Instruct"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        let model = config.model("local/llama").unwrap();
        assert!(!model.streaming_enabled(&config.providers["local"]));
        assert_eq!(model.display_name(), "meta-llama/Llama-3.1-8B-Instruct");
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.models[0].provider = "nowhere".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_default_model_rejected() {
        let config = AppConfig {
            default_model: "missing/model".into(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, "openrouter/qwen-3-32b");
    }

    #[test]
    fn unparseable_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[
            ("WEB_AGENT_DEFAULT_MODEL", "huggingface/qwen3-32b-groq"),
            ("WEB_AGENT_CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("EXA_API_KEY", "exa-test"),
            ("WEBAGENT_PORT", "9001"),
        ]));
        assert_eq!(config.default_model, "huggingface/qwen3-32b-groq");
        assert_eq!(
            config.gateway.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.tools.search_api_key.as_deref(), Some("exa-test"));
        assert_eq!(config.gateway.port, 9001);
    }

    #[test]
    fn unknown_env_default_model_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env(&[("WEB_AGENT_DEFAULT_MODEL", "nope")]));
        assert_eq!(config.default_model, "openrouter/qwen-3-32b");
    }

    #[test]
    fn api_key_resolution_order() {
        let provider = &AppConfig::default().providers["openrouter"];
        let key = provider.resolve_api_key_with(env(&[("OPENAI_API_KEY", "sk-openai")]));
        assert_eq!(key.as_deref(), Some("sk-openai"));

        let key = provider.resolve_api_key_with(env(&[
            ("OPENROUTER_API_KEY", "sk-or"),
            ("OPENAI_API_KEY", "sk-openai"),
        ]));
        assert_eq!(key.as_deref(), Some("sk-or"));

        let mut explicit = provider.clone();
        explicit.api_key = Some("sk-explicit".into());
        let key = explicit.resolve_api_key_with(env(&[("OPENROUTER_API_KEY", "sk-or")]));
        assert_eq!(key.as_deref(), Some("sk-explicit"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.tools.search_api_key = Some("exa-secret".into());
        if let Some(p) = config.providers.get_mut("openrouter") {
            p.api_key = Some("sk-secret".into());
        }
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("exa-secret"));
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("max_tool_rounds"));
    }
}
