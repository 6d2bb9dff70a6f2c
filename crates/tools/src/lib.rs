//! Built-in tools for webagent.
//!
//! Tools give the agent fresh evidence: web search, page contents and the
//! clock. Search and fetch go through the Exa API.
//!
//! The built-ins form a closed set, [`BuiltinTool`]; adding one means adding
//! a variant. The dispatcher only ever sees the `Tool` trait.

pub mod clock;
pub mod echo;
pub mod exa;
pub mod fetch_url;
pub mod web_search;

use std::sync::Arc;

use async_trait::async_trait;
use webagent_config::ToolsConfig;
use webagent_core::error::ToolError;
use webagent_core::tool::{Tool, ToolRegistry};

pub use clock::CurrentTimeTool;
pub use echo::EchoTool;
pub use exa::ExaClient;
pub use fetch_url::FetchUrlTool;
pub use web_search::WebSearchTool;

pub enum BuiltinTool {
    WebSearch(WebSearchTool),
    FetchUrl(FetchUrlTool),
    CurrentTime(CurrentTimeTool),
    Echo(EchoTool),
}

impl BuiltinTool {
    fn inner(&self) -> &dyn Tool {
        match self {
            Self::WebSearch(t) => t as &dyn Tool,
            Self::FetchUrl(t) => t,
            Self::CurrentTime(t) => t,
            Self::Echo(t) => t,
        }
    }

    /// Every built-in, configured.
    pub fn all(config: &ToolsConfig) -> Vec<BuiltinTool> {
        let exa = ExaClient::from_config(config);
        vec![
            Self::WebSearch(WebSearchTool::new(exa.clone(), config.default_num_results)),
            Self::FetchUrl(FetchUrlTool::new(exa, config.fetch_max_characters)),
            Self::CurrentTime(CurrentTimeTool),
            Self::Echo(EchoTool),
        ]
    }
}

#[async_trait]
impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner().parameters_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        self.inner().execute(arguments).await
    }
}

/// Create the default tool registry with all built-in tools.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    if config.search_api_key.is_none() {
        tracing::warn!("No search API key configured; web_search and fetch_url_content will fail");
    }

    BuiltinTool::all(config)
        .into_iter()
        .fold(ToolRegistry::new(), |registry, tool| {
            registry.with(Arc::new(tool))
        })
}
