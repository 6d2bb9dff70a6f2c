//! Web search tool backed by the Exa `/search` endpoint.

use async_trait::async_trait;
use webagent_core::error::ToolError;
use webagent_core::tool::Tool;

use crate::exa::{ExaClient, ExaResponse};

pub struct WebSearchTool {
    client: ExaClient,
    default_num_results: u32,
}

impl WebSearchTool {
    pub fn new(client: ExaClient, default_num_results: u32) -> Self {
        Self {
            client,
            default_num_results: default_num_results.max(1),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information. Returns the text of the most \
         relevant pages, each tagged with its URL."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return",
                    "minimum": 1,
                    "maximum": 10,
                    "default": self.default_num_results
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().into(),
                reason: "'query' must be a non-empty string".into(),
            })?;

        let num_results = arguments["num_results"]
            .as_u64()
            .map(|n| n.clamp(1, 10) as u32)
            .unwrap_or(self.default_num_results);

        let response: ExaResponse = self
            .client
            .post(
                self.name(),
                "/search",
                serde_json::json!({
                    "query": query,
                    "type": "auto",
                    "numResults": num_results,
                    "contents": { "text": true }
                }),
            )
            .await?;

        Ok(format_results(&response))
    }
}

/// One `<result {url} id={n}> {text}</result>` line per hit.
pub fn format_results(response: &ExaResponse) -> String {
    if response.results.is_empty() {
        return "No results found.".into();
    }
    response
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "<result {} id={}> {}</result>\n",
                r.url,
                i + 1,
                r.text.as_deref().unwrap_or_default()
            )
        })
        .collect()
}
