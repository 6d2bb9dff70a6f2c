//! URL content tool backed by the Exa `/contents` endpoint.
//!
//! Returns a markdown document: title, summary, then page text clipped to
//! `max_characters`.

use async_trait::async_trait;
use webagent_core::error::ToolError;
use webagent_core::tool::Tool;

use crate::exa::{ExaClient, ExaResponse};

pub struct FetchUrlTool {
    client: ExaClient,
    max_characters: usize,
}

impl FetchUrlTool {
    pub fn new(client: ExaClient, max_characters: usize) -> Self {
        Self {
            client,
            max_characters,
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url_content"
    }

    fn description(&self) -> &str {
        "Fetch the readable content of a single web page, with a short summary. \
         Use it to read a source found by web_search."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute http(s) URL of the page"
                },
                "max_characters": {
                    "type": "integer",
                    "description": "Maximum characters of page text to return",
                    "default": self.max_characters
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let url = arguments["url"]
            .as_str()
            .map(str::trim)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: self.name().into(),
                reason: "'url' must be an http:// or https:// URL".into(),
            })?;

        let max_characters = arguments["max_characters"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(self.max_characters);

        let response: ExaResponse = self
            .client
            .post(
                self.name(),
                "/contents",
                serde_json::json!({
                    "urls": [url],
                    "text": true,
                    "summary": { "query": "Concise summary" },
                    "livecrawl": "fallback",
                    "livecrawlTimeout": 15000
                }),
            )
            .await?;

        Ok(render_contents(url, &response, max_characters))
    }
}

/// Clip to `max` characters, ending with `...` when cut.
fn clip(text: &str, max: usize) -> String {
    if max == 0 || text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

pub fn render_contents(url: &str, response: &ExaResponse, max_characters: usize) -> String {
    let Some(result) = response.results.first() else {
        return render_unavailable(url, response);
    };

    let title = result
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(url);
    let mut parts = vec![format!("# {title}")];

    if let Some(summary) = result.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("## Summary\n{summary}"));
    }
    let text = clip(result.text.as_deref().unwrap_or_default(), max_characters);
    if !text.trim().is_empty() {
        parts.push(format!("## Content\n{}", text.trim()));
    }

    parts.join("\n\n")
}

fn render_unavailable(url: &str, response: &ExaResponse) -> String {
    let status_lines: Vec<String> = response
        .statuses
        .iter()
        .map(|entry| {
            let mut parts = vec![entry.status.as_deref().unwrap_or("unknown").to_uppercase()];
            if let Some(error) = &entry.error {
                if let Some(tag) = &error.tag {
                    parts.push(tag.clone());
                }
                if let Some(code) = error.http_status_code {
                    parts.push(format!("HTTP {code}"));
                }
            }
            format!("- {}: {}", entry.id.as_deref().unwrap_or(url), parts.join(" | "))
        })
        .collect();

    let status_block = if status_lines.is_empty() {
        "- No additional status metadata returned.".to_string()
    } else {
        status_lines.join("\n")
    };

    [
        "# Content Unavailable".to_string(),
        format!("Unable to retrieve content for [{url}]({url})."),
        String::new(),
        "## Retrieval Status".to_string(),
        status_block,
        String::new(),
        "Consider visiting the page manually or providing an alternative source.".to_string(),
    ]
    .join("\n")
}
