//! Minimal Exa API client shared by the search and fetch tools.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use webagent_config::ToolsConfig;
use webagent_core::error::ToolError;

#[derive(Clone)]
pub struct ExaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ExaClient {
    pub fn from_config(config: &ToolsConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            api_key: config.search_api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    /// POST a JSON body to `{base_url}{path}` and decode the reply.
    pub async fn post<T: serde::de::DeserializeOwned>(
        &self,
        tool_name: &str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        };

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| failed("search API key is not configured (set EXA_API_KEY)".into()))?;

        let url = format!("{}{}", self.base_url, path);
        debug!(tool = tool_name, url = %url, "Calling search API");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(format!("search API returned {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| failed(format!("invalid search API response: {e}")))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExaResponse {
    #[serde(default)]
    pub results: Vec<ExaResult>,
    #[serde(default)]
    pub statuses: Vec<ExaStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExaResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExaStatus {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<ExaStatusError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaStatusError {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub http_status_code: Option<u16>,
}
