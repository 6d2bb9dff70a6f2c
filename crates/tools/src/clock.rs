//! Current time tool.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use webagent_core::error::ToolError;
use webagent_core::tool::Tool;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time_utc"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC. Use it for questions about today, \
         recent events, or relative dates."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        Ok(serde_json::json!({ "current_time": now }).to_string())
    }
}
