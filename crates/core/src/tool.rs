//! Tool trait: the abstraction over external capabilities.
//!
//! Tools give the agent fresh evidence: web search, page fetches, the
//! clock. Each is registered under a stable name with an argument schema
//! that is advertised to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ToolError, ToolErrorKind};
use crate::model::ToolDefinition;

/// A model's request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call ID, unique within one model turn
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// The outcome of one tool call. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub output: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorKind>,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, output: String) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            output,
            truncated: false,
            error: None,
        }
    }

    /// A failed call still produces a result the model can read.
    pub fn failure(request: &ToolCallRequest, error: &ToolError) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            output: format!("Error: {error}"),
            truncated: false,
            error: Some(error.kind()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments, returning its text output.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
///
/// Iteration order is by name so the advertised schema is stable.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str {
            "upper"
        }
        fn description(&self) -> &str {
            "Uppercases the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            arguments["text"]
                .as_str()
                .map(|s| s.to_uppercase())
                .ok_or_else(|| ToolError::InvalidArguments {
                    tool_name: "upper".into(),
                    reason: "missing 'text'".into(),
                })
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "call_1".into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(Arc::new(UpperTool));
        assert!(registry.get("upper").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["upper"]);
    }

    #[test]
    fn registry_definitions() {
        let registry = ToolRegistry::new().with(Arc::new(UpperTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "upper");
        assert_eq!(defs[0].parameters["required"][0], "text");
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let registry = ToolRegistry::new().with(Arc::new(UpperTool));
        let out = registry
            .get("upper")
            .unwrap()
            .execute(serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(out, "HELLO");
    }

    #[test]
    fn failure_result_carries_kind() {
        let req = call("upper", serde_json::json!({}));
        let result = ToolCallResult::failure(&req, &ToolError::UnknownTool("upper".into()));
        assert_eq!(result.error, Some(ToolErrorKind::UnknownTool));
        assert!(result.output.starts_with("Error: "));
        assert!(result.is_error());
    }
}
