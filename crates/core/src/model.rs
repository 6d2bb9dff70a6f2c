//! Model client trait: the abstraction over language-model backends.
//!
//! A `ModelClient` sends a conversation plus tool schema to a backend and
//! gets back either a complete response or a lazy sequence of deltas.
//! Deltas arrive over an `mpsc` channel; dropping the receiver is how a
//! consumer cancels an in-flight request.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ModelError;
use crate::message::Message;
use crate::tool::ToolCallRequest;

/// One request to a model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Backend model name (e.g. "qwen/qwen3-32b")
    pub model: String,

    pub messages: Vec<Message>,

    /// Tools the model may call. Empty means no tool use this round.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            temperature: 0.1,
            top_p: None,
            max_tokens: None,
        }
    }
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's arguments
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) model turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,

    /// Provider-native reasoning, when the backend reports it separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default)]
    pub model: String,
}

/// Partial tool call. Fragments sharing an `index` belong to one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: String,
}

/// One incremental piece of a streamed model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFragment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ModelDelta {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            text: Some(s.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(s: impl Into<String>) -> Self {
        Self {
            reasoning: Some(s.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_call: Some(fragment),
            ..Default::default()
        }
    }
}

/// Receiving half of a streamed model turn.
pub type DeltaStream = mpsc::Receiver<Result<ModelDelta, ModelError>>;

/// The core model client trait.
///
/// The run loop calls `complete()` or `stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g. "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;

    /// Send a request and get a stream of deltas.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// a short delta sequence.
    async fn stream(&self, request: ModelRequest) -> Result<DeltaStream, ModelError> {
        let response = self.complete(request).await?;
        let deltas = response_to_deltas(response);
        let (tx, rx) = mpsc::channel(deltas.len().max(1));
        for delta in deltas {
            if tx.send(Ok(delta)).await.is_err() {
                break;
            }
        }
        Ok(rx)
    }
}

/// Break a complete response into the deltas a stream would have carried.
pub fn response_to_deltas(response: ModelResponse) -> Vec<ModelDelta> {
    let mut deltas = Vec::new();
    if let Some(reasoning) = response.reasoning.filter(|r| !r.is_empty()) {
        deltas.push(ModelDelta::reasoning(reasoning));
    }
    if !response.text.is_empty() {
        deltas.push(ModelDelta::text(response.text));
    }
    for (index, call) in response.tool_calls.into_iter().enumerate() {
        deltas.push(ModelDelta::tool_call(ToolCallFragment {
            index,
            id: Some(call.id),
            name: Some(call.name),
            arguments: call.arguments.to_string(),
        }));
    }
    if let Some(usage) = response.usage {
        deltas.push(ModelDelta {
            usage: Some(usage),
            ..Default::default()
        });
    }
    deltas
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Assembles streamed tool-call fragments into complete requests.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: ToolCallFragment) {
        let call = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|s| !s.is_empty()) {
            call.id = id;
        }
        if let Some(name) = fragment.name.filter(|s| !s.is_empty()) {
            call.name = name;
        }
        call.arguments.push_str(&fragment.arguments);
    }

    /// Finished calls in index order.
    ///
    /// Empty arguments become `{}`. Arguments that are not valid JSON are
    /// kept as a string value so the tool can reject them.
    pub fn finish(self) -> Vec<ToolCallRequest> {
        self.calls
            .into_iter()
            .map(|(index, call)| {
                let raw = call.arguments.trim();
                let arguments = if raw.is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(raw)
                        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
                };
                let id = if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                };
                ToolCallRequest {
                    id,
                    name: call.name,
                    arguments,
                }
            })
            .collect()
    }
}
