//! Agent-level streaming events.
//!
//! `StreamEvent` is what a turn looks like from the outside: tool-call
//! lifecycle, answer deltas, reasoning, reflection verdicts, and a closing
//! `done`. The gateway forwards these to clients over SSE.

use serde::{Deserialize, Serialize};
use webagent_core::error::ToolErrorKind;
use webagent_core::tool::{ToolCallRequest, ToolCallResult};

use crate::reflection::ReflectionVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Start,
    Finish,
}

/// Events emitted during one turn, in emission order.
///
/// - `tool_call`: a tool started or finished
/// - `answer_delta`: visible answer text; `is_final` carries the full answer
/// - `reasoning`: thinking-block or provider reasoning text
/// - `reflection`: an audit verdict
/// - `error`: unrecoverable failure, always followed by `done`
/// - `done`: the turn is over
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ToolCall {
        status: ToolCallStatus,
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        truncated: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ToolErrorKind>,
    },

    AnswerDelta {
        text: String,
        is_final: bool,
        /// Model round that produced the text, starting at 1.
        round: u32,
    },

    Reasoning { text: String },

    Reflection { verdict: ReflectionVerdict },

    Error { kind: String, message: String },

    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<RunMetadata>,
    },
}

impl StreamEvent {
    pub fn tool_start(request: &ToolCallRequest) -> Self {
        Self::ToolCall {
            status: ToolCallStatus::Start,
            id: request.id.clone(),
            name: request.name.clone(),
            arguments: Some(request.arguments.clone()),
            output: None,
            truncated: None,
            error: None,
        }
    }

    pub fn tool_finish(result: &ToolCallResult) -> Self {
        Self::ToolCall {
            status: ToolCallStatus::Finish,
            id: result.id.clone(),
            name: result.name.clone(),
            arguments: None,
            output: Some(result.output.clone()),
            truncated: Some(result.truncated),
            error: result.error,
        }
    }

    pub fn error(error: &webagent_core::Error) -> Self {
        Self::Error {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::AnswerDelta { .. } => "answer_delta",
            Self::Reasoning { .. } => "reasoning",
            Self::Reflection { .. } => "reflection",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}

/// Compact record of one executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub output_preview: String,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorKind>,
}

impl ToolCallRecord {
    pub fn new(request: &ToolCallRequest, result: &ToolCallResult, preview_chars: usize) -> Self {
        Self {
            id: result.id.clone(),
            name: result.name.clone(),
            arguments: request.arguments.clone(),
            output_preview: result.output.chars().take(preview_chars).collect(),
            truncated: result.truncated,
            error: result.error,
        }
    }
}

/// Everything a caller may want to know about a finished turn besides the answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub model: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub reflections: Vec<ReflectionVerdict>,
    /// Model rounds consumed.
    pub rounds: u32,
}
