//! Shared test helpers: a scripted model client and a few toy tools.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use webagent_core::error::{ModelError, ToolError};
use webagent_core::model::*;
use webagent_core::tool::{Tool, ToolCallRequest};

/// One scripted reply.
pub enum Step {
    Respond(ModelResponse),
    /// Raw deltas for streaming mode; an `Err` ends the stream with that error.
    Deltas(Vec<Result<ModelDelta, ModelError>>),
    Fail(ModelError),
}

impl Step {
    pub fn text(text: &str) -> Self {
        Self::Respond(ModelResponse {
            text: text.into(),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "scripted".into(),
            ..Default::default()
        })
    }

    pub fn tools(calls: Vec<ToolCallRequest>) -> Self {
        Self::Respond(ModelResponse {
            tool_calls: calls,
            model: "scripted".into(),
            ..Default::default()
        })
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}

/// A model client that replays scripted steps in order.
///
/// Panics if more calls are made than steps provided.
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Step::text(&text.into())])
    }

    pub fn failing(error: ModelError) -> Self {
        Self::new(vec![Step::Fail(error)])
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ModelRequest) -> Step {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedClient exhausted at call #{call}"))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        match self.next(request) {
            Step::Respond(response) => Ok(response),
            Step::Fail(error) => Err(error),
            Step::Deltas(_) => panic!("Deltas step used in complete mode"),
        }
    }

    async fn stream(&self, request: ModelRequest) -> Result<DeltaStream, ModelError> {
        let deltas = match self.next(request) {
            Step::Respond(response) => response_to_deltas(response).into_iter().map(Ok).collect(),
            Step::Deltas(deltas) => deltas,
            Step::Fail(error) => return Err(error),
        };

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(delta).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Uppercases `text`.
pub struct UpperTool;

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
            .map(str::to_uppercase)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "upper".into(),
                reason: "missing 'text'".into(),
            })
    }
}

/// Sleeps for `ms` milliseconds, then reports it.
pub struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }
    fn description(&self) -> &str {
        "Waits"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "ms": { "type": "integer" } }
        })
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let ms = arguments["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(format!("slept {ms}ms"))
    }
}
