//! Tool dispatcher: runs one batch of tool calls concurrently.
//!
//! Results come back in request order. Start events go out on dispatch and
//! finish events as each call completes, so the event order follows
//! completion time while the returned sequence does not.

use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};
use webagent_config::AgentConfig;
use webagent_core::error::{Error, ToolError};
use webagent_core::model::ToolDefinition;
use webagent_core::tool::{ToolCallRequest, ToolCallResult, ToolRegistry};

use crate::multiplexer::EventSink;
use crate::stream_event::StreamEvent;

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    timeout: Duration,
    /// 0 disables truncation.
    max_output_chars: usize,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, timeout: Duration, max_output_chars: usize) -> Self {
        Self {
            registry,
            timeout,
            max_output_chars,
        }
    }

    pub fn from_config(registry: ToolRegistry, config: &AgentConfig) -> Self {
        Self::new(registry, config.tool_timeout(), config.max_tool_output_chars)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn has_tools(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Execute a batch. Returns one result per request, in request order.
    ///
    /// Only a closed event sink fails the batch; tool failures become
    /// results with `error` set.
    pub async fn dispatch(
        &self,
        requests: &[ToolCallRequest],
        sink: &EventSink,
    ) -> Result<Vec<ToolCallResult>, Error> {
        for request in requests {
            sink.emit(StreamEvent::tool_start(request)).await?;
        }

        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| async move { (index, self.run_one(request).await) })
            .collect();

        let mut slots: Vec<Option<ToolCallResult>> = vec![None; requests.len()];
        while let Some((index, result)) = pending.next().await {
            sink.emit(StreamEvent::tool_finish(&result)).await?;
            slots[index] = Some(result);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn run_one(&self, request: &ToolCallRequest) -> ToolCallResult {
        let started = Instant::now();

        let outcome = match self.registry.get(&request.name) {
            None => Err(ToolError::UnknownTool(request.name.clone())),
            Some(tool) => {
                match tokio::time::timeout(self.timeout, tool.execute(request.arguments.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: request.name.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }),
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(output) => {
                let (output, truncated) = truncate_output(output, self.max_output_chars);
                debug!(tool = %request.name, id = %request.id, elapsed_ms, truncated, "Tool call finished");
                let mut result = ToolCallResult::success(request, output);
                result.truncated = truncated;
                result
            }
            Err(e) => {
                warn!(tool = %request.name, id = %request.id, elapsed_ms, error = %e, "Tool call failed");
                ToolCallResult::failure(request, &e)
            }
        }
    }
}

/// Clip `output` to `max_chars` characters. Returns whether it was cut.
pub fn truncate_output(output: String, max_chars: usize) -> (String, bool) {
    if max_chars == 0 {
        return (output, false);
    }
    match output.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut output = output;
            output.truncate(byte_index);
            (output, true)
        }
        None => (output, false),
    }
}
