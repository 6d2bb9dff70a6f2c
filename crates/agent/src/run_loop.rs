//! The agent run loop: one conversational turn, start to finish.
//!
//! Each round calls the model once. Tool calls are dispatched as one
//! concurrent batch and their results appended in request order, then the
//! loop goes back to the model. A plain answer may be audited once; a
//! demanding verdict buys one more pass. Model failures are retried while
//! transient and otherwise end the turn. Tool failures never do.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use webagent_config::{AppConfig, GenerationConfig};
use webagent_core::error::{Error, ModelError};
use webagent_core::message::{Message, Role};
use webagent_core::model::{ModelClient, ModelRequest, ToolCallAccumulator};
use webagent_core::tool::{ToolCallRequest, ToolCallResult, ToolRegistry};
use webagent_providers::{ModelSelection, RetryPolicy};

use crate::dispatcher::ToolDispatcher;
use crate::multiplexer::EventSink;
use crate::prompts;
use crate::reflection::{ReflectionAuditor, ReflectionVerdict};
use crate::stream_event::{RunMetadata, StreamEvent, ToolCallRecord};
use crate::summarizer::Summarizer;
use crate::thinking::{Segment, ThinkingSplitter};

const EMPTY_ANSWER: &str = "I wasn't able to produce an answer for this request.";
const TOOL_LIMIT_ANSWER: &str = "I reached the tool-use limit for this turn before producing an answer. \
     Ask me to continue or narrow the question.";

/// The outcome of a finished turn.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    pub metadata: RunMetadata,
    /// Full history at the end of the turn, including the final answer.
    pub history: Vec<Message>,
}

/// Per-turn mutable state. Owned by exactly one `run` call.
struct RunState {
    history: Vec<Message>,
    round: u32,
    max_rounds: u32,
    tool_calls_emitted: Vec<ToolCallResult>,
    records: Vec<ToolCallRecord>,
    reflections: Vec<ReflectionVerdict>,
    /// Tool rounds since the turn started or the last reflection follow-up.
    tool_rounds: u32,
    reflection_attempts: u32,
}

/// What one model round produced.
#[derive(Debug, Default)]
struct ModelTurn {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
}

enum Attempt {
    Done(ModelTurn),
    Failed {
        error: ModelError,
        partial: ModelTurn,
        emitted: bool,
    },
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    client: Arc<dyn ModelClient>,
    selection: ModelSelection,
    dispatcher: ToolDispatcher,
    auditor: ReflectionAuditor,
    summarizer: Summarizer,
    retry: RetryPolicy,
    generation: GenerationConfig,
    max_tool_rounds: u32,
    max_reflection_rounds: u32,
    preview_chars: usize,
    system_prompt: Option<String>,
}

impl AgentLoop {
    pub fn new(
        client: Arc<dyn ModelClient>,
        selection: ModelSelection,
        tools: ToolRegistry,
        config: &AppConfig,
    ) -> Self {
        let agent = &config.agent;
        let retry = RetryPolicy::from_config(agent);
        Self {
            auditor: ReflectionAuditor::new(
                client.clone(),
                selection.model_name.clone(),
                config.generation.auxiliary_max_tokens,
            )
            .with_retry(retry),
            summarizer: Summarizer::new(client.clone(), selection.model_name.clone(), agent),
            dispatcher: ToolDispatcher::from_config(tools, agent),
            client,
            selection,
            retry,
            generation: config.generation.clone(),
            max_tool_rounds: agent.max_tool_rounds,
            max_reflection_rounds: agent.max_reflection_rounds,
            preview_chars: agent.tool_preview_chars,
            system_prompt: agent.system_prompt.clone(),
        }
    }

    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }

    pub fn with_max_reflection_rounds(mut self, max: u32) -> Self {
        self.max_reflection_rounds = max;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.selection.streaming = streaming;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.auditor = self.auditor.with_retry(retry);
        self.summarizer = self.summarizer.with_retry(retry);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: ToolDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    /// Run one turn. Events go to `sink` as they happen; an aggregate sink
    /// discards them and the caller uses the returned outcome.
    pub async fn run(&self, history: Vec<Message>, sink: &EventSink) -> Result<RunOutcome, Error> {
        let (history, question) = prepare_history(history)?;

        let history = match self.summarizer.maybe_summarize(&history).await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "Failed to summarize conversation; continuing with full history");
                history
            }
        };
        let history = self.with_system_prompt_applied(history);

        let max_rounds = (self.max_tool_rounds + 1) * (self.max_reflection_rounds + 1);
        let mut state = RunState {
            history,
            round: 0,
            max_rounds,
            tool_calls_emitted: Vec::new(),
            records: Vec::new(),
            reflections: Vec::new(),
            tool_rounds: 0,
            reflection_attempts: 0,
        };

        info!(
            model = %self.selection.id,
            messages = state.history.len(),
            streaming = self.selection.streaming,
            "Starting agent turn"
        );

        loop {
            state.round += 1;
            let tools_allowed = state.tool_rounds < self.max_tool_rounds
                && state.round < state.max_rounds
                && self.dispatcher.has_tools();

            debug!(round = state.round, tools_allowed, "Agent loop round");
            let turn = self.call_model(&state, tools_allowed, sink).await?;

            if tools_allowed && !turn.tool_calls.is_empty() {
                self.run_tools(&mut state, turn, sink).await?;
                continue;
            }

            let budget_exhausted = !turn.tool_calls.is_empty();
            if budget_exhausted {
                warn!(
                    round = state.round,
                    requested = turn.tool_calls.len(),
                    "Tool round limit reached; ignoring requested tool calls"
                );
            }

            if !state.tool_calls_emitted.is_empty()
                && state.reflection_attempts < self.max_reflection_rounds
            {
                let verdict = self
                    .auditor
                    .audit(&question, &turn.text, &state.records)
                    .await;
                state.reflection_attempts += 1;
                sink.emit(StreamEvent::Reflection {
                    verdict: verdict.clone(),
                })
                .await?;
                state.reflections.push(verdict.clone());

                if verdict.requires_more_context {
                    info!(round = state.round, "Reflection requested additional context");
                    if !turn.text.trim().is_empty() {
                        state.history.push(Message::assistant(turn.text));
                    }
                    state.history.extend(verdict.feedback_messages());
                    state.tool_rounds = 0;
                    continue;
                }
            }

            return self.finalize(state, turn.text, budget_exhausted, sink).await;
        }
    }

    async fn run_tools(
        &self,
        state: &mut RunState,
        turn: ModelTurn,
        sink: &EventSink,
    ) -> Result<(), Error> {
        let calls = unique_call_ids(turn.tool_calls);
        debug!(round = state.round, count = calls.len(), "Dispatching tool calls");

        state
            .history
            .push(Message::assistant_tool_calls(turn.text, calls.clone()));

        let results = self.dispatcher.dispatch(&calls, sink).await?;
        let failed = results.iter().filter(|r| r.is_error()).count();
        debug!(round = state.round, count = results.len(), failed, "Tool batch complete");

        for result in results {
            let Some(request) = calls.iter().find(|c| c.id == result.id) else {
                warn!(id = %result.id, "Dropping tool result with unknown call id");
                continue;
            };
            state
                .history
                .push(Message::tool_result(&result.id, &result.name, result.output.clone()));
            state
                .records
                .push(ToolCallRecord::new(request, &result, self.preview_chars));
            state.tool_calls_emitted.push(result);
        }

        state.tool_rounds += 1;
        Ok(())
    }

    async fn finalize(
        &self,
        mut state: RunState,
        text: String,
        budget_exhausted: bool,
        sink: &EventSink,
    ) -> Result<RunOutcome, Error> {
        let mut answer = text;
        if answer.trim().is_empty() {
            let fallback = if budget_exhausted {
                TOOL_LIMIT_ANSWER
            } else {
                EMPTY_ANSWER
            };
            sink.emit(StreamEvent::AnswerDelta {
                text: fallback.to_string(),
                is_final: false,
                round: state.round,
            })
            .await?;
            answer.push_str(fallback);
        }

        sink.emit(StreamEvent::AnswerDelta {
            text: answer.clone(),
            is_final: true,
            round: state.round,
        })
        .await?;

        state.history.push(Message::assistant(answer.clone()));

        info!(
            rounds = state.round,
            tool_calls = state.tool_calls_emitted.len(),
            reflections = state.reflections.len(),
            "Agent turn complete"
        );

        Ok(RunOutcome {
            answer,
            metadata: RunMetadata {
                model: self.selection.id.clone(),
                tool_calls: state.records,
                reflections: state.reflections,
                rounds: state.round,
            },
            history: state.history,
        })
    }

    fn with_system_prompt_applied(&self, mut history: Vec<Message>) -> Vec<Message> {
        if history.first().map(|m| m.role) != Some(Role::System) {
            let prompt = self
                .system_prompt
                .clone()
                .unwrap_or_else(prompts::default_system_prompt);
            history.insert(0, Message::system(prompt));
        }
        history
    }

    fn request(&self, history: &[Message], tools_allowed: bool) -> ModelRequest {
        let mut request = ModelRequest::new(self.selection.model_name.clone(), history.to_vec());
        request.temperature = self.generation.temperature;
        request.top_p = Some(self.generation.top_p);
        request.max_tokens = Some(self.generation.max_tokens);
        if tools_allowed {
            request.tools = self.dispatcher.definitions();
        }
        request
    }

    /// One model round with retries. A protocol error yields whatever was
    /// received so far; other errors end the turn once retries are spent.
    async fn call_model(
        &self,
        state: &RunState,
        tools_allowed: bool,
        sink: &EventSink,
    ) -> Result<ModelTurn, Error> {
        let request = self.request(&state.history, tools_allowed);
        let mut attempt = 1;

        loop {
            let outcome = if self.selection.streaming {
                self.stream_once(request.clone(), state.round, sink).await?
            } else {
                self.complete_once(request.clone(), state.round, sink).await?
            };

            match outcome {
                Attempt::Done(turn) => return Ok(turn),
                Attempt::Failed { error: ModelError::Protocol(detail), partial, .. } => {
                    warn!(round = state.round, detail = %detail, "Malformed model response; treating as empty");
                    return Ok(partial);
                }
                Attempt::Failed { error, emitted, .. } => {
                    if !emitted && self.retry.should_retry(attempt, &error) {
                        let delay = self.retry.delay_for(attempt, &error);
                        warn!(
                            round = state.round,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Transient model error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error.into());
                }
            }
        }
    }

    async fn stream_once(
        &self,
        request: ModelRequest,
        round: u32,
        sink: &EventSink,
    ) -> Result<Attempt, Error> {
        let mut rx = match self.client.stream(request).await {
            Ok(rx) => rx,
            Err(error) => {
                return Ok(Attempt::Failed {
                    error,
                    partial: ModelTurn::default(),
                    emitted: false,
                });
            }
        };

        let mut turn = ModelTurn::default();
        let mut splitter = ThinkingSplitter::new();
        let mut calls = ToolCallAccumulator::new();
        let mut emitted = false;

        while let Some(item) = rx.recv().await {
            let delta = match item {
                Ok(delta) => delta,
                Err(error) => {
                    // Held-back text stays unsent while the attempt may still be retried.
                    if emitted || matches!(error, ModelError::Protocol(_)) {
                        for segment in splitter.finish() {
                            emit_segment(segment, &mut turn, round, sink).await?;
                            emitted = true;
                        }
                    }
                    return Ok(Attempt::Failed {
                        error,
                        partial: turn,
                        emitted,
                    });
                }
            };

            if let Some(reasoning) = delta.reasoning.filter(|r| !r.is_empty()) {
                sink.emit(StreamEvent::Reasoning { text: reasoning }).await?;
                emitted = true;
            }
            if let Some(text) = delta.text {
                for segment in splitter.push(&text) {
                    emit_segment(segment, &mut turn, round, sink).await?;
                    emitted = true;
                }
            }
            if let Some(fragment) = delta.tool_call {
                calls.push(fragment);
            }
        }

        for segment in splitter.finish() {
            emit_segment(segment, &mut turn, round, sink).await?;
        }
        turn.tool_calls = calls.finish();
        Ok(Attempt::Done(turn))
    }

    async fn complete_once(
        &self,
        request: ModelRequest,
        round: u32,
        sink: &EventSink,
    ) -> Result<Attempt, Error> {
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(error) => {
                return Ok(Attempt::Failed {
                    error,
                    partial: ModelTurn::default(),
                    emitted: false,
                });
            }
        };

        if let Some(reasoning) = response.reasoning.filter(|r| !r.is_empty()) {
            sink.emit(StreamEvent::Reasoning { text: reasoning }).await?;
        }

        let mut turn = ModelTurn {
            tool_calls: response.tool_calls,
            ..Default::default()
        };
        let mut splitter = ThinkingSplitter::new();
        let mut segments = splitter.push(&response.text);
        segments.extend(splitter.finish());
        for segment in segments {
            emit_segment(segment, &mut turn, round, sink).await?;
        }
        Ok(Attempt::Done(turn))
    }
}

async fn emit_segment(
    segment: Segment,
    turn: &mut ModelTurn,
    round: u32,
    sink: &EventSink,
) -> Result<(), Error> {
    match segment {
        Segment::Answer(text) => {
            turn.text.push_str(&text);
            sink.emit(StreamEvent::AnswerDelta {
                text,
                is_final: false,
                round,
            })
            .await
        }
        Segment::Reasoning(text) => sink.emit(StreamEvent::Reasoning { text }).await,
    }
}

/// Validate caller history and return it with the current question.
///
/// Messages after the final user message are dropped.
fn prepare_history(mut history: Vec<Message>) -> Result<(Vec<Message>, String), Error> {
    let last_user = history
        .iter()
        .rposition(|m| m.role == Role::User)
        .ok_or_else(|| Error::InvalidInput("history must contain a user message".into()))?;

    let question = history[last_user].text();
    if question.trim().is_empty() {
        return Err(Error::InvalidInput("the final user message is empty".into()));
    }

    if history.len() > last_user + 1 {
        debug!(
            dropped = history.len() - last_user - 1,
            "Discarding messages after the final user message"
        );
        history.truncate(last_user + 1);
    }
    Ok((history, question))
}

/// Make call ids non-empty and unique within the batch.
fn unique_call_ids(mut calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::new();
    for (index, call) in calls.iter_mut().enumerate() {
        if call.id.is_empty() || seen.contains(&call.id) {
            let base = if call.id.is_empty() { "call" } else { call.id.as_str() };
            call.id = format!("{base}_{index}");
        }
        seen.insert(call.id.clone());
    }
    calls
}
