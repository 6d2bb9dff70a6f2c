//! Event multiplexing between a running turn and its consumer.
//!
//! A turn writes into an [`EventSink`]. In streaming mode the sink is a
//! bounded channel and the turn runs on its own task; dropping the
//! receiver cancels the turn at its next await point. In aggregate mode
//! events are discarded and the caller reads the returned outcome.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use webagent_core::error::Error;
use webagent_core::message::Message;

use crate::run_loop::{AgentLoop, RunOutcome};
use crate::stream_event::StreamEvent;

/// Where a turn sends its events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSink {
    /// A sink that drops every event.
    pub fn aggregate() -> Self {
        Self { tx: None }
    }

    pub fn channel(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Deliver one event, waiting for buffer space.
    ///
    /// Fails with [`Error::Cancelled`] once the consumer has gone away.
    pub async fn emit(&self, event: StreamEvent) -> Result<(), Error> {
        match &self.tx {
            None => Ok(()),
            Some(tx) => tx.send(event).await.map_err(|_| Error::Cancelled),
        }
    }
}

/// Start a turn on its own task and return its event stream.
///
/// The stream always ends with `done`. A failed turn sends `error` first.
/// Nothing is sent after `done`.
pub fn stream_turn(agent: AgentLoop, history: Vec<Message>, buffer: usize) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        let sink = EventSink::channel(tx.clone());
        let result = tokio::select! {
            result = agent.run(history, &sink) => result,
            _ = tx.closed() => Err(Error::Cancelled),
        };

        match result {
            Ok(outcome) => {
                let _ = tx
                    .send(StreamEvent::Done {
                        metadata: Some(outcome.metadata),
                    })
                    .await;
            }
            Err(Error::Cancelled) => {
                debug!("Consumer went away; turn cancelled");
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Agent turn failed");
                if tx.send(StreamEvent::error(&e)).await.is_ok() {
                    let _ = tx.send(StreamEvent::Done { metadata: None }).await;
                }
            }
        }
    });

    rx
}

/// Run a turn to completion without streaming.
pub async fn run_turn(agent: &AgentLoop, history: Vec<Message>) -> Result<RunOutcome, Error> {
    agent.run(history, &EventSink::aggregate()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedClient, SleepTool, Step, UpperTool, tool_call};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use webagent_config::AppConfig;
    use webagent_core::error::{ModelError, ToolError};
    use webagent_core::tool::{Tool, ToolRegistry};
    use webagent_providers::{ModelSelection, RetryPolicy};

    fn selection() -> ModelSelection {
        ModelSelection {
            id: "test/model".into(),
            model_name: "model".into(),
            provider: "test".into(),
            streaming: true,
        }
    }

    fn agent(client: ScriptedClient, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(Arc::new(client), selection(), tools, &AppConfig::default())
            .with_retry(RetryPolicy::none())
            .with_max_reflection_rounds(0)
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn successful_turn_ends_with_done_metadata() {
        let client = ScriptedClient::new(vec![
            Step::tools(vec![tool_call("a", "upper", serde_json::json!({"text": "hi"}))]),
            Step::text("HI"),
        ]);
        let tools = ToolRegistry::new().with(Arc::new(UpperTool));
        let events = drain(stream_turn(agent(client, tools), vec![Message::user("shout")], 8)).await;

        let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["tool_call", "tool_call", "answer_delta", "answer_delta", "done"]
        );
        match events.last().unwrap() {
            StreamEvent::Done { metadata: Some(m) } => {
                assert_eq!(m.model, "test/model");
                assert_eq!(m.tool_calls.len(), 1);
                assert_eq!(m.rounds, 2);
            }
            other => panic!("expected done with metadata, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_turn_sends_error_then_done() {
        let client = ScriptedClient::failing(ModelError::AuthenticationFailed("bad key".into()));
        let events = drain(stream_turn(
            agent(client, ToolRegistry::new()),
            vec![Message::user("hi")],
            8,
        ))
        .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            StreamEvent::Error { kind, message } => {
                assert_eq!(kind, "model_error");
                assert!(message.contains("bad key"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(events[1], StreamEvent::Done { metadata: None });
    }

    #[tokio::test]
    async fn invalid_history_is_reported_as_error_event() {
        let client = ScriptedClient::new(vec![]);
        let events = drain(stream_turn(agent(client, ToolRegistry::new()), vec![], 8)).await;
        assert!(matches!(&events[0], StreamEvent::Error { kind, .. } if kind == "invalid_input"));
        assert!(matches!(events[1], StreamEvent::Done { .. }));
    }

    /// Counts executions that ran to completion.
    struct CountingSleep(Arc<AtomicUsize>);

    #[async_trait]
    impl Tool for CountingSleep {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Sleeps for a long time"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("finished".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_receiver_cancels_running_tools() {
        let completed = Arc::new(AtomicUsize::new(0));
        let tools = ToolRegistry::new()
            .with(Arc::new(CountingSleep(completed.clone())))
            .with(Arc::new(SleepTool));
        let client = ScriptedClient::new(vec![
            Step::tools(vec![tool_call("s", "slow", serde_json::json!({}))]),
            Step::text("unreachable"),
        ]);

        let mut rx = stream_turn(agent(client, tools), vec![Message::user("go")], 8);
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::ToolCall { .. }));
        drop(rx);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_turn_returns_outcome() {
        let agent = agent(ScriptedClient::text("hello"), ToolRegistry::new());
        let outcome = run_turn(&agent, vec![Message::user("hi")]).await.unwrap();
        assert_eq!(outcome.answer, "hello");
        assert_eq!(outcome.metadata.rounds, 1);
    }

    #[tokio::test]
    async fn aggregate_sink_never_cancels() {
        let sink = EventSink::aggregate();
        sink.emit(StreamEvent::Done { metadata: None }).await.unwrap();
    }
}
