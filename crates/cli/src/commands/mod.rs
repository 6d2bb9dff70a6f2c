//! Subcommand implementations and the terminal event renderer they share.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod models;
pub mod serve;

use std::io::Write;

use webagent_agent::{AgentLoop, StreamEvent, ToolCallStatus};
use webagent_config::AppConfig;
use webagent_providers::ModelRegistry;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Resolve `model` and build a run loop with the default tools.
pub fn build_agent(
    config: &AppConfig,
    model: Option<&str>,
) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let registry = ModelRegistry::from_config(config);
    let (selection, client) = registry.resolve(model)?;
    let tools = webagent_tools::default_registry(&config.tools);
    Ok(AgentLoop::new(client, selection, tools, config))
}

/// Writes answer text to stdout and everything else to stderr.
#[derive(Default)]
pub struct Renderer {
    round: Option<u32>,
    in_reasoning: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one event. Returns the error message for `error` events.
    pub fn render(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::AnswerDelta {
                text,
                is_final: false,
                round,
            } => {
                self.end_reasoning();
                if self.round.is_some_and(|r| r != *round) {
                    println!();
                }
                self.round = Some(*round);
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            StreamEvent::AnswerDelta { is_final: true, .. } => {
                self.end_reasoning();
                println!();
            }
            StreamEvent::Reasoning { text } => {
                if !self.in_reasoning {
                    eprint!("  [thinking] ");
                    self.in_reasoning = true;
                }
                eprint!("{text}");
            }
            StreamEvent::ToolCall {
                status: ToolCallStatus::Start,
                name,
                arguments,
                ..
            } => {
                self.end_reasoning();
                let args = arguments.as_ref().map(|a| a.to_string()).unwrap_or_default();
                eprintln!("  [tool] {name} {args}");
            }
            StreamEvent::ToolCall {
                status: ToolCallStatus::Finish,
                name,
                error,
                truncated,
                ..
            } => match error {
                Some(kind) => eprintln!("  [tool] {name} failed ({kind:?})"),
                None if truncated.unwrap_or(false) => eprintln!("  [tool] {name} done (truncated)"),
                None => eprintln!("  [tool] {name} done"),
            },
            StreamEvent::Reflection { verdict } => {
                self.end_reasoning();
                let reason = verdict.reason.as_deref().unwrap_or("");
                if verdict.requires_more_context {
                    eprintln!("  [reflection] needs more context: {reason}");
                } else {
                    eprintln!("  [reflection] ok: {reason}");
                }
            }
            StreamEvent::Error { kind, message } => {
                self.end_reasoning();
                return Some(format!("{kind}: {message}"));
            }
            StreamEvent::Done { .. } => self.end_reasoning(),
        }
        None
    }

    fn end_reasoning(&mut self) {
        if self.in_reasoning {
            eprintln!();
            self.in_reasoning = false;
        }
    }
}
