//! Context summarizer.
//!
//! Once a conversation is long enough, everything between the leading
//! system messages and the most recent turns is folded into a single
//! `assistant` summary message. The fold is a rolling update: the
//! transcript is chunked and each chunk updates the running summary.

use std::sync::Arc;

use tracing::{debug, info};
use webagent_config::AgentConfig;
use webagent_core::error::Error;
use webagent_core::message::{Message, Role, SUMMARY_PREFIX};
use webagent_core::model::{ModelClient, ModelRequest};
use webagent_providers::RetryPolicy;

use crate::prompts;
use crate::token::{estimate_tokens, trim_to_tokens};

pub struct Summarizer {
    client: Arc<dyn ModelClient>,
    model: String,
    /// Non-system messages needed before summarizing at all
    min_messages: usize,
    keep_recent_turns: usize,
    chunk_tokens: usize,
    max_tokens: usize,
    retry: RetryPolicy,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>, config: &AgentConfig) -> Self {
        Self {
            client,
            model: model.into(),
            min_messages: config.summary_min_messages,
            keep_recent_turns: config.summary_keep_recent_turns.max(1),
            chunk_tokens: config.summary_chunk_tokens.max(1),
            max_tokens: config.summary_max_tokens.max(1),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the history with its older prefix summarized, or unchanged
    /// when the conversation is short or already summarized.
    pub async fn maybe_summarize(&self, history: &[Message]) -> Result<Vec<Message>, Error> {
        let lead = history
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        let rest = &history[lead..];

        let countable = rest
            .iter()
            .filter(|m| m.role != Role::System && !m.is_summary())
            .count();
        if countable < self.min_messages {
            return Ok(history.to_vec());
        }

        let turn_starts: Vec<usize> = rest
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::User)
            .map(|(i, _)| i)
            .collect();
        if turn_starts.len() < self.keep_recent_turns {
            return Ok(history.to_vec());
        }
        let cut = turn_starts[turn_starts.len() - self.keep_recent_turns];

        let prefix = &rest[..cut];
        let (existing, to_fold) = match prefix.split_first() {
            Some((first, tail)) if first.is_summary() => (summary_body(first), tail),
            _ => (String::new(), prefix),
        };
        if to_fold.is_empty() {
            return Ok(history.to_vec());
        }

        let transcript: Vec<String> = to_fold.iter().filter_map(transcript_line).collect();
        let mut summary = existing;
        for chunk in chunk_lines(&transcript, self.chunk_tokens) {
            summary = self.update(&summary, &chunk).await?;
        }

        if summary.trim().is_empty() {
            debug!("Summarizer produced no text; leaving history unchanged");
            return Ok(history.to_vec());
        }

        info!(
            folded = to_fold.len(),
            kept = rest.len() - cut,
            summary_tokens = estimate_tokens(&summary),
            "Summarized conversation prefix"
        );

        let mut out = Vec::with_capacity(lead + 1 + rest.len() - cut);
        out.extend_from_slice(&history[..lead]);
        out.push(Message::summary(summary));
        out.extend_from_slice(&rest[cut..]);
        Ok(out)
    }

    async fn update(&self, existing: &str, chunk: &str) -> Result<String, Error> {
        let has_existing = !existing.trim().is_empty();
        let mut request = ModelRequest::new(
            self.model.clone(),
            vec![
                Message::system(prompts::summary_prompt(has_existing, self.max_tokens)),
                Message::user(prompts::summary_input(existing, chunk)),
            ],
        );
        request.max_tokens = Some(u32::try_from(self.max_tokens).unwrap_or(u32::MAX));

        let response = self
            .retry
            .run("summary", |_| self.client.complete(request.clone()))
            .await?;

        let updated = response.text.trim();
        Ok(trim_to_tokens(updated, self.max_tokens).trim_end().to_string())
    }
}

fn summary_body(message: &Message) -> String {
    let text = message.text();
    text.strip_prefix(SUMMARY_PREFIX)
        .unwrap_or(&text)
        .trim()
        .to_string()
}

/// `Role: text`, or `None` for messages with nothing to say.
fn transcript_line(message: &Message) -> Option<String> {
    let text = message.text();
    let text = text.trim();
    let body = if !text.is_empty() {
        text.to_string()
    } else if !message.tool_calls.is_empty() {
        let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
        format!("[called tools: {}]", names.join(", "))
    } else {
        return None;
    };

    match (&message.role, &message.name) {
        (Role::Tool, Some(name)) => Some(format!("Tool ({name}): {body}")),
        (role, _) => Some(format!("{}: {body}", role.label())),
    }
}

/// Group lines into chunks of at most `limit` estimated tokens. A single
/// oversized line gets a chunk of its own.
fn chunk_lines(lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut tokens = 0;
    for line in lines {
        let line_tokens = estimate_tokens(line);
        if !current.is_empty() && tokens + line_tokens > limit {
            chunks.push(current.join("\n"));
            current.clear();
            tokens = 0;
        }
        current.push(line);
        tokens += line_tokens;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}
