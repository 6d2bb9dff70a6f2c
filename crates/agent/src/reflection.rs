//! Reflection auditor: a second model call that checks whether the tool
//! evidence supports a draft answer.
//!
//! Fails open. A model error or an unparseable reply accepts the answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use webagent_core::message::Message;
use webagent_core::model::{ModelClient, ModelRequest};
use webagent_providers::RetryPolicy;

use crate::prompts;
use crate::stream_event::ToolCallRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionVerdict {
    pub requires_more_context: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_query: Option<String>,
}

impl ReflectionVerdict {
    /// Accept the answer, recording why.
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            requires_more_context: false,
            reason: Some(reason.into()),
            follow_up_instruction: None,
            suggested_query: None,
        }
    }

    /// Parse a model reply. Tolerates code fences and surrounding prose.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = extract_json(raw)?;
        let object = value.as_object()?;

        let text = |key: &str| {
            object
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let requires_more_context = match object.get("requires_more_context") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        let follow_up_instruction = text("follow_up_instruction").or_else(|| {
            (!requires_more_context).then(|| "No further action required.".to_string())
        });

        Some(Self {
            requires_more_context,
            reason: text("reason"),
            follow_up_instruction,
            suggested_query: text("suggested_query"),
        })
    }

    /// Messages appended to history when the verdict asks for more work.
    pub fn feedback_messages(&self) -> Vec<Message> {
        let mut lines = vec![
            "Reflection feedback indicates more work is needed.".to_string(),
            format!("Reason: {}", self.reason.as_deref().unwrap_or_default()),
        ];
        if let Some(instruction) = &self.follow_up_instruction {
            lines.push(format!("Instruction: {instruction}"));
        }
        if let Some(query) = &self.suggested_query {
            lines.push(format!("Suggested query: {query}"));
        }

        let mut messages = vec![Message::system(lines.join("\n"))];
        if let Some(query) = &self.suggested_query {
            messages.push(Message::user(format!(
                "Follow the reflection guidance. Consider searching for: {query}"
            )));
        }
        messages
    }
}

fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"));
    if let Some(inner) = unfenced {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

pub struct ReflectionAuditor {
    client: Arc<dyn ModelClient>,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ReflectionAuditor {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn audit(
        &self,
        question: &str,
        answer: &str,
        tool_history: &[ToolCallRecord],
    ) -> ReflectionVerdict {
        let digest: Vec<serde_json::Value> = tool_history
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "arguments": r.arguments,
                    "output_preview": r.output_preview,
                })
            })
            .collect();
        let input = serde_json::json!({
            "question": question,
            "answer": answer,
            "tool_history": digest,
        });

        let mut request = ModelRequest::new(
            self.model.clone(),
            vec![
                Message::system(prompts::reflection_prompt()),
                Message::user(input.to_string()),
            ],
        );
        request.temperature = 0.0;
        request.max_tokens = Some(self.max_tokens);

        let raw = match self
            .retry
            .run("reflection", |_| self.client.complete(request.clone()))
            .await
        {
            Ok(response) => response.text,
            Err(e) => {
                warn!(error = %e, "Reflection call failed; accepting answer");
                return ReflectionVerdict::accept(e.to_string());
            }
        };

        match ReflectionVerdict::parse(&raw) {
            Some(verdict) => {
                info!(
                    requires_more_context = verdict.requires_more_context,
                    reason = verdict.reason.as_deref().unwrap_or_default(),
                    "Reflection verdict"
                );
                verdict
            }
            None => {
                warn!("Failed to parse reflection response; accepting answer");
                ReflectionVerdict {
                    follow_up_instruction: Some(String::new()),
                    ..ReflectionVerdict::accept("Could not parse reflection JSON.")
                }
            }
        }
    }
}
