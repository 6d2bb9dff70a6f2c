//! `webagent ask`: answer one question.
//!
//! Answer deltas stream to stdout; reasoning, tool activity and reflection
//! go to stderr. With `--json` only the final answer and metadata are
//! printed.

use webagent_agent::{StreamEvent, stream_turn};
use webagent_core::message::Message;

use super::Renderer;

pub async fn run(
    message: String,
    model: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let agent = super::build_agent(&config, model.as_deref())?;
    let model_id = agent.selection().id.clone();

    let mut rx = stream_turn(agent, vec![Message::user(message)], config.agent.event_buffer);
    let mut renderer = Renderer::new();
    let mut answer = String::new();
    let mut failure = None;

    while let Some(event) = rx.recv().await {
        if let StreamEvent::AnswerDelta {
            text,
            is_final: true,
            ..
        } = &event
        {
            answer = text.clone();
        }

        if json {
            match event {
                StreamEvent::Error { kind, message } => failure = Some(format!("{kind}: {message}")),
                StreamEvent::Done { metadata } => {
                    if failure.is_none() {
                        let out = serde_json::json!({
                            "model": model_id,
                            "answer": answer,
                            "metadata": metadata,
                        });
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    }
                }
                _ => {}
            }
        } else if let Some(error) = renderer.render(&event) {
            failure = Some(error);
        }
    }

    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
