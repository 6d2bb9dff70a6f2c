//! `webagent chat`: interactive multi-turn session.
//!
//! History lives in this process for the whole session and is handed back
//! to the run loop every turn, so long sessions get summarized.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use webagent_agent::EventSink;
use webagent_core::message::{Message, Role};

use super::Renderer;

pub async fn run(model: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let agent = super::build_agent(&config, model.as_deref())?;

    println!();
    println!("  webagent interactive chat");
    println!("  Model:  {}", agent.selection().id);
    println!("  Type your message and press Enter. 'exit' or Ctrl+D quits.");
    println!();

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let mut turn_history = history.clone();
        turn_history.push(Message::user(line));

        let (tx, mut rx) = mpsc::channel(config.agent.event_buffer);
        let agent_ref = &agent;
        let turn = async move {
            let sink = EventSink::channel(tx);
            agent_ref.run(turn_history, &sink).await
        };
        let printer = async {
            let mut renderer = Renderer::new();
            println!();
            while let Some(event) = rx.recv().await {
                renderer.render(&event);
            }
        };

        let (result, ()) = tokio::join!(turn, printer);
        match result {
            Ok(outcome) => {
                history = outcome.history;
                let summarized = history.iter().any(|m| m.is_summary());
                tracing::debug!(
                    messages = history.iter().filter(|m| m.role != Role::System).count(),
                    summarized,
                    "Session history updated"
                );
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
