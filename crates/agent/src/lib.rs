//! The agent run loop for webagent.
//!
//! One turn goes like this:
//!
//! 1. **Validate** the caller's history and fold old turns into a summary
//! 2. **Call the model**, streaming text and reasoning out as events
//! 3. **If tool calls**: run them concurrently, append results, go back to 2
//! 4. **If text**: optionally audit it with a reflection pass, which may buy
//!    one more round of tool use
//! 5. **Finish** with the final answer and turn metadata
//!
//! [`stream_turn`] runs a turn on its own task and hands back the event
//! stream; [`run_turn`] waits for the outcome.

pub mod dispatcher;
pub mod multiplexer;
pub mod prompts;
pub mod reflection;
pub mod run_loop;
pub mod stream_event;
pub mod summarizer;
pub mod thinking;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::ToolDispatcher;
pub use multiplexer::{EventSink, run_turn, stream_turn};
pub use reflection::{ReflectionAuditor, ReflectionVerdict};
pub use run_loop::{AgentLoop, RunOutcome};
pub use stream_event::{RunMetadata, StreamEvent, ToolCallRecord, ToolCallStatus};
pub use summarizer::Summarizer;
