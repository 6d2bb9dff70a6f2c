//! # webagent core
//!
//! Domain types, traits, and error definitions shared by every webagent
//! crate. No transport or backend code lives here.
//!
//! The two seams are [`ModelClient`] (language-model backends) and [`Tool`]
//! (external capabilities). Everything else depends inward on them.

pub mod error;
pub mod message;
pub mod model;
pub mod tool;

pub use error::{Error, ModelError, Result, ToolError, ToolErrorKind};
pub use message::{Content, ContentBlock, Message, Role, SUMMARY_PREFIX};
pub use model::{
    DeltaStream, ModelClient, ModelDelta, ModelRequest, ModelResponse, ToolCallAccumulator,
    ToolCallFragment, ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCallRequest, ToolCallResult, ToolRegistry};
