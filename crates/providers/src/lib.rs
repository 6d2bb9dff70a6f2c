//! Model backends for webagent.
//!
//! All clients implement the `webagent_core::ModelClient` trait.
//! The registry maps public model ids to the client serving them.

pub mod openai_compat;
pub mod registry;
pub mod retry;

pub use openai_compat::OpenAiCompatClient;
pub use registry::{ModelRegistry, ModelSelection};
pub use retry::RetryPolicy;
