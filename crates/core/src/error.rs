//! Error types for the webagent domain.
//!
//! Model failures and tool failures are kept apart: the first may end a
//! turn, the second never does (it is folded back into the conversation).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all webagent operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Run cancelled by consumer")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable classification, used for `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Model(e) if e.is_transient() => "model_unavailable",
            Error::Model(ModelError::Protocol(_)) => "model_protocol_error",
            Error::Model(_) => "model_error",
            Error::Tool(_) => "tool_error",
            Error::Config { .. } => "config_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Cancelled => "cancelled",
            Error::Serialization(_) => "serialization_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered, but not with something we can read.
    #[error("Malformed model response: {0}")]
    Protocol(String),
}

impl ModelError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::RateLimited { .. } | ModelError::Timeout(_) | ModelError::Network(_) => {
                true
            }
            ModelError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            ToolError::ExecutionFailed { .. } => ToolErrorKind::ExecutionError,
            ToolError::Timeout { .. } => ToolErrorKind::Timeout,
            ToolError::InvalidArguments { .. } => ToolErrorKind::InvalidArguments,
        }
    }
}

/// Serializable classification carried on a failed tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    Timeout,
    ExecutionError,
    InvalidArguments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::ApiError {
            status_code: 502,
            message: "Bad gateway".into(),
        });
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad gateway"));
    }

    #[test]
    fn transient_classification() {
        assert!(ModelError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(ModelError::Timeout("slow".into()).is_transient());
        assert!(ModelError::Network("reset".into()).is_transient());
        assert!(
            ModelError::ApiError {
                status_code: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !ModelError::ApiError {
                status_code: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!ModelError::Protocol("garbage".into()).is_transient());
        assert!(!ModelError::AuthenticationFailed("bad key".into()).is_transient());
    }

    #[test]
    fn error_kind_names() {
        let unavailable = Error::Model(ModelError::Timeout("t".into()));
        assert_eq!(unavailable.kind(), "model_unavailable");
        let protocol = Error::Model(ModelError::Protocol("p".into()));
        assert_eq!(protocol.kind(), "model_protocol_error");
        assert_eq!(Error::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn tool_error_maps_to_kind() {
        let err = ToolError::Timeout {
            tool_name: "web_search".into(),
            timeout_ms: 500,
        };
        assert_eq!(err.kind(), ToolErrorKind::Timeout);
        assert!(err.to_string().contains("web_search"));
        assert_eq!(
            serde_json::to_string(&ToolErrorKind::UnknownTool).unwrap(),
            "\"unknown_tool\""
        );
    }
}
