//! Chat API handlers.
//!
//! Endpoints:
//! - `GET  /v1/models`            model registry listing
//! - `POST /v1/chat/completions`  chat, SSE when `stream` is set
//! - `POST /v1/chat`              chat, JSON only
//! - `POST /v1/query`             single input or message list, JSON only

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};
use uuid::Uuid;

use webagent_agent::token::{estimate_messages_tokens, estimate_tokens};
use webagent_agent::{RunOutcome, run_turn, stream_turn};
use webagent_core::error::{Error, ModelError};
use webagent_core::message::{Message, Role};

use crate::SharedState;

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
}

/// `input` is either a bare question or a message list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryInput {
    Text(String),
    Messages(Vec<Message>),
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub input: QueryInput,
    #[serde(default)]
    pub stream: bool,
}

/// An error response: `{"error": {"message", "type"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request_error",
            message: message.into(),
        }
    }

    fn agent_failed() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "server_error",
            message: "Agent failed to generate a response.".into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(message) => Self::bad_request(message),
            Error::Model(ModelError::NotConfigured(message)) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                kind: "model_not_configured",
                message,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                kind: "server_error",
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "message": self.message, "type": self.kind }
        });
        (self.status, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `GET /v1/models`
pub async fn models_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(state.models.models_payload())
}

/// `POST /v1/chat/completions`
pub async fn chat_completions_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let agent = state.agent_for(payload.model.as_deref())?;
    check_messages(&payload.messages)?;

    if !payload.stream {
        return run_to_response(agent, payload.messages, "chat.completion").await;
    }

    info!(model = %agent.selection().id, messages = payload.messages.len(), "SSE chat request");
    let rx = stream_turn(agent, payload.messages, state.config.agent.event_buffer);

    // Dropping this body on disconnect drops the receiver, which cancels the turn.
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// `POST /v1/chat`
pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.stream {
        return Err(ApiError::bad_request(
            "Streaming is not supported on this endpoint; use /v1/chat/completions.",
        ));
    }
    let agent = state.agent_for(payload.model.as_deref())?;
    check_messages(&payload.messages)?;
    run_to_response(agent, payload.messages, "chat.completion").await
}

/// `POST /v1/query`
pub async fn query_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    if payload.stream {
        return Err(ApiError::bad_request(
            "Streaming is not supported on this endpoint; use /v1/chat/completions.",
        ));
    }
    let agent = state.agent_for(payload.model.as_deref())?;

    let messages = match payload.input {
        QueryInput::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ApiError::bad_request("Input cannot be empty."));
            }
            vec![Message::user(text)]
        }
        QueryInput::Messages(messages) => {
            check_messages(&messages)?;
            messages
        }
    };

    run_to_response(agent, messages, "response").await
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Reject histories the run loop cannot answer, with a 400 rather than an
/// error event.
fn check_messages(messages: &[Message]) -> Result<(), ApiError> {
    if messages.is_empty() {
        return Err(ApiError::bad_request("At least one message is required."));
    }
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .ok_or_else(|| ApiError::bad_request("Provide at least one user message."))?;
    if last_user.text().trim().is_empty() {
        return Err(ApiError::bad_request("The final user message cannot be empty."));
    }
    Ok(())
}

async fn run_to_response(
    agent: webagent_agent::AgentLoop,
    messages: Vec<Message>,
    object: &str,
) -> Result<Response, ApiError> {
    let prompt_tokens = estimate_messages_tokens(&messages);
    let model = agent.selection().id.clone();

    let outcome = run_turn(&agent, messages).await.map_err(|e| match e {
        Error::InvalidInput(_) => ApiError::from(e),
        other => {
            error!(error = %other, model = %model, "Agent execution failed");
            ApiError::agent_failed()
        }
    })?;

    Ok(Json(completion_body(&outcome, &model, object, prompt_tokens)).into_response())
}

/// OpenAI-shaped completion object carrying turn metadata on the message.
fn completion_body(
    outcome: &RunOutcome,
    model: &str,
    object: &str,
    prompt_tokens: usize,
) -> serde_json::Value {
    let completion_tokens = estimate_tokens(&outcome.answer);
    serde_json::json!({
        "id": format!("{object}-{}", Uuid::new_v4()),
        "object": object,
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": [{ "type": "text", "text": outcome.answer }],
                "metadata": {
                    "tool_calls": outcome.metadata.tool_calls,
                    "reflections": outcome.metadata.reflections,
                    "rounds": outcome.metadata.rounds,
                },
            },
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppState, build_router};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use webagent_config::AppConfig;
    use webagent_core::model::{ModelClient, ModelRequest, ModelResponse};
    use webagent_core::tool::{ToolCallRequest, ToolRegistry};
    use webagent_providers::ModelRegistry;

    /// Replays canned responses; errors once the script runs out.
    struct CannedClient {
        responses: Mutex<VecDeque<ModelResponse>>,
    }

    impl CannedClient {
        fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }
        async fn complete(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ModelError::AuthenticationFailed("script exhausted".into()))
        }
    }

    fn text(s: &str) -> ModelResponse {
        ModelResponse {
            text: s.into(),
            ..Default::default()
        }
    }

    fn app(responses: Vec<ModelResponse>) -> axum::Router {
        let mut config = AppConfig::default();
        config.agent.retry_max_attempts = 1;
        // Keep the huggingface provider unkeyed regardless of the environment.
        if let Some(hf) = config.providers.get_mut("huggingface") {
            hf.api_key = None;
            hf.api_key_envs = vec!["WEBAGENT_TEST_UNSET_KEY".into()];
        }
        let models =
            ModelRegistry::from_config(&config).with_client("openrouter", CannedClient::new(responses));
        let tools = ToolRegistry::new().with(Arc::new(webagent_tools::echo::EchoTool));
        build_router(Arc::new(AppState::new(config, models, tools)))
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn models_listing() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["object"], "list");
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn chat_completion_non_streaming() {
        let response = app(vec![text("Hello there.")])
            .oneshot(post(
                "/v1/chat/completions",
                serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["model"], "openrouter/qwen-3-32b");
        let message = &json["choices"][0]["message"];
        assert_eq!(message["content"][0]["text"], "Hello there.");
        assert_eq!(message["metadata"]["tool_calls"], serde_json::json!([]));
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn chat_completion_streams_sse_events() {
        let tool_turn = ModelResponse {
            tool_calls: vec![ToolCallRequest {
                id: "c1".into(),
                name: "echo".into(),
                arguments: serde_json::json!({"message": "ping"}),
            }],
            ..Default::default()
        };
        let verdict = text(r#"{"requires_more_context": false, "reason": "fine"}"#);
        let response = app(vec![tool_turn, text("pong"), verdict])
            .oneshot(post(
                "/v1/chat/completions",
                serde_json::json!({
                    "stream": true,
                    "messages": [{"role": "user", "content": [{"type": "text", "text": "echo ping"}]}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        let events: Vec<&str> = body
            .lines()
            .filter_map(|l| l.strip_prefix("event: "))
            .collect();
        assert_eq!(
            events,
            vec![
                "tool_call",
                "tool_call",
                "answer_delta",
                "reflection",
                "answer_delta",
                "done"
            ]
        );
        assert!(body.contains(r#""is_final":true"#));
    }

    #[tokio::test]
    async fn unknown_model_is_400() {
        let response = app(vec![])
            .oneshot(post(
                "/v1/chat",
                serde_json::json!({"model": "nope", "messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["type"], "invalid_request_error");
        assert!(json["error"]["message"].as_str().unwrap().contains("openrouter/qwen-3-32b"));
    }

    #[tokio::test]
    async fn unkeyed_provider_is_503() {
        let response = app(vec![])
            .oneshot(post(
                "/v1/chat",
                serde_json::json!({
                    "model": "huggingface/qwen3-32b-groq",
                    "messages": [{"role": "user", "content": "Hi"}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["error"]["type"], "model_not_configured");
    }

    #[tokio::test]
    async fn message_validation() {
        for body in [
            serde_json::json!({"messages": []}),
            serde_json::json!({"messages": [{"role": "assistant", "content": "hi"}]}),
            serde_json::json!({"messages": [{"role": "user", "content": "  "}]}),
        ] {
            let response = app(vec![]).oneshot(post("/v1/chat", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn chat_rejects_streaming() {
        let response = app(vec![])
            .oneshot(post(
                "/v1/chat",
                serde_json::json!({"stream": true, "messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn query_with_plain_input() {
        let response = app(vec![text("42")])
            .oneshot(post("/v1/query", serde_json::json!({"input": "meaning of life?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["object"], "response");
        assert!(json["id"].as_str().unwrap().starts_with("response-"));
        assert_eq!(json["choices"][0]["message"]["content"][0]["text"], "42");
    }

    #[tokio::test]
    async fn query_with_empty_input_is_400() {
        let response = app(vec![])
            .oneshot(post("/v1/query", serde_json::json!({"input": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn agent_failure_is_500() {
        let response = app(vec![])
            .oneshot(post(
                "/v1/chat",
                serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "Agent failed to generate a response.");
    }
}
