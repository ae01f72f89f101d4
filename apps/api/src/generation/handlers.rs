//! Axum route handlers for the capability endpoints.
//!
//! Handlers validate the inbound payload, hand it to the generation flow and
//! wrap the result in the response envelope. No model logic lives here.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::generation::contract::{ChatReply, SimplifiedText, TaskBreakdown};
use crate::generation::flow::{ChatTurn, Generated, GenerationError, Provenance};
use crate::state::AppState;

pub const MAX_INPUT_CHARS: usize = 5000;
pub const MAX_CHAT_TURNS: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Body for the single-turn capabilities (tasker, paragraph).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub user_input: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
    pub session_id: String,
}

/// Response envelope shared by every capability endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl<T> ApiResponse<T> {
    fn generated(result: Generated<T>, session_id: String) -> Self {
        Self {
            success: true,
            data: Some(result.data),
            error: None,
            session_id,
            provenance: Some(result.provenance),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request validation
// ────────────────────────────────────────────────────────────────────────────

/// Decodes the body in two steps so that a well-formed body of the wrong
/// shape still gets its `sessionId` echoed back.
fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(body) =
        payload.map_err(|rejection| AppError::validation(rejection.body_text(), ""))?;
    let session_id = body
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    serde_json::from_value(body).map_err(|e| AppError::validation(e.to_string(), session_id))
}

fn require_session(session_id: &str) -> Result<(), AppError> {
    if session_id.trim().is_empty() {
        return Err(AppError::validation("sessionId is required", session_id));
    }
    Ok(())
}

fn check_text(field: &str, text: &str, session_id: &str) -> Result<(), AppError> {
    let len = text.chars().count();
    if len > MAX_INPUT_CHARS {
        return Err(AppError::validation(
            format!("{field} is too long ({len} chars, max {MAX_INPUT_CHARS})"),
            session_id,
        ));
    }
    Ok(())
}

fn validate_text_request(request: &TextRequest) -> Result<(), AppError> {
    require_session(&request.session_id)?;
    if request.user_input.trim().is_empty() {
        return Err(AppError::validation(
            "userInput cannot be empty",
            &request.session_id,
        ));
    }
    check_text("userInput", &request.user_input, &request.session_id)
}

fn validate_chat_request(request: &ChatRequest) -> Result<(), AppError> {
    require_session(&request.session_id)?;
    if request.messages.len() > MAX_CHAT_TURNS {
        return Err(AppError::validation(
            format!(
                "too many messages ({}, max {MAX_CHAT_TURNS})",
                request.messages.len()
            ),
            &request.session_id,
        ));
    }
    for (i, turn) in request.messages.iter().enumerate() {
        check_text(&format!("messages[{i}].text"), &turn.text, &request.session_id)?;
    }
    Ok(())
}

fn generation_error(session_id: &str) -> impl FnOnce(GenerationError) -> AppError + '_ {
    move |source| AppError::Generation {
        source,
        session_id: session_id.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/tasker
///
/// Breaks the user's input into a task with ordered steps.
pub async fn handle_tasker(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<TaskBreakdown>>, AppError> {
    let request: TextRequest = parse_body(payload)?;
    validate_text_request(&request)?;
    info!("[tasker] Processing for session {}", request.session_id);

    let result = state
        .flow
        .decompose_task(&request.user_input)
        .await
        .map_err(generation_error(&request.session_id))?;

    Ok(Json(ApiResponse::generated(result, request.session_id)))
}

/// POST /api/v1/paragraph
///
/// Rewrites the user's text into a calmer, easier-to-read form.
pub async fn handle_paragraph(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<SimplifiedText>>, AppError> {
    let request: TextRequest = parse_body(payload)?;
    validate_text_request(&request)?;
    info!("[paragraph] Processing for session {}", request.session_id);

    let result = state
        .flow
        .simplify_text(&request.user_input)
        .await
        .map_err(generation_error(&request.session_id))?;

    Ok(Json(ApiResponse::generated(result, request.session_id)))
}

/// POST /api/v1/chatbot
///
/// Replies to a client-held conversation. An empty history is allowed; the
/// flow opens with a neutral greeting.
pub async fn handle_chatbot(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatReply>>, AppError> {
    let request: ChatRequest = parse_body(payload)?;
    validate_chat_request(&request)?;
    info!(
        "[chatbot] Processing {} turn(s) for session {}",
        request.messages.len(),
        request.session_id
    );

    let result = state
        .flow
        .chat_reply(&request.messages)
        .await
        .map_err(generation_error(&request.session_id))?;

    Ok(Json(ApiResponse::generated(result, request.session_id)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::generation::capability::CapabilityRegistry;
    use crate::generation::contract::{FALLBACK_ADAPTED_TEXT, FALLBACK_REPLY};
    use crate::generation::flow::{GenerationFlow, OnFailure};
    use super::{MAX_CHAT_TURNS, MAX_INPUT_CHARS};
    use crate::llm_client::testing::ScriptedModel;
    use crate::routes::build_router;
    use crate::state::AppState;

    fn app(model: Arc<ScriptedModel>, on_failure: OnFailure) -> (Router, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let flow = GenerationFlow::new(
            CapabilityRegistry::with_defaults(root.path()),
            model,
            on_failure,
        );
        let router = build_router(AppState {
            flow: Arc::new(flow),
        });
        (router, root)
    }

    async fn post(router: Router, uri: &str, body: String) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_tasker_success_envelope() {
        let model = Arc::new(ScriptedModel::replying(
            "```json\n{\"title\":\"Fix the sink\",\"steps\":[{\"number\":1,\"description\":\"Buy a wrench\",\"done\":false}]}\n```",
        ));
        let (router, _root) = app(model, OnFailure::Fallback);
        let body = json!({
            "userInput": "I need to fix the sink and buy a wrench.",
            "sessionId": "s-1"
        });

        let (status, json) = post(router, "/api/v1/tasker", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["provenance"], "generated");
        assert_eq!(json["data"]["title"], "Fix the sink");
        assert_eq!(json["data"]["steps"][0]["description"], "Buy a wrench");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_fallback_is_still_a_success() {
        let model = Arc::new(ScriptedModel::failing());
        let (router, _root) = app(model, OnFailure::Fallback);
        let body = json!({"userInput": "Too many words here.", "sessionId": "s-2"});

        let (status, json) = post(router, "/api/v1/paragraph", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["provenance"], "fallback");
        assert_eq!(json["data"]["adaptedText"], FALLBACK_ADAPTED_TEXT);
    }

    #[tokio::test]
    async fn test_oversized_paragraph_rejected_before_flow() {
        let model = Arc::new(ScriptedModel::replying(r#"{"adaptedText":"x"}"#));
        let (router, _root) = app(model.clone(), OnFailure::Fallback);
        let body = json!({"userInput": "a".repeat(5001), "sessionId": "s-3"});

        let (status, json) = post(router, "/api/v1/paragraph", body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["sessionId"], "s-3");
        assert!(json["error"].as_str().unwrap().contains("too long"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_and_empty_input_rejected() {
        let model = Arc::new(ScriptedModel::failing());

        let (router, _root) = app(model.clone(), OnFailure::Fallback);
        let (status, _) = post(
            router,
            "/api/v1/tasker",
            json!({"userInput": "x", "sessionId": " "}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (router, _root) = app(model.clone(), OnFailure::Fallback);
        let (status, json) = post(
            router,
            "/api/v1/tasker",
            json!({"userInput": "  ", "sessionId": "s-4"}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["sessionId"], "s-4");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_body_uses_envelope() {
        let (router, _root) = app(Arc::new(ScriptedModel::failing()), OnFailure::Fallback);

        let (status, json) = post(router, "/api/v1/chatbot", "{not json".to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["sessionId"], "");
    }

    #[tokio::test]
    async fn test_wrong_shape_body_echoes_session() {
        let model = Arc::new(ScriptedModel::failing());
        let (router, _root) = app(model.clone(), OnFailure::Fallback);

        let (status, json) = post(
            router,
            "/api/v1/tasker",
            json!({"sessionId": "s-5", "input": "fix the sink"}).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["sessionId"], "s-5");
        assert!(json["error"].as_str().unwrap().contains("userInput"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_chatbot_rejects_too_many_turns() {
        let model = Arc::new(ScriptedModel::replying(r#"{"reply":"hi"}"#));
        let (router, _root) = app(model.clone(), OnFailure::Fallback);
        let messages: Vec<Value> = (0..=MAX_CHAT_TURNS)
            .map(|i| json!({"sender": "user", "text": format!("turn {i}")}))
            .collect();
        assert_eq!(messages.len(), 101);

        let body = json!({"messages": messages, "sessionId": "chat-4"});
        let (status, json) = post(router, "/api/v1/chatbot", body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["sessionId"], "chat-4");
        assert!(json["error"].as_str().unwrap().contains("too many messages"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_chatbot_rejects_oversized_turn() {
        let model = Arc::new(ScriptedModel::replying(r#"{"reply":"hi"}"#));
        let (router, _root) = app(model.clone(), OnFailure::Fallback);
        let body = json!({
            "messages": [
                {"sender": "user", "text": "Hi"},
                {"sender": "user", "text": "a".repeat(MAX_INPUT_CHARS + 1)}
            ],
            "sessionId": "chat-5"
        });

        let (status, json) = post(router, "/api/v1/chatbot", body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["sessionId"], "chat-5");
        assert!(json["error"].as_str().unwrap().contains("messages[1].text"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_chatbot_with_failing_model_returns_fallback_reply() {
        let (router, _root) = app(Arc::new(ScriptedModel::failing()), OnFailure::Fallback);
        let body = json!({
            "messages": [
                {"sender": "user", "text": "Hi"},
                {"sender": "ai", "text": "Hello"},
                {"sender": "user", "text": "Help me"}
            ],
            "sessionId": "chat-1"
        });

        let (status, json) = post(router, "/api/v1/chatbot", body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["reply"], FALLBACK_REPLY);
        assert_eq!(json["provenance"], "fallback");
    }

    #[tokio::test]
    async fn test_chatbot_rejects_unknown_sender() {
        let (router, _root) = app(Arc::new(ScriptedModel::failing()), OnFailure::Fallback);
        let body = json!({
            "messages": [{"sender": "system", "text": "Hi"}],
            "sessionId": "chat-2"
        });

        let (status, _) = post(router, "/api/v1/chatbot", body.to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_propagated_model_failure_is_bad_gateway() {
        let (router, root) = app(Arc::new(ScriptedModel::failing()), OnFailure::Propagate);
        std::fs::create_dir(root.path().join("chatbot")).unwrap();
        let body = json!({"messages": [], "sessionId": "chat-3"});

        let (status, json) = post(router, "/api/v1/chatbot", body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["success"], false);
        assert_eq!(json["sessionId"], "chat-3");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _root) = app(Arc::new(ScriptedModel::failing()), OnFailure::Fallback);
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
