use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::flow::GenerationError;

/// Transport-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant carries the caller's session id so it can be echoed back.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-bounds request payload. Never reaches the flow.
    #[error("Invalid request: {message}")]
    Validation { message: String, session_id: String },

    /// Only produced when the flow is configured to propagate failures.
    #[error("Generation failed: {source}")]
    Generation {
        #[source]
        source: GenerationError,
        session_id: String,
    },

    /// A handler failed outside the generation taxonomy. The session id is
    /// unknown at this point.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            session_id: session_id.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, session_id) = match self {
            AppError::Validation {
                message,
                session_id,
            } => {
                tracing::warn!("Rejected request: {message}");
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid request: {message}"),
                    session_id,
                )
            }
            AppError::Generation { source, session_id } => {
                tracing::error!(kind = source.kind(), "Generation error: {source}");
                let status = match &source {
                    GenerationError::PromptAssembly(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, source.to_string(), session_id)
            }
            AppError::Internal(message) => {
                tracing::error!("Internal error: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    String::new(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "sessionId": session_id,
        }));

        (status, body).into_response()
    }
}

/// Response for a panicking handler, installed through `CatchPanicLayer`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    AppError::Internal(message).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        routing::get,
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = AppError::Internal("pool exhausted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["sessionId"], "");
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal_error() {
        async fn explode() -> &'static str {
            panic!("boom")
        }
        let router = Router::new()
            .route("/explode", get(explode))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = router
            .oneshot(Request::get("/explode").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_validation_echoes_session() {
        let response = AppError::validation("userInput cannot be empty", "s-9").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["sessionId"], "s-9");
    }
}
