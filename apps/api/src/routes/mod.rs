pub mod health;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/tasker", post(handlers::handle_tasker))
        .route("/api/v1/paragraph", post(handlers::handle_paragraph))
        .route("/api/v1/chatbot", post(handlers::handle_chatbot))
        .with_state(state)
}

/// CORS for the configured origins. An empty list or `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin '{o}'")))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    fn health_with_cors(origins: &[&str]) -> Router {
        let origins: Vec<String> = origins.iter().map(|o| o.to_string()).collect();
        Router::new()
            .route("/health", get(health::health_handler))
            .layer(cors_layer(&origins).unwrap())
    }

    async fn allow_origin(router: Router, origin: &str) -> Option<String> {
        let response = router
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_listed_origin_is_allowed() {
        let router = health_with_cors(&["https://app.example"]);
        assert_eq!(
            allow_origin(router, "https://app.example").await.as_deref(),
            Some("https://app.example")
        );
    }

    #[tokio::test]
    async fn test_unlisted_origin_gets_no_cors_header() {
        let router = health_with_cors(&["https://app.example"]);
        assert_eq!(allow_origin(router, "https://evil.example").await, None);
    }

    #[tokio::test]
    async fn test_wildcard_is_permissive() {
        let router = health_with_cors(&["*"]);
        assert_eq!(
            allow_origin(router, "https://any.example").await.as_deref(),
            Some("*")
        );
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
