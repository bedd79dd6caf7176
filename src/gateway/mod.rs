//! HTTP gateway — thin axum adapter over the admission-control core.
//!
//! The gateway owns no policy of its own: it resolves the client identity,
//! walks the rate limiter and session store in that order, and maps their
//! typed errors to HTTP statuses.

pub mod api;
pub mod traits;

pub use traits::Responder;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::Config;
use crate::observability::Metrics;
use crate::sessions::SessionStore;
use crate::throttle::RateLimiter;

/// Reply sent when no responder is configured or the responder fails.
pub(crate) const FALLBACK_REPLY: &str =
    "I'm sorry, the booking service is currently unavailable. Please try again later.";

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub limiter: Arc<dyn RateLimiter>,
    pub responder: Option<Arc<dyn Responder>>,
    pub metrics: Arc<Metrics>,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);
    let body_limit = state.config.gateway.max_body_bytes;
    Router::new()
        .route("/api/chat", post(api::handle_chat))
        .route(
            "/api/session/{id}",
            get(api::handle_session_get).delete(api::handle_session_delete),
        )
        .route("/api/sessions", get(api::handle_sessions_list))
        .route("/api/health", get(api::handle_health))
        .route("/metrics", get(api::handle_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    crate::health::mark_started();
    let addr = format!(
        "{}:{}",
        state.config.gateway.host, state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    info!(%addr, "gateway listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("gateway server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::observability::Metrics;
    use crate::sessions::{create_session_store, Session};
    use crate::throttle::create_rate_limiter;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(limits: LimitsConfig, responder: Option<Arc<dyn Responder>>) -> AppState {
        let config = Config {
            limits: limits.clone(),
            ..Config::default()
        };
        AppState {
            store: create_session_store(limits.session_limits()),
            limiter: create_rate_limiter(limits.rate_limit_requests, limits.rate_window()),
            responder,
            metrics: Arc::new(Metrics::new().unwrap()),
            config: Arc::new(config),
        }
    }

    fn peer(last_octet: u8) -> SocketAddr {
        SocketAddr::from(([198, 51, 100, last_octet], 40000))
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
        from: SocketAddr,
    ) -> (StatusCode, serde_json::Value, axum::http::HeaderMap) {
        let mut builder = Request::builder().method(method).uri(uri);
        let mut request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };
        request.extensions_mut().insert(ConnectInfo(from));

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::json!(String::from_utf8_lossy(&bytes)));
        (status, json, headers)
    }

    fn chat_body(message: &str, session_id: Option<&str>) -> serde_json::Value {
        match session_id {
            Some(id) => serde_json::json!({ "message": message, "session_id": id }),
            None => serde_json::json!({ "message": message }),
        }
    }

    #[tokio::test]
    async fn chat_turn_creates_session_and_falls_back_without_responder() {
        let state = test_state(LimitsConfig::default(), None);
        let router = router(state.clone());

        let (status, body, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("book me a haircut", None)),
            peer(1),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], FALLBACK_REPLY);
        let session_id = body["session_id"].as_str().unwrap();
        assert!(!session_id.is_empty());

        // User turn and fallback reply are both retained.
        let session = state.store.get(session_id).await.unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test]
    async fn chat_uses_configured_responder() {
        struct EchoResponder;

        #[async_trait]
        impl Responder for EchoResponder {
            async fn respond(&self, _session: &Session, message: &str) -> anyhow::Result<String> {
                Ok(format!("echo: {message}"))
            }

            fn name(&self) -> &str {
                "echo"
            }
        }

        let state = test_state(LimitsConfig::default(), Some(Arc::new(EchoResponder)));
        let router = router(state);

        let (status, body, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hello", None)),
            peer(1),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "echo: hello");
    }

    #[tokio::test]
    async fn rate_limit_denies_before_touching_the_store() {
        let state = test_state(
            LimitsConfig {
                rate_limit_requests: 1,
                ..LimitsConfig::default()
            },
            None,
        );
        let router = router(state.clone());

        let (first, _, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", None)),
            peer(1),
        )
        .await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(state.store.len(), 1);

        let (second, body, headers) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi again", None)),
            peer(1),
        )
        .await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("Rate limit"));
        let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0);
        // Denied request created nothing.
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn per_client_quota_maps_to_429() {
        let state = test_state(
            LimitsConfig {
                max_sessions_per_client: 1,
                ..LimitsConfig::default()
            },
            None,
        );
        let router = router(state);

        let (first, _, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s1"))),
            peer(1),
        )
        .await;
        assert_eq!(first, StatusCode::OK);

        let (second, body, headers) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s2"))),
            peer(1),
        )
        .await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("quota"));
        // Quota rejection carries no retry guidance.
        assert!(!headers.contains_key("retry-after"));
    }

    #[tokio::test]
    async fn global_capacity_maps_to_503() {
        let state = test_state(
            LimitsConfig {
                max_sessions_total: 1,
                ..LimitsConfig::default()
            },
            None,
        );
        let router = router(state);

        let (first, _, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s1"))),
            peer(1),
        )
        .await;
        assert_eq!(first, StatusCode::OK);

        let (second, _, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s2"))),
            peer(2),
        )
        .await;
        assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn full_session_maps_to_409() {
        // One chat turn stores two messages, so a cap of 2 fills the
        // session in a single turn.
        let state = test_state(
            LimitsConfig {
                max_messages_per_session: 2,
                ..LimitsConfig::default()
            },
            None,
        );
        let router = router(state);

        let (first, _, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s1"))),
            peer(1),
        )
        .await;
        assert_eq!(first, StatusCode::OK);

        let (second, body, _) = send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi again", Some("s1"))),
            peer(1),
        )
        .await;
        assert_eq!(second, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("full"));
    }

    #[tokio::test]
    async fn session_endpoints_roundtrip() {
        let state = test_state(LimitsConfig::default(), None);
        let router = router(state);

        send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s1"))),
            peer(1),
        )
        .await;

        let (status, body, _) = send(&router, "GET", "/api/session/s1", None, peer(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s1");
        assert_eq!(body["message_count"], 2);

        let (status, body, _) = send(&router, "GET", "/api/sessions", None, peer(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

        let (status, _, _) = send(&router, "DELETE", "/api/session/s1", None, peer(1)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(&router, "GET", "/api/session/s1", None, peer(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let state = test_state(LimitsConfig::default(), None);
        let router = router(state);

        let (status, _, _) = send(&router, "GET", "/api/session/nope", None, peer(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = send(&router, "DELETE", "/api/session/nope", None, peer(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let state = test_state(LimitsConfig::default(), None);
        let router = router(state);

        let (status, body, _) = send(&router, "GET", "/api/health", None, peer(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "maitre");
    }

    #[tokio::test]
    async fn metrics_expose_active_session_gauge() {
        let state = test_state(LimitsConfig::default(), None);
        let router = router(state);

        send(
            &router,
            "POST",
            "/api/chat",
            Some(chat_body("hi", Some("s1"))),
            peer(1),
        )
        .await;

        let (status, body, _) = send(&router, "GET", "/metrics", None, peer(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().unwrap().contains("maitre_sessions_active 1"));
    }
}
