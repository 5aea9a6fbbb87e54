//! HTTP server for relbot
//!
//! # Endpoints
//!
//! - `POST /postreceive` - GitHub webhook deliveries, dispatched by event type
//! - `GET /` - JSON listing of the routes below
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use relbot_core::{AppContext, EventRouter};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub mod health;
pub mod routes;
pub mod webhook;

pub use health::health_handler;
pub use routes::list_routes;
pub use webhook::webhook_handler;

/// Shared application state, handed to every handler through `State`
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<AppContext>,
    router: Arc<EventRouter>,
}

impl AppState {
    /// State over a bootstrapped context and an event router
    pub fn new(ctx: Arc<AppContext>, router: EventRouter) -> Self {
        Self {
            ctx,
            router: Arc::new(router),
        }
    }

    /// The application context
    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// The event router
    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}

/// Builds the axum Router with all endpoints
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", get(list_routes))
        .route("/postreceive", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use relbot_core::testing::{FakeFactory, FakeFinalizer, TestContext};
    use relbot_core::{EventHandler, Outcome};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(test: &TestContext) -> axum::Router {
        build_router(AppState::new(Arc::clone(&test.ctx), EventRouter::standard()))
    }

    fn webhook_request(event: Option<&str>, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/postreceive")
            .header("content-type", "application/json")
            .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958");
        if let Some(event) = event {
            builder = builder.header("x-github-event", event);
        }
        builder.body(body.into()).unwrap()
    }

    fn json_request(event: &str, payload: &Value) -> Request<Body> {
        webhook_request(Some(event), serde_json::to_vec(payload).unwrap())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn tag_created(repo: &str, tag: &str) -> Value {
        json!({"ref": tag, "ref_type": "tag", "repository": {"full_name": repo}})
    }

    fn bump_closed() -> Value {
        json!({
            "action": "closed",
            "pull_request": {"title": "Bump Meta", "base": {"repo": {"full_name": "org/meta"}}},
            "repository": {"full_name": "org/meta"}
        })
    }

    // ─── Informational endpoints ───

    #[tokio::test]
    async fn health_returns_200() {
        let test = TestContext::new(&[], FakeFinalizer::default());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app(&test).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn root_lists_routes() {
        let test = TestContext::new(&[], FakeFinalizer::default());
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = app(&test).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let routes = body["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 3);
        assert!(routes.contains(&json!({
            "name": "postreceive",
            "methods": ["POST"],
            "url": "/postreceive"
        })));
        assert!(routes.contains(&json!({
            "name": "list_routes",
            "methods": ["GET", "HEAD"],
            "url": "/"
        })));
    }

    #[tokio::test]
    async fn every_listed_route_is_mounted() {
        let test = TestContext::new(&[], FakeFinalizer::default());

        for (name, methods, url) in routes::ROUTES {
            for method in *methods {
                let request = Request::builder()
                    .method(*method)
                    .uri(*url)
                    .body(Body::empty())
                    .unwrap();

                let status = app(&test).oneshot(request).await.unwrap().status();

                assert_ne!(status, StatusCode::NOT_FOUND, "{name}: {method} {url}");
                assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED, "{name}: {method} {url}");
            }
        }
    }

    // ─── Webhook: request validation ───

    #[tokio::test]
    async fn missing_event_header_is_400() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());
        let body = serde_json::to_vec(&tag_created("org/repo", "1.0.0")).unwrap();

        let response = app(&test)
            .oneshot(webhook_request(None, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(test.finalizer.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_400() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(webhook_request(Some("create"), "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_payload_is_400() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(json_request("create", &json!({"ref_type": "tag"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(test.finalizer.calls().is_empty());
    }

    // ─── Webhook: dispatch ───

    #[tokio::test]
    async fn unknown_event_is_200_ignored() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(json_request("issues", &json!({"action": "opened"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["outcome"], "ignored");
    }

    #[tokio::test]
    async fn tag_on_tracked_repo_is_handled() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(json_request("create", &tag_created("org/repo", "2.0.0")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"outcome": "handled"}));
        assert_eq!(
            test.finalizer.calls(),
            vec![(
                "2.0.0".to_string(),
                "org/repo".to_string(),
                "org/meta".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn tag_on_untracked_repo_is_200() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(json_request("create", &tag_created("org/elsewhere", "2.0.0")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["outcome"], "ignored");
        assert!(test.finalizer.calls().is_empty());
    }

    #[tokio::test]
    async fn closed_bump_pr_cleans_up() {
        let test = TestContext::new(&[], FakeFinalizer::default());

        let response = app(&test)
            .oneshot(json_request("pull_request", &bump_closed()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            test.meta().calls(),
            vec![
                "delete_remote_branch bump_meta",
                "checkout_default_branch",
                "delete_local_branch bump_meta",
            ]
        );
    }

    // ─── Webhook: failures ───

    #[tokio::test]
    async fn finalizer_failure_is_500() {
        let test = TestContext::new(&["org/repo"], FakeFinalizer::failing());

        let response = app(&test)
            .oneshot(json_request("create", &tag_created("org/repo", "2.0.0")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn remote_failure_is_500() {
        let test = TestContext::new(&[], FakeFinalizer::default());
        test.meta().fail_on("delete_remote_branch");

        let response = app(&test)
            .oneshot(json_request("pull_request", &bump_closed()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(test.meta().calls(), vec!["delete_remote_branch bump_meta"]);
    }

    #[tokio::test]
    async fn lock_timeout_is_503() {
        let test = TestContext::build(
            &[],
            FakeFinalizer::default(),
            FakeFactory::default(),
            |config| config.lock_timeout = Duration::from_millis(100),
        );
        let _held = test.ctx.locks().try_acquire("org/meta").unwrap().unwrap();

        let response = app(&test)
            .oneshot(json_request("pull_request", &bump_closed()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(test.meta().calls().is_empty());
    }

    struct Panicking;

    #[async_trait]
    impl EventHandler for Panicking {
        async fn handle(
            &self,
            _ctx: &relbot_core::AppContext,
            _payload: &Value,
        ) -> relbot_core::Result<Outcome> {
            panic!("handler bug");
        }
    }

    #[tokio::test]
    async fn handler_panic_is_500() {
        let test = TestContext::new(&[], FakeFinalizer::default());
        let router = EventRouter::standard().route("boom", Panicking);
        let app = build_router(AppState::new(Arc::clone(&test.ctx), router));

        let response = app
            .oneshot(json_request("boom", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // the server keeps serving after a handler panic
        let response = build_router(AppState::new(Arc::clone(&test.ctx), EventRouter::standard()))
            .oneshot(json_request("push", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
