use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use amora_matching::router;
use amora_matching::storage::MemoryStore;
use amora_shared::middleware::JwtSecret;
use amora_shared::types::auth::Claims;

mod common;

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    jwt: JwtSecret,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = common::test_state(store.clone());
        let jwt = state.jwt.clone();
        Self { app: router(state), store, jwt }
    }

    fn token(&self, user: Uuid) -> String {
        self.jwt.sign(&Claims::new(user, 3600)).unwrap()
    }

    async fn call(&self, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// A user who has opened the app once.
    async fn user(&self) -> Uuid {
        let id = Uuid::now_v7();
        let (status, _) = self.call(Method::GET, "/me", Some(id), None).await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

#[tokio::test]
async fn test_health_reports_storage() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "storage");
    assert_eq!(body["checks"][1]["name"], "pair_locks:local");
    assert_eq!(body["checks"][1]["status"], "healthy");

    app.store.set_unavailable(true);
    let (_, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_profile_update_is_validated() {
    let app = TestApp::new();
    let me = app.user().await;

    let (status, body) = app
        .call(Method::PATCH, "/me", Some(me), Some(json!({ "display_name": "Ari", "age": 29 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["display_name"], "Ari");

    let (status, body) = app.call(Method::PATCH, "/me", Some(me), Some(json!({ "age": 12 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E0002");
}

#[tokio::test]
async fn test_like_back_announces_match() {
    let app = TestApp::new();
    let (l, t) = (app.user().await, app.user().await);

    let (status, body) = app.call(Method::POST, &format!("/likes/{t}"), Some(l), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["message"], "like sent");

    let (_, body) = app.call(Method::GET, "/likes/received", Some(t), None).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = app.call(Method::POST, &format!("/likes/{l}"), Some(t), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "matched");
    assert_eq!(body["data"]["created"], true);
    assert_eq!(body["message"], "it's a match");

    let (_, body) = app.call(Method::GET, &format!("/likes/state/{t}"), Some(l), None).await;
    assert_eq!(body["data"]["state"], "matched");

    let (_, body) = app.call(Method::GET, "/matches", Some(l), None).await;
    assert_eq!(body["data"][0]["partner_id"], t.to_string());
}

#[tokio::test]
async fn test_respond_reject_then_accept_missing_like() {
    let app = TestApp::new();
    let (l, t) = (app.user().await, app.user().await);

    app.call(Method::POST, &format!("/likes/{t}"), Some(l), None).await;
    let (status, body) = app
        .call(Method::PUT, &format!("/likes/{l}/respond"), Some(t), Some(json!({ "accepted": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rejected"], true);

    let (status, body) = app
        .call(Method::PUT, &format!("/likes/{l}/respond"), Some(t), Some(json!({ "accepted": true })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "E3002");
}

#[tokio::test]
async fn test_self_like_is_forbidden() {
    let app = TestApp::new();
    let me = app.user().await;
    let (status, body) = app.call(Method::POST, &format!("/likes/{me}"), Some(me), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "E3001");
}

#[tokio::test]
async fn test_storage_outage_is_retryable() {
    let app = TestApp::new();
    let (l, t) = (app.user().await, app.user().await);

    app.store.set_unavailable(true);
    let (status, body) = app.call(Method::POST, &format!("/likes/{t}"), Some(l), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["details"]["retryable"], true);
}

#[tokio::test]
async fn test_match_conversation_round_trip() {
    let app = TestApp::new();
    let (l, t) = (app.user().await, app.user().await);
    app.call(Method::POST, &format!("/likes/{t}"), Some(l), None).await;
    let (_, body) = app.call(Method::POST, &format!("/likes/{l}"), Some(t), None).await;
    let pair_id = body["data"]["pair"]["pair_id"].as_str().unwrap().to_string();
    let uri = format!("/matches/{pair_id}/messages");

    for (sender, text) in [(l, "hi"), (t, "hey"), (l, "coffee?")] {
        let (status, body) = app.call(Method::POST, &uri, Some(sender), Some(json!({ "body": text }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["body"], text);
    }

    let (_, body) = app.call(Method::GET, &uri, Some(t), None).await;
    let bodies: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["body"].as_str())
        .collect();
    assert_eq!(bodies, ["hi", "hey", "coffee?"]);

    let outsider = app.user().await;
    let (status, _) = app.call(Method::GET, &uri, Some(outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::POST, &uri, Some(l), Some(json!({ "body": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E4001");
}
