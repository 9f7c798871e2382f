//! Drives the proxy router in-process against a mocked upstream.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use media_proxy::{cache_key, router, MediaCache, ProxyState, Upstream};
use mockall::mock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const API: &str = "https://api.test";

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(
            &self,
            request: HttpRequest,
            policy: RetryPolicy,
        ) -> BridgeResult<HttpResponse>;
    }
}

type Route = fn(&HttpRequest) -> BridgeResult<HttpResponse>;

fn response(status: u16, content_type: Option<&str>, body: &'static [u8]) -> HttpResponse {
    let mut headers = HashMap::new();
    if let Some(content_type) = content_type {
        headers.insert("Content-Type".to_string(), content_type.to_string());
    }
    HttpResponse {
        status,
        headers,
        body: Bytes::from_static(body),
    }
}

fn upstream_fixture(request: &HttpRequest) -> BridgeResult<HttpResponse> {
    let feed = br#"{"feed":[{"post_id":"1","user_name":"ana",
        "user_image":"https://img.test/ana.png","post_image":"https://broken.test/1.jpg",
        "like_count":10,"liked_by_user":false}]}"#;

    match request.url.as_str() {
        "https://api.test/user/feed" => Ok(response(200, Some("application/json"), feed)),
        "https://api.test/user/reels" => Err(BridgeError::OperationFailed(
            "connection reset".to_string(),
        )),
        "https://api.test/user/like" => Ok(response(200, None, b"")),
        "https://api.test/user/dislike" => Ok(response(
            404,
            Some("application/json"),
            br#"{"error":"post not found"}"#,
        )),
        url if url.starts_with("https://img.test/") => {
            Ok(response(200, Some("image/png"), b"png-bytes"))
        }
        _ => Err(BridgeError::Timeout(Duration::from_secs(30))),
    }
}

fn upstream_down(request: &HttpRequest) -> BridgeResult<HttpResponse> {
    if request.url.ends_with("/user/feed") {
        return Ok(response(503, Some("application/json"), br#"{"message":"down"}"#));
    }
    Err(BridgeError::Timeout(Duration::from_secs(30)))
}

fn mock_with(route: Route) -> MockHttpClient {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .returning(move |request| route(&request));
    client
        .expect_execute_with_retry()
        .returning(move |request, _| route(&request));
    client
}

async fn app(client: MockHttpClient) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let client: Arc<dyn HttpClient> = Arc::new(client);
    let cache = MediaCache::open(dir.path(), client.clone(), Duration::from_secs(5))
        .await
        .unwrap();
    let state = ProxyState::new(
        Arc::new(cache),
        Upstream::new(client, API, Duration::from_secs(5)),
        "https://avatars.test",
        false,
    );
    (dir, router(state))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "proxy.test:3000")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn feed_media_is_rewritten_and_served_from_cache() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    let response = app.clone().oneshot(get("/user/feed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let key = cache_key("https://img.test/ana.png");
    assert_eq!(
        body["feed"][0]["user_image"],
        format!("http://proxy.test:3000/cache/image/{}.png", key)
    );
    // Download failed, original kept
    assert_eq!(body["feed"][0]["post_image"], "https://broken.test/1.jpg");
    assert_eq!(body["feed"][0]["like_count"], 10);

    let response = app
        .oneshot(get(&format!("/cache/image/{}.png", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"png-bytes");
}

#[tokio::test]
async fn upstream_error_status_is_relayed() {
    let (_dir, app) = app(mock_with(upstream_down)).await;

    let response = app.oneshot(get("/user/feed")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await, json!({ "message": "down" }));
}

#[tokio::test]
async fn unreachable_upstream_is_a_500_with_context() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    let response = app.oneshot(get("/user/reels")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to fetch reels");
    assert!(body["message"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn like_body_is_forwarded_and_empty_answer_becomes_success() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute_with_retry()
        .withf(|request, policy| {
            request.method == HttpMethod::Post
                && request.url == "https://api.test/user/like"
                && request.body.as_deref() == Some(&br#"{"like":true,"post_id":"1"}"#[..])
                && policy.max_attempts == 1
        })
        .times(1)
        .returning(|_, _| Ok(response(200, None, b"")));
    let (_dir, app) = app(client).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/user/like")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"like":true,"post_id":"1"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "success": true }));
}

#[tokio::test]
async fn dislike_relays_upstream_status_and_body() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/user/dislike")
        .body(Body::from(r#"{"like":false,"reels_id":"r1"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({ "error": "post not found" }));
}

#[tokio::test]
async fn cache_lookup_rejects_missing_and_invalid_names() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    let missing = format!("/cache/image/{}.jpg", cache_key("https://img.test/none.jpg"));
    let response = app.clone().oneshot(get(&missing)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Image not found in cache" })
    );

    let response = app
        .oneshot(get("/cache/image/..%2F..%2Fsecret.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proxy_image_caches_once_then_redirects() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .times(1)
        .returning(|_| Ok(response(200, Some("image/png"), b"png-bytes")));
    let (dir, app) = app(client).await;

    let response = app.clone().oneshot(get("/proxy/image")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Missing url parameter" })
    );

    let uri = "/proxy/image?url=https%3A%2F%2Fimg.test%2Fx.png";
    let expected = format!("/cache/image/{}.png", cache_key("https://img.test/x.png"));
    for _ in 0..2 {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], expected.as_str());
    }
    assert!(dir
        .path()
        .join(format!("{}.png", cache_key("https://img.test/x.png")))
        .exists());
}

#[tokio::test]
async fn pravatar_streams_through_when_caching_fails() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .returning(|_| Err(BridgeError::OperationFailed("disk says no".to_string())));
    client
        .expect_execute_with_retry()
        .withf(|request, _| request.url == "https://avatars.test/150?u=7")
        .returning(|_, _| Ok(response(200, Some("image/webp"), b"webp-bytes")));
    let (_dir, app) = app(client).await;

    let response = app.oneshot(get("/pravatar/7")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=86400"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"webp-bytes");
}

#[tokio::test]
async fn health_reports_cache_state() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    app.clone().oneshot(get("/user/feed")).await.unwrap();
    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cachedFiles"], 1);
    assert_eq!(body["endpoints"]["cachedImage"], "GET /cache/image/:hash.:ext");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (_dir, app) = app(mock_with(upstream_fixture)).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/user/like")
        .header(header::ORIGIN, "http://localhost:8081")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
