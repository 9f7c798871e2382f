//! HTTP routes.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /user/feed`, `GET /user/reels` | upstream listing with media URLs rewritten to the cache |
//! | `POST /user/like`, `DELETE /user/dislike` | relayed to upstream verbatim |
//! | `GET /cache/image/:file` | cached bytes, one-year `Cache-Control` |
//! | `GET /proxy/image?url=` | cache then redirect, or stream through on cache failure |
//! | `GET /pravatar/:id` | `/proxy/image` for the avatar generator |
//! | `GET /health` | liveness and cache status |

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bridge_traits::http::{HttpClient, HttpMethod, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::cache::MediaCache;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::rewrite::{rewrite_listing, Listing, FEED, REELS, REELS_WITH_VIDEO};
use crate::upstream::Upstream;

const CACHED_MAX_AGE: &str = "public, max-age=31536000";
const PASSTHROUGH_MAX_AGE: &str = "public, max-age=86400";

/// Shared handler state. Cloning is cheap.
#[derive(Clone)]
pub struct ProxyState {
    cache: Arc<MediaCache>,
    upstream: Upstream,
    pravatar_base: String,
    cache_videos: bool,
}

impl ProxyState {
    pub fn new(
        cache: Arc<MediaCache>,
        upstream: Upstream,
        pravatar_base: impl Into<String>,
        cache_videos: bool,
    ) -> Self {
        Self {
            cache,
            upstream,
            pravatar_base: pravatar_base.into().trim_end_matches('/').to_string(),
            cache_videos,
        }
    }

    /// Open the cache directory and wire the upstream client from `config`
    pub async fn from_config(config: &ProxyConfig, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        let cache = MediaCache::open(
            config.cache_dir.clone(),
            http_client.clone(),
            config.request_timeout(),
        )
        .await?;
        let upstream = Upstream::new(
            http_client,
            config.upstream_base(),
            config.request_timeout(),
        );

        Ok(Self::new(
            Arc::new(cache),
            upstream,
            config.pravatar_base(),
            config.cache_videos,
        ))
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }
}

pub fn router(state: ProxyState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/user/feed", get(get_feed))
        .route("/user/reels", get(get_reels))
        .route("/user/like", post(like))
        .route("/user/dislike", delete(dislike))
        .route("/cache/image/:file", get(cached_image))
        .route("/proxy/image", get(proxy_image))
        .route("/pravatar/:id", get(pravatar))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// `http://{Host}` of the incoming request, used for absolute cache URLs
fn public_base(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(|host| format!("http://{}", host))
}

fn status_of(response: &HttpResponse) -> StatusCode {
    StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Upstream response with its status, content type and body untouched
fn relay(response: HttpResponse) -> Response {
    let status = status_of(&response);
    let content_type = response
        .header("content-type")
        .unwrap_or("application/json")
        .to_string();

    (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}

async fn get_feed(State(state): State<ProxyState>, headers: HeaderMap) -> Result<Response> {
    relay_listing(&state, "/user/feed", FEED, "Failed to fetch feed", &headers).await
}

async fn get_reels(State(state): State<ProxyState>, headers: HeaderMap) -> Result<Response> {
    let listing = if state.cache_videos {
        REELS_WITH_VIDEO
    } else {
        REELS
    };
    relay_listing(&state, "/user/reels", listing, "Failed to fetch reels", &headers).await
}

async fn relay_listing(
    state: &ProxyState,
    path: &str,
    listing: Listing,
    context: &'static str,
    headers: &HeaderMap,
) -> Result<Response> {
    let response = state
        .upstream
        .forward(HttpMethod::Get, path, None)
        .await
        .map_err(|e| ProxyError::upstream(context, e))?;

    if !response.is_success() {
        warn!(path, status = response.status, "Relaying upstream error");
        return Ok(relay(response));
    }

    let Ok(mut body) = serde_json::from_slice::<Value>(&response.body) else {
        warn!(path, "Upstream body is not JSON, relaying as-is");
        return Ok(relay(response));
    };

    let base = public_base(headers);
    let rewritten = rewrite_listing(&state.cache, &mut body, listing, base.as_deref()).await;
    info!(path, status = response.status, rewritten, "Listing served");

    Ok((status_of(&response), Json(body)).into_response())
}

async fn like(State(state): State<ProxyState>, body: Bytes) -> Result<Response> {
    passthrough(&state, HttpMethod::Post, "/user/like", body, "Failed to like").await
}

async fn dislike(State(state): State<ProxyState>, body: Bytes) -> Result<Response> {
    passthrough(
        &state,
        HttpMethod::Delete,
        "/user/dislike",
        body,
        "Failed to dislike",
    )
    .await
}

/// Forward the body and relay the answer. An empty upstream body becomes
/// `{"success": true}`.
async fn passthrough(
    state: &ProxyState,
    method: HttpMethod,
    path: &str,
    body: Bytes,
    context: &'static str,
) -> Result<Response> {
    let response = state
        .upstream
        .forward(method, path, Some(body))
        .await
        .map_err(|e| ProxyError::upstream(context, e))?;

    let status = status_of(&response);
    info!(path, status = response.status, "Mutation relayed");

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok((status, Json(json!({ "success": true }))).into_response());
    }
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(value) => Ok((status, Json(value)).into_response()),
        Err(_) => Ok(relay(response)),
    }
}

async fn cached_image(
    State(state): State<ProxyState>,
    Path(file): Path<String>,
) -> Result<Response> {
    let read = state.cache.open_file(&file).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(read.content_type)),
            (header::CONTENT_LENGTH, HeaderValue::from(read.len)),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHED_MAX_AGE)),
        ],
        Body::from_stream(ReaderStream::new(read.file)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct ImageQuery {
    url: Option<String>,
}

async fn proxy_image(
    State(state): State<ProxyState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response> {
    let url = query
        .url
        .filter(|url| !url.is_empty())
        .ok_or(ProxyError::MissingParameter("url"))?;

    serve_remote_image(&state, &url).await
}

async fn pravatar(State(state): State<ProxyState>, Path(id): Path<String>) -> Result<Response> {
    let url = url::Url::parse_with_params(&format!("{}/150", state.pravatar_base), [("u", &id)])
        .map_err(|e| ProxyError::upstream("Failed to fetch image", e))?;

    serve_remote_image(&state, url.as_str()).await
}

/// Redirect to the cached copy, or stream the image through when it cannot
/// be cached
async fn serve_remote_image(state: &ProxyState, url: &str) -> Result<Response> {
    match state.cache.cache(url).await {
        Ok(file) => Ok((
            StatusCode::FOUND,
            [(header::LOCATION, file.relative_url())],
        )
            .into_response()),
        Err(e) => {
            warn!(url, error = %e, "Caching failed, streaming image through");

            let response = state
                .upstream
                .fetch(url)
                .await
                .map_err(|e| ProxyError::upstream("Failed to fetch image", e))?;
            if !response.is_success() {
                return Err(ProxyError::upstream(
                    "Failed to fetch image",
                    format!("upstream returned status {}", response.status),
                ));
            }

            let content_type = response.content_type().unwrap_or("image/jpeg").to_string();
            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, PASSTHROUGH_MAX_AGE.to_string()),
                ],
                response.body,
            )
                .into_response())
        }
    }
}

async fn health(State(state): State<ProxyState>) -> Json<Value> {
    let cached_files = match state.cache.file_count().await {
        Ok(count) => json!(count),
        Err(e) => {
            warn!(error = %e, "Failed to count cached files");
            Value::Null
        }
    };

    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "cacheDir": state.cache.root().display().to_string(),
        "cachedFiles": cached_files,
        "upstream": state.upstream.base_url(),
        "endpoints": {
            "feed": "GET /user/feed",
            "reels": "GET /user/reels",
            "like": "POST /user/like",
            "dislike": "DELETE /user/dislike",
            "imageProxy": "GET /proxy/image?url=...",
            "pravatar": "GET /pravatar/:id",
            "cachedImage": "GET /cache/image/:hash.:ext"
        }
    }))
}
