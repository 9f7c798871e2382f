//! Feed API connector implementation

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{FeedApiError, Result};
use crate::types::{FeedResponse, LikeRequest, LikeTarget, PostDto, ReelDto, ReelsResponse};

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the client core needs from the upstream API
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Fetch the current post feed
    async fn fetch_feed(&self) -> Result<Vec<PostDto>>;

    /// Fetch the current reels list
    async fn fetch_reels(&self) -> Result<Vec<ReelDto>>;

    /// Deliver a like (`POST /user/like`)
    async fn like(&self, target: LikeTarget<'_>) -> Result<()>;

    /// Deliver a dislike (`DELETE /user/dislike`)
    async fn dislike(&self, target: LikeTarget<'_>) -> Result<()>;

    /// Deliver the given desired like state
    async fn set_liked(&self, target: LikeTarget<'_>, liked: bool) -> Result<()> {
        if liked {
            self.like(target).await
        } else {
            self.dislike(target).await
        }
    }
}

/// Feed API connector over an injected `HttpClient`
///
/// # Example
///
/// ```ignore
/// use provider_feed_api::{FeedApi, FeedApiConnector};
///
/// let connector = FeedApiConnector::new(http_client, "https://api.example.com");
/// let posts = connector.fetch_feed().await?;
/// ```
pub struct FeedApiConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Base URL without trailing slash
    base_url: String,

    /// Bounded wait for every request
    timeout: Duration,
}

impl FeedApiConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `base_url` - Upstream API root, e.g. `https://api.example.com`
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a request and turn non-2xx answers into `FeedApiError::Api`
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = request
            .header("Accept", "application/json")
            .timeout(self.timeout);
        let method = request.method;

        let response = self.http_client.execute(request).await.map_err(|e| {
            warn!(method = method.as_str(), error = %e, "Feed API request failed");
            FeedApiError::from(e)
        })?;

        if response.is_success() {
            debug!(status = response.status, "Feed API request succeeded");
            Ok(response)
        } else {
            warn!(status = response.status, "Feed API returned an error status");
            Err(FeedApiError::Api {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, self.url(path)))
            .await?;

        serde_json::from_slice(&response.body).map_err(|e| {
            FeedApiError::ParseError(format!("Failed to parse {} response: {}", path, e))
        })
    }

    async fn send_like(&self, method: HttpMethod, path: &str, body: LikeRequest) -> Result<()> {
        let request = HttpRequest::new(method, self.url(path))
            .json(&body)
            .map_err(|e| FeedApiError::InvalidRequest(e.to_string()))?;

        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedApi for FeedApiConnector {
    #[instrument(skip(self))]
    async fn fetch_feed(&self) -> Result<Vec<PostDto>> {
        let response: FeedResponse = self.get_json("/user/feed").await?;
        info!("Fetched {} posts", response.feed.len());
        Ok(response.feed)
    }

    #[instrument(skip(self))]
    async fn fetch_reels(&self) -> Result<Vec<ReelDto>> {
        let response: ReelsResponse = self.get_json("/user/reels").await?;
        info!("Fetched {} reels", response.reels.len());
        Ok(response.reels)
    }

    #[instrument(skip(self))]
    async fn like(&self, target: LikeTarget<'_>) -> Result<()> {
        self.send_like(HttpMethod::Post, "/user/like", LikeRequest::new(target, true))
            .await
    }

    #[instrument(skip(self))]
    async fn dislike(&self, target: LikeTarget<'_>) -> Result<()> {
        self.send_like(
            HttpMethod::Delete,
            "/user/dislike",
            LikeRequest::new(target, false),
        )
        .await
    }
}
