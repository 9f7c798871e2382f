//! Upstream API access for the passthrough routes.

use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Sends requests to the upstream API and to arbitrary media URLs.
///
/// Every call is a single attempt: the first upstream answer is relayed to
/// the client as-is.
#[derive(Clone)]
pub struct Upstream {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl Upstream {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a request to `{base_url}{path}`. A non-empty body is sent as
    /// JSON.
    #[instrument(skip(self, body), fields(method = method.as_str()))]
    pub async fn forward(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        self.send(request).await
    }

    /// GET an absolute URL
    pub async fn fetch(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::new(HttpMethod::Get, url)).await
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute_with_retry(request.timeout(self.timeout), RetryPolicy::none())
            .await?;
        debug!(status = response.status, bytes = response.body.len(), "Upstream responded");
        Ok(response)
    }
}
