//! # Media Cache
//!
//! Content-addressed disk cache for remote media. A URL maps to
//! `{md5(url)}.{ext}` inside the cache root; the presence of that file is the
//! only "cached" signal, there is no index and no expiry.
//!
//! Concurrent `cache()` calls for the same URL serialize on a per-key lock and
//! re-check the disk after acquiring it, so a cold key is downloaded once.
//! Files are written to a temporary name and renamed into place, so readers
//! never observe a partial file.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ProxyError, Result};

/// Extensions a cache file may carry, also recognised as URL suffixes
const CACHE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "mp4"];

const DEFAULT_EXTENSION: &str = "jpg";

/// Route prefix under which cached files are served
pub const CACHE_ROUTE: &str = "/cache/image";

/// Cache key of a URL: lowercase hex MD5 of the URL string
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Md5::digest(url.as_bytes()))
}

/// Extension from a `.ext` suffix followed by a query string or the end of
/// the URL, case-insensitively. The earliest match wins.
pub fn extension_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_ascii_lowercase();

    CACHE_EXTENSIONS
        .iter()
        .filter_map(|ext| {
            let needle = format!(".{}", ext);
            lower
                .match_indices(&needle)
                .find(|(at, _)| {
                    matches!(lower.as_bytes().get(at + needle.len()), None | Some(b'?'))
                })
                .map(|(at, _)| (at, *ext))
        })
        .min_by_key(|(at, _)| *at)
        .map(|(_, ext)| ext)
}

pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}

/// `Content-Type` to serve a cache file with
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Split a requested file name into `(key, extension)`.
///
/// Only a single segment of the form `{32 lowercase hex}.{known ext}` is
/// accepted, which also rules out traversal (`..`, separators, NUL).
pub fn parse_file_name(name: &str) -> Option<(&str, &str)> {
    let (key, extension) = name.split_once('.')?;
    let valid_key = key.len() == 32
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

    (valid_key && CACHE_EXTENSIONS.contains(&extension)).then_some((key, extension))
}

/// A media file present in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub key: String,
    pub extension: String,
}

impl CachedFile {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.key, self.extension)
    }

    /// `/cache/image/{key}.{ext}`
    pub fn relative_url(&self) -> String {
        format!("{}/{}", CACHE_ROUTE, self.file_name())
    }

    /// Absolute URL under `public_base` (e.g. `http://host:3000`), or the
    /// relative one without a base
    pub fn url(&self, public_base: Option<&str>) -> String {
        match public_base {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), self.relative_url()),
            None => self.relative_url(),
        }
    }
}

/// An opened cache file ready to be streamed
#[derive(Debug)]
pub struct CacheRead {
    pub file: fs::File,
    pub len: u64,
    pub content_type: &'static str,
}

pub struct MediaCache {
    root: PathBuf,
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MediaCache {
    /// Open the cache at `root`, creating the directory if needed
    pub async fn open(
        root: impl Into<PathBuf>,
        http_client: Arc<dyn HttpClient>,
        timeout: Duration,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            http_client,
            timeout,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure `url` is on disk and return its cache file.
    ///
    /// A cache hit performs no network call.
    ///
    /// # Errors
    ///
    /// `Download` when the fetch fails or returns a non-2xx status, `Io` when
    /// the file cannot be written.
    #[instrument(skip(self), fields(key = tracing::field::Empty))]
    pub async fn cache(&self, url: &str) -> Result<CachedFile> {
        let key = cache_key(url);
        tracing::Span::current().record("key", key.as_str());

        if let Some(hit) = self.find(&key, url).await {
            debug!("Cache hit");
            return Ok(hit);
        }

        let lock = self.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            match self.find(&key, url).await {
                Some(hit) => {
                    debug!("Cached by a concurrent request");
                    Ok(hit)
                }
                None => self.download(&key, url).await,
            }
        };
        self.release_key_lock(&key, lock);

        result
    }

    /// Cache URL for `url`, or `url` itself when caching fails
    pub async fn local_url(&self, url: &str, public_base: Option<&str>) -> String {
        match self.cache(url).await {
            Ok(file) => file.url(public_base),
            Err(e) => {
                warn!(url, error = %e, "Caching failed, keeping original URL");
                url.to_string()
            }
        }
    }

    /// Open a cache file by its served name
    pub async fn open_file(&self, name: &str) -> Result<CacheRead> {
        let (_, extension) =
            parse_file_name(name).ok_or_else(|| ProxyError::InvalidFileName(name.to_string()))?;

        let file = match fs::File::open(self.root.join(name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProxyError::NotCached)
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();

        Ok(CacheRead {
            file,
            len,
            content_type: content_type_for(extension),
        })
    }

    /// Number of published cache files
    pub async fn file_count(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| parse_file_name(name).is_some())
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Existing file for `key`. A URL without a recognised suffix may have
    /// been stored under any extension, so all of them are probed.
    async fn find(&self, key: &str, url: &str) -> Option<CachedFile> {
        let candidates = match extension_from_url(url) {
            Some(ext) => vec![ext],
            None => CACHE_EXTENSIONS.to_vec(),
        };

        for extension in candidates {
            let file = CachedFile {
                key: key.to_string(),
                extension: extension.to_string(),
            };
            if fs::try_exists(self.root.join(file.file_name()))
                .await
                .unwrap_or(false)
            {
                return Some(file);
            }
        }
        None
    }

    async fn download(&self, key: &str, url: &str) -> Result<CachedFile> {
        info!(url, "Downloading media");

        let request = HttpRequest::new(HttpMethod::Get, url).timeout(self.timeout);
        let response =
            self.http_client
                .execute(request)
                .await
                .map_err(|e| ProxyError::Download {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        if !response.is_success() {
            return Err(ProxyError::Download {
                url: url.to_string(),
                message: format!("upstream returned status {}", response.status),
            });
        }

        let extension = extension_from_url(url)
            .or_else(|| response.content_type().and_then(extension_from_content_type))
            .unwrap_or(DEFAULT_EXTENSION);
        let file = CachedFile {
            key: key.to_string(),
            extension: extension.to_string(),
        };

        self.publish(&file, &response.body).await?;
        info!(file = %file.file_name(), bytes = response.body.len(), "Media cached");

        Ok(file)
    }

    /// Write to a unique temporary name, then rename into place
    async fn publish(&self, file: &CachedFile, bytes: &[u8]) -> Result<()> {
        let target = self.root.join(file.file_name());
        let tmp = self
            .root
            .join(format!("{}.{}.tmp", file.file_name(), Uuid::new_v4()));

        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Drop the map entry once no other request holds the lock. Clones are
    /// only handed out under the map lock, so a count of two (map + ours) is
    /// final.
    fn release_key_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves fixed bytes after a delay and counts calls
    struct SlowImageHost {
        calls: AtomicUsize,
        content_type: Option<&'static str>,
        fail: bool,
    }

    impl SlowImageHost {
        fn new(content_type: Option<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                content_type,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(None)
            }
        }
    }

    #[async_trait]
    impl HttpClient for SlowImageHost {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(BridgeError::OperationFailed("certificate expired".to_string()));
            }

            let mut headers = HashMap::new();
            if let Some(content_type) = self.content_type {
                headers.insert("content-type".to_string(), content_type.to_string());
            }
            Ok(HttpResponse {
                status: 200,
                headers,
                body: Bytes::from_static(b"\x89PNG-bytes"),
            })
        }
    }

    async fn cache_with(host: Arc<SlowImageHost>) -> (TempDir, MediaCache) {
        let dir = TempDir::new().unwrap();
        let cache = MediaCache::open(dir.path().join("images"), host, Duration::from_secs(5))
            .await
            .unwrap();
        (dir, cache)
    }

    #[test]
    fn test_cache_key_is_md5_hex() {
        assert_eq!(cache_key(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            cache_key("https://example.com/a.jpg"),
            cache_key("https://example.com/a.jpg")
        );
        assert_eq!(cache_key("https://example.com/a.jpg").len(), 32);
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(extension_from_url("https://x.test/a.jpg"), Some("jpg"));
        assert_eq!(extension_from_url("https://x.test/a.PNG?w=200"), Some("png"));
        assert_eq!(extension_from_url("https://x.test/a.jpeg"), Some("jpeg"));
        assert_eq!(extension_from_url("https://x.test/a.gif.bak"), None);
        assert_eq!(extension_from_url("https://i.pravatar.cc/150?u=7"), None);
    }

    #[test]
    fn test_parse_file_name() {
        let key = cache_key("https://x.test/a.jpg");
        let name = format!("{}.jpg", key);
        assert_eq!(parse_file_name(&name), Some((key.as_str(), "jpg")));

        assert!(parse_file_name("../etc/passwd").is_none());
        assert!(parse_file_name(&format!("{}.exe", key)).is_none());
        assert!(parse_file_name(&format!("{}.jpg", key.to_uppercase())).is_none());
        assert!(parse_file_name(&format!("{}.jpg.tmp", key)).is_none());
    }

    #[tokio::test]
    async fn test_second_call_is_a_cache_hit() {
        let host = Arc::new(SlowImageHost::new(Some("image/png")));
        let (_dir, cache) = cache_with(host.clone()).await;
        let url = "https://example.com/a.jpg";

        let first = cache.cache(url).await.unwrap();
        let second = cache.cache(url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.file_name(), format!("{}.jpg", cache_key(url)));
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cold_requests_download_once() {
        let host = Arc::new(SlowImageHost::new(None));
        let (_dir, cache) = cache_with(host.clone()).await;
        let url = "https://example.com/a.jpg";

        let (a, b) = tokio::join!(cache.cache(url), cache.cache(url));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
        assert!(cache.key_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extension_falls_back_to_content_type_then_default() {
        let host = Arc::new(SlowImageHost::new(Some("image/webp")));
        let (_dir, cache) = cache_with(host.clone()).await;

        let file = cache.cache("https://i.pravatar.cc/150?u=1").await.unwrap();
        assert_eq!(file.extension, "webp");

        // Suffix-less URL found again by probing
        cache.cache("https://i.pravatar.cc/150?u=1").await.unwrap();
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);

        let host = Arc::new(SlowImageHost::new(None));
        let (_dir, cache) = cache_with(host).await;
        let file = cache.cache("https://i.pravatar.cc/150?u=2").await.unwrap();
        assert_eq!(file.extension, "jpg");
    }

    #[tokio::test]
    async fn test_failed_download_keeps_original_url() {
        let (_dir, cache) = cache_with(Arc::new(SlowImageHost::failing())).await;
        let url = "https://broken.test/a.png";

        assert!(matches!(
            cache.cache(url).await,
            Err(ProxyError::Download { .. })
        ));
        assert_eq!(cache.local_url(url, Some("http://proxy:3000")).await, url);
        assert_eq!(cache.file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_published_file_is_readable_and_counted() {
        let (_dir, cache) = cache_with(Arc::new(SlowImageHost::new(None))).await;

        let url = cache
            .local_url("https://example.com/b.png", Some("http://proxy:3000/"))
            .await;
        let name = url.rsplit('/').next().unwrap();

        assert!(url.starts_with("http://proxy:3000/cache/image/"));
        let read = cache.open_file(name).await.unwrap();
        assert_eq!(read.content_type, "image/png");
        assert_eq!(read.len, 10);
        assert_eq!(cache.file_count().await.unwrap(), 1);

        let missing = format!("{}.png", cache_key("https://example.com/other.png"));
        assert!(matches!(
            cache.open_file(&missing).await,
            Err(ProxyError::NotCached)
        ));
    }
}
