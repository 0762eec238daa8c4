//! Tile fetching over HTTP.
//!
//! The [`TileFetcher`] trait is the only thing a layer knows about the
//! network. [`HttpFetcher`] is the production implementation: reqwest for
//! transport, a [`Cache`] in front of it and an optional retry budget.
//! Retries live here and never in the layers.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use crate::cache::{Cache, NoCache};
use crate::error::{Error, Result};

/// Delay before the first retry. Doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on the delay between attempts.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(2);

/// Future returned by [`TileFetcher::fetch`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'static>>;

/// Performs the byte fetch for a tile URL.
pub trait TileFetcher: Send + Sync {
    /// Start fetching `url`.
    ///
    /// Must not block; all work happens when the returned future is polled.
    fn fetch(&self, url: &str) -> FetchFuture;
}

/// HTTP tile fetcher with caching.
///
/// # Example
///
/// ```ignore
/// let fetcher = HttpFetcher::with_cache(MemoryCache::with_max_bytes(64 << 20))
///     .with_retries(2);
/// let bytes = fetcher.fetch("http://mt0.google.com/vt/lyrs=y&x=0&y=0&z=0&s=Ga").await?;
/// ```
pub struct HttpFetcher<C: Cache = NoCache> {
    http: reqwest::Client,
    cache: Arc<C>,
    retries: u32,
}

impl HttpFetcher<NoCache> {
    /// Create a fetcher with default settings and no caching.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cache(NoCache)
    }
}

impl Default for HttpFetcher<NoCache> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cache + 'static> HttpFetcher<C> {
    /// Create a fetcher with a custom cache.
    #[must_use]
    pub fn with_cache(cache: C) -> Self {
        Self::with_http_and_cache(reqwest::Client::new(), cache)
    }

    /// Create a fetcher with a custom HTTP client and cache.
    #[must_use]
    pub fn with_http_and_cache(http: reqwest::Client, cache: C) -> Self {
        Self {
            http,
            cache: Arc::new(cache),
            retries: 0,
        }
    }

    /// Retry transport failures and server errors up to `retries` extra times.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// The cache in front of the network.
    #[must_use]
    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<C: Cache + 'static> TileFetcher for HttpFetcher<C> {
    fn fetch(&self, url: &str) -> FetchFuture {
        let http = self.http.clone();
        let cache = Arc::clone(&self.cache);
        let retries = self.retries;
        let url = url.to_string();

        Box::pin(async move {
            if let Some(data) = cache.get(&url).await? {
                tracing::debug!(url = %url, "cache hit");
                return Ok(data);
            }

            let mut attempt = 0;
            let data = loop {
                match fetch_once(&http, &url).await {
                    Ok(data) => break data,
                    Err(e) if attempt < retries && is_transient(&e) => {
                        attempt += 1;
                        let delay = retry_delay(attempt);
                        tracing::warn!(url = %url, attempt, ?delay, "retrying tile fetch: {e}");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => return Err(e),
                }
            };

            cache.put(&url, data.clone()).await?;
            Ok(data)
        })
    }
}

async fn fetch_once(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url, "fetching");

    let response = http.get(url).send().await.map_err(|e| Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let data = response.bytes().await.map_err(|e| Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(data.to_vec())
}

/// Backoff before retry number `attempt` (starting at 1).
fn retry_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    RETRY_BASE_DELAY.saturating_mul(factor).min(RETRY_MAX_DELAY)
}

/// Transport errors and 5xx responses may succeed on another attempt.
fn is_transient(error: &Error) -> bool {
    match error {
        Error::Http { .. } => true,
        Error::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    }
}
