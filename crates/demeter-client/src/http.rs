//! Cached HTTP GET.
//!
//! [`CachedHttpClient`] implements [`CachingFetcher`]: a URL whose cache file
//! exists is served from disk, anything else is downloaded and stored under
//! `cache::page_cache_path(cache_dir, url)` before being returned.

use std::path::Path;

use demeter_core::cache;
use demeter_core::error::AppError;
use demeter_core::traits::CachingFetcher;
use demeter_core::HttpConfig;
use reqwest::Client;

/// Maps a failed request to the matching [`AppError`] variant.
pub(crate) fn request_error(e: reqwest::Error, url: &str) -> AppError {
    if e.is_timeout() || e.is_connect() {
        AppError::NetworkError(format!("{}: {}", url, e))
    } else if e.is_builder() {
        AppError::InvalidUrl(format!("{}: {}", url, e))
    } else {
        AppError::ClientError(format!("{}: {}", url, e))
    }
}

/// Builds the shared reqwest client for portal requests.
pub(crate) fn build_client(http_config: &HttpConfig) -> Result<Client, AppError> {
    let mut builder = Client::builder().user_agent(http_config.user_agent.clone());
    if let Some(timeout) = http_config.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| AppError::ClientError(e.to_string()))
}

/// HTTP GET client with an on-disk cache.
///
/// # Examples
///
/// ```no_run
/// use demeter_client::CachedHttpClient;
/// use demeter_core::traits::CachingFetcher;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = CachedHttpClient::new()?;
/// let body = fetcher
///     .get("https://data.cityofnewyork.us/api/views?page=1", Path::new("downloads/socrata"))
///     .await?;
/// println!("{} bytes", body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CachedHttpClient {
    client: Client,
}

impl CachedHttpClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(http_config: &HttpConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(http_config)?,
        })
    }
}

impl CachingFetcher for CachedHttpClient {
    async fn get(&self, url: &str, cache_dir: &Path) -> Result<Vec<u8>, AppError> {
        let path = cache::page_cache_path(cache_dir, url);
        if cache::is_cached(&path).await? {
            tracing::debug!(url, path = %path.display(), "Serving from cache");
            return Ok(tokio::fs::read(&path).await?);
        }

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(e, url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::ClientError(format!(
                "HTTP {} from {}",
                status.as_u16(),
                url
            )));
        }

        let body = resp.bytes().await.map_err(|e| request_error(e, url))?;
        cache::write_atomic(&path, &body).await?;
        tracing::debug!(url, bytes = body.len(), "Cached response");
        Ok(body.to_vec())
    }
}
