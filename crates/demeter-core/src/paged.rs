//! Paged search driver for Socrata-style portals.
//!
//! Walks `/api/views?page=1`, `?page=2`, ... until a page decodes to an empty
//! array. Every page goes through the [`CachingFetcher`], so a second run over
//! a fully cached portal issues no requests at all.
//!
//! A page that does not decode as a JSON array is treated as a corrupt cache
//! entry: the file is discarded and the page fetched once more. If the second
//! copy is undecodable too, the search stops with
//! [`FailureKind::DecodeFailure`] and the bad file is left in place for
//! inspection.

use std::path::Path;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cache;
use crate::error::{AppError, FailureKind};
use crate::progress::{HarvestEvent, ProgressReporter, SilentReporter};
use crate::stats::{PagedSearchReport, PagedStatus};
use crate::traits::CachingFetcher;

/// Builds the URL of page `page` for a portal.
///
/// The views path is joined as an absolute path, so any path already present
/// on `portal_url` is replaced.
///
/// ```
/// use demeter_core::paged::page_url;
///
/// assert_eq!(
///     page_url("https://data.cityofnewyork.us/browse", 2).unwrap(),
///     "https://data.cityofnewyork.us/api/views?page=2"
/// );
/// ```
pub fn page_url(portal_url: &str, page: u32) -> Result<String, AppError> {
    let base = Url::parse(portal_url)
        .map_err(|e| AppError::InvalidPortalUrl(format!("{}: {}", portal_url, e)))?;
    let url = base
        .join(&format!("/api/views?page={}", page))
        .map_err(|e| AppError::InvalidUrl(format!("{}: {}", portal_url, e)))?;
    Ok(url.to_string())
}

fn decode_page(bytes: &[u8]) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Driver for paged view listings.
#[derive(Debug, Clone)]
pub struct PagedSearch<H: CachingFetcher> {
    fetcher: H,
}

impl<H: CachingFetcher> PagedSearch<H> {
    pub fn new(fetcher: H) -> Self {
        Self { fetcher }
    }

    /// Fetches every page of `portal_url` into `cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the portal URL cannot be parsed, when the fetcher
    /// fails (transport error, non-success status, cache write) or when a
    /// corrupt page cannot be removed. Undecodable pages are not errors: they
    /// end the search with a [`PagedStatus::Failed`] report.
    pub async fn harvest_paged(
        &self,
        portal_url: &str,
        cache_dir: &Path,
    ) -> Result<PagedSearchReport, AppError> {
        self.harvest_paged_cancellable(
            portal_url,
            cache_dir,
            &SilentReporter,
            CancellationToken::new(),
        )
        .await
    }

    /// Same as [`harvest_paged`](Self::harvest_paged), with progress events.
    pub async fn harvest_paged_with_progress<R: ProgressReporter>(
        &self,
        portal_url: &str,
        cache_dir: &Path,
        reporter: &R,
    ) -> Result<PagedSearchReport, AppError> {
        self.harvest_paged_cancellable(portal_url, cache_dir, reporter, CancellationToken::new())
            .await
    }

    /// Same as [`harvest_paged_with_progress`](Self::harvest_paged_with_progress),
    /// stopping before the next page once `cancel_token` is cancelled.
    pub async fn harvest_paged_cancellable<R: ProgressReporter>(
        &self,
        portal_url: &str,
        cache_dir: &Path,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<PagedSearchReport, AppError> {
        let mut report = PagedSearchReport {
            portal_url: portal_url.to_string(),
            pages_requested: 0,
            views_seen: 0,
            status: PagedStatus::Cancelled,
        };

        let mut page: u32 = 1;
        loop {
            if cancel_token.is_cancelled() {
                tracing::info!(portal = portal_url, page, "Paged search cancelled");
                return Ok(report);
            }

            let url = page_url(portal_url, page)?;
            let views = match self.fetch_page(&url, cache_dir, &mut report, reporter).await? {
                Some(views) => views,
                None => {
                    report.status = PagedStatus::Failed {
                        kind: FailureKind::DecodeFailure,
                        url,
                    };
                    return Ok(report);
                }
            };

            if views.is_empty() {
                reporter.report(HarvestEvent::PagesExhausted {
                    portal_url,
                    pages: page,
                });
                report.status = PagedStatus::Exhausted { last_page: page };
                return Ok(report);
            }

            report.views_seen += views.len();
            reporter.report(HarvestEvent::PageFetched {
                url: &url,
                views: views.len(),
            });
            page += 1;
        }
    }

    /// Fetches and decodes one page, with a single discard-and-refetch.
    ///
    /// Returns `Ok(None)` when both copies were undecodable.
    async fn fetch_page<R: ProgressReporter>(
        &self,
        url: &str,
        cache_dir: &Path,
        report: &mut PagedSearchReport,
        reporter: &R,
    ) -> Result<Option<Vec<Value>>, AppError> {
        let path = cache::page_cache_path(cache_dir, url);

        report.pages_requested += 1;
        let body = self.fetcher.get(url, cache_dir).await?;
        let first_error = match decode_page(&body) {
            Ok(views) => return Ok(Some(views)),
            Err(e) => e,
        };

        tracing::debug!(url, error = %first_error, "Page is not a JSON array");
        reporter.report(HarvestEvent::PageDiscarded { url, path: &path });
        cache::discard(&path).await?;

        report.pages_requested += 1;
        let body = self.fetcher.get(url, cache_dir).await?;
        match decode_page(&body) {
            Ok(views) => Ok(Some(views)),
            Err(e) => {
                tracing::debug!(url, error = %e, "Page still undecodable after refetch");
                reporter.report(HarvestEvent::PageUndecodable { url, path: &path });
                Ok(None)
            }
        }
    }
}
