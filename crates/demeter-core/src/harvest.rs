//! Harvest service for CKAN-style portals.
//!
//! This module holds the incremental download loop: list every dataset
//! identifier of a portal, skip the ones already present in the cache, fetch
//! and store the others one by one with a politeness delay in between.
//!
//! # Architecture
//!
//! [`HarvestService`] is generic over two traits:
//! - [`PortalClientFactory`] - creates the CKAN client for a portal URL
//! - [`CachingFetcher`] - cached GET used by the paged driver in batch runs
//!
//! # Failure handling
//!
//! Failures are classified into [`FailureKind`] values and carried in the
//! returned [`HarvestReport`]:
//!
//! - client creation or listing fails: `PortalUnreachable`, nothing else happens;
//! - a record is refused: `AccessDenied`, the rest of the list is abandoned;
//! - a record is rejected as invalid: `RecordInvalid`, same escalation.
//!
//! Any other record error is returned as `Err`. Files written before an abort
//! stay in the cache, so the next run resumes where this one stopped.
//!
//! # Cancellation Support
//!
//! The `*_cancellable` methods accept a `CancellationToken`. It is checked
//! between items only: a record being fetched is always written out before
//! the run stops.

use std::path::Path;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cache;
use crate::config::{HarvestConfig, PortalEntry, PortalType};
use crate::error::{AppError, FailureKind};
use crate::paged::PagedSearch;
use crate::progress::{HarvestEvent, ProgressReporter, SilentReporter};
use crate::stats::{
    BatchHarvestSummary, HarvestOutcome, HarvestReport, HarvestStats, HarvestStatus,
    PagedSearchReport, PortalHarvestResult, PortalOutcome,
};
use crate::traits::{CachingFetcher, PortalClient, PortalClientFactory};

/// Subdirectory of the download directory used for paged search pages.
pub const SOCRATA_CACHE_DIR: &str = "socrata";

/// Classified result of fetching one record.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Value),
    AccessDenied(String),
    RecordInvalid(String),
}

impl FetchOutcome {
    /// The failure kind this outcome escalates to, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Fetched(_) => None,
            Self::AccessDenied(_) => Some(FailureKind::AccessDenied),
            Self::RecordInvalid(_) => Some(FailureKind::RecordInvalid),
        }
    }
}

/// Fetches one record and classifies the escalating errors.
///
/// Errors other than authorization and validation are returned unchanged.
pub async fn fetch_record<C: PortalClient>(client: &C, id: &str) -> Result<FetchOutcome, AppError> {
    match client.get_dataset(id).await {
        Ok(record) => Ok(FetchOutcome::Fetched(record)),
        Err(AppError::NotAuthorized(msg)) => Ok(FetchOutcome::AccessDenied(msg)),
        Err(AppError::ValidationError(msg)) => Ok(FetchOutcome::RecordInvalid(msg)),
        Err(e) => Err(e),
    }
}

/// Service for harvesting dataset metadata from open data portals.
///
/// # Type Parameters
///
/// * `F` - Portal client factory implementation
/// * `H` - Caching fetcher used for paged portals
///
/// # Example
///
/// ```ignore
/// use demeter_core::HarvestService;
///
/// let service = HarvestService::new(PortalClientFactoryEnum::new(), CachedHttpClient::new()?);
/// let report = service.harvest("https://demo.ckan.org", Path::new("downloads")).await?;
/// println!("{} downloaded, {} skipped", report.stats.downloaded, report.stats.skipped);
/// ```
pub struct HarvestService<F, H>
where
    F: PortalClientFactory,
    H: CachingFetcher,
{
    portal_factory: F,
    fetcher: H,
    config: HarvestConfig,
}

impl<F, H> Clone for HarvestService<F, H>
where
    F: PortalClientFactory + Clone,
    H: CachingFetcher + Clone,
{
    fn clone(&self) -> Self {
        Self {
            portal_factory: self.portal_factory.clone(),
            fetcher: self.fetcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<F, H> HarvestService<F, H>
where
    F: PortalClientFactory,
    H: CachingFetcher,
{
    /// Creates a harvest service with the default configuration.
    pub fn new(portal_factory: F, fetcher: H) -> Self {
        Self::with_config(portal_factory, fetcher, HarvestConfig::default())
    }

    /// Creates a harvest service with a custom configuration.
    pub fn with_config(portal_factory: F, fetcher: H, config: HarvestConfig) -> Self {
        Self {
            portal_factory,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvests a CKAN portal into `directory/<portal without protocol>/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the portal directory cannot be created, a cache
    /// file cannot be checked or written, or a record fetch fails with
    /// anything other than an authorization or validation error.
    pub async fn harvest(&self, portal_url: &str, directory: &Path) -> Result<HarvestReport, AppError> {
        self.harvest_cancellable(portal_url, directory, &SilentReporter, CancellationToken::new())
            .await
    }

    /// Same as [`harvest`](Self::harvest), with progress events.
    pub async fn harvest_with_progress<R: ProgressReporter>(
        &self,
        portal_url: &str,
        directory: &Path,
        reporter: &R,
    ) -> Result<HarvestReport, AppError> {
        self.harvest_cancellable(portal_url, directory, reporter, CancellationToken::new())
            .await
    }

    /// Same as [`harvest_with_progress`](Self::harvest_with_progress), with
    /// cancellation support.
    ///
    /// # Cancellation Behavior
    ///
    /// When cancelled:
    /// - no further records are requested;
    /// - every file already written stays in place;
    /// - the report carries [`HarvestStatus::Cancelled`].
    pub async fn harvest_cancellable<R: ProgressReporter>(
        &self,
        portal_url: &str,
        directory: &Path,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<HarvestReport, AppError> {
        let started_at = Utc::now();
        let namespace = cache::strip_protocol(portal_url).to_string();
        let portal_dir = cache::portal_dir(directory, portal_url);
        tokio::fs::create_dir_all(&portal_dir).await?;

        let mut stats = HarvestStats::new();
        let finish = |stats: HarvestStats, status: HarvestStatus| HarvestReport {
            portal_url: portal_url.to_string(),
            namespace: namespace.clone(),
            stats,
            status,
            started_at,
            finished_at: Utc::now(),
        };

        let listed = async {
            let client = self.portal_factory.create(portal_url, PortalType::Ckan)?;
            let ids = client.list_dataset_ids().await?;
            Ok::<_, AppError>((client, ids))
        }
        .await;
        let (client, ids) = match listed {
            Ok(listed) => listed,
            Err(e) => {
                let reason = e.to_string();
                reporter.report(HarvestEvent::ListingFailed {
                    portal_url,
                    error: &reason,
                });
                return Ok(finish(
                    stats,
                    HarvestStatus::Aborted {
                        kind: FailureKind::PortalUnreachable,
                        reason,
                    },
                ));
            }
        };

        reporter.report(HarvestEvent::DatasetsFound {
            portal_url,
            count: ids.len(),
        });

        for id in &ids {
            if cancel_token.is_cancelled() {
                reporter.report(HarvestEvent::PortalCancelled {
                    portal_url,
                    stats: &stats,
                });
                return Ok(finish(stats, HarvestStatus::Cancelled));
            }

            let Some(path) = cache::dataset_path(directory, portal_url, id) else {
                tracing::warn!(
                    portal = portal_url,
                    identifier = %id,
                    "Rejecting identifier that is not a plain file name"
                );
                stats.record(HarvestOutcome::Rejected);
                continue;
            };
            if cache::is_cached(&path).await? {
                stats.record(HarvestOutcome::Skipped);
                continue;
            }

            reporter.report(HarvestEvent::Downloading {
                identifier: id,
                portal_url,
            });

            let (kind, reason) = match fetch_record(&client, id).await? {
                FetchOutcome::Fetched(record) => {
                    let bytes = serde_json::to_vec(&record)?;
                    cache::write_atomic(&path, &bytes).await?;
                    stats.record(HarvestOutcome::Downloaded);
                    reporter.report(HarvestEvent::Saved {
                        identifier: id,
                        path: &path,
                    });
                    self.pause(&cancel_token).await;
                    continue;
                }
                FetchOutcome::AccessDenied(reason) => (FailureKind::AccessDenied, reason),
                FetchOutcome::RecordInvalid(reason) => (FailureKind::RecordInvalid, reason),
            };

            tracing::debug!(portal = portal_url, identifier = %id, %reason, "Record fetch escalated");
            reporter.report(HarvestEvent::PortalAborted {
                portal_url,
                identifier: id,
                kind,
            });
            return Ok(finish(stats, HarvestStatus::Aborted { kind, reason }));
        }

        reporter.report(HarvestEvent::PortalFinished {
            portal_url,
            stats: &stats,
        });
        Ok(finish(stats, HarvestStatus::Completed))
    }

    /// Walks the paged views listing of a Socrata portal into `cache_dir`.
    pub async fn harvest_paged_cancellable<R: ProgressReporter>(
        &self,
        portal_url: &str,
        cache_dir: &Path,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<PagedSearchReport, AppError> {
        PagedSearch::new(self.fetcher.clone())
            .harvest_paged_cancellable(portal_url, cache_dir, reporter, cancel_token)
            .await
    }

    /// Harvests one portal with the strategy matching its type.
    ///
    /// CKAN portals go to `directory`, Socrata pages to `directory/socrata`.
    pub async fn harvest_portal<R: ProgressReporter>(
        &self,
        portal_url: &str,
        portal_type: PortalType,
        directory: &Path,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<PortalOutcome, AppError> {
        match portal_type {
            PortalType::Ckan => self
                .harvest_cancellable(portal_url, directory, reporter, cancel_token)
                .await
                .map(PortalOutcome::Harvest),
            PortalType::Socrata => self
                .harvest_paged_cancellable(
                    portal_url,
                    &directory.join(SOCRATA_CACHE_DIR),
                    reporter,
                    cancel_token,
                )
                .await
                .map(PortalOutcome::Paged),
        }
    }

    /// Harvests several portals in sequence.
    ///
    /// Portal-level failures are recorded in the summary and the batch moves
    /// on to the next entry. An uncaught error stops the batch and is returned.
    pub async fn batch_harvest(
        &self,
        portals: &[&PortalEntry],
        directory: &Path,
    ) -> Result<BatchHarvestSummary, AppError> {
        self.batch_harvest_cancellable(portals, directory, &SilentReporter, CancellationToken::new())
            .await
    }

    /// Same as [`batch_harvest`](Self::batch_harvest), with progress events
    /// and cancellation support. No new portal is started once cancelled.
    pub async fn batch_harvest_cancellable<R: ProgressReporter>(
        &self,
        portals: &[&PortalEntry],
        directory: &Path,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<BatchHarvestSummary, AppError> {
        let mut summary = BatchHarvestSummary::new();
        let total_portals = portals.len();
        reporter.report(HarvestEvent::BatchStarted { total_portals });

        for (portal_index, portal) in portals.iter().enumerate() {
            if cancel_token.is_cancelled() {
                tracing::info!(
                    remaining = total_portals - portal_index,
                    "Batch harvest cancelled"
                );
                break;
            }

            reporter.report(HarvestEvent::PortalStarted {
                portal_index,
                total_portals,
                portal_name: &portal.name,
                portal_url: &portal.url,
            });

            let outcome = self
                .harvest_portal(
                    &portal.url,
                    portal.portal_type,
                    directory,
                    reporter,
                    cancel_token.clone(),
                )
                .await?;

            summary.add(PortalHarvestResult {
                portal_name: portal.name.clone(),
                portal_url: portal.url.clone(),
                outcome,
            });
        }

        reporter.report(HarvestEvent::BatchCompleted { summary: &summary });
        Ok(summary)
    }

    /// Politeness delay after a record write; cut short by cancellation.
    async fn pause(&self, cancel_token: &CancellationToken) {
        let delay = self.config.inter_request_delay;
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => {}
        }
    }
}
