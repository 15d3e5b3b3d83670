//! Progress reporting for harvest and link-check runs.
//!
//! Drivers emit [`HarvestEvent`]s; a [`ProgressReporter`] decides how they are
//! shown. [`TracingReporter`] prints the classic progress lines through
//! `tracing`, [`SilentReporter`] drops everything.

use std::path::Path;

use tracing::{error, info, warn};

use crate::error::FailureKind;
use crate::stats::{BatchHarvestSummary, HarvestStats};

/// Events emitted while harvesting portals and probing links.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    /// A batch run is starting.
    BatchStarted { total_portals: usize },
    /// One portal of a batch is starting.
    PortalStarted {
        portal_index: usize,
        total_portals: usize,
        portal_name: &'a str,
        portal_url: &'a str,
    },
    /// The dataset listing returned.
    DatasetsFound { portal_url: &'a str, count: usize },
    /// A record is about to be fetched.
    Downloading { identifier: &'a str, portal_url: &'a str },
    /// A record was written to the cache.
    Saved { identifier: &'a str, path: &'a Path },
    /// The dataset listing failed.
    ListingFailed { portal_url: &'a str, error: &'a str },
    /// A record fetch escalated into an abort of the portal.
    PortalAborted {
        portal_url: &'a str,
        identifier: &'a str,
        kind: FailureKind,
    },
    /// Every listed identifier was processed.
    PortalFinished {
        portal_url: &'a str,
        stats: &'a HarvestStats,
    },
    /// The run was cancelled between two items.
    PortalCancelled {
        portal_url: &'a str,
        stats: &'a HarvestStats,
    },
    /// A page of a paged search was decoded.
    PageFetched { url: &'a str, views: usize },
    /// A page could not be decoded and was discarded for one refetch.
    PageDiscarded { url: &'a str, path: &'a Path },
    /// A page could not be decoded even after the refetch.
    PageUndecodable { url: &'a str, path: &'a Path },
    /// The paged search reached an empty page.
    PagesExhausted { portal_url: &'a str, pages: u32 },
    /// A liveness probe completed with a response.
    ProbeSucceeded { url: &'a str, status_code: i32 },
    /// A liveness probe failed at the transport level.
    ProbeFailed { url: &'a str },
    /// A batch run finished.
    BatchCompleted { summary: &'a BatchHarvestSummary },
}

/// Receives harvest events.
pub trait ProgressReporter: Send + Sync {
    /// Called for every event. The default implementation does nothing.
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Reporter that prints progress lines through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::BatchStarted { total_portals } => {
                info!(total_portals, "Starting batch harvest of {} portals", total_portals);
            }
            HarvestEvent::PortalStarted {
                portal_index,
                total_portals,
                portal_name,
                portal_url,
            } => {
                info!(
                    portal = portal_url,
                    "[{}/{}] {}",
                    portal_index + 1,
                    total_portals,
                    portal_name
                );
            }
            HarvestEvent::DatasetsFound { portal_url, count } => {
                info!(portal = portal_url, count, "Found {} datasets", count);
            }
            HarvestEvent::Downloading {
                identifier,
                portal_url,
            } => {
                info!("  Downloading {} from {}", identifier, portal_url);
            }
            HarvestEvent::Saved { identifier, path } => {
                tracing::debug!(identifier, path = %path.display(), "Saved record");
            }
            HarvestEvent::ListingFailed { portal_url, error } => {
                error!(error, "**Error searching {}**", portal_url);
            }
            HarvestEvent::PortalAborted {
                portal_url,
                identifier,
                kind,
            } => match kind {
                FailureKind::AccessDenied => {
                    warn!(identifier, "**Not authorized for {}**", portal_url);
                }
                FailureKind::RecordInvalid => {
                    warn!(identifier, "**Validation error for {}**", portal_url);
                }
                other => {
                    warn!(identifier, kind = %other, "**Aborted {}**", portal_url);
                }
            },
            HarvestEvent::PortalFinished { portal_url, stats } => {
                info!(
                    downloaded = stats.downloaded,
                    skipped = stats.skipped,
                    "**Finished downloading {}**",
                    portal_url
                );
            }
            HarvestEvent::PortalCancelled { portal_url, stats } => {
                warn!(
                    portal = portal_url,
                    downloaded = stats.downloaded,
                    skipped = stats.skipped,
                    "Harvest cancelled"
                );
            }
            HarvestEvent::PageFetched { url, views } => {
                info!(views, "Fetched {}", url);
            }
            HarvestEvent::PageDiscarded { url, path } => {
                warn!(path = %path.display(), "Discarding undecodable page {}, fetching again", url);
            }
            HarvestEvent::PageUndecodable { url, path } => {
                error!(url, "**Something is wrong with {}**", path.display());
            }
            HarvestEvent::PagesExhausted { portal_url, pages } => {
                info!(pages, "**Finished downloading {}**", portal_url);
            }
            HarvestEvent::ProbeSucceeded { url, status_code } => {
                info!(status_code, "Succeeded: {}", url);
            }
            HarvestEvent::ProbeFailed { url } => {
                info!("Failed:    {}", url);
            }
            HarvestEvent::BatchCompleted { summary } => {
                info!(
                    successful = summary.successful_count(),
                    failed = summary.failed_count(),
                    datasets = summary.total_datasets(),
                    "Batch harvest complete"
                );
            }
        }
    }
}
