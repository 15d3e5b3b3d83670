//! Harvest statistics and reports.
//!
//! Plain data types describing how a portal run ended. They carry no I/O and
//! are built by the drivers in [`crate::harvest`] and [`crate::paged`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FailureKind;

/// Outcome of processing a single listed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// The record was fetched and written to the cache.
    Downloaded,
    /// A cache file already existed; nothing was requested.
    Skipped,
    /// The identifier cannot name a cache file; nothing was requested.
    Rejected,
}

/// Counters for one portal harvest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub rejected: usize,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the matching counter.
    pub fn record(&mut self, outcome: HarvestOutcome) {
        match outcome {
            HarvestOutcome::Downloaded => self.downloaded += 1,
            HarvestOutcome::Skipped => self.skipped += 1,
            HarvestOutcome::Rejected => self.rejected += 1,
        }
    }

    /// Number of identifiers processed, downloaded or skipped.
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped
    }
}

/// How a portal harvest ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarvestStatus {
    /// Every listed identifier was processed.
    Completed,
    /// The run stopped on a handled failure.
    Aborted {
        #[serde(serialize_with = "serialize_kind")]
        kind: FailureKind,
        reason: String,
    },
    /// A cancellation request was observed between two items.
    Cancelled,
}

fn serialize_kind<S: serde::Serializer>(kind: &FailureKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

/// Result of harvesting one CKAN-style portal.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub portal_url: String,
    /// Portal URL without protocol; also the cache subdirectory name.
    pub namespace: String,
    pub stats: HarvestStats,
    pub status: HarvestStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    pub fn is_completed(&self) -> bool {
        self.status == HarvestStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == HarvestStatus::Cancelled
    }

    /// The failure kind when the run was aborted.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            HarvestStatus::Aborted { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// How a paged search ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PagedStatus {
    /// `last_page` returned zero views.
    Exhausted { last_page: u32 },
    /// A page stayed undecodable after one refetch.
    Failed {
        #[serde(serialize_with = "serialize_kind")]
        kind: FailureKind,
        url: String,
    },
    /// A cancellation request was observed between two pages.
    Cancelled,
}

/// Result of walking a Socrata-style paged search.
#[derive(Debug, Clone, Serialize)]
pub struct PagedSearchReport {
    pub portal_url: String,
    /// Page requests issued, the refetch of a discarded page included.
    pub pages_requested: u32,
    pub views_seen: usize,
    pub status: PagedStatus,
}

impl PagedSearchReport {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.status, PagedStatus::Exhausted { .. })
    }
}

/// What a single batch entry produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalOutcome {
    Harvest(HarvestReport),
    Paged(PagedSearchReport),
}

impl PortalOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Harvest(report) => report.is_completed(),
            Self::Paged(report) => report.is_exhausted(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Harvest(report) => report.is_cancelled(),
            Self::Paged(report) => report.status == PagedStatus::Cancelled,
        }
    }

    /// Records downloaded or skipped for CKAN, views seen for Socrata.
    pub fn dataset_count(&self) -> usize {
        match self {
            Self::Harvest(report) => report.stats.total(),
            Self::Paged(report) => report.views_seen,
        }
    }
}

/// Result of one portal within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct PortalHarvestResult {
    pub portal_name: String,
    pub portal_url: String,
    pub outcome: PortalOutcome,
}

/// Aggregated results of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchHarvestSummary {
    pub results: Vec<PortalHarvestResult>,
}

impl BatchHarvestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: PortalHarvestResult) {
        self.results.push(result);
    }

    pub fn total_portals(&self) -> usize {
        self.results.len()
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Portals that ended on a handled failure. Cancelled portals are not counted.
    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_success() && !r.outcome.is_cancelled())
            .count()
    }

    pub fn total_datasets(&self) -> usize {
        self.results.iter().map(|r| r.outcome.dataset_count()).sum()
    }
}
