//! Demeter Core - Domain types, harvest drivers and link resolution.
//!
//! This crate provides the core functionality for Demeter, including:
//!
//! - **Harvesting**: [`HarvestService`] downloads CKAN records one by one into
//!   a file cache; [`PagedSearch`] walks Socrata's paged views listing
//! - **Link checking**: [`resolve_link`] extracts the resource link of a
//!   record, [`LinkAudit`] resolves and probes a whole cache directory
//! - **Error model**: [`AppError`] and the five [`FailureKind`]s
//! - **Traits**: [`PortalClient`], [`CachingFetcher`], [`LinkProber`] for
//!   dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits; the reqwest-backed
//! implementations live in `demeter-client`, and the `demeter` binary in
//! `demeter-cli` wires the two together.
//!
//! # Example
//!
//! ```ignore
//! use demeter_core::{HarvestService, TracingReporter};
//!
//! let harvest = HarvestService::new(portal_factory, fetcher);
//! let report = harvest
//!     .harvest_with_progress("https://demo.ckan.org", Path::new("downloads"), &TracingReporter)
//!     .await?;
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod harvest;
pub mod links;
pub mod liveness;
pub mod paged;
pub mod progress;
pub mod stats;
pub mod traits;

// Configuration
pub use config::{
    HarvestConfig, HttpConfig, PortalEntry, PortalType, PortalsConfig, default_config_path,
    load_portals_config,
};

// Error handling
pub use error::{AppError, FailureKind};

// Harvest statistics and reports
pub use stats::{
    BatchHarvestSummary, HarvestOutcome, HarvestReport, HarvestStats, HarvestStatus,
    PagedSearchReport, PagedStatus, PortalHarvestResult, PortalOutcome,
};

// Link resolution and liveness
pub use links::{LinkDescriptor, resolve_link};
pub use liveness::{LivenessResult, ProbeFailure, TRANSPORT_FAILURE_STATUS};

// Progress reporting
pub use progress::{HarvestEvent, ProgressReporter, SilentReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{CachingFetcher, LinkProber, PortalClient, PortalClientFactory};

// Services (generic over trait implementations)
pub use audit::{AuditSummary, LinkAudit};
pub use harvest::{FetchOutcome, HarvestService};
pub use paged::PagedSearch;
