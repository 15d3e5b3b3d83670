//! Trait definitions for external dependencies.
//!
//! The drivers in this crate never talk to the network directly. They work
//! against these traits, which keeps them testable with in-memory mocks and
//! leaves the concrete HTTP implementations to `demeter-client`.
//!
//! # Example
//!
//! ```
//! use demeter_core::traits::PortalClient;
//! use demeter_core::AppError;
//!
//! async fn count_datasets<C: PortalClient>(client: &C) -> Result<usize, AppError> {
//!     Ok(client.list_dataset_ids().await?.len())
//! }
//! ```

use std::future::Future;
use std::path::Path;

use serde_json::Value;

use crate::config::PortalType;
use crate::liveness::LivenessResult;
use crate::AppError;

/// Client for an open data portal that lists and serves records one by one.
pub trait PortalClient: Send + Sync + Clone {
    /// Software this client speaks.
    fn portal_type(&self) -> PortalType;

    /// Base URL the client was created for.
    fn base_url(&self) -> &str;

    /// Lists every dataset identifier, in portal order.
    fn list_dataset_ids(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Fetches the full record of one dataset.
    ///
    /// Implementations report a refused record as [`AppError::NotAuthorized`]
    /// and a rejected request as [`AppError::ValidationError`]; the harvest
    /// driver escalates on both.
    fn get_dataset(&self, id: &str) -> impl Future<Output = Result<Value, AppError>> + Send;
}

/// Factory for creating portal clients.
///
/// Separate from [`PortalClient`] to avoid async trait constructors.
pub trait PortalClientFactory: Send + Sync + Clone {
    /// The type of portal client this factory creates.
    type Client: PortalClient;

    /// Creates a client for `portal_url`.
    ///
    /// Fails on an unusable URL or a portal type without a record-by-record API.
    fn create(&self, portal_url: &str, portal_type: PortalType) -> Result<Self::Client, AppError>;
}

/// HTTP GET with an on-disk cache in front of it.
pub trait CachingFetcher: Send + Sync + Clone {
    /// Returns the body of `url`.
    ///
    /// When `cache::page_cache_path(cache_dir, url)` exists its content is
    /// returned without any request. Otherwise the body is fetched, written
    /// there atomically and returned. A non-success status is an error.
    fn get(
        &self,
        url: &str,
        cache_dir: &Path,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;
}

/// Single-request reachability check for a resource URL.
pub trait LinkProber: Send + Sync + Clone {
    /// Probes `url`. Never fails: transport errors are captured in the result.
    fn probe(&self, url: &str) -> impl Future<Output = LivenessResult> + Send;
}
