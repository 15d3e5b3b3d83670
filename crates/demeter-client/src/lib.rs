//! Demeter Client - HTTP collaborators for the harvest drivers
//!
//! This crate provides the reqwest-backed implementations of the
//! `demeter-core` traits:
//!
//! - [`ckan`] - CKAN Action API client (`PortalClient`)
//! - [`http`] - cached HTTP GET (`CachingFetcher`)
//! - [`probe`] - HEAD liveness prober (`LinkProber`)
//! - [`portal`] - enum dispatch over portal clients (`PortalClientFactory`)

pub mod ckan;
pub mod http;
pub mod portal;
pub mod probe;

// Re-export main client types
pub use ckan::CkanClient;
pub use http::CachedHttpClient;
pub use portal::{PortalClientEnum, PortalClientFactoryEnum};
pub use probe::HttpProber;
