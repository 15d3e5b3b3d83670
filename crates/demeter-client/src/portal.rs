//! Portal client factory and enum dispatch.
//!
//! # Why an Enum Instead of `dyn Trait`?
//!
//! The [`PortalClient`] trait uses `impl Future` return types (RPITIT),
//! making it not object-safe. An enum gives static dispatch and room for
//! further record-by-record portal APIs.

use demeter_core::config::PortalType;
use demeter_core::error::AppError;
use demeter_core::traits::{PortalClient, PortalClientFactory};
use demeter_core::HttpConfig;
use serde_json::Value;

use crate::ckan::CkanClient;

/// Unified portal client that wraps concrete portal implementations.
#[derive(Clone)]
pub enum PortalClientEnum {
    /// CKAN portal client.
    Ckan(CkanClient),
}

impl PortalClient for PortalClientEnum {
    fn portal_type(&self) -> PortalType {
        match self {
            Self::Ckan(c) => c.portal_type(),
        }
    }

    fn base_url(&self) -> &str {
        match self {
            Self::Ckan(c) => c.base_url(),
        }
    }

    async fn list_dataset_ids(&self) -> Result<Vec<String>, AppError> {
        match self {
            Self::Ckan(c) => c.list_dataset_ids().await,
        }
    }

    async fn get_dataset(&self, id: &str) -> Result<Value, AppError> {
        match self {
            Self::Ckan(c) => c.get_dataset(id).await,
        }
    }
}

/// Factory that creates the appropriate portal client based on portal type.
#[derive(Debug, Clone, Default)]
pub struct PortalClientFactoryEnum {
    http_config: HttpConfig,
}

impl PortalClientFactoryEnum {
    /// Creates a factory with default HTTP settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_config(http_config: HttpConfig) -> Self {
        Self { http_config }
    }
}

impl PortalClientFactory for PortalClientFactoryEnum {
    type Client = PortalClientEnum;

    fn create(&self, portal_url: &str, portal_type: PortalType) -> Result<Self::Client, AppError> {
        match portal_type {
            PortalType::Ckan => Ok(PortalClientEnum::Ckan(CkanClient::with_config(
                portal_url,
                &self.http_config,
            )?)),
            PortalType::Socrata => Err(AppError::ConfigError(format!(
                "Portal type '{}' has no record-by-record API; it is harvested page by page.",
                portal_type
            ))),
        }
    }
}
