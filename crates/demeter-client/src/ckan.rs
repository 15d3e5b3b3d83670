//! CKAN client for harvesting datasets from CKAN-compatible open data portals.
//!
//! Only the two Action API calls the harvest loop needs are wrapped:
//! `package_list` and `package_show`. Records are returned as raw JSON so
//! they can be cached verbatim.

use demeter_core::config::PortalType;
use demeter_core::error::AppError;
use demeter_core::traits::PortalClient;
use demeter_core::HttpConfig;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::http::{build_client, request_error};

/// Generic wrapper for CKAN API responses.
///
/// CKAN API reference: <https://docs.ckan.org/en/2.9/api/>
///
/// ```json
/// {
///     "success": bool,
///     "result": T,
///     "error": {"__type": "Authorization Error", "message": "..."}
/// }
/// ```
#[derive(Deserialize, Debug)]
struct CkanResponse {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<CkanError>,
}

/// The `error` object CKAN attaches to failed calls.
#[derive(Deserialize, Debug, Clone, Default)]
struct CkanError {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

const AUTHORIZATION_ERROR: &str = "Authorization Error";
const VALIDATION_ERROR: &str = "Validation Error";

/// HTTP client for interacting with CKAN open data portals.
///
/// # Examples
///
/// ```no_run
/// use demeter_client::CkanClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CkanClient::new("https://demo.ckan.org")?;
/// let dataset_ids = client.list_package_ids().await?;
/// println!("Found {} datasets", dataset_ids.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CkanClient {
    client: Client,
    base_url: Url,
}

impl CkanClient {
    /// Creates a client for the portal at `base_url_str` with default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidPortalUrl` if the URL cannot be parsed.
    pub fn new(base_url_str: &str) -> Result<Self, AppError> {
        Self::with_config(base_url_str, &HttpConfig::default())
    }

    /// Creates a client with explicit HTTP settings.
    pub fn with_config(base_url_str: &str, http_config: &HttpConfig) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url_str)
            .map_err(|_| AppError::InvalidPortalUrl(base_url_str.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::InvalidPortalUrl(base_url_str.to_string()));
        }
        // Keep any portal path prefix when joining the API paths.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: build_client(http_config)?,
            base_url,
        })
    }

    /// Fetches the complete list of dataset names via `package_list`.
    pub async fn list_package_ids(&self) -> Result<Vec<String>, AppError> {
        let url = self.action_url("package_list")?;
        let result = self.call(url).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Fetches the full record of one dataset via `package_show`.
    ///
    /// # Errors
    ///
    /// - `AppError::NotAuthorized` on HTTP 403 or a CKAN `Authorization Error`
    /// - `AppError::ValidationError` on HTTP 409 or a CKAN `Validation Error`
    /// - `AppError::ClientError` on any other failed call
    pub async fn show_package(&self, id: &str) -> Result<Value, AppError> {
        let mut url = self.action_url("package_show")?;
        url.query_pairs_mut().append_pair("id", id);
        self.call(url).await
    }

    fn action_url(&self, action: &str) -> Result<Url, AppError> {
        self.base_url
            .join(&format!("api/3/action/{}", action))
            .map_err(|e| AppError::InvalidUrl(e.to_string()))
    }

    /// Performs one Action API call and returns its `result`.
    async fn call(&self, url: Url) -> Result<Value, AppError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(e, url.as_str()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| request_error(e, url.as_str()))?;
        let body: Option<CkanResponse> = serde_json::from_slice(&bytes).ok();

        classify(status, body, &url)
    }
}

/// Maps a CKAN response to its result or to the matching error.
fn classify(status: StatusCode, body: Option<CkanResponse>, url: &Url) -> Result<Value, AppError> {
    let ckan_error = body.as_ref().and_then(|b| b.error.clone()).unwrap_or_default();
    let detail = match &ckan_error.message {
        Some(Value::String(msg)) => format!("{}: {}", url, msg),
        Some(other) => format!("{}: {}", url, other),
        None => url.to_string(),
    };

    if status == StatusCode::FORBIDDEN
        || ckan_error.error_type.as_deref() == Some(AUTHORIZATION_ERROR)
    {
        return Err(AppError::NotAuthorized(detail));
    }
    if status == StatusCode::CONFLICT || ckan_error.error_type.as_deref() == Some(VALIDATION_ERROR) {
        return Err(AppError::ValidationError(detail));
    }
    if !status.is_success() {
        return Err(AppError::ClientError(format!(
            "HTTP {} from {}",
            status.as_u16(),
            url
        )));
    }

    match body {
        Some(resp) if resp.success => Ok(resp.result),
        Some(_) => Err(AppError::ClientError(format!(
            "CKAN API returned success: false for {}",
            detail
        ))),
        None => Err(AppError::ClientError(format!(
            "Response from {} is not a CKAN envelope",
            url
        ))),
    }
}

impl PortalClient for CkanClient {
    fn portal_type(&self) -> PortalType {
        PortalType::Ckan
    }

    fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    async fn list_dataset_ids(&self) -> Result<Vec<String>, AppError> {
        self.list_package_ids().await
    }

    async fn get_dataset(&self, id: &str) -> Result<Value, AppError> {
        self.show_package(id).await
    }
}
