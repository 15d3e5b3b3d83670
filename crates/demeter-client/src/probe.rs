//! HEAD-based liveness prober.

use std::collections::BTreeMap;
use std::time::Duration;

use demeter_core::error::AppError;
use demeter_core::liveness::{LivenessResult, ProbeFailure};
use demeter_core::traits::LinkProber;
use demeter_core::HttpConfig;
use reqwest::redirect::Policy;
use reqwest::Client;
use reqwest::header::HeaderMap;

/// Maximum number of redirects followed by one probe.
const MAX_REDIRECTS: usize = 10;

/// Probes resource URLs with a single HEAD request.
///
/// Redirects are followed and the whole exchange is bounded by one timeout.
/// Any HTTP response counts as a completed probe; only transport failures
/// produce the `-42` sentinel.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Creates a prober with the given per-probe timeout.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_config(timeout, &HttpConfig::default())
    }

    pub fn with_config(timeout: Duration, http_config: &HttpConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(http_config.user_agent.clone())
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| AppError::ClientError(e.to_string()))?;
        Ok(Self { client })
    }
}

fn failure_kind(e: &reqwest::Error) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout
    } else if e.is_builder() {
        ProbeFailure::InvalidUrl
    } else if e.is_redirect() {
        ProbeFailure::Redirect
    } else if e.is_connect() {
        ProbeFailure::Connect
    } else {
        ProbeFailure::Other
    }
}

/// Flattens response headers; repeated names are joined with `", "`.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

impl LinkProber for HttpProber {
    async fn probe(&self, url: &str) -> LivenessResult {
        match self.client.head(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                tracing::debug!(url, status, "Probe completed");
                LivenessResult::completed(status, header_map(resp.headers()))
            }
            Err(e) => {
                let kind = failure_kind(&e);
                tracing::debug!(url, ?kind, error = %e, "Probe failed");
                LivenessResult::transport_failure(url, kind, e.to_string())
            }
        }
    }
}
