//! Liveness probe results.
//!
//! A probe either completes (any HTTP status, 4xx and 5xx included) or fails
//! at the transport level. Completion says nothing about the health of the
//! resource: a 404 is a completed probe with status 404.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Status code recorded when the request raised instead of completing.
pub const TRANSPORT_FAILURE_STATUS: i32 = -42;

/// Transport-level failure categories captured in [`LivenessResult::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    Timeout,
    Connect,
    InvalidUrl,
    Redirect,
    Other,
}

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub status_code: i32,
    pub headers: Option<BTreeMap<String, String>>,
    pub error: Option<Value>,
}

impl LivenessResult {
    /// A probe that received a response.
    pub fn completed(status_code: u16, headers: BTreeMap<String, String>) -> Self {
        Self {
            status_code: i32::from(status_code),
            headers: Some(headers),
            error: None,
        }
    }

    /// A probe that never received a response.
    pub fn transport_failure(url: &str, failure: ProbeFailure, message: impl Into<String>) -> Self {
        Self {
            status_code: TRANSPORT_FAILURE_STATUS,
            headers: None,
            error: Some(json!({
                "url": url,
                "kind": failure,
                "message": message.into(),
            })),
        }
    }

    /// True when the request completed, whatever the status code.
    pub fn succeeded(&self) -> bool {
        self.status_code != TRANSPORT_FAILURE_STATUS
    }

    /// True for completed probes with a 2xx or 3xx status.
    pub fn is_alive(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}
