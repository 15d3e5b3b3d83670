//! Link resolution over harvested dataset records.
//!
//! [`resolve_link`] maps one raw record, CKAN dataset or Socrata view, to the
//! [`LinkDescriptor`] that the liveness check works from. It is a pure
//! function: no I/O, the input is only read, and the same record always
//! yields the same descriptor.
//!
//! # Selection rules
//!
//! - **CKAN**: the `url` of the *last* entry of `resources`, verbatim; `None`
//!   when `resources` is absent or empty. Every CKAN record counts as a link.
//! - **Socrata**: the first `metadata.accessPoints` value containing `"://"`,
//!   in document order; the view is a link when `viewType == "href"`.
//!
//! Records missing the keys these rules depend on are rejected with
//! [`AppError::MalformedRecord`] instead of producing a partial descriptor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PortalType;
use crate::error::AppError;

/// Normalized view of the link a dataset record points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    pub is_link: bool,
    pub url: Option<String>,
    pub software: PortalType,
    pub identifier: String,
}

/// Resolves the link descriptor of a record produced by `software`.
///
/// # Examples
///
/// ```
/// use demeter_core::PortalType;
/// use demeter_core::links::resolve_link;
/// use serde_json::json;
///
/// let record = json!({
///     "name": "bike-lanes",
///     "resources": [
///         {"url": "https://example.org/bike-lanes.csv"},
///         {"url": "https://example.org/bike-lanes.geojson"}
///     ]
/// });
///
/// let link = resolve_link(&record, PortalType::Ckan).unwrap();
/// assert_eq!(link.identifier, "bike-lanes");
/// assert_eq!(link.url.as_deref(), Some("https://example.org/bike-lanes.geojson"));
/// ```
pub fn resolve_link(record: &Value, software: PortalType) -> Result<LinkDescriptor, AppError> {
    match software {
        PortalType::Ckan => resolve_ckan(record),
        PortalType::Socrata => resolve_socrata(record),
    }
}

fn malformed(software: PortalType, identifier: &str, reason: impl Into<String>) -> AppError {
    AppError::MalformedRecord {
        software: software.to_string(),
        identifier: identifier.to_string(),
        reason: reason.into(),
    }
}

fn resolve_ckan(dataset: &Value) -> Result<LinkDescriptor, AppError> {
    let name = dataset
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(PortalType::Ckan, "<unnamed>", "missing key 'name'"))?;

    let url = match dataset.get("resources") {
        None => None,
        Some(Value::Array(resources)) => match resources.last() {
            None => None,
            Some(last) => {
                let url = last.get("url").and_then(Value::as_str).ok_or_else(|| {
                    malformed(
                        PortalType::Ckan,
                        name,
                        "last resource has no string 'url'",
                    )
                })?;
                Some(url.to_string())
            }
        },
        Some(other) => {
            return Err(malformed(
                PortalType::Ckan,
                name,
                format!("'resources' is not an array: {}", other),
            ));
        }
    };

    Ok(LinkDescriptor {
        is_link: true,
        url,
        software: PortalType::Ckan,
        identifier: name.to_string(),
    })
}

fn resolve_socrata(view: &Value) -> Result<LinkDescriptor, AppError> {
    let label = view.get("id").and_then(Value::as_str).unwrap_or("<unknown>");

    let view_type = view
        .get("viewType")
        .ok_or_else(|| malformed(PortalType::Socrata, label, "missing key 'viewType'"))?;

    let identifier = match view.get("tableId") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(malformed(
                PortalType::Socrata,
                label,
                format!("'tableId' is neither a string nor a number: {}", other),
            ));
        }
        None => {
            return Err(malformed(
                PortalType::Socrata,
                label,
                "missing key 'tableId'",
            ));
        }
    };

    let url = view
        .get("metadata")
        .and_then(|m| m.get("accessPoints"))
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|points| points.values())
        .filter_map(Value::as_str)
        .find(|candidate| candidate.contains("://"))
        .map(str::to_string);

    Ok(LinkDescriptor {
        is_link: view_type.as_str() == Some("href"),
        url,
        software: PortalType::Socrata,
        identifier,
    })
}
