//! Link audit over a cache directory.
//!
//! Walks every cached file below a root, resolves the link of every record it
//! holds and, when a [`LinkProber`] is configured, checks each URL. One JSON
//! line per record is written to the output:
//!
//! ```json
//! {"is_link":true,"url":"https://...","software":"ckan","identifier":"roads","source":"downloads/demo.ckan.org/roads","liveness":{"status_code":200,"headers":{},"error":null}}
//! ```
//!
//! The record shape decides how a file is read: a JSON object is one CKAN
//! record, a JSON array is one Socrata page of views. Below the paged search
//! directory only arrays are accepted, since a page left behind after a
//! decode failure may hold any JSON. Files that are not valid JSON, or hold
//! no acceptable shape, are logged and counted. A malformed record is an
//! error that names the file it came from.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cache;
use crate::config::PortalType;
use crate::error::AppError;
use crate::harvest::SOCRATA_CACHE_DIR;
use crate::links::{LinkDescriptor, resolve_link};
use crate::liveness::LivenessResult;
use crate::progress::{HarvestEvent, ProgressReporter};
use crate::traits::LinkProber;

/// Counters for one audit run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub files: usize,
    pub records: usize,
    pub links: usize,
    pub probed: usize,
    pub alive: usize,
    pub failed_probes: usize,
    pub undecodable_files: usize,
}

#[derive(Serialize)]
struct LinkRow<'a> {
    #[serde(flatten)]
    link: &'a LinkDescriptor,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    liveness: Option<&'a LivenessResult>,
}

/// Resolves and optionally probes the links of cached records.
#[derive(Debug, Clone)]
pub struct LinkAudit<P: LinkProber> {
    prober: Option<P>,
    software: Option<PortalType>,
}

impl<P: LinkProber> LinkAudit<P> {
    /// Creates an audit; with `None` no URL is probed.
    pub fn new(prober: Option<P>) -> Self {
        Self {
            prober,
            software: None,
        }
    }

    /// Only audits files holding records of `software`.
    pub fn only(mut self, software: PortalType) -> Self {
        self.software = Some(software);
        self
    }

    /// Audits every file below `root`, in path order.
    ///
    /// # Errors
    ///
    /// Fails on filesystem errors, on a write error on `out`, and on the
    /// first malformed record.
    pub async fn audit_directory<W, R>(
        &self,
        root: &Path,
        out: &mut W,
        reporter: &R,
    ) -> Result<AuditSummary, AppError>
    where
        W: AsyncWrite + Unpin + Send,
        R: ProgressReporter,
    {
        let mut summary = AuditSummary::default();

        for path in collect_files(root).await? {
            let bytes = tokio::fs::read(&path).await?;
            let (software, records) = match classify(&bytes, in_pages_dir(root, &path)) {
                Some(classified) => classified,
                None => {
                    tracing::warn!(path = %path.display(), "Skipping undecodable file");
                    summary.undecodable_files += 1;
                    continue;
                }
            };
            if self.software.is_some_and(|wanted| wanted != software) {
                continue;
            }

            summary.files += 1;
            for record in &records {
                self.audit_record(record, software, &path, out, reporter, &mut summary)
                    .await?;
            }
        }

        out.flush().await?;
        tracing::info!(
            files = summary.files,
            records = summary.records,
            probed = summary.probed,
            alive = summary.alive,
            "Link audit complete"
        );
        Ok(summary)
    }

    async fn audit_record<W, R>(
        &self,
        record: &Value,
        software: PortalType,
        path: &Path,
        out: &mut W,
        reporter: &R,
        summary: &mut AuditSummary,
    ) -> Result<(), AppError>
    where
        W: AsyncWrite + Unpin + Send,
        R: ProgressReporter,
    {
        let link = resolve_link(record, software).map_err(|e| match e {
            AppError::MalformedRecord {
                software,
                identifier,
                reason,
            } => AppError::MalformedRecord {
                software,
                identifier,
                reason: format!("{} (in {})", reason, path.display()),
            },
            other => other,
        })?;

        summary.records += 1;
        if link.is_link {
            summary.links += 1;
        }

        let liveness = match (&self.prober, &link.url) {
            (Some(prober), Some(url)) => {
                let result = prober.probe(url).await;
                summary.probed += 1;
                if result.succeeded() {
                    reporter.report(HarvestEvent::ProbeSucceeded {
                        url,
                        status_code: result.status_code,
                    });
                } else {
                    summary.failed_probes += 1;
                    reporter.report(HarvestEvent::ProbeFailed { url });
                }
                if result.is_alive() {
                    summary.alive += 1;
                }
                Some(result)
            }
            _ => None,
        };

        let row = LinkRow {
            link: &link,
            source: path.display().to_string(),
            liveness: liveness.as_ref(),
        };
        let mut line = serde_json::to_vec(&row)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        Ok(())
    }
}

/// Decodes a cached file into the records it holds.
///
/// Files below the paged search directory must hold a page of views.
fn classify(bytes: &[u8], pages_only: bool) -> Option<(PortalType, Vec<Value>)> {
    match serde_json::from_slice::<Value>(bytes).ok()? {
        Value::Array(views) => Some((PortalType::Socrata, views)),
        record @ Value::Object(_) if !pages_only => Some((PortalType::Ckan, vec![record])),
        _ => None,
    }
}

/// True when `path` lies in the paged search directory, whether `root` is
/// the download directory or that directory itself.
fn in_pages_dir(root: &Path, path: &Path) -> bool {
    let pages_dir = Component::Normal(OsStr::new(SOCRATA_CACHE_DIR));
    root.components().next_back() == Some(pages_dir)
        || path
            .strip_prefix(root)
            .is_ok_and(|rel| rel.components().next() == Some(pages_dir))
}

/// Lists regular files below `root`, sorted, skipping partial writes.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && !cache::is_partial_file(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
