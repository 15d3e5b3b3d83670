//! On-disk cache layout.
//!
//! Cache files are keyed by URL with the protocol removed:
//!
//! - CKAN records: `<directory>/<portal without protocol>/<dataset id>`
//! - Socrata pages: `<cache dir>/<page url without protocol>`
//!
//! A file that exists is a completed download. Writes go through a hidden
//! `.<name>.partial` sibling that is renamed into place once fully written, so
//! an interrupted run never leaves a truncated file under the final name.

use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

const PARTIAL_SUFFIX: &str = ".partial";

/// Removes a leading `http://` or `https://` from `url`.
///
/// ```
/// use demeter_core::cache::strip_protocol;
///
/// assert_eq!(strip_protocol("https://demo.ckan.org"), "demo.ckan.org");
/// assert_eq!(strip_protocol("ftp://example.com"), "ftp://example.com");
/// ```
pub fn strip_protocol(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

/// Directory holding all records of one CKAN portal.
pub fn portal_dir(directory: &Path, portal_url: &str) -> PathBuf {
    directory.join(strip_protocol(portal_url))
}

/// Cache path of one CKAN record.
///
/// Returns `None` unless `identifier` is a single plain file name: empty
/// names, `.`, `..`, separators and absolute paths would resolve outside the
/// portal directory.
pub fn dataset_path(directory: &Path, portal_url: &str, identifier: &str) -> Option<PathBuf> {
    let mut components = Path::new(identifier).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name.to_str() == Some(identifier) => {
            Some(portal_dir(directory, portal_url).join(name))
        }
        _ => None,
    }
}

/// Cache path of a fetched URL (Socrata pages and any other cached GET).
pub fn page_cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    cache_dir.join(strip_protocol(url))
}

/// Returns true for the temporary files written by [`write_atomic`].
pub fn is_partial_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(PARTIAL_SUFFIX))
}

/// Returns true when a completed cache file exists at `path`.
pub async fn is_cached(path: &Path) -> Result<bool, AppError> {
    Ok(tokio::fs::try_exists(path).await?)
}

/// Writes `bytes` to `path` through a temporary sibling and a rename.
///
/// Missing parent directories are created.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let parent = path.parent().ok_or_else(|| {
        AppError::Generic(format!("Cache path has no parent: {}", path.display()))
    })?;
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        AppError::Generic(format!("Cache path has no file name: {}", path.display()))
    })?;

    tokio::fs::create_dir_all(parent).await?;

    let partial = parent.join(format!(".{}{}", file_name, PARTIAL_SUFFIX));
    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await?;
    Ok(())
}

/// Removes a cache file; a file that is already gone is not an error.
pub async fn discard(path: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
