//! Configuration types for Demeter components.
//!
//! Two layers are covered here:
//!
//! - runtime settings ([`HarvestConfig`], [`HttpConfig`]) with defaults that
//!   match the classic harvester behaviour and builder-style overrides;
//! - the `portals.toml` catalogue ([`PortalsConfig`]) used for batch runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Pause between two successful record downloads from the same portal.
pub const DEFAULT_INTER_REQUEST_DELAY: Duration = Duration::from_secs(3);

/// Timeout applied to each liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Harvest and link-check settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestConfig {
    /// Politeness delay after every record written to disk.
    pub inter_request_delay: Duration,
    /// Timeout for a single HEAD probe, redirects included.
    pub probe_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            inter_request_delay: DEFAULT_INTER_REQUEST_DELAY,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl HarvestConfig {
    /// Overrides the politeness delay.
    pub fn with_inter_request_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = delay;
        self
    }

    /// Overrides the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// HTTP client configuration for portal API calls.
///
/// Listing, record and page requests carry no timeout unless one is set
/// here; a slow portal blocks the run rather than being skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout: Option<Duration>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Demeter/{} (open-data-harvester)", env!("CARGO_PKG_VERSION")),
            request_timeout: None,
        }
    }
}

// =============================================================================
// Portal Configuration (portals.toml)
// =============================================================================

/// Portal software, which decides the harvest strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalType {
    /// CKAN portal: listed with `package_list`, fetched record by record.
    #[default]
    Ckan,
    /// Socrata portal: harvested page by page from `/api/views`.
    Socrata,
}

impl PortalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ckan => "ckan",
            Self::Socrata => "socrata",
        }
    }
}

impl fmt::Display for PortalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortalType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ckan" => Ok(Self::Ckan),
            "socrata" => Ok(Self::Socrata),
            _ => Err(AppError::ConfigError(format!(
                "Unknown portal type: '{}'. Valid options: ckan, socrata",
                s
            ))),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Root structure of `portals.toml`.
///
/// ```toml
/// [[portals]]
/// name = "ckan-demo"
/// url = "https://demo.ckan.org"
/// type = "ckan"
///
/// [[portals]]
/// name = "nyc"
/// url = "https://data.cityofnewyork.us"
/// type = "socrata"
/// enabled = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalsConfig {
    pub portals: Vec<PortalEntry>,
}

impl PortalsConfig {
    /// Returns only enabled portals, in file order.
    pub fn enabled_portals(&self) -> Vec<&PortalEntry> {
        self.portals.iter().filter(|p| p.enabled).collect()
    }

    /// Finds a portal by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&PortalEntry> {
        self.portals
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// A single portal entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalEntry {
    /// Human-readable name, used for `--portal <name>` lookup.
    pub name: String,

    /// Portal root URL, e.g. "<https://demo.ckan.org>".
    pub url: String,

    /// Portal software. Defaults to `ckan`.
    #[serde(rename = "type", default)]
    pub portal_type: PortalType,

    /// Whether batch runs include this portal. Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub description: Option<String>,
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "portals.toml";

/// Returns the default configuration directory: `~/.config/demeter/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("demeter"))
}

/// Returns the default configuration file path: `~/.config/demeter/portals.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Demeter Portal Configuration
#
# Usage:
#   demeter harvest                  # Harvest all enabled portals
#   demeter harvest --portal nyc     # Harvest one portal by name
#   demeter harvest https://...      # Harvest a single URL (ignores this file)
#
# type is "ckan" (default) or "socrata".
# Set enabled = false to skip a portal during batch harvest.

[[portals]]
name = "ckan-demo"
url = "https://demo.ckan.org"
type = "ckan"
description = "CKAN demo instance"

[[portals]]
name = "nyc"
url = "https://data.cityofnewyork.us"
type = "socrata"
description = "NYC Open Data"
enabled = false
"#;

/// Loads portal configuration from a TOML file.
///
/// # Returns
/// * `Ok(Some(config))` - configuration loaded
/// * `Ok(None)` - no default path available, or the template could not be written
/// * `Err(e)` - a custom path is missing, or the file is unreadable or invalid
///
/// When the default path does not exist yet, a template is written there and
/// then read back.
pub fn load_portals_config(path: Option<PathBuf>) -> Result<Option<PortalsConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if !using_default_path {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        if let Err(e) = create_default_config(&config_path) {
            tracing::warn!("Could not create default config template: {}", e);
            return Ok(None);
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: PortalsConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(config))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
