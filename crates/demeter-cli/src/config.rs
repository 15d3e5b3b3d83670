use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use demeter_core::PortalType;

/// Parses a number of seconds (fractions allowed) into a `Duration`.
pub fn parse_secs(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{}': {}", value, e))
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "demeter")]
#[command(
    author,
    version,
    about = "Incremental metadata harvester and link checker for open data portals"
)]
#[command(after_help = "Examples:
  demeter harvest https://demo.ckan.org
  demeter harvest https://data.cityofnewyork.us --type socrata
  demeter links --check --output links.jsonl")]
pub struct Config {
    /// Root directory of the download cache
    #[arg(long, env = "DEMETER_DOWNLOAD_DIR", default_value = "downloads", global = true)]
    pub directory: PathBuf,

    /// Seconds to wait after each downloaded record
    #[arg(
        long = "delay-secs",
        env = "DEMETER_INTER_REQUEST_DELAY",
        default_value = "3",
        value_parser = parse_secs,
        global = true
    )]
    pub inter_request_delay: Duration,

    /// Timeout in seconds for each liveness probe
    #[arg(
        long = "probe-timeout-secs",
        env = "DEMETER_PROBE_TIMEOUT",
        default_value = "2",
        value_parser = parse_secs,
        global = true
    )]
    pub probe_timeout: Duration,

    /// Timeout in seconds for portal API requests (none by default)
    #[arg(
        long = "request-timeout-secs",
        env = "DEMETER_REQUEST_TIMEOUT",
        value_parser = parse_secs,
        global = true
    )]
    pub request_timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download dataset metadata from CKAN and Socrata portals
    #[command(after_help = "Examples:
  demeter harvest                                    # Harvest all enabled portals from config
  demeter harvest https://demo.ckan.org              # Harvest a single CKAN portal
  demeter harvest https://data.ny.gov --type socrata # Harvest a single Socrata portal
  demeter harvest --portal nyc                       # Harvest portal by name from config
  demeter harvest --config ~/custom.toml             # Use custom config file")]
    Harvest {
        /// URL of a single portal to harvest
        #[arg(value_name = "URL")]
        portal_url: Option<String>,

        /// Harvest a specific portal by name from config file
        #[arg(short, long, value_name = "NAME", conflicts_with = "portal_url")]
        portal: Option<String>,

        /// Custom path to portals.toml configuration file
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Software of the portal given as URL: ckan or socrata
        #[arg(long = "type", value_name = "TYPE", default_value = "ckan", requires = "portal_url")]
        portal_type: PortalType,
    },
    /// Resolve (and optionally probe) the links of every cached record
    #[command(after_help = "Examples:
  demeter links                          # Write link descriptors to links.jsonl
  demeter links --check                  # Also send a HEAD request to every link
  demeter links --software socrata -o -  # Socrata records only, to stdout")]
    Links {
        /// Only audit records of this software: ckan or socrata
        #[arg(long, value_name = "TYPE")]
        software: Option<PortalType>,

        /// Probe every resolved URL with a HEAD request
        #[arg(long)]
        check: bool,

        /// Output file for JSON lines, or "-" for stdout
        #[arg(short, long, value_name = "PATH", default_value = "links.jsonl")]
        output: PathBuf,
    },
}
