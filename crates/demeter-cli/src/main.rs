mod config;

use std::path::{Path, PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use demeter_client::{CachedHttpClient, HttpProber, PortalClientFactoryEnum};
use demeter_core::{
    AppError, AuditSummary, BatchHarvestSummary, HarvestConfig, HarvestService, HarvestStatus,
    HttpConfig, LinkAudit, PagedStatus, PortalEntry, PortalOutcome, PortalType, TracingReporter,
    load_portals_config,
};

use config::{Command, Config};

type Harvester = HarvestService<PortalClientFactoryEnum, CachedHttpClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current item...");
            signal_token.cancel();
        }
    });

    if let Err(e) = run(config, cancel_token).await {
        match e.downcast_ref::<AppError>() {
            Some(app_error) => error!("{}", app_error.user_message()),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let http_config = HttpConfig {
        request_timeout: config.request_timeout,
        ..HttpConfig::default()
    };

    match config.command {
        Command::Harvest {
            portal_url,
            portal,
            config: config_path,
            portal_type,
        } => {
            let harvest_config = HarvestConfig::default()
                .with_inter_request_delay(config.inter_request_delay)
                .with_probe_timeout(config.probe_timeout);
            let harvest_service = HarvestService::with_config(
                PortalClientFactoryEnum::with_http_config(http_config.clone()),
                CachedHttpClient::with_config(&http_config)?,
                harvest_config,
            );
            handle_harvest(
                &harvest_service,
                &config.directory,
                portal_url,
                portal_type,
                portal,
                config_path,
                cancel_token,
            )
            .await?;
        }
        Command::Links {
            software,
            check,
            output,
        } => {
            let prober = if check {
                Some(HttpProber::with_config(config.probe_timeout, &http_config)?)
            } else {
                None
            };
            let mut audit = LinkAudit::new(prober);
            if let Some(software) = software {
                audit = audit.only(software);
            }
            handle_links(&audit, &config.directory, &output).await?;
        }
    }

    Ok(())
}

/// Handle the harvest command with its three modes:
/// 1. Direct URL (CKAN unless `--type socrata`)
/// 2. Named portal from config
/// 3. Batch mode (all enabled portals)
async fn handle_harvest(
    harvest_service: &Harvester,
    directory: &Path,
    portal_url: Option<String>,
    portal_type: PortalType,
    portal_name: Option<String>,
    config_path: Option<PathBuf>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    let reporter = TracingReporter;

    match (portal_url, portal_name) {
        // Mode 1: Direct URL
        (Some(url), None) => {
            info!("Harvesting {} portal: {}", portal_type, url);
            let outcome = harvest_service
                .harvest_portal(&url, portal_type, directory, &reporter, cancel_token)
                .await?;
            print_single_portal_summary(&url, &outcome);
        }

        // Mode 2: Named portal from config
        (None, Some(name)) => {
            let portals_config = load_portals_config(config_path)?.ok_or_else(|| {
                anyhow::anyhow!(
                    "No configuration file found. Create ~/.config/demeter/portals.toml or use --config"
                )
            })?;

            let portal = portals_config
                .find_by_name(&name)
                .ok_or_else(|| anyhow::anyhow!("Portal '{}' not found in configuration", name))?;

            if !portal.enabled {
                info!(
                    "Note: Portal '{}' is marked as disabled in configuration",
                    name
                );
            }

            info!("Harvesting {} portal: {}", portal.portal_type, portal.url);
            let outcome = harvest_service
                .harvest_portal(
                    &portal.url,
                    portal.portal_type,
                    directory,
                    &reporter,
                    cancel_token,
                )
                .await?;
            print_single_portal_summary(&portal.url, &outcome);
        }

        // Mode 3: Batch mode (all enabled portals)
        (None, None) => {
            let portals_config = load_portals_config(config_path)?.ok_or_else(|| {
                anyhow::anyhow!(
                    "No configuration file found. Create ~/.config/demeter/portals.toml or use --config"
                )
            })?;

            let enabled: Vec<&PortalEntry> = portals_config.enabled_portals();

            if enabled.is_empty() {
                info!("No enabled portals found in configuration.");
                info!("Add portals to ~/.config/demeter/portals.toml or use: demeter harvest <url>");
                return Ok(());
            }

            info!("═══════════════════════════════════════════════════════");
            info!("Starting batch harvest of {} portals", enabled.len());
            info!("═══════════════════════════════════════════════════════");

            let summary = harvest_service
                .batch_harvest_cancellable(&enabled, directory, &reporter, cancel_token)
                .await?;

            print_batch_summary(&summary);
        }

        // This case is prevented by clap's conflicts_with
        (Some(_), Some(_)) => unreachable!("portal_url and portal are mutually exclusive"),
    }

    Ok(())
}

/// One-line description of how a portal run ended.
fn describe_outcome(outcome: &PortalOutcome) -> String {
    match outcome {
        PortalOutcome::Harvest(report) => match &report.status {
            HarvestStatus::Completed => "completed".to_string(),
            HarvestStatus::Cancelled => "cancelled".to_string(),
            HarvestStatus::Aborted { kind, reason } => format!("{}: {}", kind, reason),
        },
        PortalOutcome::Paged(report) => match &report.status {
            PagedStatus::Exhausted { last_page } => format!("exhausted at page {}", last_page),
            PagedStatus::Cancelled => "cancelled".to_string(),
            PagedStatus::Failed { kind, url } => format!("{}: {}", kind, url),
        },
    }
}

/// Print a summary of batch harvesting results.
fn print_batch_summary(summary: &BatchHarvestSummary) {
    info!("");
    info!("═══════════════════════════════════════════════════════");
    info!("BATCH HARVEST COMPLETE");
    info!("═══════════════════════════════════════════════════════");
    info!("  Portals processed:   {}", summary.total_portals());
    info!("  Successful:          {}", summary.successful_count());
    info!("  Failed:              {}", summary.failed_count());
    info!("  Total datasets:      {}", summary.total_datasets());

    if summary.failed_count() > 0 {
        info!("───────────────────────────────────────────────────────");
        info!("Failed portals:");
        for result in summary
            .results
            .iter()
            .filter(|r| !r.outcome.is_success() && !r.outcome.is_cancelled())
        {
            error!(
                "  - {}: {}",
                result.portal_name,
                describe_outcome(&result.outcome)
            );
        }
    }
    info!("═══════════════════════════════════════════════════════");
}

/// Print a summary for single portal harvest (modes 1 and 2).
fn print_single_portal_summary(portal_url: &str, outcome: &PortalOutcome) {
    info!("");
    info!("═══════════════════════════════════════════════════════");
    info!("Harvest finished: {}", portal_url);
    info!("═══════════════════════════════════════════════════════");
    match outcome {
        PortalOutcome::Harvest(report) => {
            info!("  + Downloaded:        {}", report.stats.downloaded);
            info!("  = Already cached:    {}", report.stats.skipped);
            if report.stats.rejected > 0 {
                warn!("  ! Rejected ids:      {}", report.stats.rejected);
            }
        }
        PortalOutcome::Paged(report) => {
            info!("  Pages requested:     {}", report.pages_requested);
            info!("  Views seen:          {}", report.views_seen);
        }
    }
    info!("───────────────────────────────────────────────────────");
    info!("  Status:              {}", describe_outcome(outcome));
    info!("═══════════════════════════════════════════════════════");
}

async fn handle_links(
    audit: &LinkAudit<HttpProber>,
    directory: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    info!("Resolving links of cached records in {}", directory.display());

    let sink: Box<dyn AsyncWrite + Unpin + Send> = if output == Path::new("-") {
        Box::new(tokio::io::stdout())
    } else {
        Box::new(tokio::fs::File::create(output).await?)
    };
    let mut writer = BufWriter::new(sink);

    let summary = audit
        .audit_directory(directory, &mut writer, &TracingReporter)
        .await?;
    writer.flush().await?;

    print_audit_summary(&summary, output);
    Ok(())
}

fn print_audit_summary(summary: &AuditSummary, output: &Path) {
    info!("");
    info!("═══════════════════════════════════════════════════════");
    info!("LINK AUDIT COMPLETE");
    info!("═══════════════════════════════════════════════════════");
    info!("  Files read:          {}", summary.files);
    info!("  Records:             {}", summary.records);
    info!("  Links resolved:      {}", summary.links);
    if summary.undecodable_files > 0 {
        warn!("  Undecodable files:   {}", summary.undecodable_files);
    }
    if summary.probed > 0 {
        info!("───────────────────────────────────────────────────────");
        info!("  Probed:              {}", summary.probed);
        info!("  Alive:               {}", summary.alive);
        info!("  Transport failures:  {}", summary.failed_probes);
    }
    info!("───────────────────────────────────────────────────────");
    info!("  Output:              {}", output.display());
    info!("═══════════════════════════════════════════════════════");
}
