//!
//! This module implements the CLI interface for lawbot: command parsing, wiring the
//! loaded configuration into `lawbot-core`, and user-visible output.
//!
//! All synchronisation logic (sessions, fetching, the transform pipeline, publishing)
//! lives in the [`lawbot-core`] crate. This module is strictly CLI glue.
//!
//! ## Commands
//! - `sync`: full bot run (login, check, transform, publish) over explicit titles or
//!   the configured category
//! - `render`: read-only run; raw-fetches source pages without logging in, runs the
//!   pipeline and prints the result
//!
//! ## Exit status
//! [`run`] returns an error when the first login fails, when any title fails, or
//! when an interrupt cancelled the batch, so `main` exits non-zero. Titles skipped
//! because they are already up to date do not count as failures.
//!
//! [`lawbot-core`]: ../../lawbot-core/
use crate::load_config::{load_config, CliConfig};
use crate::wiki_client::HttpWikiClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lawbot_core::config::SyncOptions;
use lawbot_core::contract::WikiApi;
use lawbot_core::error::SyncError;
use lawbot_core::fetch::RevisionFetcher;
use lawbot_core::pipeline::TransformPipeline;
use lawbot_core::session::SessionManager;
use lawbot_core::synchronise::{run_batch, SyncOrchestrator, SyncOutcome, SyncReport};
use lawbot_core::title::TitleScheme;
use std::path::PathBuf;
use tokio::sync::watch;

/// CLI for lawbot: synchronise wiki source pages to their published pages.
#[derive(Parser)]
#[clap(
    name = "lawbot",
    version,
    about = "Transform raw legal-text source pages and publish them to their wiki pages"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Write logs to this file instead of stderr
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Only log errors
    #[clap(long, short, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    /// Log debug details
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise titles (default: every member of the configured category)
    Sync {
        /// Titles to synchronise, with or without the source suffix
        titles: Vec<String>,

        /// Run fetch, check and transform but do not publish
        #[clap(long)]
        dry_run: bool,

        /// Publish even when the destination is already up to date
        #[clap(long)]
        force: bool,

        /// Print the transformed text of every title to stdout
        #[clap(long)]
        stdout: bool,

        /// Write the transformed text to a file (reserved, not implemented)
        #[clap(long)]
        output_file: Option<PathBuf>,
    },
    /// Fetch raw source text without logging in, transform it and print it
    Render {
        /// Titles to render (default: every member of the configured category)
        titles: Vec<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config(&cli.config)?;
    let api = HttpWikiClient::new(config.host()?).context("failed to set up the wiki client")?;

    match cli.command {
        Commands::Sync {
            titles,
            dry_run,
            force,
            stdout,
            output_file,
        } => {
            if let Some(path) = output_file {
                tracing::warn!(
                    path = %path.display(),
                    "--output-file is not implemented yet, ignoring"
                );
            }
            let options = SyncOptions {
                force,
                dry_run,
                keep_rendered: stdout,
            };
            let session = match config.credentials() {
                Some(credentials) => SessionManager::new(api, credentials),
                None => SessionManager::anonymous(api),
            };

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, no new titles will be started");
                    let _ = cancel_tx.send(true);
                }
            });

            tracing::info!(command = "sync", dry_run, force, "Starting synchronisation process");
            let report = synchronise_titles(&session, &config, &titles, options, cancel_rx).await?;

            for title in &report.titles {
                if let Some(text) = &title.rendered {
                    println!("{text}");
                }
            }
            if !stdout {
                print_summary(&report);
            }

            check_report(&report)?;
            tracing::info!(command = "sync", "Synchronisation complete");
            Ok(())
        }
        Commands::Render { titles } => {
            let session = SessionManager::anonymous(api);
            let rendered = render_titles(&session, &config, &titles).await?;
            let mut failed = 0;
            for (title, result) in rendered {
                match result {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        failed += 1;
                        tracing::error!(title = %title, error = %e, "Render failed");
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} titles could not be rendered");
            }
            Ok(())
        }
    }
}

/// Builds the pipeline and orchestrator from `config` and runs one batch.
pub async fn synchronise_titles<A: WikiApi>(
    session: &SessionManager<A>,
    config: &CliConfig,
    titles: &[String],
    options: SyncOptions,
    cancel: watch::Receiver<bool>,
) -> Result<SyncReport> {
    let pipeline = TransformPipeline::new(config.pipeline.clone())?;
    let settings = &config.wiki.settings;
    let scheme = TitleScheme::new(settings.source_suffix.clone());

    session.connect().await.context("initial login failed")?;

    let titles = RevisionFetcher::new(session)
        .resolve_titles(titles, &settings.category)
        .await
        .context("could not resolve the titles to synchronise")?;

    let orchestrator =
        SyncOrchestrator::new(session, &pipeline, &scheme, &settings.category_marker, options);
    let report = run_batch(&orchestrator, titles, config.batch_settings(), cancel)
        .await
        .context("initial login failed")?;
    Ok(report)
}

/// Turns a finished batch into the command's result.
pub fn check_report(report: &SyncReport) -> Result<()> {
    let total = report.titles.len();
    if report.was_cancelled() {
        tracing::error!(
            command = "sync",
            failed = report.failed(),
            not_started = report.not_started(),
            "Synchronisation was cancelled"
        );
        anyhow::bail!(
            "batch cancelled: {} of {total} titles not started, {} failed",
            report.not_started(),
            report.failed()
        );
    }
    if report.has_failures() {
        tracing::error!(
            command = "sync",
            failed = report.failed(),
            "Synchronisation finished with failures"
        );
        anyhow::bail!("{} of {total} titles failed", report.failed());
    }
    Ok(())
}

/// Read-only variant: raw text of each source page through the pipeline.
pub async fn render_titles<A: WikiApi>(
    session: &SessionManager<A>,
    config: &CliConfig,
    titles: &[String],
) -> Result<Vec<(String, Result<String, SyncError>)>> {
    let pipeline = TransformPipeline::new(config.pipeline.clone())?;
    let settings = &config.wiki.settings;
    let scheme = TitleScheme::new(settings.source_suffix.clone());
    let fetcher = RevisionFetcher::new(session);

    let titles = fetcher
        .resolve_titles(titles, &settings.category)
        .await
        .context("could not resolve the titles to render")?;

    let mut rendered = Vec::with_capacity(titles.len());
    for title in titles {
        let pair = scheme.decompose(&title);
        tracing::info!(source = %pair.source, "Rendering source page");
        let result = match fetcher.raw_text(&pair.source).await {
            Ok(text) => pipeline.run(&text).await.map_err(SyncError::from),
            Err(e) => Err(SyncError::from(e)),
        };
        rendered.push((title, result));
    }
    Ok(rendered)
}

fn print_summary(report: &SyncReport) {
    println!("Synchronise complete.");
    for title in &report.titles {
        let status = match &title.outcome {
            SyncOutcome::Published(receipt) => match receipt.new_revision_id {
                Some(id) => format!("published (revision {id})"),
                None => "published".to_string(),
            },
            SyncOutcome::DryRun => "dry run".to_string(),
            SyncOutcome::Skipped(reason) => format!("skipped: {reason}"),
            SyncOutcome::Failed(e) => format!("FAILED: {e}"),
            SyncOutcome::NotStarted => "not started (cancelled)".to_string(),
        };
        println!("  {}: {status}", title.title);
    }
    println!(
        "{} done, {} skipped, {} failed, {} not started",
        report.done(),
        report.skipped(),
        report.failed(),
        report.not_started()
    );
}
