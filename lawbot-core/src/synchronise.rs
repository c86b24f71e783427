//! High-level pipeline: orchestrates fetch → check → transform → publish per title.
//!
//! This module provides the top-level orchestration logic for "synchronising" source
//! pages to their published destination pages:
//!   - Fetches the latest revision of the source page (title + suffix)
//!   - Unless forced, fetches the destination page and asks the idempotency gate
//!     whether the destination was already built from that revision
//!   - Runs the source text through the external [`TransformPipeline`]
//!   - Publishes the result with a provenance-tagged summary (skipped in dry-run)
//!
//! # Major Types
//! - [`SyncOrchestrator`]: drives one title through the state machine
//! - [`SyncOutcome`] / [`TitleReport`]: what happened to one title
//! - [`SyncReport`]: per-title reports of a whole batch, in input order
//!
//! # Error Handling
//! Errors never escape a title: they become [`SyncOutcome::Failed`] and the batch
//! moves on. The one exception is the initial login in [`run_batch`]; without a
//! session no title can make progress, so a rejected login aborts the batch.
//!
//! # Concurrency
//! [`run_batch`] runs up to `concurrency` titles at a time over one shared
//! [`SessionManager`]. Titles start in input order and each report is stored in
//! its input slot as soon as the title finishes, so a slow title never holds back
//! the outcome of a faster one. Cancellation stops new titles from starting
//! ([`SyncOutcome::NotStarted`]); titles in flight get a grace period, after which
//! their futures are dropped, their stage processes killed, and they are reported
//! as failed with [`SyncError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{BatchSettings, SyncOptions};
use crate::contract::{PublishReceipt, WikiApi};
use crate::error::{AuthError, SyncError};
use crate::fetch::RevisionFetcher;
use crate::gate::{should_sync, SkipDecision};
use crate::pipeline::TransformPipeline;
use crate::publish::Publisher;
use crate::session::SessionManager;
use crate::title::{TitlePair, TitleScheme};

/// States a title passes through. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    FetchSource,
    CheckDestination,
    Transform,
    Publish,
    Done,
    Skipped,
    Failed,
    NotStarted,
}

/// Terminal result for one title.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Done: the destination page was edited.
    Published(PublishReceipt),
    /// Done: everything ran except the publish call.
    DryRun,
    Skipped(String),
    Failed(SyncError),
    /// The batch was cancelled before this title started.
    NotStarted,
}

impl SyncOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, SyncOutcome::Published(_) | SyncOutcome::DryRun)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }

    pub fn state(&self) -> SyncState {
        match self {
            SyncOutcome::Published(_) | SyncOutcome::DryRun => SyncState::Done,
            SyncOutcome::Skipped(_) => SyncState::Skipped,
            SyncOutcome::Failed(_) => SyncState::Failed,
            SyncOutcome::NotStarted => SyncState::NotStarted,
        }
    }
}

#[derive(Debug)]
pub struct TitleReport {
    /// The title as it was requested.
    pub title: String,
    pub pair: Option<TitlePair>,
    pub outcome: SyncOutcome,
    /// Transformed text, when the options ask to keep it.
    pub rendered: Option<String>,
}

impl TitleReport {
    fn without_work(title: String, outcome: SyncOutcome) -> Self {
        Self {
            title,
            pair: None,
            outcome,
            rendered: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub titles: Vec<TitleReport>,
}

impl SyncReport {
    pub fn done(&self) -> usize {
        self.titles.iter().filter(|t| t.outcome.is_done()).count()
    }

    pub fn skipped(&self) -> usize {
        self.titles
            .iter()
            .filter(|t| matches!(t.outcome, SyncOutcome::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.titles.iter().filter(|t| t.outcome.is_failed()).count()
    }

    pub fn not_started(&self) -> usize {
        self.titles
            .iter()
            .filter(|t| matches!(t.outcome, SyncOutcome::NotStarted))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// True when the batch was cancelled before every title ran.
    pub fn was_cancelled(&self) -> bool {
        self.not_started() > 0
            || self
                .titles
                .iter()
                .any(|t| matches!(t.outcome, SyncOutcome::Failed(SyncError::Cancelled)))
    }
}

/// Runs single titles through fetch → check → transform → publish.
pub struct SyncOrchestrator<'a, A> {
    session: &'a SessionManager<A>,
    fetcher: RevisionFetcher<'a, A>,
    publisher: Publisher<'a, A>,
    pipeline: &'a TransformPipeline,
    scheme: &'a TitleScheme,
    options: SyncOptions,
}

impl<'a, A: WikiApi> SyncOrchestrator<'a, A> {
    pub fn new(
        session: &'a SessionManager<A>,
        pipeline: &'a TransformPipeline,
        scheme: &'a TitleScheme,
        category_marker: &str,
        options: SyncOptions,
    ) -> Self {
        Self {
            session,
            fetcher: RevisionFetcher::new(session),
            publisher: Publisher::new(session, category_marker),
            pipeline,
            scheme,
            options,
        }
    }

    pub fn session(&self) -> &'a SessionManager<A> {
        self.session
    }

    pub fn fetcher(&self) -> &RevisionFetcher<'a, A> {
        &self.fetcher
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Synchronises one title. Never fails; errors are part of the report.
    pub async fn sync_title(&self, title: &str) -> TitleReport {
        let pair = self.scheme.decompose(title);
        let mut rendered = None;
        let span = info_span!("sync", title = %pair.destination);

        let outcome = match self.run(&pair, &mut rendered).instrument(span.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::Failed(e),
        };

        span.in_scope(|| match &outcome {
            SyncOutcome::Failed(e) => {
                error!(state = ?SyncState::Failed, error = %e, "[SYNC][ERROR] Title failed")
            }
            SyncOutcome::Skipped(reason) => {
                info!(state = ?SyncState::Skipped, reason = %reason, "[SYNC] Title skipped")
            }
            done => info!(state = ?SyncState::Done, outcome = ?done, "[SYNC] Title done"),
        });

        TitleReport {
            title: title.to_string(),
            pair: Some(pair),
            outcome,
            rendered,
        }
    }

    async fn run(
        &self,
        pair: &TitlePair,
        rendered: &mut Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        self.session.connect().await?;

        info!(
            state = ?SyncState::FetchSource,
            source = %pair.source,
            "[SYNC] Fetching source revision"
        );
        let source = self.fetcher.latest_revision(&pair.source).await?;

        let decision = if self.options.force {
            info!(state = ?SyncState::CheckDestination, "[SYNC] Forced, not checking destination");
            should_sync(&source, None, true)
        } else {
            info!(
                state = ?SyncState::CheckDestination,
                destination = %pair.destination,
                "[SYNC] Checking destination"
            );
            let destination = self.fetcher.destination_revision(&pair.destination).await?;
            should_sync(&source, destination.as_ref(), false)
        };
        if let SkipDecision::Skip(reason) = decision {
            return Ok(SyncOutcome::Skipped(reason));
        }

        info!(
            state = ?SyncState::Transform,
            revision_id = source.revision_id,
            "[SYNC] Transforming source text"
        );
        let text = self.pipeline.run(&source.content).await?;
        if self.options.keep_rendered {
            *rendered = Some(text.clone());
        }

        if self.options.dry_run {
            info!(state = ?SyncState::Publish, "[SYNC] Dry run, not publishing");
            return Ok(SyncOutcome::DryRun);
        }

        info!(state = ?SyncState::Publish, "[SYNC] Publishing");
        let receipt = self
            .publisher
            .publish(&pair.destination, &text, &source)
            .await?;
        Ok(SyncOutcome::Published(receipt))
    }
}

/// Logs in once, then synchronises every title.
///
/// Returns `Err` only when the initial login fails; per-title failures are in the report.
pub async fn run_batch<A: WikiApi>(
    orchestrator: &SyncOrchestrator<'_, A>,
    titles: Vec<String>,
    settings: BatchSettings,
    cancel: watch::Receiver<bool>,
) -> Result<SyncReport, AuthError> {
    if let Err(e) = orchestrator.session().connect().await {
        error!(error = %e, "[SYNC][ERROR] Initial login failed, aborting batch");
        return Err(e);
    }

    let total = titles.len();
    let concurrency = settings.concurrency.max(1);
    info!(titles = total, concurrency, "[SYNC] Starting batch");

    let started: Vec<AtomicBool> = (0..total).map(|_| AtomicBool::new(false)).collect();
    let mut slots: Vec<Option<TitleReport>> = (0..total).map(|_| None).collect();

    {
        let work = stream::iter(titles.iter().cloned().enumerate())
            .map(|(index, title)| {
                let cancel = cancel.clone();
                let started = &started;
                async move {
                    if *cancel.borrow() {
                        return None;
                    }
                    started[index].store(true, Ordering::SeqCst);
                    Some((index, orchestrator.sync_title(&title).await))
                }
            })
            .buffer_unordered(concurrency);
        let mut work = std::pin::pin!(work);

        let drain = async {
            while let Some(finished) = work.next().await {
                if let Some((index, report)) = finished {
                    slots[index] = Some(report);
                }
            }
        };
        let deadline = async {
            cancelled(cancel.clone()).await;
            warn!(
                grace_secs = settings.grace_period.as_secs_f64(),
                "[SYNC] Batch cancelled, waiting for titles in flight"
            );
            tokio::time::sleep(settings.grace_period).await;
        };

        tokio::select! {
            _ = drain => {}
            _ = deadline => {
                warn!("[SYNC] Grace period elapsed, abandoning titles in flight");
            }
        }
    }

    // An empty slot was either abandoned in flight or never started.
    let reports = titles
        .into_iter()
        .zip(slots)
        .zip(&started)
        .map(|((title, slot), started)| match slot {
            Some(report) => report,
            None if started.load(Ordering::SeqCst) => {
                TitleReport::without_work(title, SyncOutcome::Failed(SyncError::Cancelled))
            }
            None => TitleReport::without_work(title, SyncOutcome::NotStarted),
        })
        .collect();

    let report = SyncReport { titles: reports };
    info!(
        done = report.done(),
        skipped = report.skipped(),
        failed = report.failed(),
        not_started = report.not_started(),
        "[SYNC] Batch finished"
    );
    Ok(report)
}

async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone without cancelling: never fires.
            std::future::pending::<()>().await;
        }
    }
}
