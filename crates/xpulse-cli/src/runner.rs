//! Shared orchestration for fetch runs: one [`BatchController`] run per
//! stored request, with one unit of work per subject.

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xpulse_batch::{BatchConfig, BatchController, ProgressObserver, RunReport, WorkError};
use xpulse_core::{BatchProgress, RequestCounters, RequestStatus, RequestStore};
use xpulse_fetcher::{fetch_subject_results, ContentApiClient, SearchFilters, Subject};

/// What to fetch for every subject of a run.
pub(crate) struct FetchOptions {
    pub max_items: usize,
    pub filters: SearchFilters,
    pub cancel: CancellationToken,
}

/// Prints one line per finished chunk to stderr.
pub(crate) struct ConsoleObserver {
    label: String,
}

impl ConsoleObserver {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        let s = &progress.stats;
        eprintln!(
            "{}: batch {}/{} done ({} ok, {} failed)",
            self.label, s.completed_batches, s.total_batches, s.success_count, s.failure_count
        );
    }
}

/// Fetches every subject into `request_id`, driving the request's status
/// through a full run.
///
/// # Errors
///
/// Returns the run's error when it ends `failed` (credential rejected,
/// store unavailable, cancelled). Per-subject failures are reported in the
/// returned [`RunReport`] instead.
pub(crate) async fn fetch_into_request<S: RequestStore>(
    store: &S,
    client: &ContentApiClient,
    request_id: Uuid,
    subjects: &[Subject],
    options: &FetchOptions,
    batch: BatchConfig,
    counters: RequestCounters,
) -> anyhow::Result<RunReport<Subject, usize>> {
    let mut controller = BatchController::new(batch, ConsoleObserver::new(request_id.to_string()))
        .bind(store, request_id)
        .with_counters(counters)
        .with_cancellation(options.cancel.clone());

    let report = controller
        .run(subjects, |subject| {
            fetch_subject_into(store, client, request_id, subject, options)
        })
        .await?;
    Ok(report)
}

/// Unit of work: fetch one subject and store what arrived.
///
/// Items yielded before a fetch error are still stored. Errors that would
/// recur for every subject, and store failures, abort the run.
async fn fetch_subject_into<S: RequestStore>(
    store: &S,
    client: &ContentApiClient,
    request_id: Uuid,
    subject: Subject,
    options: &FetchOptions,
) -> Result<usize, WorkError> {
    let label = subject.to_string();
    let mut fetch = fetch_subject_results(client, subject, options.max_items, options.filters.clone())
        .with_cancellation(options.cancel.clone());

    let mut items = Vec::new();
    let mut failure = None;
    while let Some(next) = fetch.next().await {
        match next {
            Ok(item) => items.push(item),
            Err(e) => failure = Some(e),
        }
    }

    let stored = store
        .upsert_items(request_id, &items)
        .await
        .map_err(|e| WorkError::fatal(format!("failed to store items for {label}: {e}")))?;

    match failure {
        Some(e) if e.is_fatal() => Err(WorkError::fatal(format!("{label}: {e}"))),
        Some(e) => Err(WorkError::item(format!("{label}: {e}"))),
        None => {
            tracing::info!(subject = %label, items = stored, "subject fetched");
            Ok(stored)
        }
    }
}

/// Prints the outcome of one run.
pub(crate) fn print_run_summary(request_id: Uuid, report: &RunReport<Subject, usize>) {
    let stats = &report.progress.stats;
    let items: usize = report.results.iter().sum();
    println!(
        "request {request_id}: {} of {} subjects fetched, {items} items in {} ms",
        stats.success_count, stats.total_processed, stats.processing_time_ms
    );
    for failure in &report.failures {
        println!("  failed: {}", failure.error);
    }
}

/// Marks a request that never finished its run as `failed`.
///
/// Requests already in a terminal state keep their status, so a controller's
/// own failure record is not overwritten. Store errors are logged only.
pub(crate) async fn fail_request_best_effort<S: RequestStore>(
    store: &S,
    request_id: Uuid,
    message: &str,
) {
    match store.get(request_id).await {
        Ok(Some(request)) if request.status.state().is_terminal() => return,
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "could not read request before failing it");
        }
    }

    let mut progress = BatchProgress::queued();
    if progress.fail(message, Utc::now()).is_err() {
        return;
    }
    let status = RequestStatus::from_progress(&progress, &[], RequestCounters::default());
    if let Err(e) = store.update_status(request_id, &status).await {
        tracing::error!(%request_id, error = %e, "failed to mark request as failed");
    }
}

/// Status tracking for runs that are not driven by a [`BatchController`]:
/// a keyword search, or the parent of a mixed upload.
///
/// Follows the same write rules as the controller. The start write is
/// mandatory, progress writes are best-effort, and a failure is recorded
/// best-effort before the caller returns its error.
pub(crate) struct TrackedRun<'s, S> {
    store: &'s S,
    request_id: Uuid,
    progress: BatchProgress,
    errors: Vec<String>,
    started: Instant,
}

impl<'s, S: RequestStore> TrackedRun<'s, S> {
    /// Moves the request to `processing` with `total_batches` expected steps.
    pub(crate) async fn start(
        store: &'s S,
        request_id: Uuid,
        total_batches: usize,
    ) -> anyhow::Result<Self> {
        let mut progress = BatchProgress::queued();
        progress.start(Uuid::new_v4(), total_batches, Utc::now())?;
        let status = RequestStatus::from_progress(&progress, &[], RequestCounters::default());
        store.update_status(request_id, &status).await?;
        Ok(Self {
            store,
            request_id,
            progress,
            errors: Vec::new(),
            started: Instant::now(),
        })
    }

    pub(crate) fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    /// Folds one finished step into the stats and persists them.
    pub(crate) async fn record(&mut self, successes: usize, errors: Vec<String>) {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.progress
            .stats
            .record_chunk(successes, errors.len(), elapsed_ms);
        self.errors.extend(errors);

        let status =
            RequestStatus::from_progress(&self.progress, &self.errors, RequestCounters::default());
        if let Err(e) = self.store.update_status(self.request_id, &status).await {
            tracing::warn!(request_id = %self.request_id, error = %e, "failed to persist progress");
        }
    }

    /// Writes the final `completed` status.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the run is then marked failed.
    pub(crate) async fn complete(mut self, counters: RequestCounters) -> anyhow::Result<BatchProgress> {
        let mut completed = self.progress.clone();
        completed.complete(Utc::now())?;
        let status = RequestStatus::from_progress(&completed, &self.errors, counters);
        if let Err(e) = self.store.update_status(self.request_id, &status).await {
            let message = format!("failed to record completion: {e}");
            self.fail(&message).await;
            anyhow::bail!(message);
        }
        self.progress = completed;
        Ok(self.progress)
    }

    /// Marks the run failed and writes it best-effort.
    pub(crate) async fn fail(&mut self, message: &str) {
        if self.progress.fail(message, Utc::now()).is_err() {
            return;
        }
        let status =
            RequestStatus::from_progress(&self.progress, &self.errors, RequestCounters::default());
        if let Err(e) = self.store.update_status(self.request_id, &status).await {
            tracing::error!(
                request_id = %self.request_id,
                error = %e,
                "failed to mark request as failed"
            );
        }
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
