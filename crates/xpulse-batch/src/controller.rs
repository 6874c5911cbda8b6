//! One end-to-end batch run.

use std::future::Future;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use xpulse_core::{BatchProgress, RequestCounters, RequestStatus, RequestStore};

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::observer::ProgressObserver;
use crate::processor::{create_batches, pause, process_batch, ItemFailure, WorkError};

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport<T, R> {
    pub progress: BatchProgress,
    pub results: Vec<R>,
    pub failures: Vec<ItemFailure<T>>,
    /// Failure messages in the order they were recorded.
    pub errors: Vec<String>,
}

/// Drives a run through `queued → processing → (completed | failed)`.
///
/// When bound to a store the status blob of the bound request is written at
/// start, after every chunk, and at the end. The start write must succeed;
/// later progress writes and the failure write are best-effort.
pub struct BatchController<'a, S, O> {
    config: BatchConfig,
    observer: O,
    binding: Option<(&'a S, Uuid)>,
    cancel: CancellationToken,
    counters: RequestCounters,
    progress: BatchProgress,
}

impl<'a, S, O> BatchController<'a, S, O>
where
    S: RequestStore,
    O: ProgressObserver,
{
    pub fn new(config: BatchConfig, observer: O) -> Self {
        Self {
            config,
            observer,
            binding: None,
            cancel: CancellationToken::new(),
            counters: RequestCounters::default(),
            progress: BatchProgress::queued(),
        }
    }

    /// Mirrors the run into `store` under `request_id`.
    #[must_use]
    pub fn bind(mut self, store: &'a S, request_id: Uuid) -> Self {
        self.binding = Some((store, request_id));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Counters reported with the final status. When bound, `items_fetched`
    /// is replaced by the store's item count at completion.
    #[must_use]
    pub fn with_counters(mut self, counters: RequestCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    /// Runs `unit` over `items` chunk by chunk.
    ///
    /// Per-item failures are collected and do not fail the run.
    ///
    /// # Errors
    ///
    /// - [`BatchError::InvalidTransition`] if this controller already ran.
    /// - [`BatchError::Store`] if the bound store rejects the start or
    ///   completion write.
    /// - [`BatchError::Fatal`] / [`BatchError::Cancelled`] from the chunks.
    ///
    /// In every case but the first the run ends `failed` and the observer's
    /// `on_error` fires before the error is returned.
    pub async fn run<T, R, F, Fut>(
        &mut self,
        items: &[T],
        unit: F,
    ) -> Result<RunReport<T, R>, BatchError>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, WorkError>>,
    {
        let chunks = create_batches(items, &self.config);
        let run_id = Uuid::new_v4();
        self.progress.start(run_id, chunks.len(), Utc::now())?;
        let started = Instant::now();

        tracing::info!(
            %run_id,
            items = items.len(),
            chunks = chunks.len(),
            "batch run started"
        );

        let mut results: Vec<R> = Vec::with_capacity(items.len());
        let mut failures: Vec<ItemFailure<T>> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        if let Some((store, request_id)) = self.binding {
            let status = RequestStatus::from_progress(&self.progress, &errors, self.counters);
            if let Err(e) = store.update_status(request_id, &status).await {
                return Err(self.fail_run_best_effort(e.into(), &errors).await);
            }
        }

        let chunk_count = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            let outcome = match process_batch(chunk, &unit, &self.config, &self.cancel).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail_run_best_effort(e, &errors).await),
            };

            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.progress.stats.record_chunk(
                outcome.results.len(),
                outcome.failures.len(),
                elapsed_ms,
            );
            errors.extend(outcome.failures.iter().map(|f| f.error.clone()));
            results.extend(outcome.results);
            failures.extend(outcome.failures);

            tracing::debug!(
                %run_id,
                chunk = index + 1,
                of = chunk_count,
                succeeded = self.progress.stats.success_count,
                failed = self.progress.stats.failure_count,
                "chunk finished"
            );
            self.observer.on_progress(&self.progress);
            self.persist_progress_best_effort(&errors).await;

            if index + 1 < chunk_count {
                if let Err(e) = pause(self.config.delay_between_batches, &self.cancel).await {
                    return Err(self.fail_run_best_effort(e, &errors).await);
                }
            }
        }

        let mut completed = self.progress.clone();
        completed.complete(Utc::now())?;
        if let Some((store, request_id)) = self.binding {
            let counters = self.final_counters(store, request_id).await;
            let status = RequestStatus::from_progress(&completed, &errors, counters);
            if let Err(e) = store.update_status(request_id, &status).await {
                return Err(self.fail_run_best_effort(e.into(), &errors).await);
            }
        }
        self.progress = completed;
        self.observer.on_complete(&self.progress);

        tracing::info!(
            %run_id,
            succeeded = self.progress.stats.success_count,
            failed = self.progress.stats.failure_count,
            elapsed_ms = self.progress.stats.processing_time_ms,
            "batch run completed"
        );

        Ok(RunReport {
            progress: self.progress.clone(),
            results,
            failures,
            errors,
        })
    }

    async fn persist_progress_best_effort(&self, errors: &[String]) {
        let Some((store, request_id)) = self.binding else {
            return;
        };
        let status = RequestStatus::from_progress(&self.progress, errors, self.counters);
        if let Err(e) = store.update_status(request_id, &status).await {
            tracing::warn!(
                %request_id,
                error = %e,
                "failed to persist batch progress; continuing"
            );
        }
    }

    async fn final_counters(&self, store: &S, request_id: Uuid) -> RequestCounters {
        let mut counters = self.counters;
        match store.count_items(request_id).await {
            Ok(count) => counters.items_fetched = count,
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "failed to count stored items");
            }
        }
        counters
    }

    /// Marks the run failed, records it in the store if possible, fires
    /// `on_error`, and hands `error` back for the caller to return.
    async fn fail_run_best_effort(&mut self, error: BatchError, errors: &[String]) -> BatchError {
        let message = error.to_string();
        if let Err(e) = self.progress.fail(message.clone(), Utc::now()) {
            tracing::error!(error = %e, "could not mark batch run failed");
        }
        tracing::error!(
            run_id = ?self.progress.run_id,
            error = %message,
            "batch run failed"
        );

        if let Some((store, request_id)) = self.binding {
            let status = RequestStatus::from_progress(&self.progress, errors, self.counters);
            if let Err(e) = store.update_status(request_id, &status).await {
                tracing::error!(
                    %request_id,
                    error = %e,
                    "failed to mark request failed"
                );
            }
        }

        self.observer.on_error(&self.progress, &error);
        error
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
