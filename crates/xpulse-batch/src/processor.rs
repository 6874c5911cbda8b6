//! Two-level chunking: a run is split into chunks of `max_batch_size`, and
//! each chunk into sub-groups of `max_concurrent` items that run together.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::error::BatchError;

/// Error returned by a unit of work.
///
/// Item errors are recorded against the item and the batch moves on. Fatal
/// errors (bad credentials, a store that went away) stop the run once the
/// current sub-group has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkError {
    pub message: String,
    pub fatal: bool,
}

impl WorkError {
    pub fn item(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }
}

impl std::fmt::Display for WorkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WorkError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure<T> {
    pub item: T,
    pub error: String,
}

/// Results and per-item failures of one chunk. Every input item lands in
/// exactly one of the two lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T, R> {
    pub results: Vec<R>,
    pub failures: Vec<ItemFailure<T>>,
}

impl<T, R> Default for BatchOutcome<T, R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Splits `items` into contiguous chunks of `config.max_batch_size`,
/// preserving order. Only the last chunk may be shorter. A size of 0 is
/// treated as 1.
#[must_use]
pub fn create_batches<T: Clone>(items: &[T], config: &BatchConfig) -> Vec<Vec<T>> {
    items
        .chunks(config.max_batch_size.max(1))
        .map(<[T]>::to_vec)
        .collect()
}

/// Runs `unit` over one chunk.
///
/// Sub-groups of `config.max_concurrent` items run concurrently; sub-groups
/// run one after another with `config.delay_between_batches` between them.
///
/// # Errors
///
/// Returns [`BatchError::Fatal`] after the sub-group in which a unit of work
/// returned a fatal [`WorkError`], and [`BatchError::Cancelled`] when
/// `cancel` fires between sub-groups or during a pause.
pub async fn process_batch<T, R, F, Fut>(
    items: &[T],
    unit: &F,
    config: &BatchConfig,
    cancel: &CancellationToken,
) -> Result<BatchOutcome<T, R>, BatchError>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, WorkError>>,
{
    let mut outcome = BatchOutcome::default();
    let groups: Vec<&[T]> = items.chunks(config.max_concurrent.max(1)).collect();
    let group_count = groups.len();

    for (index, group) in groups.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let settled = join_all(group.iter().cloned().map(|item| {
            let fut = unit(item.clone());
            async move { (item, fut.await) }
        }))
        .await;

        let mut fatal: Option<String> = None;
        for (item, result) in settled {
            match result {
                Ok(value) => outcome.results.push(value),
                Err(err) => {
                    tracing::debug!(error = %err, fatal = err.fatal, "unit of work failed");
                    if err.fatal && fatal.is_none() {
                        fatal = Some(err.message.clone());
                    }
                    outcome.failures.push(ItemFailure {
                        item,
                        error: err.message,
                    });
                }
            }
        }
        if let Some(message) = fatal {
            return Err(BatchError::Fatal(message));
        }

        if index + 1 < group_count {
            pause(config.delay_between_batches, cancel).await?;
        }
    }

    Ok(outcome)
}

/// Sleeps for `delay` unless `cancel` fires first.
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), BatchError> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(BatchError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        () = cancel.cancelled() => Err(BatchError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod tests;
