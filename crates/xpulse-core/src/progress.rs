//! Run-level progress accounting shared by the batch controller and the
//! status store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Aggregate counts for one run.
///
/// Every field only grows during a run, and `total_processed` always equals
/// `success_count + failure_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub processing_time_ms: u64,
}

impl BatchStats {
    #[must_use]
    pub fn new(total_batches: usize) -> Self {
        Self {
            total_batches,
            ..Self::default()
        }
    }

    /// Folds one finished chunk into the totals.
    pub fn record_chunk(&mut self, successes: usize, failures: usize, elapsed_ms: u64) {
        self.success_count = self.success_count.saturating_add(successes);
        self.failure_count = self.failure_count.saturating_add(failures);
        self.total_processed = self.success_count.saturating_add(self.failure_count);
        self.completed_batches = self.completed_batches.saturating_add(1);
        self.processing_time_ms = self.processing_time_ms.max(elapsed_ms);
    }
}

/// Lifecycle state of a run: `queued → processing → (completed | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RunState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Queued => write!(f, "queued"),
            RunState::Processing => write!(f, "processing"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Progress snapshot of a single run.
///
/// Only the transition methods mutate `state`; they reject anything that
/// would leave a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub run_id: Option<Uuid>,
    pub stats: BatchStats,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::queued()
    }
}

impl BatchProgress {
    #[must_use]
    pub fn queued() -> Self {
        Self {
            run_id: None,
            stats: BatchStats::default(),
            state: RunState::Queued,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// `queued → processing`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the run is queued.
    pub fn start(
        &mut self,
        run_id: Uuid,
        total_batches: usize,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.guard(RunState::Queued, RunState::Processing)?;
        self.run_id = Some(run_id);
        self.stats = BatchStats::new(total_batches);
        self.state = RunState::Processing;
        self.started_at = Some(now);
        Ok(())
    }

    /// `processing → completed`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the run is processing.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.guard(RunState::Processing, RunState::Completed)?;
        self.state = RunState::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// `queued | processing → failed`, recording `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the run already reached a
    /// terminal state.
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.state.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.state,
                to: RunState::Failed,
            });
        }
        self.state = RunState::Failed;
        self.completed_at = Some(now);
        self.error = Some(message.into());
        Ok(())
    }

    fn guard(&self, expected: RunState, to: RunState) -> Result<(), CoreError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }
}
