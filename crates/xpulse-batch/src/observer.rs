use tokio::sync::mpsc;
use xpulse_core::BatchProgress;

use crate::error::BatchError;

/// Callbacks fired by [`crate::BatchController`] as a run advances.
///
/// Callbacks run inline on the controller's task and must not block.
pub trait ProgressObserver: Send + Sync {
    /// After every chunk.
    fn on_progress(&self, _progress: &BatchProgress) {}

    fn on_complete(&self, _progress: &BatchProgress) {}

    fn on_error(&self, _progress: &BatchProgress, _error: &BatchError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Snapshot forwarded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress(BatchProgress),
    Completed(BatchProgress),
    Failed {
        progress: BatchProgress,
        error: String,
    },
}

/// Forwards progress snapshots into an unbounded channel, e.g. for a
/// terminal renderer running on another task. Events are dropped once the
/// receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        self.send(ProgressEvent::Progress(progress.clone()));
    }

    fn on_complete(&self, progress: &BatchProgress) {
        self.send(ProgressEvent::Completed(progress.clone()));
    }

    fn on_error(&self, progress: &BatchProgress, error: &BatchError) {
        self.send(ProgressEvent::Failed {
            progress: progress.clone(),
            error: error.to_string(),
        });
    }
}
