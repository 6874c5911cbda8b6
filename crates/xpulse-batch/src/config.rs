use std::time::Duration;

use xpulse_core::AppConfig;

/// Shape of one run: chunk size, concurrency width inside a chunk, and the
/// pause between consecutive sub-groups and chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub max_concurrent: usize,
    pub delay_between_batches: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_concurrent: 3,
            delay_between_batches: Duration::from_millis(1000),
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_batch_size: config.batch_max_size,
            max_concurrent: config.batch_max_concurrent,
            delay_between_batches: Duration::from_millis(config.batch_delay_ms),
        }
    }

    /// Same configuration without any pauses. Handy for tests and for
    /// callers that rate-limit elsewhere.
    #[must_use]
    pub fn without_delay(mut self) -> Self {
        self.delay_between_batches = Duration::ZERO;
        self
    }
}
