//! Chunked, rate-limited execution of per-reference work with run-level
//! progress tracking.
//!
//! [`process_batch`] runs one chunk in sub-groups of bounded width.
//! [`BatchController`] drives a whole run chunk by chunk, owns the
//! `queued → processing → (completed | failed)` lifecycle, and mirrors it
//! into a [`xpulse_core::RequestStore`] when bound to one.

pub mod config;
pub mod controller;
pub mod error;
pub mod observer;
pub mod processor;

pub use config::BatchConfig;
pub use controller::{BatchController, RunReport};
pub use error::BatchError;
pub use observer::{ChannelObserver, NoopObserver, ProgressEvent, ProgressObserver};
pub use processor::{
    create_batches, process_batch, BatchOutcome, ItemFailure, WorkError,
};
pub use tokio_util::sync::CancellationToken;
