use thiserror::Error;
use xpulse_core::{CoreError, StoreError};

#[derive(Debug, Error)]
pub enum BatchError {
    /// A unit of work reported an error that makes further work pointless.
    #[error("batch aborted: {0}")]
    Fatal(String),

    #[error("batch run cancelled")]
    Cancelled,

    #[error(transparent)]
    InvalidTransition(#[from] CoreError),

    #[error("status store error: {0}")]
    Store(#[from] StoreError),
}
