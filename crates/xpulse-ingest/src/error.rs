use thiserror::Error;
use uuid::Uuid;
use xpulse_core::StoreError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upload contains no profile or post URLs to register")]
    NothingToRegister,

    #[error("request {0} not found")]
    UnknownRequest(Uuid),

    #[error("failed to encode request inputs: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
