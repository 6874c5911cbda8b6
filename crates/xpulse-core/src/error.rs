use thiserror::Error;

use crate::progress::RunState;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    #[error("invalid request kind: {0}")]
    InvalidRequestKind(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
