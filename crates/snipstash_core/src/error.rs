//! Application error types for core storage and domain logic.
use crate::codec::CodecError;
use crate::store::StoreError;
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An expected business conflict, such as a taken account name.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Internal server error")]
    Internal,
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(value: bcrypt::BcryptError) -> Self {
        Self::Credentials(value.to_string())
    }
}
