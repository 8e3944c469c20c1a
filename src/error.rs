//! Errors returned by the [`DonationEngine`](crate::engine::DonationEngine) facade.

use crate::interfaces::DirectoryError;
use crate::model::AmountError;
use crate::services::AttributionError;
use crate::storage::StorageError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Caller-facing error taxonomy.
///
/// Nothing is persisted when a call fails with `Validation`, `InvalidAmount`
/// or `NotFound`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Write conflicts persisted through every retry.
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Storage(StorageError),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(message) => EngineError::ConcurrencyConflict(message),
            StorageError::NotFound { entity, id } => EngineError::NotFound { kind: entity, id },
            other => EngineError::Storage(other),
        }
    }
}

impl From<AttributionError> for EngineError {
    fn from(e: AttributionError) -> Self {
        match e {
            AttributionError::UnknownCode(code) => EngineError::not_found("referral code", code),
            AttributionError::TrackingNotFound(id) => {
                EngineError::not_found("referral tracking", id)
            }
            AttributionError::Resolver(e) => EngineError::Directory(e),
            AttributionError::Storage(e) => e.into(),
            e @ (AttributionError::SelfReferral
            | AttributionError::CrossReferrer { .. }
            | AttributionError::Transition(_)) => EngineError::Validation(e.to_string()),
        }
    }
}
