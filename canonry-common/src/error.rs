//! Common error types for Canonry
//!
//! Every domain failure is a distinct variant so callers can report the
//! precise reason. Transient storage faults arrive wrapped in `Store` and are
//! the caller's to retry; none of the other variants are ever retried.

use crate::model::TierKind;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Common result type for Canonry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Canonry services
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced work (or other entity) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, surfaced verbatim to the client
    #[error("Validation error: {0}")]
    Validation(String),

    /// Edge target is CANON and can no longer gain lineage
    #[error("Target work {0} is canon and immutable")]
    ImmutableTarget(Uuid),

    /// An edge for this ordered (source, target) pair already exists
    #[error("Edge {source_id} -> {target_id} already exists")]
    DuplicateEdge { source_id: Uuid, target_id: Uuid },

    /// Work is already at the terminal tier
    #[error("Work {work_id} is already {tier}; no further promotion is possible")]
    TerminalState { work_id: Uuid, tier: TierKind },

    /// Another promotion committed between our read and our write
    #[error("Work {work_id} was promoted concurrently (expected tier {expected})")]
    ConcurrentPromotion { work_id: Uuid, expected: TierKind },

    /// Slug is already taken by another work
    #[error("Slug already in use: {0}")]
    DuplicateSlug(String),

    /// Work has lineage or promotion history and cannot be deleted
    #[error("Work {0} has lineage or promotion history and cannot be deleted")]
    WorkHasHistory(Uuid),

    /// Work Store failure not covered by the domain variants
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::ImmutableTarget(_) => "IMMUTABLE_TARGET",
            Error::DuplicateEdge { .. } => "DUPLICATE_EDGE",
            Error::TerminalState { .. } => "TERMINAL_STATE",
            Error::ConcurrentPromotion { .. } => "CONCURRENT_PROMOTION",
            Error::DuplicateSlug(_) => "DUPLICATE_SLUG",
            Error::WorkHasHistory(_) => "WORK_HAS_HISTORY",
            Error::Store(_) => "STORE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    pub(crate) fn work_not_found(id: Uuid) -> Self {
        Error::NotFound(format!("work {}", id))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::Database(err))
    }
}
