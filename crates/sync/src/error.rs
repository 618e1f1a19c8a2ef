//! Sync service error surface.

use orderbridge_erp::ErpError;
use orderbridge_orders::RepositoryError;
use thiserror::Error;

/// Error returned by sync operations.
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Programmer/configuration error (missing customer, no items, pushing an
    /// already-linked order). Fail fast, never retried.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The operation needs an ERP linkage the order does not have.
    #[error("order {0} has no ERP linkage")]
    NotLinked(String),

    /// The ERP reports the order already exists. Distinguished so the caller
    /// can choose idempotent-success handling over a hard failure.
    #[error("order already exists in the ERP as {existing}")]
    Duplicate { existing: String },

    /// Any other gateway failure (timeouts, 5xx, rate limits).
    #[error("erp gateway error: {0}")]
    Gateway(#[source] ErpError),

    /// Local persistence failure after the ERP side already succeeded.
    /// Never rolled back; the batch job converges later.
    #[error("repository error: {0}")]
    Repository(#[source] RepositoryError),
}

impl SyncError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Convert a gateway error, keeping duplicates distinguishable.
    pub fn from_gateway(err: ErpError) -> Self {
        match err {
            ErpError::Duplicate {
                existing_order_number,
            } => Self::Duplicate {
                existing: existing_order_number,
            },
            other => Self::Gateway(other),
        }
    }
}

impl From<RepositoryError> for SyncError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}
