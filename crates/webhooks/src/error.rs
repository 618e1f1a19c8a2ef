//! Webhook processor error surface.

use orderbridge_orders::RepositoryError;
use thiserror::Error;

/// Error returned by webhook processors.
///
/// Only local persistence failures are hard errors; missing orders,
/// side-effect enqueue failures and PDF archival failures are soft by design
/// (the provider redelivers, the queue retries, the provider URL survives).
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
