//! `orderbridge-jobs` — asynchronously-dispatched background work.
//!
//! Webhook receipt and order creation enqueue fire-and-forget jobs here; a
//! worker pool polls the store and retries failures on the schedules the
//! external providers tolerate (ERP detail sync: 10s/30s/60s over 3 attempts;
//! customer sync: 60s fixed). The same queue carries webhook side effects
//! (emails, ERP status pushes) so their failures are observable and retriable
//! independently of the state transition that triggered them.

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{Backoff, DeadLetterEntry, Job, JobId, JobKind, JobResult, JobStatus, RetryPolicy};
