//! `orderbridge-sync` — the order/ERP reconciliation state machine.
//!
//! Two directions: push (local -> ERP) at checkout and on admin edits, and
//! pull (ERP -> local) from the batch reconciliation job. Local state is the
//! source of truth for the storefront; ERP sync is best-effort and eventually
//! consistent.

pub mod error;
pub mod handlers;
pub mod service;

pub use error::SyncError;
pub use handlers::{
    SyncRequest, customer_sync_handler, detail_sync_handler, enqueue_customer_sync,
    enqueue_detail_sync,
};
pub use service::{OrderSyncService, PushOutcome, StatusPushWait, SyncConfig, SyncReport};
