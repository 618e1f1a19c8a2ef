//! Background job wiring for the sync service.
//!
//! Webhook receipt and order creation never pull the ERP inline: they enqueue
//! `sync.*` jobs that a worker executes with retry/backoff. The handlers here
//! reload the order from the repository so a stale payload can never clobber
//! newer local state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orderbridge_jobs::{Job, JobKind, JobResult, JobStore, RetryPolicy};
use orderbridge_orders::{Order, OrderRepository};

use crate::service::OrderSyncService;

/// Payload of the order-scoped `sync.*` jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub order_number: String,
}

/// Enqueue an ERP detail refresh for an order. Best-effort: an enqueue
/// failure is logged and swallowed, never propagated to the trigger.
pub fn enqueue_detail_sync(jobs: &dyn JobStore, order_number: &str) {
    let job = Job::new(
        JobKind::ErpOrderDetailSync,
        serde_json::json!(SyncRequest {
            order_number: order_number.to_string(),
        }),
    )
    .with_retry_policy(RetryPolicy::erp_detail_sync());
    if let Err(err) = jobs.enqueue(job) {
        tracing::warn!(order_number, error = %err, "failed to enqueue ERP detail sync");
    }
}

/// Enqueue a refresh of the ERP's copy of an order's customer data.
pub fn enqueue_customer_sync(jobs: &dyn JobStore, order_number: &str) {
    let job = Job::new(
        JobKind::CustomerSync,
        serde_json::json!(SyncRequest {
            order_number: order_number.to_string(),
        }),
    )
    .with_retry_policy(RetryPolicy::customer_sync());
    if let Err(err) = jobs.enqueue(job) {
        tracing::warn!(order_number, error = %err, "failed to enqueue customer sync");
    }
}

/// Handler for `sync.erp_order_detail` jobs: pulls the ERP's view of the
/// order back into local state. Register under `"sync.erp_order_detail"`.
pub fn detail_sync_handler(
    service: Arc<OrderSyncService>,
    repository: Arc<dyn OrderRepository>,
) -> impl Fn(&Job) -> JobResult + Send + Sync + 'static {
    move |job| {
        let mut order = match load_order(repository.as_ref(), job) {
            Ok(order) => order,
            Err(failure) => return failure,
        };
        match service.pull_order_status(&mut order) {
            Ok(_) => JobResult::Success,
            Err(err) => JobResult::Failure(err.to_string()),
        }
    }
}

/// Handler for `sync.customer` jobs: re-sends the full order payload, which
/// carries the customer record, to the ERP.
pub fn customer_sync_handler(
    service: Arc<OrderSyncService>,
    repository: Arc<dyn OrderRepository>,
) -> impl Fn(&Job) -> JobResult + Send + Sync + 'static {
    move |job| {
        let order = match load_order(repository.as_ref(), job) {
            Ok(order) => order,
            Err(failure) => return failure,
        };
        match service.update_order(&order) {
            Ok(()) => JobResult::Success,
            Err(err) => JobResult::Failure(err.to_string()),
        }
    }
}

fn load_order(repository: &dyn OrderRepository, job: &Job) -> Result<Order, JobResult> {
    let request: SyncRequest = serde_json::from_value(job.payload.clone())
        .map_err(|err| JobResult::Failure(format!("malformed sync payload: {err}")))?;
    match repository.find_by_order_number(&request.order_number) {
        Ok(Some(order)) => Ok(order),
        Ok(None) => Err(JobResult::Failure(format!(
            "order {} not found",
            request.order_number
        ))),
        Err(err) => Err(JobResult::Failure(err.to_string())),
    }
}
