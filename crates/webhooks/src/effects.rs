//! Deferred side effects of webhook processing.
//!
//! Emails and ERP status pushes never run inline with the state transition:
//! processors enqueue them on the job queue, where they retry and dead-letter
//! independently of whether the primary transition succeeded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use orderbridge_jobs::{Job, JobKind, JobResult, JobStore, RetryPolicy};
use orderbridge_orders::OrderRepository;
use orderbridge_sync::OrderSyncService;

use crate::mailer::Mailer;

pub const EMAIL_INVOICE_ISSUED: &str = "email.invoice_issued";
pub const EMAIL_TRACKING_CODE: &str = "email.tracking_code";
pub const ERP_STATUS_PUSH: &str = "erp.status_push";

/// Payload of an `email.*` side-effect job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEffect {
    pub template: String,
    pub recipient: String,
    pub context: serde_json::Value,
}

/// Payload of an `erp.status_push` side-effect job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPushEffect {
    pub order_number: String,
    pub status_id: u32,
}

/// Enqueue a side-effect job. Best-effort: an enqueue failure is logged and
/// swallowed, never propagated into the webhook response.
pub fn enqueue_side_effect(jobs: &dyn JobStore, effect: &str, payload: serde_json::Value) {
    let job = Job::new(JobKind::side_effect(effect), payload)
        .with_retry_policy(RetryPolicy::side_effect());
    if let Err(err) = jobs.enqueue(job) {
        tracing::warn!(effect, error = %err, "failed to enqueue side effect");
    }
}

/// Handler for `email.*` jobs: deserializes the payload and hands it to the
/// mailer. Register under the `"email.*"` pattern.
pub fn email_effect_handler(
    mailer: Arc<dyn Mailer>,
) -> impl Fn(&Job) -> JobResult + Send + Sync + 'static {
    move |job| {
        let effect: EmailEffect = match serde_json::from_value(job.payload.clone()) {
            Ok(effect) => effect,
            Err(err) => return JobResult::Failure(format!("malformed email payload: {err}")),
        };
        match mailer.send(&effect.template, &effect.recipient, &effect.context) {
            Ok(()) => JobResult::Success,
            Err(err) => JobResult::Failure(err.to_string()),
        }
    }
}

/// Handler for `erp.status_push` jobs: reloads the order and issues the
/// narrow status transition through the sync service.
pub fn status_push_effect_handler(
    service: Arc<OrderSyncService>,
    repository: Arc<dyn OrderRepository>,
) -> impl Fn(&Job) -> JobResult + Send + Sync + 'static {
    move |job| {
        let effect: StatusPushEffect = match serde_json::from_value(job.payload.clone()) {
            Ok(effect) => effect,
            Err(err) => return JobResult::Failure(format!("malformed status push payload: {err}")),
        };
        let order = match repository.find_by_order_number(&effect.order_number) {
            Ok(Some(order)) => order,
            Ok(None) => {
                return JobResult::Failure(format!("order {} not found", effect.order_number));
            }
            Err(err) => return JobResult::Failure(err.to_string()),
        };
        if service.update_order_status(&order, effect.status_id) {
            JobResult::Success
        } else {
            JobResult::Failure(format!(
                "erp status push to {} failed for order {}",
                effect.status_id, effect.order_number
            ))
        }
    }
}
