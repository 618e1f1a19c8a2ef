//! Order sync service: push local orders to the ERP, pull ERP status back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use orderbridge_core::OrderStatus;
use orderbridge_erp::{
    ErpCustomer, ErpGateway, ErpOrderItem, ErpOrderPayload, ErpShipping, RequestLimiter,
    StatusCatalogResolver,
};
use orderbridge_jobs::JobStore;
use orderbridge_orders::{CustomerDirectory, Order, OrderRepository};

use crate::error::SyncError;
use crate::handlers::enqueue_customer_sync;

/// How long to poll for a freshly created ERP order to become visible before
/// issuing the follow-up status transition.
///
/// The ERP commits creates asynchronously; pushing a status update before the
/// create is visible loses the update. Polling replaces the fixed sleep the
/// race would otherwise call for; when the order never shows up the narrow
/// push is skipped and the batch job reconciles later.
#[derive(Debug, Clone)]
pub struct StatusPushWait {
    pub max_polls: u32,
    pub poll_delay: Duration,
}

impl Default for StatusPushWait {
    fn default() -> Self {
        Self {
            max_polls: 5,
            poll_delay: Duration::from_millis(500),
        }
    }
}

impl StatusPushWait {
    /// No waiting (tests).
    pub fn immediate() -> Self {
        Self {
            max_polls: 1,
            poll_delay: Duration::ZERO,
        }
    }
}

/// Sync service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Candidate names for the ERP's "processing"-equivalent status, used by
    /// the post-create transition. Tenant-configurable.
    pub processing_status_names: Vec<String>,
    /// Batch reconciliation chunk size.
    pub chunk_size: usize,
    /// Cap on orders examined per batch run when the caller passes no limit.
    pub default_batch_limit: usize,
    pub wait: StatusPushWait,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            processing_status_names: vec![
                "in progress".to_string(),
                "processing".to_string(),
                "em andamento".to_string(),
            ],
            chunk_size: 50,
            default_batch_limit: 500,
            wait: StatusPushWait::default(),
        }
    }
}

/// Outcome of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub erp_order_number: String,
    /// Whether the follow-up "processing" transition reached the ERP. `false`
    /// is not a push failure; the batch job reconciles the status later.
    pub status_pushed: bool,
}

/// Result of one batch reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub total: usize,
}

/// Drives `Order.status` across the local store and the ERP.
pub struct OrderSyncService {
    gateway: Arc<dyn ErpGateway>,
    repository: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerDirectory>,
    resolver: Arc<StatusCatalogResolver>,
    limiter: Arc<RequestLimiter>,
    jobs: Option<Arc<dyn JobStore>>,
    config: SyncConfig,
}

impl OrderSyncService {
    pub fn new(
        gateway: Arc<dyn ErpGateway>,
        repository: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerDirectory>,
        resolver: Arc<StatusCatalogResolver>,
        limiter: Arc<RequestLimiter>,
        config: SyncConfig,
    ) -> Self {
        Self {
            gateway,
            repository,
            customers,
            resolver,
            limiter,
            jobs: None,
            config,
        }
    }

    /// Attach the background job queue. With a queue attached, a successful
    /// push also schedules a `sync.customer` refresh of the ERP-side customer
    /// record.
    pub fn with_job_queue(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Push a local order to the ERP.
    ///
    /// The ERP order is always created in its "open" state: the ERP's own
    /// automation (stock decrement, ledger entries) fires on the
    /// open->processing *transition*, so creating directly in "processing"
    /// would bypass it. When the order is already paid the transition is
    /// issued as a second, narrow call after the create becomes visible;
    /// failure of that second call does not fail the push.
    pub fn push_order(&self, order: &mut Order) -> Result<PushOutcome, SyncError> {
        if order.erp_order_number().is_some() {
            return Err(SyncError::precondition(format!(
                "order {} is already linked to the ERP",
                order.order_number()
            )));
        }
        if order.items().is_empty() {
            return Err(SyncError::precondition(format!(
                "order {} has no items",
                order.order_number()
            )));
        }
        let customer = self.customers.get(order.customer_id()).ok_or_else(|| {
            SyncError::precondition(format!(
                "order {} has no resolvable customer",
                order.order_number()
            ))
        })?;

        let payload = build_erp_payload(order, &customer);

        self.limiter.acquire();
        let erp_order_number = self
            .gateway
            .create_order(&payload)
            .map_err(SyncError::from_gateway)?;

        tracing::info!(
            order_number = %order.order_number(),
            erp_order_number = %erp_order_number,
            "order created in ERP"
        );

        order
            .assign_erp_order_number(&erp_order_number)
            .map_err(|e| SyncError::precondition(e.to_string()))?;
        self.repository.update(order)?;

        if let Some(jobs) = &self.jobs {
            enqueue_customer_sync(jobs.as_ref(), order.order_number());
        }

        let wants_processing =
            order.is_paid() || order.status() == OrderStatus::Processing;
        let status_pushed = if wants_processing {
            self.push_processing_transition(order, &erp_order_number)
        } else {
            false
        };

        Ok(PushOutcome {
            erp_order_number,
            status_pushed,
        })
    }

    /// Move the freshly created ERP order to "processing". Best-effort: every
    /// failure path logs and returns false instead of failing the push.
    fn push_processing_transition(&self, order: &Order, erp_order_number: &str) -> bool {
        if !self.wait_until_visible(erp_order_number) {
            tracing::warn!(
                order_number = %order.order_number(),
                erp_order_number,
                "ERP order not visible after polling, skipping processing transition"
            );
            return false;
        }

        let names: Vec<&str> = self
            .config
            .processing_status_names
            .iter()
            .map(String::as_str)
            .collect();
        let Some(status_id) = self.resolver.find_status_id_by_names(&names) else {
            tracing::warn!(
                order_number = %order.order_number(),
                "no processing-equivalent status found in the ERP catalog"
            );
            return false;
        };

        self.update_order_status(order, status_id)
    }

    /// Poll until the ERP order is visible or attempts run out.
    fn wait_until_visible(&self, erp_order_number: &str) -> bool {
        for attempt in 0..self.config.wait.max_polls {
            self.limiter.acquire();
            match self.gateway.get_order_by_id(erp_order_number) {
                Ok(Some(_)) => return true,
                Ok(None) => {
                    tracing::debug!(erp_order_number, attempt, "ERP order not visible yet");
                }
                Err(err) => {
                    tracing::debug!(erp_order_number, attempt, error = %err, "visibility poll failed");
                }
            }
            if attempt + 1 < self.config.wait.max_polls {
                std::thread::sleep(self.config.wait.poll_delay);
            }
        }
        false
    }

    /// Full-payload update. The remote API replaces rather than merges, so
    /// every field is re-sent. Never use this for status-only changes: a full
    /// replace does not propagate status reliably on this ERP — use
    /// [`Self::update_order_status`].
    pub fn update_order(&self, order: &Order) -> Result<(), SyncError> {
        let erp_order_number = order
            .erp_order_number()
            .ok_or_else(|| SyncError::NotLinked(order.order_number().to_string()))?;
        let customer = self.customers.get(order.customer_id()).ok_or_else(|| {
            SyncError::precondition(format!(
                "order {} has no resolvable customer",
                order.order_number()
            ))
        })?;

        let payload = build_erp_payload(order, &customer);

        self.limiter.acquire();
        self.gateway
            .update_order(erp_order_number, &payload)
            .map_err(SyncError::from_gateway)
    }

    /// Narrow, single-purpose status transition. Idempotent; returns false
    /// (not an error) on failure so batch callers can continue past it.
    pub fn update_order_status(&self, order: &Order, status_id: u32) -> bool {
        let Some(erp_order_number) = order.erp_order_number() else {
            tracing::warn!(
                order_number = %order.order_number(),
                "cannot push status for an order without ERP linkage"
            );
            return false;
        };

        self.limiter.acquire();
        match self.gateway.update_order_status(erp_order_number, status_id) {
            Ok(()) => {
                tracing::info!(
                    order_number = %order.order_number(),
                    erp_order_number,
                    status_id,
                    "pushed status transition to ERP"
                );
                true
            }
            Err(err) => {
                tracing::warn!(
                    order_number = %order.order_number(),
                    erp_order_number,
                    status_id,
                    error = %err,
                    "failed to push status transition to ERP"
                );
                false
            }
        }
    }

    /// Pull the ERP's view of an order back into local state.
    ///
    /// Writes the status only when it changed (and the change is a legal
    /// forward move); refreshes `last_erp_sync` on every successful fetch.
    /// Returns whether the local status changed.
    pub fn pull_order_status(&self, order: &mut Order) -> Result<bool, SyncError> {
        let erp_order_number = order
            .erp_order_number()
            .ok_or_else(|| SyncError::NotLinked(order.order_number().to_string()))?
            .to_string();

        self.limiter.acquire();
        let snapshot = self
            .gateway
            .get_order_by_id(&erp_order_number)
            .map_err(SyncError::from_gateway)?;

        order.touch_erp_sync(Utc::now());

        let Some(snapshot) = snapshot else {
            tracing::warn!(
                order_number = %order.order_number(),
                erp_order_number = %erp_order_number,
                "ERP does not know this order"
            );
            self.repository.update(order)?;
            return Ok(false);
        };

        let canonical = self.resolver.map_erp_status_to_canonical(snapshot.status_id);
        let previous = order.status();

        let changed = if canonical != previous {
            if previous.can_transition_to(canonical) {
                if canonical == OrderStatus::Cancelled {
                    // ERP-side cancellation soft-deletes the local order.
                    order.cancel().is_ok()
                } else {
                    order.advance_status(canonical).is_ok()
                }
            } else {
                tracing::warn!(
                    order_number = %order.order_number(),
                    local = %previous,
                    erp = %canonical,
                    "ERP reports a status behind the local one, keeping local"
                );
                false
            }
        } else {
            false
        };

        if changed {
            tracing::info!(
                order_number = %order.order_number(),
                from = %previous,
                to = %canonical,
                "order status pulled from ERP"
            );
        }

        self.repository.update(order)?;
        Ok(changed)
    }

    /// Batch reconciliation: pull status for every ERP-linked, non-terminal
    /// order, in bounded chunks. One order's failure never aborts the run.
    pub fn sync_all_pending(&self, limit: Option<usize>) -> SyncReport {
        let batch_limit = limit.unwrap_or(self.config.default_batch_limit);
        let orders = match self.repository.list_pending_erp_sync(batch_limit) {
            Ok(orders) => orders,
            Err(err) => {
                tracing::error!(error = %err, "failed to list orders pending ERP sync");
                return SyncReport::default();
            }
        };

        let mut report = SyncReport {
            total: orders.len(),
            ..SyncReport::default()
        };

        for chunk in orders.chunks(self.config.chunk_size.max(1)) {
            for order in chunk {
                let mut order = order.clone();
                match self.pull_order_status(&mut order) {
                    Ok(_) => report.synced += 1,
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(
                            order_number = %order.order_number(),
                            error = %err,
                            "batch sync failed for order"
                        );
                    }
                }
            }
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            total = report.total,
            "batch reconciliation finished"
        );
        report
    }
}

/// Build the ERP-shaped payload for an order.
fn build_erp_payload(order: &Order, customer: &orderbridge_orders::Customer) -> ErpOrderPayload {
    let address = &order.fulfillment().address;
    ErpOrderPayload {
        order_number: order.order_number().to_string(),
        customer: ErpCustomer {
            name: customer.name.clone(),
            email: customer.email.clone(),
            document: customer.document.clone(),
            phone: customer.phone.clone(),
        },
        items: order
            .items()
            .iter()
            .map(|item| ErpOrderItem {
                sku: item.sku.clone(),
                description: item.name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        shipping_total: order.financial().shipping,
        discount_total: order.financial().discount,
        total: order.financial().total,
        payment_method: order.financial().payment_method.clone(),
        installments: order.financial().installments,
        shipping: ErpShipping {
            method_name: order.fulfillment().method_name.clone(),
            carrier: order.fulfillment().carrier.clone(),
            street: address.street.clone(),
            number: address.number.clone(),
            complement: address.complement.clone(),
            district: address.district.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        },
        notes: None,
    }
}
