//! Shipping webhook processor.

use std::sync::Arc;

use orderbridge_erp::{StatusCatalogResolver, canonical_from_status_name};
use orderbridge_jobs::JobStore;
use orderbridge_orders::{CustomerDirectory, Order, OrderRepository};
use orderbridge_sync::enqueue_detail_sync;

use crate::effects::{
    EMAIL_TRACKING_CODE, ERP_STATUS_PUSH, EmailEffect, StatusPushEffect, enqueue_side_effect,
};
use crate::error::WebhookError;
use crate::events::ShippingEvent;

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct ShippingProcessorConfig {
    /// Candidate names for the ERP's "shipped"-equivalent status.
    pub shipped_status_names: Vec<String>,
}

impl Default for ShippingProcessorConfig {
    fn default() -> Self {
        Self {
            shipped_status_names: vec!["shipped".to_string(), "enviado".to_string()],
        }
    }
}

/// What processing a shipping event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShippingOutcome {
    /// No local order matched; dropped.
    Dropped,
    /// The event carried no tracking code, or the same code the order already
    /// has. Carriers resend events, so this is the common replay path.
    NoNewTracking,
    Processed { status_changed: bool },
}

/// Consumes carrier tracking events.
///
/// The trigger is a *new tracking code*, never "status says shipped": carriers
/// resend the same event and the status wording varies per carrier, but a
/// tracking code change is a reliable signal of a real shipment.
pub struct ShippingProcessor {
    repository: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerDirectory>,
    resolver: Arc<StatusCatalogResolver>,
    jobs: Arc<dyn JobStore>,
    config: ShippingProcessorConfig,
}

impl ShippingProcessor {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerDirectory>,
        resolver: Arc<StatusCatalogResolver>,
        jobs: Arc<dyn JobStore>,
        config: ShippingProcessorConfig,
    ) -> Self {
        Self {
            repository,
            customers,
            resolver,
            jobs,
            config,
        }
    }

    pub fn process(&self, event: &ShippingEvent) -> Result<ShippingOutcome, WebhookError> {
        let Some(mut order) = self.repository.find_by_order_number(&event.order_number)? else {
            tracing::warn!(
                order_number = %event.order_number,
                "shipping event matched no local order, dropping"
            );
            return Ok(ShippingOutcome::Dropped);
        };

        // Matched receipts schedule an ERP detail refresh regardless of
        // whether the tracking code is new.
        if order.erp_order_number().is_some() {
            enqueue_detail_sync(self.jobs.as_ref(), order.order_number());
        }

        let Some(tracking_code) = event.tracking_code.as_deref() else {
            tracing::debug!(
                order_number = %order.order_number(),
                "shipping event carries no tracking code"
            );
            return Ok(ShippingOutcome::NoNewTracking);
        };
        if order.fulfillment().tracking_code.as_deref() == Some(tracking_code) {
            tracing::debug!(
                order_number = %order.order_number(),
                tracking_code,
                "tracking code unchanged, replay ignored"
            );
            return Ok(ShippingOutcome::NoNewTracking);
        }

        order.set_tracking(tracking_code, event.carrier.clone());

        let status_changed = self.apply_event_status(event, &mut order);

        self.enqueue_erp_push(&order);
        self.enqueue_tracking_email(&order, tracking_code);

        self.repository.update(&order)?;

        tracing::info!(
            order_number = %order.order_number(),
            tracking_code,
            status_changed,
            "tracking code recorded"
        );

        Ok(ShippingOutcome::Processed { status_changed })
    }

    /// Advance the order status when the event carries one that maps onto a
    /// legal forward move.
    fn apply_event_status(&self, event: &ShippingEvent, order: &mut Order) -> bool {
        let Some(raw) = event.status.as_deref() else {
            return false;
        };
        let Some(canonical) = canonical_from_status_name(raw) else {
            tracing::debug!(
                order_number = %order.order_number(),
                status = raw,
                "carrier status name matched no canonical state"
            );
            return false;
        };
        if canonical == order.status() {
            return false;
        }
        if !order.status().can_transition_to(canonical) {
            tracing::warn!(
                order_number = %order.order_number(),
                from = %order.status(),
                to = %canonical,
                "carrier status would move the order backwards, ignoring"
            );
            return false;
        }
        order.advance_status(canonical).is_ok()
    }

    fn enqueue_erp_push(&self, order: &Order) {
        if order.erp_order_number().is_none() {
            tracing::debug!(
                order_number = %order.order_number(),
                "order has no ERP linkage, skipping shipped status push"
            );
            return;
        }

        let names: Vec<&str> = self
            .config
            .shipped_status_names
            .iter()
            .map(String::as_str)
            .collect();
        match self.resolver.find_status_id_by_names(&names) {
            Some(status_id) => enqueue_side_effect(
                self.jobs.as_ref(),
                ERP_STATUS_PUSH,
                serde_json::json!(StatusPushEffect {
                    order_number: order.order_number().to_string(),
                    status_id,
                }),
            ),
            None => tracing::warn!(
                order_number = %order.order_number(),
                "no shipped-equivalent status in the ERP catalog, skipping push"
            ),
        }
    }

    fn enqueue_tracking_email(&self, order: &Order, tracking_code: &str) {
        let Some(customer) = self.customers.get(order.customer_id()) else {
            tracing::warn!(
                order_number = %order.order_number(),
                "customer not found, skipping tracking email"
            );
            return;
        };

        enqueue_side_effect(
            self.jobs.as_ref(),
            EMAIL_TRACKING_CODE,
            serde_json::json!(EmailEffect {
                template: EMAIL_TRACKING_CODE.to_string(),
                recipient: customer.email,
                context: serde_json::json!({
                    "order_number": order.order_number(),
                    "customer_name": customer.name,
                    "tracking_code": tracking_code,
                    "carrier": order.fulfillment().carrier,
                }),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orderbridge_core::{CustomerId, OrderId, OrderStatus, PaymentStatus, ProductId};
    use orderbridge_erp::{
        CatalogConfig, ErpModule, ErpStatusEntry, InMemoryCatalogCache, MockErpGateway,
    };
    use orderbridge_jobs::InMemoryJobStore;
    use orderbridge_orders::{
        Customer, FinancialSnapshot, FulfillmentSnapshot, InMemoryCustomerDirectory,
        InMemoryOrderRepository, OrderItem, ShippingAddress,
    };

    struct Fixture {
        repository: Arc<InMemoryOrderRepository>,
        customers: Arc<InMemoryCustomerDirectory>,
        jobs: Arc<InMemoryJobStore>,
        processor: ShippingProcessor,
    }

    fn setup() -> Fixture {
        let gateway = Arc::new(MockErpGateway::new());
        gateway.set_modules(vec![ErpModule {
            id: 2,
            name: "Vendas".to_string(),
        }]);
        gateway.set_statuses(
            2,
            vec![ErpStatusEntry {
                id: 11,
                name: "Enviado".to_string(),
                color: None,
                is_inherited: false,
            }],
        );

        let repository = Arc::new(InMemoryOrderRepository::new());
        let customers = Arc::new(InMemoryCustomerDirectory::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let resolver = Arc::new(StatusCatalogResolver::new(
            gateway,
            Arc::new(InMemoryCatalogCache::new(Duration::from_secs(60))),
            CatalogConfig::default(),
        ));

        let processor = ShippingProcessor::new(
            repository.clone(),
            customers.clone(),
            resolver,
            jobs.clone(),
            ShippingProcessorConfig::default(),
        );

        Fixture {
            repository,
            customers,
            jobs,
            processor,
        }
    }

    fn seed_order(fixture: &Fixture, order_number: &str) -> Order {
        let customer = Customer {
            id: CustomerId::new(),
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            document: None,
            phone: None,
        };
        fixture.customers.insert(customer.clone());

        let mut order = Order::new(
            OrderId::new(),
            order_number,
            customer.id,
            vec![OrderItem {
                product_id: ProductId::new(),
                sku: "SKU-1".to_string(),
                name: "Product SKU-1".to_string(),
                quantity: 1,
                unit_price: 5_000,
            }],
            FinancialSnapshot {
                subtotal: 5_000,
                discount: 0,
                shipping: 1_000,
                total: 6_000,
                payment_method: "pix".to_string(),
                payment_status: PaymentStatus::Approved,
                payment_fee: 0,
                net_amount: 6_000,
                installments: 1,
            },
            FulfillmentSnapshot {
                address: ShippingAddress::default(),
                method_name: "Sedex".to_string(),
                carrier: None,
                tracking_code: None,
            },
        );
        order.assign_erp_order_number("24442492001").unwrap();
        order.advance_status(OrderStatus::Invoiced).unwrap();
        fixture.repository.insert(order.clone()).unwrap();
        order
    }

    fn event(order_number: &str, tracking: &str) -> ShippingEvent {
        ShippingEvent {
            order_number: order_number.to_string(),
            tracking_code: Some(tracking.to_string()),
            carrier: Some("Correios".to_string()),
            status: Some("Enviado".to_string()),
            ..ShippingEvent::default()
        }
    }

    #[test]
    fn new_tracking_code_records_advances_and_enqueues() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0001");

        let outcome = fixture
            .processor
            .process(&event("PED-20240101-0001", "BR123456789BR"))
            .unwrap();

        assert_eq!(
            outcome,
            ShippingOutcome::Processed {
                status_changed: true
            }
        );
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0001")
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.fulfillment().tracking_code.as_deref(),
            Some("BR123456789BR")
        );
        assert_eq!(stored.status(), OrderStatus::Shipped);
        // Detail refresh + ERP push + tracking email.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 3);
    }

    #[test]
    fn identical_tracking_code_replay_is_a_no_op() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0002");
        let event = event("PED-20240101-0002", "BR123456789BR");

        fixture.processor.process(&event).unwrap();
        assert_eq!(fixture.jobs.stats().unwrap().pending, 3);

        let outcome = fixture.processor.process(&event).unwrap();

        assert_eq!(outcome, ShippingOutcome::NoNewTracking);
        // The replay adds only its detail refresh, no push and no email.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 4);
    }

    #[test]
    fn changed_tracking_code_triggers_again() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0003");

        fixture
            .processor
            .process(&event("PED-20240101-0003", "BR111111111BR"))
            .unwrap();
        let outcome = fixture
            .processor
            .process(&event("PED-20240101-0003", "BR222222222BR"))
            .unwrap();

        assert!(matches!(outcome, ShippingOutcome::Processed { .. }));
        // Two triggers, each a detail refresh + push + email.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 6);
    }

    #[test]
    fn event_without_tracking_code_is_ignored() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0004");

        let outcome = fixture
            .processor
            .process(&ShippingEvent {
                order_number: "PED-20240101-0004".to_string(),
                status: Some("Postado".to_string()),
                ..ShippingEvent::default()
            })
            .unwrap();

        assert_eq!(outcome, ShippingOutcome::NoNewTracking);
        // The matched receipt still schedules its detail refresh.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 1);
    }

    #[test]
    fn unknown_order_is_dropped() {
        let fixture = setup();
        let outcome = fixture
            .processor
            .process(&event("PED-NOPE", "BR123456789BR"))
            .unwrap();
        assert_eq!(outcome, ShippingOutcome::Dropped);
    }

    #[test]
    fn backward_carrier_status_is_ignored_but_tracking_lands() {
        let fixture = setup();
        let mut order = seed_order(&fixture, "PED-20240101-0005");
        order.advance_status(OrderStatus::Delivered).unwrap();
        fixture.repository.update(&order).unwrap();

        let outcome = fixture
            .processor
            .process(&event("PED-20240101-0005", "BR123456789BR"))
            .unwrap();

        assert_eq!(
            outcome,
            ShippingOutcome::Processed {
                status_changed: false
            }
        );
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0005")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Delivered);
        assert_eq!(
            stored.fulfillment().tracking_code.as_deref(),
            Some("BR123456789BR")
        );
    }
}
