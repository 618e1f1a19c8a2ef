//! Invoice webhook processor.

use std::sync::Arc;

use orderbridge_core::OrderStatus;
use orderbridge_erp::StatusCatalogResolver;
use orderbridge_jobs::JobStore;
use orderbridge_orders::{CustomerDirectory, Order, OrderRepository};
use orderbridge_sync::enqueue_detail_sync;

use crate::effects::{
    EMAIL_INVOICE_ISSUED, ERP_STATUS_PUSH, EmailEffect, StatusPushEffect, enqueue_side_effect,
};
use crate::error::WebhookError;
use crate::events::InvoiceEvent;
use crate::storage::PdfStorage;

/// Processor configuration.
#[derive(Debug, Clone)]
pub struct InvoiceProcessorConfig {
    /// Candidate names for the ERP's "invoiced"-equivalent status, used for
    /// the reverse lookup before enqueueing the ERP push.
    pub invoiced_status_names: Vec<String>,
}

impl Default for InvoiceProcessorConfig {
    fn default() -> Self {
        Self {
            invoiced_status_names: vec![
                "invoiced".to_string(),
                "faturado".to_string(),
                "faturamento".to_string(),
            ],
        }
    }
}

/// What processing an invoice event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    /// No local order matched. The event is dropped; the provider redelivers
    /// on its own schedule.
    Dropped,
    Processed {
        status_changed: bool,
        pdf_archived: bool,
        email_enqueued: bool,
    },
}

/// Consumes invoice (fiscal note) events.
pub struct InvoiceProcessor {
    repository: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerDirectory>,
    resolver: Arc<StatusCatalogResolver>,
    jobs: Arc<dyn JobStore>,
    storage: Arc<dyn PdfStorage>,
    config: InvoiceProcessorConfig,
}

impl InvoiceProcessor {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerDirectory>,
        resolver: Arc<StatusCatalogResolver>,
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn PdfStorage>,
        config: InvoiceProcessorConfig,
    ) -> Self {
        Self {
            repository,
            customers,
            resolver,
            jobs,
            storage,
            config,
        }
    }

    /// Process one invoice event.
    ///
    /// Snapshot fields merge on every matched event; the status flips to
    /// `Invoiced` only for a complete event (number + key), and the ERP push
    /// and customer email are enqueued only on that transition.
    pub fn process(&self, event: &InvoiceEvent) -> Result<InvoiceOutcome, WebhookError> {
        let Some(mut order) = self.resolve_order(event)? else {
            tracing::warn!(
                erp_order_id = event.erp_order_id.as_deref().unwrap_or("-"),
                order_number = event.order_number.as_deref().unwrap_or("-"),
                "invoice event matched no local order, dropping"
            );
            return Ok(InvoiceOutcome::Dropped);
        };

        // Every matched receipt also schedules an ERP detail refresh so the
        // local copy converges on whatever else changed ERP-side.
        if order.erp_order_number().is_some() {
            enqueue_detail_sync(self.jobs.as_ref(), order.order_number());
        }

        let pdf_archived = self.archive_pdf(event, &mut order);

        // When nothing was archived the provider URL still merges like any
        // other snapshot field.
        order.merge_invoice_snapshot(
            event.invoice_number.clone(),
            event.invoice_key.clone(),
            if pdf_archived { None } else { event.pdf_url.clone() },
            event.issued_at,
        );

        let mut status_changed = false;
        if event.is_complete() && order.status() != OrderStatus::Invoiced {
            if order.status().can_transition_to(OrderStatus::Invoiced) {
                status_changed = order.advance_status(OrderStatus::Invoiced).is_ok();
            } else {
                tracing::debug!(
                    order_number = %order.order_number(),
                    status = %order.status(),
                    "invoice completed after the order moved past invoiced, keeping status"
                );
            }
        }

        let mut email_enqueued = false;
        if status_changed {
            self.enqueue_erp_push(&order);
            email_enqueued = self.enqueue_invoice_email(&order);
            tracing::info!(
                order_number = %order.order_number(),
                invoice_number = order.invoice().number.as_deref().unwrap_or("-"),
                "order invoiced"
            );
        }

        self.repository.update(&order)?;

        Ok(InvoiceOutcome::Processed {
            status_changed,
            pdf_archived,
            email_enqueued,
        })
    }

    /// ERP order id first, then order number: the provider supplies one or
    /// the other depending on the trigger path.
    fn resolve_order(&self, event: &InvoiceEvent) -> Result<Option<Order>, WebhookError> {
        if let Some(erp_id) = &event.erp_order_id {
            if let Some(order) = self.repository.find_by_erp_order_number(erp_id)? {
                return Ok(Some(order));
            }
        }
        if let Some(order_number) = &event.order_number {
            return Ok(self.repository.find_by_order_number(order_number)?);
        }
        Ok(None)
    }

    /// Archive the invoice PDF under our own storage. On failure the caller
    /// merges the provider URL instead; archival never blocks the textual
    /// field merge.
    fn archive_pdf(&self, event: &InvoiceEvent, order: &mut Order) -> bool {
        if event.invoice_key.is_none() || event.erp_order_id.is_none() {
            return false;
        }
        let Some(source_url) = &event.pdf_url else {
            return false;
        };

        let key = format!("invoices/{}.pdf", order.order_number());
        match self.storage.archive(&key, source_url) {
            Ok(stored_url) => {
                order.merge_invoice_snapshot(None, None, Some(stored_url), None);
                true
            }
            Err(err) => {
                tracing::warn!(
                    order_number = %order.order_number(),
                    error = %err,
                    "invoice pdf archival failed, keeping provider url"
                );
                false
            }
        }
    }

    fn enqueue_erp_push(&self, order: &Order) {
        if order.erp_order_number().is_none() {
            tracing::debug!(
                order_number = %order.order_number(),
                "order has no ERP linkage, skipping invoiced status push"
            );
            return;
        }

        let names: Vec<&str> = self
            .config
            .invoiced_status_names
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
                "no invoiced-equivalent status in the ERP catalog, skipping push"
            ),
        }
    }

    fn enqueue_invoice_email(&self, order: &Order) -> bool {
        let Some(customer) = self.customers.get(order.customer_id()) else {
            tracing::warn!(
                order_number = %order.order_number(),
                "customer not found, skipping invoice email"
            );
            return false;
        };

        enqueue_side_effect(
            self.jobs.as_ref(),
            EMAIL_INVOICE_ISSUED,
            serde_json::json!(EmailEffect {
                template: EMAIL_INVOICE_ISSUED.to_string(),
                recipient: customer.email,
                context: serde_json::json!({
                    "order_number": order.order_number(),
                    "customer_name": customer.name,
                    "invoice_number": order.invoice().number,
                    "invoice_key": order.invoice().key,
                    "pdf_url": order.invoice().pdf_url,
                }),
            }),
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orderbridge_core::{CustomerId, OrderId, PaymentStatus, ProductId};
    use orderbridge_erp::{CatalogConfig, ErpModule, ErpStatusEntry, InMemoryCatalogCache, MockErpGateway};
    use orderbridge_jobs::InMemoryJobStore;
    use orderbridge_orders::{
        Customer, FinancialSnapshot, FulfillmentSnapshot, InMemoryCustomerDirectory,
        InMemoryOrderRepository, OrderItem, ShippingAddress,
    };

    use crate::storage::InMemoryPdfStorage;

    struct Fixture {
        repository: Arc<InMemoryOrderRepository>,
        customers: Arc<InMemoryCustomerDirectory>,
        jobs: Arc<InMemoryJobStore>,
        storage: Arc<InMemoryPdfStorage>,
        processor: InvoiceProcessor,
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
                id: 10,
                name: "Faturado".to_string(),
                color: None,
                is_inherited: false,
            }],
        );

        let repository = Arc::new(InMemoryOrderRepository::new());
        let customers = Arc::new(InMemoryCustomerDirectory::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let storage = Arc::new(InMemoryPdfStorage::new());
        let resolver = Arc::new(StatusCatalogResolver::new(
            gateway,
            Arc::new(InMemoryCatalogCache::new(Duration::from_secs(60))),
            CatalogConfig::default(),
        ));

        let processor = InvoiceProcessor::new(
            repository.clone(),
            customers.clone(),
            resolver,
            jobs.clone(),
            storage.clone(),
            InvoiceProcessorConfig::default(),
        );

        Fixture {
            repository,
            customers,
            jobs,
            storage,
            processor,
        }
    }

    fn seed_order(fixture: &Fixture, order_number: &str, erp_number: Option<&str>) -> Order {
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
        if let Some(erp) = erp_number {
            order.assign_erp_order_number(erp).unwrap();
        }
        fixture.repository.insert(order.clone()).unwrap();
        order
    }

    #[test]
    fn unmatched_event_is_dropped() {
        let fixture = setup();
        let outcome = fixture
            .processor
            .process(&InvoiceEvent {
                order_number: Some("PED-NOPE".to_string()),
                ..InvoiceEvent::default()
            })
            .unwrap();
        assert_eq!(outcome, InvoiceOutcome::Dropped);
    }

    #[test]
    fn incomplete_event_updates_snapshot_but_not_status() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0001", Some("24442492001"));

        let outcome = fixture
            .processor
            .process(&InvoiceEvent {
                order_number: Some("PED-20240101-0001".to_string()),
                invoice_number: Some("000123".to_string()),
                ..InvoiceEvent::default()
            })
            .unwrap();

        assert_eq!(
            outcome,
            InvoiceOutcome::Processed {
                status_changed: false,
                pdf_archived: false,
                email_enqueued: false,
            }
        );
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0001")
            .unwrap()
            .unwrap();
        assert_eq!(stored.invoice().number.as_deref(), Some("000123"));
        assert_eq!(stored.status(), OrderStatus::Pending);
        // Only the per-receipt detail refresh; no side effects.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 1);
    }

    #[test]
    fn complete_event_flips_status_and_enqueues_side_effects() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0002", Some("24442492001"));

        let outcome = fixture
            .processor
            .process(&InvoiceEvent {
                erp_order_id: Some("24442492001".to_string()),
                invoice_number: Some("000123".to_string()),
                invoice_key: Some("3524NFKEY".to_string()),
                ..InvoiceEvent::default()
            })
            .unwrap();

        assert_eq!(
            outcome,
            InvoiceOutcome::Processed {
                status_changed: true,
                pdf_archived: false,
                email_enqueued: true,
            }
        );
        let stored = fixture
            .repository
            .find_by_erp_order_number("24442492001")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Invoiced);
        // Detail refresh + ERP push + email.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 3);
    }

    #[test]
    fn redelivered_complete_event_does_not_enqueue_twice() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0003", Some("24442492001"));
        let event = InvoiceEvent {
            erp_order_id: Some("24442492001".to_string()),
            invoice_number: Some("000123".to_string()),
            invoice_key: Some("3524NFKEY".to_string()),
            ..InvoiceEvent::default()
        };

        fixture.processor.process(&event).unwrap();
        assert_eq!(fixture.jobs.stats().unwrap().pending, 3);

        let outcome = fixture.processor.process(&event).unwrap();

        assert_eq!(
            outcome,
            InvoiceOutcome::Processed {
                status_changed: false,
                pdf_archived: false,
                email_enqueued: false,
            }
        );
        // The redelivery adds only its detail refresh, never the side effects.
        assert_eq!(fixture.jobs.stats().unwrap().pending, 4);
    }

    #[test]
    fn pdf_is_archived_and_failure_keeps_provider_url() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0004", Some("24442492001"));
        let event = InvoiceEvent {
            erp_order_id: Some("24442492001".to_string()),
            invoice_number: Some("000123".to_string()),
            invoice_key: Some("3524NFKEY".to_string()),
            pdf_url: Some("https://erp.example/danfe/123".to_string()),
            ..InvoiceEvent::default()
        };

        let outcome = fixture.processor.process(&event).unwrap();
        assert!(matches!(
            outcome,
            InvoiceOutcome::Processed {
                pdf_archived: true,
                ..
            }
        ));
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0004")
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.invoice().pdf_url.as_deref(),
            Some("memory://invoices/PED-20240101-0004.pdf")
        );

        // Storage failure: textual fields still land, provider URL kept.
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0005", Some("24442492001"));
        fixture.storage.fail_all(true);
        let event = InvoiceEvent {
            erp_order_id: Some("24442492001".to_string()),
            invoice_number: Some("000124".to_string()),
            invoice_key: Some("3524NFKEY2".to_string()),
            pdf_url: Some("https://erp.example/danfe/124".to_string()),
            ..InvoiceEvent::default()
        };
        let outcome = fixture.processor.process(&event).unwrap();
        assert!(matches!(
            outcome,
            InvoiceOutcome::Processed {
                pdf_archived: false,
                status_changed: true,
                ..
            }
        ));
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0005")
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.invoice().pdf_url.as_deref(),
            Some("https://erp.example/danfe/124")
        );
    }

    #[test]
    fn pdf_url_merges_even_when_nothing_is_archived() {
        let fixture = setup();
        seed_order(&fixture, "PED-20240101-0007", Some("24442492001"));

        // No invoice key yet, so the archival gate stays closed, but the
        // provider URL is a snapshot field like any other.
        let outcome = fixture
            .processor
            .process(&InvoiceEvent {
                order_number: Some("PED-20240101-0007".to_string()),
                invoice_number: Some("000125".to_string()),
                pdf_url: Some("https://erp.example/danfe/125".to_string()),
                ..InvoiceEvent::default()
            })
            .unwrap();

        assert!(matches!(
            outcome,
            InvoiceOutcome::Processed {
                pdf_archived: false,
                status_changed: false,
                ..
            }
        ));
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0007")
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.invoice().pdf_url.as_deref(),
            Some("https://erp.example/danfe/125")
        );
        assert!(fixture.storage.stored().is_empty());
    }

    #[test]
    fn late_complete_event_after_shipping_keeps_status() {
        let fixture = setup();
        let mut order = seed_order(&fixture, "PED-20240101-0006", Some("24442492001"));
        order.advance_status(OrderStatus::Shipped).unwrap();
        fixture.repository.update(&order).unwrap();

        let outcome = fixture
            .processor
            .process(&InvoiceEvent {
                order_number: Some("PED-20240101-0006".to_string()),
                invoice_number: Some("000123".to_string()),
                invoice_key: Some("3524NFKEY".to_string()),
                ..InvoiceEvent::default()
            })
            .unwrap();

        assert!(matches!(
            outcome,
            InvoiceOutcome::Processed {
                status_changed: false,
                ..
            }
        ));
        let stored = fixture
            .repository
            .find_by_order_number("PED-20240101-0006")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Shipped);
        assert_eq!(stored.invoice().key.as_deref(), Some("3524NFKEY"));
    }
}
