//! Aggregate root: Order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderbridge_core::{CustomerId, DomainError, DomainResult, OrderId, OrderStatus, PaymentStatus, ProductId};

/// Order line: a frozen snapshot of the product at purchase time.
///
/// Never mutated after creation; price changes on the product do not
/// propagate here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Structured shipping address, frozen at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Financial snapshot captured once at order-creation/payment time.
///
/// All amounts in smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub subtotal: u64,
    pub discount: u64,
    pub shipping: u64,
    pub total: u64,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_fee: u64,
    pub net_amount: u64,
    pub installments: u32,
}

/// Fulfillment snapshot: address and shipping method frozen at creation,
/// tracking code assigned later by the shipping webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentSnapshot {
    pub address: ShippingAddress,
    pub method_name: String,
    pub carrier: Option<String>,
    pub tracking_code: Option<String>,
}

/// Invoice snapshot, empty until the ERP issues the fiscal note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub number: Option<String>,
    pub key: Option<String>,
    pub pdf_url: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    /// Human-readable identity, globally unique, immutable once assigned.
    order_number: String,
    /// Assigned once the ERP accepts the order; unique when present.
    erp_order_number: Option<String>,
    customer_id: CustomerId,
    status: OrderStatus,
    items: Vec<OrderItem>,
    financial: FinancialSnapshot,
    fulfillment: FulfillmentSnapshot,
    invoice: InvoiceSnapshot,
    paid_at: Option<DateTime<Utc>>,
    erp_synced_at: Option<DateTime<Utc>>,
    last_erp_sync: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new order in `Pending` status with no ERP linkage.
    ///
    /// The item list may be empty here (checkout builds incrementally); the
    /// sync service enforces non-emptiness before pushing to the ERP.
    pub fn new(
        id: OrderId,
        order_number: impl Into<String>,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        financial: FinancialSnapshot,
        fulfillment: FulfillmentSnapshot,
    ) -> Self {
        Self {
            id,
            order_number: order_number.into(),
            erp_order_number: None,
            customer_id,
            status: OrderStatus::Pending,
            items,
            financial,
            fulfillment,
            invoice: InvoiceSnapshot::default(),
            paid_at: None,
            erp_synced_at: None,
            last_erp_sync: None,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn erp_order_number(&self) -> Option<&str> {
        self.erp_order_number.as_deref()
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn financial(&self) -> &FinancialSnapshot {
        &self.financial
    }

    pub fn fulfillment(&self) -> &FulfillmentSnapshot {
        &self.fulfillment
    }

    pub fn invoice(&self) -> &InvoiceSnapshot {
        &self.invoice
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn erp_synced_at(&self) -> Option<DateTime<Utc>> {
        self.erp_synced_at
    }

    pub fn last_erp_sync(&self) -> Option<DateTime<Utc>> {
        self.last_erp_sync
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Paid means the payment was approved (the `paid_at` marker is set when
    /// the approval is recorded).
    pub fn is_paid(&self) -> bool {
        self.financial.payment_status.is_paid()
    }

    /// Append an item to a still-pending order. Lines are append-only and
    /// frozen once added.
    pub fn add_item(&mut self, item: OrderItem) -> DomainResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::invariant(
                "items can only be added while the order is pending",
            ));
        }
        if item.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.items.push(item);
        Ok(())
    }

    /// Advance the status along the forward path (or to cancelled).
    pub fn advance_status(&mut self, next: OrderStatus) -> DomainResult<()> {
        self.status.ensure_transition_to(next)?;
        self.status = next;
        Ok(())
    }

    /// Cancel from any non-terminal state. Cancelled orders are soft-deleted;
    /// rows are never hard-deleted.
    pub fn cancel(&mut self) -> DomainResult<()> {
        self.advance_status(OrderStatus::Cancelled)?;
        self.soft_delete();
        Ok(())
    }

    /// Administrative override: set the status regardless of the transition
    /// rules. Logged so the audit trail shows who moved the order backwards.
    pub fn force_status(&mut self, next: OrderStatus) {
        if !self.status.can_transition_to(next) && self.status != next {
            tracing::warn!(
                order_number = %self.order_number,
                from = %self.status,
                to = %next,
                "administrative status override outside the forward path"
            );
        }
        self.status = next;
    }

    /// Link the order to the ERP. Once only.
    pub fn assign_erp_order_number(&mut self, erp_order_number: impl Into<String>) -> DomainResult<()> {
        if let Some(existing) = &self.erp_order_number {
            return Err(DomainError::conflict(format!(
                "order {} is already linked to ERP order {}",
                self.order_number, existing
            )));
        }
        self.erp_order_number = Some(erp_order_number.into());
        self.erp_synced_at = Some(Utc::now());
        Ok(())
    }

    /// Record an approved payment. The financial snapshot stays frozen apart
    /// from the payment status itself.
    pub fn record_payment_approved(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if !self
            .financial
            .payment_status
            .can_transition_to(PaymentStatus::Approved)
        {
            return Err(DomainError::invariant(format!(
                "payment cannot move from {:?} to approved",
                self.financial.payment_status
            )));
        }
        self.financial.payment_status = PaymentStatus::Approved;
        self.paid_at = Some(at);
        Ok(())
    }

    /// Merge invoice fields from a webhook event. Only provided fields are
    /// written; absent fields keep their current value.
    pub fn merge_invoice_snapshot(
        &mut self,
        number: Option<String>,
        key: Option<String>,
        pdf_url: Option<String>,
        issued_at: Option<DateTime<Utc>>,
    ) {
        if number.is_some() {
            self.invoice.number = number;
        }
        if key.is_some() {
            self.invoice.key = key;
        }
        if pdf_url.is_some() {
            self.invoice.pdf_url = pdf_url;
        }
        if issued_at.is_some() {
            self.invoice.issued_at = issued_at;
        }
    }

    /// Record a tracking code (and carrier, when provided).
    pub fn set_tracking(&mut self, tracking_code: impl Into<String>, carrier: Option<String>) {
        self.fulfillment.tracking_code = Some(tracking_code.into());
        if carrier.is_some() {
            self.fulfillment.carrier = carrier;
        }
    }

    /// Refresh the local<->ERP reconciliation timestamp.
    pub fn touch_erp_sync(&mut self, at: DateTime<Utc>) {
        self.last_erp_sync = Some(at);
    }

    /// Soft-delete. Orders are never hard-deleted.
    pub fn soft_delete(&mut self) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(Utc::now());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn new_order_starts_pending_without_erp_linkage() {
        let order = order("PED-20240101-0001");
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.erp_order_number().is_none());
        assert!(!order.is_paid());
    }

    #[test]
    fn erp_linkage_is_assigned_once() {
        let mut order = order("PED-20240101-0001");
        order.assign_erp_order_number("24442492001").unwrap();
        assert_eq!(order.erp_order_number(), Some("24442492001"));
        assert!(order.erp_synced_at().is_some());

        let err = order.assign_erp_order_number("99999").unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(order.erp_order_number(), Some("24442492001"));
    }

    #[test]
    fn advance_status_rejects_backward_moves() {
        let mut order = order("PED-20240101-0002");
        order.advance_status(OrderStatus::Invoiced).unwrap();
        let err = order.advance_status(OrderStatus::Processing).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(order.status(), OrderStatus::Invoiced);
    }

    #[test]
    fn cancel_from_non_terminal_then_no_further_moves() {
        let mut order = order("PED-20240101-0003");
        order.advance_status(OrderStatus::Processing).unwrap();
        order.cancel().unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.is_deleted());
        assert!(order.advance_status(OrderStatus::Shipped).is_err());
    }

    #[test]
    fn force_status_bypasses_transition_rules() {
        let mut order = order("PED-20240101-0004");
        order.advance_status(OrderStatus::Shipped).unwrap();
        order.force_status(OrderStatus::Processing);
        assert_eq!(order.status(), OrderStatus::Processing);
    }

    #[test]
    fn payment_approval_sets_paid_marker() {
        let mut order = order("PED-20240101-0005");
        let at = Utc::now();
        order.record_payment_approved(at).unwrap();
        assert!(order.is_paid());
        assert_eq!(order.paid_at(), Some(at));

        // Approving twice violates the payment machine.
        assert!(order.record_payment_approved(at).is_err());
    }

    #[test]
    fn invoice_merge_keeps_absent_fields() {
        let mut order = order("PED-20240101-0006");
        order.merge_invoice_snapshot(Some("000123".to_string()), None, None, None);
        order.merge_invoice_snapshot(None, Some("NFKEY".to_string()), None, None);

        assert_eq!(order.invoice().number.as_deref(), Some("000123"));
        assert_eq!(order.invoice().key.as_deref(), Some("NFKEY"));
        assert!(order.invoice().pdf_url.is_none());
    }

    #[test]
    fn items_are_append_only_and_frozen_after_pending() {
        let mut order = order("PED-20240101-0007");
        order.add_item(item("SKU-3")).unwrap();
        assert_eq!(order.items().len(), 3);

        order.advance_status(OrderStatus::Processing).unwrap();
        assert!(order.add_item(item("SKU-4")).is_err());
    }

    #[test]
    fn soft_delete_is_idempotent() {
        let mut order = order("PED-20240101-0008");
        order.soft_delete();
        let first = order.deleted_at;
        order.soft_delete();
        assert_eq!(order.deleted_at, first);
        assert!(order.is_deleted());
    }
}
