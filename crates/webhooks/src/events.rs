//! Provider-agnostic webhook event DTOs.
//!
//! Normalization from raw provider JSON to these shapes is an adapter
//! responsibility outside this crate; processors consume the normalized form
//! only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invoice (fiscal note) event from the invoicing provider.
///
/// Depending on the trigger path the provider supplies either the ERP order
/// id or the local order number, sometimes both. Every other field is
/// optional; events arrive incrementally as the note moves through issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceEvent {
    pub order_number: Option<String>,
    pub erp_order_id: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_key: Option<String>,
    pub invoice_type: Option<String>,
    pub pdf_url: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl InvoiceEvent {
    /// An invoice is complete once it has both its number and its access key.
    /// Only complete events may flip the order status.
    pub fn is_complete(&self) -> bool {
        self.invoice_number.is_some() && self.invoice_key.is_some()
    }
}

/// Shipping/tracking event from the carrier integration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingEvent {
    pub order_number: String,
    pub tracking_code: Option<String>,
    pub carrier: Option<String>,
    pub service: Option<String>,
    /// Raw carrier status name, mapped through the shared name vocabulary.
    pub status: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}
