//! ERP-shaped payloads.
//!
//! Wire DTOs for the gateway contract. Field names follow the ERP's order
//! model, not the local aggregate; the sync service owns the translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ERP module descriptor, from "list modules".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpModule {
    pub id: u32,
    pub name: String,
}

/// One entry of the merchant-configurable status taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpStatusEntry {
    pub id: u32,
    pub name: String,
    pub color: Option<String>,
    #[serde(default)]
    pub is_inherited: bool,
}

/// Customer block of an ERP order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpCustomer {
    pub name: String,
    pub email: String,
    pub document: Option<String>,
    pub phone: Option<String>,
}

/// One item line of an ERP order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpOrderItem {
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    /// Unit price in smallest currency unit.
    pub unit_price: u64,
}

/// Shipping block of an ERP order payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpShipping {
    pub method_name: String,
    pub carrier: Option<String>,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Full order payload for create/update.
///
/// Updates are a **replace**, not a merge, on this ERP: every field must be
/// re-sent on update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpOrderPayload {
    pub order_number: String,
    pub customer: ErpCustomer,
    pub items: Vec<ErpOrderItem>,
    pub shipping_total: u64,
    pub discount_total: u64,
    pub total: u64,
    pub payment_method: String,
    pub installments: u32,
    pub shipping: ErpShipping,
    pub notes: Option<String>,
}

/// What the ERP reports back for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpOrderSnapshot {
    pub erp_order_number: String,
    pub status_id: u32,
    pub status_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
