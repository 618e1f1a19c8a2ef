//! Scriptable in-memory ERP gateway for tests/dev.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ErpError;
use crate::gateway::ErpGateway;
use crate::payload::{ErpModule, ErpOrderPayload, ErpOrderSnapshot, ErpStatusEntry};

/// Default "open" status id the mock assigns on creation.
pub const MOCK_OPEN_STATUS_ID: u32 = 6;

#[derive(Debug, Default)]
struct Inner {
    modules: Vec<ErpModule>,
    statuses: HashMap<u32, Vec<ErpStatusEntry>>,
    /// local order_number -> snapshot
    orders: HashMap<String, ErpOrderSnapshot>,
    next_erp_number: u64,
    /// per-ERP-order countdown before `get_order_by_id` starts seeing it
    visibility_delay: HashMap<String, u32>,
    default_visibility_delay: u32,
    fail_next_create: Option<ErpError>,
    fail_status_updates: bool,
    fail_get_order: Option<ErpError>,
    list_modules_calls: u32,
    list_statuses_calls: u32,
    status_update_calls: Vec<(String, u32)>,
    update_order_calls: Vec<String>,
    create_calls: u32,
}

/// In-memory ERP double.
///
/// Records every call and supports injected failures, duplicate signaling and
/// delayed order visibility (the ERP-side commit lag the sync service polls
/// through).
#[derive(Debug)]
pub struct MockErpGateway {
    inner: Mutex<Inner>,
}

impl MockErpGateway {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_erp_number: 24_442_492_001,
                ..Inner::default()
            }),
        }
    }

    pub fn set_modules(&self, modules: Vec<ErpModule>) {
        self.inner.lock().unwrap().modules = modules;
    }

    pub fn set_statuses(&self, module_id: u32, entries: Vec<ErpStatusEntry>) {
        self.inner.lock().unwrap().statuses.insert(module_id, entries);
    }

    /// Fail the next `create_order` with the given error.
    pub fn fail_next_create(&self, err: ErpError) {
        self.inner.lock().unwrap().fail_next_create = Some(err);
    }

    /// Make every `update_order_status` call fail with a 500.
    pub fn fail_status_updates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_status_updates = fail;
    }

    /// Fail every `get_order_by_id` with the given error.
    pub fn fail_get_order(&self, err: ErpError) {
        self.inner.lock().unwrap().fail_get_order = Some(err);
    }

    /// Newly created orders only become visible to `get_order_by_id` after
    /// this many lookups (simulates ERP-side commit lag).
    pub fn set_visibility_delay(&self, lookups: u32) {
        self.inner.lock().unwrap().default_visibility_delay = lookups;
    }

    /// Overwrite the reported status of an existing ERP order.
    pub fn set_order_status(&self, erp_order_number: &str, status_id: u32, status_name: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        for snapshot in inner.orders.values_mut() {
            if snapshot.erp_order_number == erp_order_number {
                snapshot.status_id = status_id;
                snapshot.status_name = status_name.map(str::to_string);
            }
        }
    }

    pub fn list_modules_calls(&self) -> u32 {
        self.inner.lock().unwrap().list_modules_calls
    }

    pub fn list_statuses_calls(&self) -> u32 {
        self.inner.lock().unwrap().list_statuses_calls
    }

    pub fn create_calls(&self) -> u32 {
        self.inner.lock().unwrap().create_calls
    }

    /// Narrow status-update calls, in order: (erp_order_number, status_id).
    pub fn status_update_calls(&self) -> Vec<(String, u32)> {
        self.inner.lock().unwrap().status_update_calls.clone()
    }

    pub fn update_order_calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().update_order_calls.clone()
    }
}

impl Default for MockErpGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ErpGateway for MockErpGateway {
    fn create_order(&self, payload: &ErpOrderPayload) -> Result<String, ErpError> {
        let mut inner = self.inner.lock().unwrap();
        inner.create_calls += 1;

        if let Some(err) = inner.fail_next_create.take() {
            return Err(err);
        }

        if let Some(existing) = inner.orders.get(&payload.order_number) {
            return Err(ErpError::duplicate(existing.erp_order_number.clone()));
        }

        let erp_number = inner.next_erp_number.to_string();
        inner.next_erp_number += 1;

        let delay = inner.default_visibility_delay;
        if delay > 0 {
            inner.visibility_delay.insert(erp_number.clone(), delay);
        }

        inner.orders.insert(
            payload.order_number.clone(),
            ErpOrderSnapshot {
                erp_order_number: erp_number.clone(),
                status_id: MOCK_OPEN_STATUS_ID,
                status_name: Some("Em aberto".to_string()),
                updated_at: Some(chrono::Utc::now()),
            },
        );

        Ok(erp_number)
    }

    fn update_order(
        &self,
        erp_order_number: &str,
        _payload: &ErpOrderPayload,
    ) -> Result<(), ErpError> {
        let mut inner = self.inner.lock().unwrap();
        inner.update_order_calls.push(erp_order_number.to_string());

        if inner
            .orders
            .values()
            .any(|s| s.erp_order_number == erp_order_number)
        {
            Ok(())
        } else {
            Err(ErpError::provider(404, "order not found"))
        }
    }

    fn update_order_status(&self, erp_order_number: &str, status_id: u32) -> Result<(), ErpError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .status_update_calls
            .push((erp_order_number.to_string(), status_id));

        if inner.fail_status_updates {
            return Err(ErpError::provider(500, "status update failed"));
        }

        for snapshot in inner.orders.values_mut() {
            if snapshot.erp_order_number == erp_order_number {
                snapshot.status_id = status_id;
                return Ok(());
            }
        }
        Err(ErpError::provider(404, "order not found"))
    }

    fn get_order_by_id(&self, erp_order_number: &str) -> Result<Option<ErpOrderSnapshot>, ErpError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(err) = inner.fail_get_order.clone() {
            return Err(err);
        }

        if let Some(remaining) = inner.visibility_delay.get_mut(erp_order_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }

        Ok(inner
            .orders
            .values()
            .find(|s| s.erp_order_number == erp_order_number)
            .cloned())
    }

    fn list_modules(&self) -> Result<Vec<ErpModule>, ErpError> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_modules_calls += 1;
        Ok(inner.modules.clone())
    }

    fn list_statuses(&self, module_id: u32) -> Result<Vec<ErpStatusEntry>, ErpError> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_statuses_calls += 1;
        Ok(inner.statuses.get(&module_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(order_number: &str) -> ErpOrderPayload {
        ErpOrderPayload {
            order_number: order_number.to_string(),
            customer: crate::payload::ErpCustomer {
                name: "Maria".to_string(),
                email: "maria@example.com".to_string(),
                document: None,
                phone: None,
            },
            items: vec![],
            shipping_total: 0,
            discount_total: 0,
            total: 0,
            payment_method: "pix".to_string(),
            installments: 1,
            shipping: crate::payload::ErpShipping::default(),
            notes: None,
        }
    }

    #[test]
    fn create_assigns_sequential_numbers_and_detects_duplicates() {
        let gateway = MockErpGateway::new();
        let first = gateway.create_order(&payload("PED-1")).unwrap();
        let second = gateway.create_order(&payload("PED-2")).unwrap();
        assert_ne!(first, second);

        let err = gateway.create_order(&payload("PED-1")).unwrap_err();
        assert_eq!(err, ErpError::duplicate(first));
    }

    #[test]
    fn visibility_delay_hides_fresh_orders() {
        let gateway = MockErpGateway::new();
        gateway.set_visibility_delay(2);
        let erp_number = gateway.create_order(&payload("PED-1")).unwrap();

        assert!(gateway.get_order_by_id(&erp_number).unwrap().is_none());
        assert!(gateway.get_order_by_id(&erp_number).unwrap().is_none());
        assert!(gateway.get_order_by_id(&erp_number).unwrap().is_some());
    }

    #[test]
    fn status_update_mutates_the_snapshot() {
        let gateway = MockErpGateway::new();
        let erp_number = gateway.create_order(&payload("PED-1")).unwrap();

        gateway.update_order_status(&erp_number, 9).unwrap();
        let snapshot = gateway.get_order_by_id(&erp_number).unwrap().unwrap();
        assert_eq!(snapshot.status_id, 9);
        assert_eq!(gateway.status_update_calls(), vec![(erp_number, 9)]);
    }
}
