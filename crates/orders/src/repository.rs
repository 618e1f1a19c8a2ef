//! Order persistence seam.
//!
//! The core stays storage-agnostic: callers program against `OrderRepository`
//! and the tests run on the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use orderbridge_core::OrderId;

use crate::order::Order;

/// Order repository abstraction.
pub trait OrderRepository: Send + Sync {
    /// Insert a new order. Rejects duplicate order numbers.
    fn insert(&self, order: Order) -> Result<(), RepositoryError>;

    /// Get an order by its internal id.
    fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Find an order by its human-readable order number.
    fn find_by_order_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError>;

    /// Find an order by the number the ERP assigned to it.
    fn find_by_erp_order_number(
        &self,
        erp_order_number: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Persist changes to an existing order.
    fn update(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Mark an order soft-deleted. Soft-deleted orders drop out of the sync
    /// listings; rows are never hard-deleted.
    fn soft_delete(&self, id: OrderId) -> Result<(), RepositoryError>;

    /// Orders with an ERP linkage that are not yet in a terminal state,
    /// oldest first. Used by batch reconciliation.
    fn list_pending_erp_sync(&self, limit: usize) -> Result<Vec<Order>, RepositoryError>;

    /// Whether an order number is already taken.
    fn order_number_exists(&self, order_number: &str) -> Result<bool, RepositoryError>;
}

/// Repository error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("order not found")]
    NotFound,
    #[error("duplicate order number: {0}")]
    DuplicateOrderNumber(String),
    #[error("duplicate erp order number: {0}")]
    DuplicateErpOrderNumber(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// In-memory order repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().unwrap();
        if orders
            .values()
            .any(|o| o.order_number() == order.order_number())
        {
            return Err(RepositoryError::DuplicateOrderNumber(
                order.order_number().to_string(),
            ));
        }
        orders.insert(order.id(), order);
        Ok(())
    }

    fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap();
        Ok(orders.get(&id).cloned())
    }

    fn find_by_order_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap();
        Ok(orders
            .values()
            .find(|o| o.order_number() == order_number)
            .cloned())
    }

    fn find_by_erp_order_number(
        &self,
        erp_order_number: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap();
        Ok(orders
            .values()
            .find(|o| o.erp_order_number() == Some(erp_order_number))
            .cloned())
    }

    fn update(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().unwrap();
        if !orders.contains_key(&order.id()) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(erp_no) = order.erp_order_number() {
            if orders
                .values()
                .any(|o| o.id() != order.id() && o.erp_order_number() == Some(erp_no))
            {
                return Err(RepositoryError::DuplicateErpOrderNumber(erp_no.to_string()));
            }
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    fn soft_delete(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().unwrap();
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.soft_delete();
        Ok(())
    }

    fn list_pending_erp_sync(&self, limit: usize) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().unwrap();
        let mut result: Vec<_> = orders
            .values()
            .filter(|o| {
                o.erp_order_number().is_some() && !o.status().is_terminal() && !o.is_deleted()
            })
            .cloned()
            .collect();
        result.sort_by_key(|o| o.created_at());
        result.truncate(limit);
        Ok(result)
    }

    fn order_number_exists(&self, order_number: &str) -> Result<bool, RepositoryError> {
        let orders = self.orders.read().unwrap();
        Ok(orders.values().any(|o| o.order_number() == order_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::test_support;
    use orderbridge_core::OrderStatus;

    #[test]
    fn insert_rejects_duplicate_order_numbers() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(test_support::order("PED-20240101-0001")).unwrap();

        let err = repo
            .insert(test_support::order("PED-20240101-0001"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateOrderNumber(_)));
    }

    #[test]
    fn lookup_by_order_number_and_erp_number() {
        let repo = InMemoryOrderRepository::new();
        let mut order = test_support::order("PED-20240101-0002");
        order.assign_erp_order_number("24442492001").unwrap();
        repo.insert(order.clone()).unwrap();

        let by_number = repo
            .find_by_order_number("PED-20240101-0002")
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id(), order.id());

        let by_erp = repo
            .find_by_erp_order_number("24442492001")
            .unwrap()
            .unwrap();
        assert_eq!(by_erp.id(), order.id());

        assert!(repo.find_by_order_number("missing").unwrap().is_none());
    }

    #[test]
    fn pending_erp_sync_excludes_terminal_unlinked_and_deleted() {
        let repo = InMemoryOrderRepository::new();

        let unlinked = test_support::order("PED-20240101-0003");
        repo.insert(unlinked).unwrap();

        let mut linked = test_support::order("PED-20240101-0004");
        linked.assign_erp_order_number("1001").unwrap();
        repo.insert(linked.clone()).unwrap();

        let mut delivered = test_support::order("PED-20240101-0005");
        delivered.assign_erp_order_number("1002").unwrap();
        delivered.advance_status(OrderStatus::Delivered).unwrap();
        repo.insert(delivered).unwrap();

        let mut deleted = test_support::order("PED-20240101-0006");
        deleted.assign_erp_order_number("1003").unwrap();
        deleted.soft_delete();
        repo.insert(deleted).unwrap();

        let pending = repo.list_pending_erp_sync(100).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), linked.id());
    }

    #[test]
    fn soft_delete_marks_the_order_and_hides_it_from_sync() {
        let repo = InMemoryOrderRepository::new();
        let mut order = test_support::order("PED-20240101-0009");
        order.assign_erp_order_number("3001").unwrap();
        repo.insert(order.clone()).unwrap();
        assert_eq!(repo.list_pending_erp_sync(100).unwrap().len(), 1);

        repo.soft_delete(order.id()).unwrap();

        let stored = repo.get(order.id()).unwrap().unwrap();
        assert!(stored.is_deleted());
        assert!(repo.list_pending_erp_sync(100).unwrap().is_empty());

        let err = repo.soft_delete(OrderId::new()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[test]
    fn update_rejects_conflicting_erp_linkage() {
        let repo = InMemoryOrderRepository::new();
        let mut first = test_support::order("PED-20240101-0007");
        first.assign_erp_order_number("2001").unwrap();
        repo.insert(first).unwrap();

        let second = test_support::order("PED-20240101-0008");
        repo.insert(second.clone()).unwrap();

        let mut second = second;
        second.assign_erp_order_number("2001").unwrap();
        let err = repo.update(&second).unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateErpOrderNumber(_)));
    }
}
