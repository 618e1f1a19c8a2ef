//! Customer lookup seam.
//!
//! Customer CRUD itself lives in the web layer; the core only needs to
//! resolve an order's owner when building ERP payloads and addressing
//! notification emails.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use orderbridge_core::CustomerId;

/// Customer details the core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub document: Option<String>,
    pub phone: Option<String>,
}

/// Customer lookup abstraction.
pub trait CustomerDirectory: Send + Sync {
    fn get(&self, id: CustomerId) -> Option<Customer>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    customers: RwLock<HashMap<CustomerId, Customer>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, customer: Customer) {
        self.customers
            .write()
            .unwrap()
            .insert(customer.id, customer);
    }
}

impl CustomerDirectory for InMemoryCustomerDirectory {
    fn get(&self, id: CustomerId) -> Option<Customer> {
        self.customers.read().unwrap().get(&id).cloned()
    }
}
