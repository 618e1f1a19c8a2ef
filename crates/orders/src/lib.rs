//! `orderbridge-orders` — the Order aggregate root and its persistence seam.
//!
//! Orders are the one aggregate this system owns. Everything financial and
//! fulfillment-related on an order is a frozen snapshot captured at
//! creation/payment time; it is never recomputed from current product data.

pub mod customer;
pub mod number;
pub mod order;
pub mod repository;

pub use customer::{Customer, CustomerDirectory, InMemoryCustomerDirectory};
pub use number::OrderNumberGenerator;
pub use order::{
    FinancialSnapshot, FulfillmentSnapshot, InvoiceSnapshot, Order, OrderItem, ShippingAddress,
};
pub use repository::{InMemoryOrderRepository, OrderRepository, RepositoryError};
