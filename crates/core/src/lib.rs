//! `orderbridge-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the canonical order/payment status machines, and the
//! domain error model shared by every other crate in the workspace.

pub mod error;
pub mod id;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrderId, ProductId};
pub use status::{OrderStatus, PaymentStatus};
