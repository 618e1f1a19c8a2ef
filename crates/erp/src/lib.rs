//! `orderbridge-erp` — the ERP collaborator boundary.
//!
//! The gateway itself is an external collaborator; this crate owns its
//! contract (`ErpGateway`), the typed error surface, the payload shapes, the
//! request rate limiter every call path shares, and the status catalog
//! resolver that translates the merchant-configurable ERP status vocabulary
//! into the canonical order states.

pub mod catalog;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod mock;
pub mod payload;

pub use catalog::{
    CatalogCache, CatalogConfig, DirectStatusMap, InMemoryCatalogCache, StatusCatalogResolver,
    canonical_from_status_name,
};
pub use error::ErpError;
pub use gateway::ErpGateway;
pub use limiter::RequestLimiter;
pub use mock::MockErpGateway;
pub use payload::{
    ErpCustomer, ErpModule, ErpOrderItem, ErpOrderPayload, ErpOrderSnapshot, ErpShipping,
    ErpStatusEntry,
};
