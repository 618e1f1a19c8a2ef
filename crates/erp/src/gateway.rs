//! ERP gateway contract.

use crate::error::ErpError;
use crate::payload::{ErpModule, ErpOrderPayload, ErpOrderSnapshot, ErpStatusEntry};

/// Contract of the ERP's REST client (external collaborator).
///
/// Implementations wrap the ERP's HTTP API: auth refresh, per-call connect and
/// total timeouts, and payload normalization all live behind this trait. The
/// core only depends on the contract; tests run against [`crate::MockErpGateway`].
pub trait ErpGateway: Send + Sync {
    /// Create an order. Returns the ERP-assigned order number.
    ///
    /// The ERP signals an existing order with the same number as
    /// [`ErpError::Duplicate`].
    fn create_order(&self, payload: &ErpOrderPayload) -> Result<String, ErpError>;

    /// Full-payload update. The ERP treats this as a replace, not a merge.
    fn update_order(&self, erp_order_number: &str, payload: &ErpOrderPayload)
    -> Result<(), ErpError>;

    /// Narrow, status-only transition. Status changes must use this call:
    /// full replaces have been observed to not propagate status reliably on
    /// this ERP.
    fn update_order_status(&self, erp_order_number: &str, status_id: u32) -> Result<(), ErpError>;

    /// Fetch an order by its ERP order number. `Ok(None)` when the ERP does
    /// not know the order (yet).
    fn get_order_by_id(&self, erp_order_number: &str) -> Result<Option<ErpOrderSnapshot>, ErpError>;

    /// List the ERP's modules.
    fn list_modules(&self) -> Result<Vec<ErpModule>, ErpError>;

    /// List the statuses configured for a module.
    fn list_statuses(&self, module_id: u32) -> Result<Vec<ErpStatusEntry>, ErpError>;
}
