//! ERP gateway error surface.

use std::collections::BTreeMap;

use thiserror::Error;

/// Error returned by ERP gateway operations.
///
/// Duplicate-order conflicts stay distinguishable from generic failure so the
/// caller can choose idempotent-success handling over a hard failure. Provider
/// errors carry an HTTP-status-like code plus a structured context map.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErpError {
    /// The ERP reports the order already exists. Carries the conflicting
    /// ERP-side order number when the provider includes it.
    #[error("order already exists in the ERP: {existing_order_number}")]
    Duplicate { existing_order_number: String },

    /// The external 3 req/s cap (or the provider's own limiter) rejected the
    /// call.
    #[error("erp request rate limited")]
    RateLimited,

    /// Connect or total timeout elapsed.
    #[error("erp request timed out")]
    Timeout,

    /// Auth refresh failed or the token was rejected.
    #[error("erp request unauthorized")]
    Unauthorized,

    /// Any other provider-reported failure.
    #[error("erp provider error ({code}): {message}")]
    Provider {
        code: u16,
        message: String,
        context: BTreeMap<String, String>,
    },
}

impl ErpError {
    pub fn provider(code: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn provider_with_context(
        code: u16,
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self::Provider {
            code,
            message: message.into(),
            context,
        }
    }

    pub fn duplicate(existing_order_number: impl Into<String>) -> Self {
        Self::Duplicate {
            existing_order_number: existing_order_number.into(),
        }
    }

    /// Whether the failure is worth retrying under the enclosing job's
    /// backoff policy.
    pub fn is_transient(&self) -> bool {
        match self {
            ErpError::RateLimited | ErpError::Timeout => true,
            ErpError::Provider { code, .. } => (500..=599).contains(code),
            ErpError::Duplicate { .. } | ErpError::Unauthorized => false,
        }
    }
}
