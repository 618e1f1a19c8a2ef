//! Canonical order and payment status machines.
//!
//! The ERP exposes a merchant-configurable status vocabulary; the rest of the
//! system never branches on those strings. Everything is translated into
//! `OrderStatus`, a closed sum type with explicit transition rules.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Canonical order lifecycle.
///
/// Strictly forward-moving except for `Cancelled`, which is reachable from any
/// non-terminal state. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Invoiced,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All canonical states, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Invoiced,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Position on the forward path. `Cancelled` sits outside the path.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Invoiced => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether a transition `self -> next` is allowed.
    ///
    /// Forward moves (skipping states is fine — a pull from the ERP may observe
    /// several hops at once) and cancellation from any non-terminal state.
    /// Self-transitions are not transitions.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self == next {
            return false;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Validate a transition, returning the invariant violation on failure.
    pub fn ensure_transition_to(self, next: OrderStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "illegal order status transition: {self} -> {next}"
            )))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status machine, independent of the order lifecycle.
///
/// `Pending -> {Approved | Rejected | Cancelled}`; an approved payment can
/// still move to `Refunded` or `ChargedBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        if self == next {
            return false;
        }
        match self {
            PaymentStatus::Pending => matches!(
                next,
                PaymentStatus::Approved | PaymentStatus::Rejected | PaymentStatus::Cancelled
            ),
            PaymentStatus::Approved => {
                matches!(next, PaymentStatus::Refunded | PaymentStatus::ChargedBack)
            }
            _ => false,
        }
    }

    pub fn is_paid(self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }
}
