//! Payment transaction domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use warung_core::{OrderId, TransactionId, TransactionRef, TransactionStatus, UserId};

/// Local record of a gateway transaction for an order.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    /// Gateway order reference (`ORDER-{ts}-{hex}`).
    pub transaction_id: TransactionRef,
    pub amount: Decimal,
    pub status: TransactionStatus,
    /// Last raw payload received from the gateway.
    pub payment_response: serde_json::Value,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A status report from the gateway, already mapped to local terms.
#[derive(Debug, Clone)]
pub struct GatewayUpdate {
    /// Mapped status; `None` for gateway statuses with no local meaning.
    pub status: Option<TransactionStatus>,
    /// Gateway payment type (e.g. `bank_transfer`, `gopay`).
    pub payment_method: Option<String>,
    /// Raw payload, stored verbatim.
    pub payload: serde_json::Value,
}

impl GatewayUpdate {
    /// Status the transaction should hold after this update.
    ///
    /// Unmapped statuses and transitions refused by
    /// [`TransactionStatus::can_transition_to`] keep the current status.
    #[must_use]
    pub fn resolve(&self, current: TransactionStatus) -> TransactionStatus {
        match self.status {
            Some(next) if current.can_transition_to(next) => next,
            _ => current,
        }
    }
}

/// Result of applying a [`GatewayUpdate`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Transaction after the update.
    pub transaction: Transaction,
    /// Status before the update.
    pub previous_status: TransactionStatus,
    /// Whether this update completed the order (first completion only).
    pub order_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: Option<TransactionStatus>) -> GatewayUpdate {
        GatewayUpdate {
            status,
            payment_method: None,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn test_resolve_applies_mapped_status() {
        let next = update(Some(TransactionStatus::Settlement)).resolve(TransactionStatus::Pending);
        assert_eq!(next, TransactionStatus::Settlement);
    }

    #[test]
    fn test_resolve_keeps_status_for_unknown() {
        assert_eq!(
            update(None).resolve(TransactionStatus::Challenge),
            TransactionStatus::Challenge
        );
    }

    #[test]
    fn test_resolve_refuses_regression_from_paid() {
        assert_eq!(
            update(Some(TransactionStatus::Expired)).resolve(TransactionStatus::Settlement),
            TransactionStatus::Settlement
        );
        assert_eq!(
            update(Some(TransactionStatus::Pending)).resolve(TransactionStatus::Success),
            TransactionStatus::Success
        );
    }

    #[test]
    fn test_resolve_lets_failed_transaction_retry() {
        assert_eq!(
            update(Some(TransactionStatus::Pending)).resolve(TransactionStatus::Failed),
            TransactionStatus::Pending
        );
        assert_eq!(
            update(Some(TransactionStatus::Challenge)).resolve(TransactionStatus::Expired),
            TransactionStatus::Challenge
        );
    }
}
