//! Status enums for catalog and payment entities.

use serde::{Deserialize, Serialize};

/// Local status of a payment transaction.
///
/// Mirrors the gateway's lifecycle closely enough that a notification maps to
/// exactly one variant. `Settlement` and `Success` are the paid states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.transaction_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting payment.
    #[default]
    Pending,
    /// Funds settled.
    Settlement,
    /// Card captured without a fraud challenge.
    Success,
    /// Denied by the gateway or the issuer.
    Deny,
    /// Cancelled before settlement.
    Canceled,
    /// Captured but held for fraud review.
    Challenge,
    /// Payment attempt failed.
    Failed,
    /// Payment window elapsed.
    Expired,
}

impl TransactionStatus {
    /// Whether money has been received for this transaction.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Settlement | Self::Success)
    }

    /// Whether moving from `self` to `next` is accepted.
    ///
    /// Paid transactions never regress to an unpaid status; every other
    /// status may move anywhere.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_paid() || next.is_paid()
    }

    /// Lowercase wire/storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Settlement => "settlement",
            Self::Success => "success",
            Self::Deny => "deny",
            Self::Canceled => "canceled",
            Self::Challenge => "challenge",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "settlement" => Ok(Self::Settlement),
            "success" => Ok(Self::Success),
            "deny" => Ok(Self::Deny),
            "canceled" => Ok(Self::Canceled),
            "challenge" => Ok(Self::Challenge),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("invalid transaction status: {s}")),
        }
    }
}

/// Stock availability shown on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.stock_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    Available,
    LowStock,
    OutOfStock,
    PreOrder,
}

/// Dimension a product variant differs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "store.variant_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    #[default]
    Color,
    Size,
    Material,
    Style,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_statuses() {
        assert!(TransactionStatus::Settlement.is_paid());
        assert!(TransactionStatus::Success.is_paid());
        assert!(!TransactionStatus::Challenge.is_paid());
        assert!(!TransactionStatus::Pending.is_paid());
    }

    #[test]
    fn test_paid_never_regresses() {
        let paid = TransactionStatus::Settlement;
        assert!(!paid.can_transition_to(TransactionStatus::Pending));
        assert!(!paid.can_transition_to(TransactionStatus::Expired));
        assert!(paid.can_transition_to(TransactionStatus::Settlement));
        assert!(TransactionStatus::Success.can_transition_to(TransactionStatus::Settlement));
    }

    #[test]
    fn test_failed_can_move_again() {
        let expired = TransactionStatus::Expired;
        assert!(expired.can_transition_to(TransactionStatus::Pending));
        assert!(expired.can_transition_to(TransactionStatus::Challenge));
        assert!(expired.can_transition_to(TransactionStatus::Settlement));
        assert!(TransactionStatus::Failed.can_transition_to(TransactionStatus::Deny));
    }

    #[test]
    fn test_pending_moves_anywhere() {
        for next in [
            TransactionStatus::Challenge,
            TransactionStatus::Deny,
            TransactionStatus::Settlement,
            TransactionStatus::Pending,
        ] {
            assert!(TransactionStatus::Pending.can_transition_to(next));
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Canceled,
            TransactionStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<TransactionStatus>(), Ok(status));
        }
        assert!("cancel".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&StockStatus::OutOfStock).ok().as_deref(),
            Some("\"out_of_stock\"")
        );
    }
}
