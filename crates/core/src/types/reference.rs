//! Opaque string and token references.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The order reference shared with the payment gateway.
///
/// Stored on both the order (`orders.transaction_id`) and its transaction
/// row, and echoed back by every gateway notification as `order_id`. Freshly
/// generated references look like `ORDER-1718000000-1a2b3c4d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct TransactionRef(String);

impl TransactionRef {
    /// Prefix of generated references.
    pub const PREFIX: &'static str = "ORDER";

    /// Generate a unique reference from a timestamp and a random suffix.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let short = suffix.get(..8).unwrap_or(&suffix);
        Self(format!("{}-{}-{short}", Self::PREFIX, now.timestamp()))
    }

    /// Wrap an existing reference (e.g., from a gateway callback).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random token identifying an anonymous visitor's cart.
///
/// Kept in the visitor's session and on the cart order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct GuestToken(Uuid);

impl GuestToken {
    /// Generate a fresh token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for GuestToken {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}
