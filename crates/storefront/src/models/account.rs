//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use warung_core::{CustomerId, Email, ProfileId, UserId};

/// Maximum length of a profile phone number.
pub const MAX_PHONE_LENGTH: usize = 15;

/// A registered storefront user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<Email>,
    pub created_at: DateTime<Utc>,
}

/// The purchasing party of an order.
///
/// Registered users have exactly one customer; guest checkouts create
/// customers without a user.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: Option<UserId>,
    pub name: Option<String>,
    pub email: Option<Email>,
}

/// Contact details attached to a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}
