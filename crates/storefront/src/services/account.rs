//! Profile management for logged-in users.

use sqlx::PgPool;
use tracing::instrument;

use warung_core::Email;

use crate::db::CustomerRepository;
use crate::db::customers::ProfileUpdate;
use crate::error::{AppError, Result};
use crate::models::account::MAX_PHONE_LENGTH;
use crate::models::{Customer, CurrentUser, UserProfile};

/// Editable account fields. Missing fields are left unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A user's profile and the customer record orders are placed under.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Account {
    pub username: String,
    pub profile: UserProfile,
    pub customer: Customer,
}

/// Account service.
pub struct AccountService<'a> {
    customers: CustomerRepository<'a>,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            customers: CustomerRepository::new(pool),
        }
    }

    /// The user's profile (created empty on first access) and customer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the customer record is gone.
    pub async fn account(&self, user: &CurrentUser) -> Result<Account> {
        let profile = self.customers.profile(user.id).await?;
        let customer = self
            .customers
            .get_customer(user.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        Ok(Account {
            username: user.username.clone(),
            profile,
            customer,
        })
    }

    /// Update profile contact fields and the customer's name and email.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid email or a phone number
    /// longer than 15 characters.
    #[instrument(skip(self, user, update), fields(user_id = %user.id))]
    pub async fn update(&self, user: &CurrentUser, update: &AccountUpdate) -> Result<Account> {
        let phone = update.phone.as_deref().map(str::trim);
        if let Some(phone) = phone
            && phone.chars().count() > MAX_PHONE_LENGTH
        {
            return Err(AppError::BadRequest(format!(
                "Phone number must be at most {MAX_PHONE_LENGTH} characters"
            )));
        }

        let email = match update.email.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?),
        };
        let name = update
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let profile = self
            .customers
            .update_profile(
                user.id,
                &ProfileUpdate {
                    phone: phone.map(String::from),
                    address: update.address.clone(),
                    bio: update.bio.clone(),
                },
            )
            .await?;

        let customer = if name.is_some() || email.is_some() {
            self.customers
                .update_customer(user.customer_id, name, email.as_ref())
                .await?
        } else {
            self.customers
                .get_customer(user.customer_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?
        };

        tracing::info!("Account updated");

        Ok(Account {
            username: user.username.clone(),
            profile,
            customer,
        })
    }
}
