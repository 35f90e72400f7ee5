//! Account repository: users, customers and profiles.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use warung_core::{CustomerId, Email, ProfileId, UserId};

use super::RepositoryError;
use crate::models::account::{Customer, User, UserProfile};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            username: row.username,
            email: parse_optional_email(Some(row.email))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithPasswordRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    user_id: Option<UserId>,
    name: Option<String>,
    email: Option<String>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: parse_optional_email(row.email)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: ProfileId,
    user_id: UserId,
    phone: Option<String>,
    address: Option<String>,
    bio: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            phone: row.phone,
            address: row.address,
            bio: row.bio,
            updated_at: row.updated_at,
        }
    }
}

/// Empty strings are treated as "no email".
fn parse_optional_email(value: Option<String>) -> Result<Option<Email>, RepositoryError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Email::parse(raw).map(Some).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        }),
    }
}

/// Profile fields a user can edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

/// Repository for account database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user together with its customer and profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_account(
        &self,
        username: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<(User, Customer), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user_row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO store.user (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, created_at
            ",
        )
        .bind(username)
        .bind(email.as_str())
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "username already exists"))?;

        let customer_row = sqlx::query_as::<_, CustomerRow>(
            r"
            INSERT INTO store.customer (user_id, name, email)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, email
            ",
        )
        .bind(user_row.id)
        .bind(username)
        .bind(email.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO store.user_profile (user_id) VALUES ($1)")
            .bind(user_row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((User::try_from(user_row)?, Customer::try_from(customer_row)?))
    }

    /// Get a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_user_with_password(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(
            r"
            SELECT id, username, email, created_at, password_hash
            FROM store.user
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM store.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get the customer linked to a user, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn customer_for_user(&self, user: &User) -> Result<Customer, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO store.customer (user_id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.email.as_ref().map(Email::as_str))
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, user_id, name, email FROM store.customer WHERE user_id = $1",
        )
        .bind(user.id)
        .fetch_one(self.pool)
        .await?;

        Customer::try_from(row)
    }

    /// Get or create the guest customer for an email, refreshing its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn guest_customer(&self, name: &str, email: &Email) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            INSERT INTO store.customer (name, email)
            VALUES ($1, $2)
            ON CONFLICT (email) WHERE user_id IS NULL
            DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name, email
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .fetch_one(self.pool)
        .await?;

        Customer::try_from(row)
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, user_id, name, email FROM store.customer WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }

    /// Update a customer's display name and email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    pub async fn update_customer(
        &self,
        id: CustomerId,
        name: Option<&str>,
        email: Option<&Email>,
    ) -> Result<Customer, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            UPDATE store.customer
            SET name = COALESCE($2, name),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING id, user_id, name, email
            ",
        )
        .bind(id)
        .bind(name)
        .bind(email.map(Email::as_str))
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Customer::try_from(row)
    }

    /// Get a user's profile, creating an empty one if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            INSERT INTO store.user_profile (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, phone, address, bio, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(UserProfile::from(row))
    }

    /// Apply a profile update, creating the profile if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            INSERT INTO store.user_profile (user_id, phone, address, bio)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET phone = COALESCE(EXCLUDED.phone, store.user_profile.phone),
                address = COALESCE(EXCLUDED.address, store.user_profile.address),
                bio = COALESCE(EXCLUDED.bio, store.user_profile.bio),
                updated_at = now()
            RETURNING id, user_id, phone, address, bio, updated_at
            ",
        )
        .bind(user_id)
        .bind(update.phone.as_deref())
        .bind(update.address.as_deref())
        .bind(update.bio.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(UserProfile::from(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_email_is_none() {
        assert!(matches!(parse_optional_email(None), Ok(None)));
        assert!(matches!(parse_optional_email(Some("  ".to_string())), Ok(None)));
    }

    #[test]
    fn test_invalid_stored_email_is_corruption() {
        assert!(matches!(
            parse_optional_email(Some("not-an-email".to_string())),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
