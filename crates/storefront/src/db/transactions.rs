//! Transaction repository: local records of gateway payments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use warung_core::{OrderId, TransactionId, TransactionRef, TransactionStatus, UserId};

use super::RepositoryError;
use super::orders::complete_order;
use crate::models::transaction::{GatewayUpdate, Reconciliation, Transaction};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: TransactionId,
    order_id: OrderId,
    user_id: Option<UserId>,
    transaction_id: TransactionRef,
    amount: Decimal,
    status: TransactionStatus,
    payment_response: serde_json::Value,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            transaction_id: row.transaction_id,
            amount: row.amount,
            status: row.status,
            payment_response: row.payment_response,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TRANSACTION_COLUMNS: &str = r"
    id, order_id, user_id, transaction_id, amount, status, payment_response,
    payment_method, created_at, updated_at
";

/// Repository for payment transactions.
pub struct TransactionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepository<'a> {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a transaction by its gateway reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_ref(
        &self,
        reference: &TransactionRef,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM store.transaction WHERE transaction_id = $1"
        ))
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Transaction::from))
    }

    /// The transaction of an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_order(&self, order_id: OrderId) -> Result<Option<Transaction>, RepositoryError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM store.transaction WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Transaction::from))
    }

    /// The user's most recent transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest_for_user(&self, user_id: UserId) -> Result<Option<Transaction>, RepositoryError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM store.transaction
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Transaction::from))
    }

    /// Create the order's transaction, or reset it to `pending` under a new
    /// reference for a fresh payment attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order's transaction is
    /// already paid.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, snap_response), fields(%reference))]
    pub async fn start_payment(
        &self,
        order_id: OrderId,
        user_id: Option<UserId>,
        reference: &TransactionRef,
        amount: Decimal,
        snap_response: &serde_json::Value,
    ) -> Result<Transaction, RepositoryError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO store.transaction
                 (order_id, user_id, transaction_id, amount, status, payment_response)
             VALUES ($1, $2, $3, $4, 'pending', $5)
             ON CONFLICT (order_id) DO UPDATE
             SET transaction_id = EXCLUDED.transaction_id,
                 user_id = COALESCE(EXCLUDED.user_id, store.transaction.user_id),
                 amount = EXCLUDED.amount,
                 status = 'pending',
                 payment_response = EXCLUDED.payment_response,
                 payment_method = NULL,
                 updated_at = now()
             WHERE store.transaction.status NOT IN ('settlement', 'success')
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(order_id)
        .bind(user_id)
        .bind(reference)
        .bind(amount)
        .bind(snap_response)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "transaction reference already used"))?;

        row.map(Transaction::from)
            .ok_or_else(|| RepositoryError::Conflict("order is already paid".to_owned()))
    }

    /// Apply a gateway status report to the transaction with `reference`.
    ///
    /// The row is locked for the duration. The payload is always stored; the
    /// status moves only where [`GatewayUpdate::resolve`] allows it. When the
    /// resolved status is paid, the order is completed in the same database
    /// transaction, so redelivered notifications complete it exactly once.
    ///
    /// Returns `None` if no transaction has this reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, update), fields(%reference, gateway_status = ?update.status))]
    pub async fn apply_gateway_update(
        &self,
        reference: &TransactionRef,
        update: &GatewayUpdate,
    ) -> Result<Option<Reconciliation>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM store.transaction
             WHERE transaction_id = $1
             FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.commit().await?;
            return Ok(None);
        };

        let previous_status = current.status;
        let next_status = update.resolve(previous_status);
        if update.status.is_some_and(|s| s != next_status) {
            tracing::warn!(
                from = %previous_status,
                to = ?update.status,
                "ignoring gateway status regression"
            );
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE store.transaction
             SET status = $2,
                 payment_response = $3,
                 payment_method = COALESCE($4, payment_method),
                 updated_at = now()
             WHERE id = $1
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(current.id)
        .bind(next_status)
        .bind(&update.payload)
        .bind(update.payment_method.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        let order_completed = if next_status.is_paid() {
            complete_order(&mut *tx, row.order_id).await?
        } else {
            false
        };

        tx.commit().await?;

        Ok(Some(Reconciliation {
            transaction: Transaction::from(row),
            previous_status,
            order_completed,
        }))
    }

    /// Mark a still-pending transaction as failed.
    ///
    /// Returns whether the status changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fail_if_pending(&self, reference: &TransactionRef) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE store.transaction
            SET status = 'failed', updated_at = now()
            WHERE transaction_id = $1 AND status = 'pending'
            ",
        )
        .bind(reference)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
