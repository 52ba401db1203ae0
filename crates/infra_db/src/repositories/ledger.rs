//! Ledger repository implementation
//!
//! The only writer of `customers.balance` and `invoices.status`.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use crate::error::DatabaseError;

/// Repository applying payments to customers and invoices
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Debits the customer and marks the invoice paid in one serializable transaction
    ///
    /// The customer row is locked first, so concurrent commits for the same
    /// customer queue behind each other. The invoice update only matches a
    /// pending invoice of that customer; otherwise the transaction is rolled
    /// back and nothing changes.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the customer or the invoice does not exist
    /// - `Conflict` if the invoice is not pending or belongs to another customer
    /// - `SerializationFailure` if a concurrent transaction won
    pub async fn commit_payment(
        &self,
        invoice_id: i64,
        customer_id: i64,
        amount: Decimal,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let customer = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM customers WHERE id = $1 FOR UPDATE",
        )
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        if customer.is_none() {
            tx.rollback().await?;
            return Err(DatabaseError::not_found("Customer", customer_id));
        }

        let paid = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'PAID'
            WHERE id = $1
              AND customer_id = $2
              AND status = 'PENDING'
            "#,
        )
        .bind(invoice_id)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        if paid.rows_affected() != 1 {
            let status = sqlx::query_scalar::<_, String>("SELECT status FROM invoices WHERE id = $1")
                .bind(invoice_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Err(match status {
                None => DatabaseError::not_found("Invoice", invoice_id),
                Some(status) => DatabaseError::Conflict(format!(
                    "invoice {} of customer {} cannot be paid from status {}",
                    invoice_id, customer_id, status
                )),
            });
        }

        sqlx::query("UPDATE customers SET balance = balance - $2 WHERE id = $1")
            .bind(customer_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(invoice_id, customer_id, %amount, "Ledger transaction committed");
        Ok(())
    }
}
