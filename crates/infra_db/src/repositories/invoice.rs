//! Invoice repository implementation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::DatabaseError;

const INVOICE_COLUMNS: &str = "id, customer_id, currency, value, status, created";

/// Repository for the `invoices` table
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves an invoice by id
    ///
    /// # Returns
    ///
    /// The invoice row or NotFound error
    pub async fn get_by_id(&self, id: i64) -> Result<InvoiceRow, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))
    }

    /// Retrieves every invoice ordered by id
    pub async fn list(&self) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Retrieves invoices with `status` created in `[start, end)`
    pub async fn find_by_status_created_between(
        &self,
        status: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE status = $1
              AND created >= $2
              AND created < $3
            "#
        ))
        .bind(status)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts an invoice and returns the stored row
    ///
    /// # Errors
    ///
    /// Returns NotFound if the referenced customer does not exist
    pub async fn insert(&self, invoice: NewInvoiceRow) -> Result<InvoiceRow, DatabaseError> {
        let customer_id = invoice.customer_id;
        sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            INSERT INTO invoices (customer_id, currency, value, status, created)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice.customer_id)
        .bind(invoice.currency)
        .bind(invoice.value)
        .bind(invoice.status)
        .bind(invoice.created)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::ForeignKeyViolation(_) => DatabaseError::not_found("Customer", customer_id),
            other => other,
        })
    }
}

/// Database row for an invoice
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: i64,
    pub customer_id: i64,
    pub currency: String,
    pub value: Decimal,
    pub status: String,
    pub created: DateTime<Utc>,
}

/// Data for inserting an invoice
#[derive(Debug, Clone)]
pub struct NewInvoiceRow {
    pub customer_id: i64,
    pub currency: String,
    pub value: Decimal,
    pub status: String,
    pub created: DateTime<Utc>,
}
