//! Customer repository implementation

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::DatabaseError;

/// Repository for the `customers` table
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a customer by id
    ///
    /// # Returns
    ///
    /// The customer row or NotFound error
    pub async fn get_by_id(&self, id: i64) -> Result<CustomerRow, DatabaseError> {
        sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, currency, balance
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Customer", id))
    }

    /// Retrieves every customer ordered by id
    pub async fn list(&self) -> Result<Vec<CustomerRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, currency, balance
            FROM customers
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts a customer and returns the stored row
    pub async fn insert(&self, currency: &str, balance: Decimal) -> Result<CustomerRow, DatabaseError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            INSERT INTO customers (currency, balance)
            VALUES ($1, $2)
            RETURNING id, currency, balance
            "#,
        )
        .bind(currency)
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

/// Database row for a customer
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub currency: String,
    pub balance: Decimal,
}
