//! PostgreSQL customer adapter

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{Currency, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_billing::{Customer, CustomerPort};

use super::{check_database, parse_currency};
use crate::error::DatabaseError;
use crate::repositories::{CustomerRepository, CustomerRow};

/// PostgreSQL-backed implementation of `CustomerPort`
#[derive(Debug, Clone)]
pub struct PostgresCustomerAdapter {
    repository: CustomerRepository,
    pool: PgPool,
}

impl PostgresCustomerAdapter {
    /// Creates an adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: CustomerRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresCustomerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresCustomerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_database(&self.pool, "postgres-customer-adapter").await
    }
}

#[async_trait]
impl CustomerPort for PostgresCustomerAdapter {
    #[instrument(skip(self), fields(customer_id = %id))]
    async fn fetch_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
        debug!("Fetching customer");
        let row = self.repository.get_by_id(id.value()).await?;
        Ok(row_to_customer(row)?)
    }

    #[instrument(skip(self))]
    async fn fetch_customers(&self) -> Result<Vec<Customer>, PortError> {
        let rows = self.repository.list().await?;
        let customers = rows
            .into_iter()
            .map(row_to_customer)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(customers)
    }

    #[instrument(skip(self, currency, balance), fields(%currency))]
    async fn create_customer(
        &self,
        currency: Currency,
        balance: Decimal,
    ) -> Result<Customer, PortError> {
        let row = self.repository.insert(currency.code(), balance).await?;
        debug!(customer_id = row.id, "Customer created");
        Ok(row_to_customer(row)?)
    }
}

fn row_to_customer(row: CustomerRow) -> Result<Customer, DatabaseError> {
    Ok(Customer::new(
        CustomerId::new(row.id),
        parse_currency(&row.currency)?,
        row.balance,
    ))
}
