//! PostgreSQL account ledger adapter

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PortError};
use domain_billing::AccountLedger;

use super::check_database;
use crate::repositories::LedgerRepository;

/// PostgreSQL-backed implementation of `AccountLedger`
///
/// Dropping an in-flight commit drops its transaction, which PostgreSQL
/// rolls back.
#[derive(Debug, Clone)]
pub struct PostgresLedgerAdapter {
    repository: LedgerRepository,
    pool: PgPool,
}

impl PostgresLedgerAdapter {
    /// Creates an adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: LedgerRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_database(&self.pool, "postgres-ledger-adapter").await
    }
}

#[async_trait]
impl AccountLedger for PostgresLedgerAdapter {
    #[instrument(skip(self, invoice_id, customer_id, amount), fields(%invoice_id, %customer_id))]
    async fn commit_payment(
        &self,
        invoice_id: InvoiceId,
        customer_id: CustomerId,
        amount: Decimal,
    ) -> Result<(), PortError> {
        self.repository
            .commit_payment(invoice_id.value(), customer_id.value(), amount)
            .await?;
        Ok(())
    }
}
