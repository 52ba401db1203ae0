//! PostgreSQL invoice adapter

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

use core_kernel::{
    BillingPeriod, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, Money,
    PortError,
};
use domain_billing::{Invoice, InvoicePort, InvoiceStatus, NewInvoice};

use super::{check_database, parse_currency};
use crate::error::DatabaseError;
use crate::repositories::{InvoiceRepository, InvoiceRow, NewInvoiceRow};

/// PostgreSQL-backed implementation of `InvoicePort`
#[derive(Debug, Clone)]
pub struct PostgresInvoiceAdapter {
    repository: InvoiceRepository,
    pool: PgPool,
}

impl PostgresInvoiceAdapter {
    /// Creates an adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: InvoiceRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresInvoiceAdapter {}

#[async_trait]
impl HealthCheckable for PostgresInvoiceAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        check_database(&self.pool, "postgres-invoice-adapter").await
    }
}

#[async_trait]
impl InvoicePort for PostgresInvoiceAdapter {
    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        debug!("Fetching invoice");
        let row = self.repository.get_by_id(id.value()).await?;
        Ok(row_to_invoice(row)?)
    }

    #[instrument(skip(self))]
    async fn fetch_invoices(&self) -> Result<Vec<Invoice>, PortError> {
        let rows = self.repository.list().await?;
        Ok(rows_to_invoices(rows)?)
    }

    #[instrument(skip(self))]
    async fn fetch_due(
        &self,
        status: InvoiceStatus,
        period: BillingPeriod,
    ) -> Result<Vec<Invoice>, PortError> {
        let rows = self
            .repository
            .find_by_status_created_between(status.as_str(), period.start, period.end)
            .await?;
        debug!(count = rows.len(), "Selected invoices");
        Ok(decodable_invoices(rows))
    }

    #[instrument(skip(self, invoice), fields(customer_id = %invoice.customer_id))]
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, PortError> {
        let row = self
            .repository
            .insert(NewInvoiceRow {
                customer_id: invoice.customer_id.value(),
                currency: invoice.amount.currency().code().to_string(),
                value: invoice.amount.amount(),
                status: invoice.status.as_str().to_string(),
                created: invoice.created,
            })
            .await?;
        debug!(invoice_id = row.id, "Invoice created");
        Ok(row_to_invoice(row)?)
    }
}

fn row_to_invoice(row: InvoiceRow) -> Result<Invoice, DatabaseError> {
    let currency = parse_currency(&row.currency)?;
    let status = row
        .status
        .parse::<InvoiceStatus>()
        .map_err(DatabaseError::Decode)?;

    Ok(Invoice {
        id: InvoiceId::new(row.id),
        customer_id: CustomerId::new(row.customer_id),
        amount: Money::new(row.value, currency),
        status,
        created: row.created,
    })
}

fn rows_to_invoices(rows: Vec<InvoiceRow>) -> Result<Vec<Invoice>, DatabaseError> {
    rows.into_iter().map(row_to_invoice).collect()
}

/// Decodes every row that can be decoded; the rest are logged and left out
fn decodable_invoices(rows: Vec<InvoiceRow>) -> Vec<Invoice> {
    rows.into_iter()
        .filter_map(|row| {
            let invoice_id = row.id;
            row_to_invoice(row)
                .inspect_err(|e| {
                    error!(invoice_id = invoice_id, error = %e, "Skipping invoice row that cannot be decoded")
                })
                .ok()
        })
        .collect()
}
