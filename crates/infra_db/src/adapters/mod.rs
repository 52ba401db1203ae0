//! Billing Port Adapters
//!
//! PostgreSQL implementations of the billing ports. Each adapter:
//! - Implements one port trait from `domain_billing::ports`
//! - Maps repository rows to domain types
//! - Translates `DatabaseError` into `PortError`
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresCustomerAdapter, PostgresInvoiceAdapter, PostgresLedgerAdapter};
//! use std::sync::Arc;
//!
//! let customers = Arc::new(PostgresCustomerAdapter::new(pool.clone()));
//! let invoices = Arc::new(PostgresInvoiceAdapter::new(pool.clone()));
//! let ledger = Arc::new(PostgresLedgerAdapter::new(pool));
//! ```

pub mod customer;
pub mod invoice;
pub mod ledger;

pub use customer::PostgresCustomerAdapter;
pub use invoice::PostgresInvoiceAdapter;
pub use ledger::PostgresLedgerAdapter;

use chrono::Utc;
use core_kernel::{AdapterHealth, Currency, HealthCheckResult};
use sqlx::PgPool;

use crate::error::DatabaseError;

/// Runs `SELECT 1` and reports the outcome for `adapter_id`
pub(crate) async fn check_database(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let (status, message) = match result {
        Ok(_) => (AdapterHealth::Healthy, None),
        Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
    };

    HealthCheckResult {
        adapter_id: adapter_id.to_string(),
        status,
        latency_ms,
        message,
        checked_at: Utc::now(),
    }
}

pub(crate) fn parse_currency(value: &str) -> Result<Currency, DatabaseError> {
    value
        .parse()
        .map_err(|e| DatabaseError::Decode(format!("{}", e)))
}
