//! Infrastructure Database Layer
//!
//! PostgreSQL implementations of the billing ports using SQLx.
//!
//! # Architecture
//!
//! Repositories own the SQL and work on row types; adapters implement the
//! domain ports on top of them and translate errors into `PortError`.
//!
//! The schema is owned outside this crate. The adapters expect:
//!
//! ```text
//! customers(id BIGSERIAL, currency VARCHAR(3), balance NUMERIC(1000,2))
//! invoices(id BIGSERIAL, customer_id BIGINT -> customers, currency VARCHAR(3),
//!          value NUMERIC(1000,2), status TEXT, created TIMESTAMPTZ)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! let ledger = PostgresLedgerAdapter::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresCustomerAdapter, PostgresInvoiceAdapter, PostgresLedgerAdapter};
pub use error::DatabaseError;
pub use pool::{create_pool, DatabaseConfig, DatabasePool};
