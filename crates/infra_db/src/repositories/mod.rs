//! Repository implementations for the billing tables
//!
//! Repositories encapsulate SQL and work on plain row types; the adapters map
//! rows to domain types. Queries are checked at runtime so the crate builds
//! without a live database.

pub mod customer;
pub mod invoice;
pub mod ledger;

pub use customer::{CustomerRepository, CustomerRow};
pub use invoice::{InvoiceRepository, InvoiceRow, NewInvoiceRow};
pub use ledger::LedgerRepository;
