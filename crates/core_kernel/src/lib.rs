//! Core Kernel - Foundational types shared by the billing workspace
//!
//! This crate provides the building blocks used across all other crates:
//! - Money types with precise decimal arithmetic
//! - Billing periods anchored in a configurable timezone
//! - Integer identifiers for customers and invoices
//! - The port error taxonomy and adapter health checks

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{BillingPeriod, Timezone, TemporalError};
pub use identifiers::{CustomerId, InvoiceId};
pub use ports::{
    PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable,
};
