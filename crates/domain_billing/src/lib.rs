//! Billing Domain - Invoice Settlement
//!
//! This crate settles pending invoices against customer balances. A billing
//! run selects the invoices created during the previous calendar month,
//! checks each one with a [`PaymentGateway`] and commits the payment through
//! the [`AccountLedger`], which debits the balance and marks the invoice paid
//! in one atomic step.
//!
//! # Guarantees
//!
//! - An invoice moves from `PENDING` to `PAID` at most once
//! - A customer's invoices are charged one at a time, oldest first
//! - Balance and status change together or not at all
//! - A failure on one invoice or customer never stops the others
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingOrchestrator, PaymentGatewayFactory};
//!
//! let gateway = PaymentGatewayFactory::create("online", customers.clone())?;
//! let orchestrator = BillingOrchestrator::new(gateway, invoices, ledger);
//!
//! orchestrator.charge_invoices().await?;
//! ```

pub mod customer;
pub mod error;
pub mod gateway;
pub mod invoice;
pub mod orchestrator;
pub mod ports;
pub mod services;

pub use customer::Customer;
pub use error::{BillingError, FailurePolicy};
pub use gateway::{BalanceCheckGateway, PaymentGateway, PaymentGatewayFactory, PaymentGatewayKind};
pub use invoice::{partition_by_customer, Invoice, InvoiceStatus, NewInvoice};
pub use orchestrator::{BillingOrchestrator, ChargeOutcome, OrchestratorConfig};
pub use ports::{AccountLedger, CustomerPort, InvoicePort};
pub use services::{CustomerService, InvoiceService, PaymentService};
