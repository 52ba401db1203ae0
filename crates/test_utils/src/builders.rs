//! Test Data Builders
//!
//! Builders that seed customers and invoices through the billing ports, so
//! the same test setup works against the in-memory store and PostgreSQL.
//! Tests specify only the fields they care about.

use chrono::{DateTime, Utc};
use core_kernel::{Currency, Money, PortError};
use domain_billing::{Customer, CustomerPort, Invoice, InvoicePort, InvoiceStatus, NewInvoice};
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::TemporalFixtures;

/// Builder for seeding customers
pub struct TestCustomerBuilder {
    currency: Currency,
    balance: Decimal,
}

impl Default for TestCustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCustomerBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            currency: Currency::USD,
            balance: dec!(1000.00),
        }
    }

    /// Sets the currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the opening balance
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    /// Picks an arbitrary opening balance between 0.00 and 10 000.00
    pub fn with_random_balance(mut self) -> Self {
        let cents: i64 = (0..1_000_000i64).fake();
        self.balance = Decimal::new(cents, 2);
        self
    }

    /// Creates the customer through `port`
    pub async fn create(self, port: &dyn CustomerPort) -> Result<Customer, PortError> {
        port.create_customer(self.currency, self.balance).await
    }
}

/// Builder for seeding invoices
pub struct TestInvoiceBuilder {
    customer: Customer,
    amount: Decimal,
    currency: Currency,
    status: InvoiceStatus,
    created: DateTime<Utc>,
}

impl TestInvoiceBuilder {
    /// Starts a pending invoice for `customer` in the customer's currency,
    /// created inside the billed period
    pub fn for_customer(customer: &Customer) -> Self {
        Self {
            customer: customer.clone(),
            amount: dec!(100.00),
            currency: customer.currency,
            status: InvoiceStatus::Pending,
            created: TemporalFixtures::billed_day(15),
        }
    }

    /// Sets the amount, keeping the currency
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Denominates the invoice in `currency`
    pub fn in_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the creation timestamp
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Creates the invoice on `day` of the billed month
    pub fn on_billed_day(self, day: u32) -> Self {
        self.created_at(TemporalFixtures::billed_day(day))
    }

    /// Marks the invoice as already paid
    pub fn paid(mut self) -> Self {
        self.status = InvoiceStatus::Paid;
        self
    }

    /// Builds the invoice data
    pub fn build(self) -> NewInvoice {
        NewInvoice::pending(self.customer.id, Money::new(self.amount, self.currency))
            .with_status(self.status)
            .created_at(self.created)
    }

    /// Creates the invoice through `port`
    pub async fn create(self, port: &dyn InvoicePort) -> Result<Invoice, PortError> {
        port.create_invoice(self.build()).await
    }
}
