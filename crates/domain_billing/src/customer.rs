//! Customer accounts
//!
//! A customer holds a single balance in a single currency. The balance is
//! only ever changed by the ledger when a payment is committed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, CustomerId, Money};

/// A billable customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier
    pub id: CustomerId,
    /// Currency the customer is billed in
    pub currency: Currency,
    /// Funds available for settling invoices
    pub balance: Decimal,
}

impl Customer {
    /// Creates a customer snapshot
    pub fn new(id: CustomerId, currency: Currency, balance: Decimal) -> Self {
        Self { id, currency, balance }
    }

    /// Returns the balance as money in the customer's currency
    pub fn available(&self) -> Money {
        Money::new(self.balance, self.currency)
    }
}
