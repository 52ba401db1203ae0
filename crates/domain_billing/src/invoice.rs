//! Invoices awaiting settlement
//!
//! An invoice belongs logically to a customer but is stored on its own and
//! refers to the customer by id only. Its status moves from `Pending` to
//! `Paid` exactly once, when the ledger commits the payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use core_kernel::{CustomerId, InvoiceId, Money};

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    /// Waiting to be charged
    Pending,
    /// Settled against the customer's balance
    Paid,
}

impl InvoiceStatus {
    /// Returns the persisted representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(InvoiceStatus::Pending),
            "PAID" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

/// An invoice to be settled against a customer balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Customer being billed
    pub customer_id: CustomerId,
    /// Amount due; its currency may differ from the customer's
    pub amount: Money,
    /// Status
    pub status: InvoiceStatus,
    /// Creation timestamp, used to select the billing period and charge order
    pub created: DateTime<Utc>,
}

impl Invoice {
    /// Returns true if the invoice still awaits payment
    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }

    /// Key invoices of one customer are charged in: oldest first, then lowest id
    pub fn charge_order(&self) -> (DateTime<Utc>, InvoiceId) {
        (self.created, self.id)
    }
}

/// Data for creating a new invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: CustomerId,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub created: DateTime<Utc>,
}

impl NewInvoice {
    /// A pending invoice created now
    pub fn pending(customer_id: CustomerId, amount: Money) -> Self {
        Self {
            customer_id,
            amount,
            status: InvoiceStatus::Pending,
            created: Utc::now(),
        }
    }

    /// Overrides the creation timestamp
    pub fn created_at(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Overrides the status
    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }
}

/// Groups invoices by customer, each group sorted in charge order
///
/// Customers with no invoices get no group, so an empty input yields an
/// empty map.
pub fn partition_by_customer(invoices: Vec<Invoice>) -> BTreeMap<CustomerId, Vec<Invoice>> {
    let mut partitions: BTreeMap<CustomerId, Vec<Invoice>> = BTreeMap::new();
    for invoice in invoices {
        partitions.entry(invoice.customer_id).or_default().push(invoice);
    }
    for partition in partitions.values_mut() {
        partition.sort_by_key(Invoice::charge_order);
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn invoice(id: i64, customer: i64, day: u32) -> Invoice {
        Invoice {
            id: InvoiceId::new(id),
            customer_id: CustomerId::new(customer),
            amount: Money::new(dec!(10), Currency::EUR),
            status: InvoiceStatus::Pending,
            created: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_partition_groups_and_sorts() {
        let invoices = vec![
            invoice(5, 1, 20),
            invoice(3, 2, 2),
            invoice(4, 1, 3),
            invoice(1, 1, 20),
        ];

        let partitions = partition_by_customer(invoices);
        assert_eq!(partitions.len(), 2);

        let first: Vec<i64> = partitions[&CustomerId::new(1)]
            .iter()
            .map(|i| i.id.value())
            .collect();
        // Same timestamp for 1 and 5: lower id first
        assert_eq!(first, vec![4, 1, 5]);
        assert_eq!(partitions[&CustomerId::new(2)].len(), 1);
    }

    #[test]
    fn test_partition_of_nothing_is_empty() {
        assert!(partition_by_customer(Vec::new()).is_empty());
    }

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in [InvoiceStatus::Pending, InvoiceStatus::Paid] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        assert!("VOID".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&InvoiceStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
