//! Application services over the billing ports
//!
//! Thin wrappers that translate port failures into [`BillingError`] so that
//! callers never handle `PortError` directly.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{BillingPeriod, CustomerId, InvoiceId, PortError};

use crate::customer::Customer;
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ports::{AccountLedger, CustomerPort, InvoicePort};

/// Read access to customers
#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerPort>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerPort>) -> Self {
        Self { customers }
    }

    /// Fetches a customer, mapping a missing row to `CustomerNotFound`
    pub async fn fetch(&self, id: CustomerId) -> Result<Customer, BillingError> {
        self.customers.fetch_customer(id).await.map_err(|e| match e {
            PortError::NotFound { .. } => BillingError::CustomerNotFound(id),
            other => BillingError::Persistence(other),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<Customer>, BillingError> {
        self.customers
            .fetch_customers()
            .await
            .map_err(BillingError::Persistence)
    }
}

/// Read access to invoices
#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<dyn InvoicePort>,
}

impl InvoiceService {
    pub fn new(invoices: Arc<dyn InvoicePort>) -> Self {
        Self { invoices }
    }

    /// Fetches an invoice, mapping a missing row to `InvoiceNotFound`
    pub async fn fetch(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.invoices.fetch_invoice(id).await.map_err(|e| match e {
            PortError::NotFound { .. } => BillingError::InvoiceNotFound(id),
            other => BillingError::Persistence(other),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<Invoice>, BillingError> {
        self.invoices
            .fetch_invoices()
            .await
            .map_err(BillingError::Persistence)
    }

    /// Invoices with `status` created inside `period`
    pub async fn fetch_all_by_status(
        &self,
        status: InvoiceStatus,
        period: BillingPeriod,
    ) -> Result<Vec<Invoice>, BillingError> {
        self.invoices
            .fetch_due(status, period)
            .await
            .map_err(BillingError::Persistence)
    }
}

/// Settles invoices through the account ledger
#[derive(Clone)]
pub struct PaymentService {
    ledger: Arc<dyn AccountLedger>,
}

impl PaymentService {
    pub fn new(ledger: Arc<dyn AccountLedger>) -> Self {
        Self { ledger }
    }

    /// Debits the customer and marks the invoice paid in one transaction
    ///
    /// Chargeability must already have been established by the gateway.
    #[instrument(skip(self, invoice_id, customer_id, amount), fields(%invoice_id, %customer_id))]
    pub async fn commit_payment(
        &self,
        invoice_id: InvoiceId,
        customer_id: CustomerId,
        amount: Decimal,
    ) -> Result<(), BillingError> {
        self.ledger
            .commit_payment(invoice_id, customer_id, amount)
            .await
            .map_err(BillingError::Persistence)?;

        debug!(%amount, "Payment committed");
        Ok(())
    }
}
