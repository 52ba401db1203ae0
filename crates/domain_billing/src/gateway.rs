//! Payment gateway
//!
//! The gateway answers one question: can this invoice be charged right now?
//! It never moves money; the ledger does that in a separate step.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use core_kernel::PortError;

use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ports::CustomerPort;

/// Decides whether an invoice can be settled
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns `Ok(true)` if the invoice can be charged, `Ok(false)` if the
    /// customer's balance does not cover it
    ///
    /// # Errors
    ///
    /// - `AlreadyPaid` if the invoice is not pending
    /// - `CustomerNotFound` if the customer does not exist
    /// - `CurrencyMismatch` if invoice and customer currencies differ
    /// - `GatewayUnavailable` if a dependency could not be reached
    async fn is_chargeable(&self, invoice: &Invoice) -> Result<bool, BillingError>;
}

/// Gateway that checks the customer's balance through the customer port
pub struct BalanceCheckGateway {
    customers: Arc<dyn CustomerPort>,
}

impl BalanceCheckGateway {
    /// Creates a gateway reading customers from `customers`
    pub fn new(customers: Arc<dyn CustomerPort>) -> Self {
        Self { customers }
    }
}

#[async_trait]
impl PaymentGateway for BalanceCheckGateway {
    async fn is_chargeable(&self, invoice: &Invoice) -> Result<bool, BillingError> {
        if invoice.status == InvoiceStatus::Paid {
            return Err(BillingError::AlreadyPaid(invoice.id));
        }

        let customer = self
            .customers
            .fetch_customer(invoice.customer_id)
            .await
            .map_err(|e| match e {
                PortError::NotFound { .. } => BillingError::CustomerNotFound(invoice.customer_id),
                other => BillingError::GatewayUnavailable(other),
            })?;

        let mismatch = || BillingError::CurrencyMismatch {
            invoice_id: invoice.id,
            customer_id: customer.id,
            invoice_currency: invoice.amount.currency(),
            customer_currency: customer.currency,
        };

        if !invoice.amount.is_in(customer.currency) {
            return Err(mismatch());
        }

        let covered = customer
            .available()
            .covers(&invoice.amount)
            .map_err(|_| mismatch())?;

        if !covered {
            debug!(
                invoice_id = %invoice.id,
                customer_id = %customer.id,
                balance = %customer.available(),
                amount = %invoice.amount,
                "Balance does not cover invoice"
            );
        }
        Ok(covered)
    }
}

/// Gateway implementations selectable by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentGatewayKind {
    /// Balance check against the customer store
    #[default]
    Online,
}

impl PaymentGatewayKind {
    /// Configuration name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentGatewayKind::Online => "online",
        }
    }
}

impl fmt::Display for PaymentGatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentGatewayKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(PaymentGatewayKind::Online),
            _ => Err(BillingError::UnknownPaymentGateway(s.to_string())),
        }
    }
}

/// Builds the configured payment gateway
pub struct PaymentGatewayFactory;

impl PaymentGatewayFactory {
    /// Creates the gateway registered under `kind`
    ///
    /// # Errors
    ///
    /// `UnknownPaymentGateway` if no gateway is registered under `kind`
    pub fn create(
        kind: &str,
        customers: Arc<dyn CustomerPort>,
    ) -> Result<Arc<dyn PaymentGateway>, BillingError> {
        match kind.parse::<PaymentGatewayKind>()? {
            PaymentGatewayKind::Online => Ok(Arc::new(BalanceCheckGateway::new(customers))),
        }
    }
}
