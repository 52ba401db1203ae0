//! Billing domain errors
//!
//! Every failure the billing run can meet is a variant of [`BillingError`].
//! The orchestrator branches on the variant (through [`BillingError::policy`])
//! instead of inspecting messages.

use thiserror::Error;

use core_kernel::{Currency, CustomerId, InvoiceId, PortError, TemporalError};

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// The invoice was offered for charging although it is already paid
    #[error("Invoice {0} has already been paid")]
    AlreadyPaid(InvoiceId),

    /// The invoice references a customer that does not exist
    #[error("Customer {0} was not found")]
    CustomerNotFound(CustomerId),

    /// Invoice lookup failed
    #[error("Invoice {0} was not found")]
    InvoiceNotFound(InvoiceId),

    /// Invoice and customer are denominated in different currencies
    #[error("Currency of invoice {invoice_id} ({invoice_currency}) does not match currency of customer {customer_id} ({customer_currency})")]
    CurrencyMismatch {
        invoice_id: InvoiceId,
        customer_id: CustomerId,
        invoice_currency: Currency,
        customer_currency: Currency,
    },

    /// The payment gateway or one of its dependencies could not be reached
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(#[source] PortError),

    /// The store could not be read or the ledger transaction did not commit
    #[error("Persistence failure: {0}")]
    Persistence(#[source] PortError),

    /// No gateway is registered under the configured kind
    #[error("Unknown payment gateway: {0}")]
    UnknownPaymentGateway(String),

    /// Charging the invoice panicked; nothing was committed
    #[error("Charging invoice {invoice_id} panicked: {message}")]
    ChargePanicked {
        invoice_id: InvoiceId,
        message: String,
    },

    /// The billing period could not be derived from the run's clock
    #[error("Invalid billing period: {0}")]
    InvalidBillingPeriod(#[from] TemporalError),
}

/// What a billing run does after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and skip; the same failure recurs until fixed out-of-band
    SkipUntilReconciled,
    /// Log and skip; the invoice stays pending and the next run tries again
    RetryNextRun,
    /// Nothing can be charged in this run
    Fatal,
}

impl BillingError {
    /// Classifies this error into the policy the billing run applies
    pub fn policy(&self) -> FailurePolicy {
        match self {
            BillingError::AlreadyPaid(_)
            | BillingError::CustomerNotFound(_)
            | BillingError::InvoiceNotFound(_)
            | BillingError::CurrencyMismatch { .. } => FailurePolicy::SkipUntilReconciled,
            BillingError::GatewayUnavailable(_)
            | BillingError::Persistence(_)
            | BillingError::ChargePanicked { .. } => FailurePolicy::RetryNextRun,
            BillingError::UnknownPaymentGateway(_) | BillingError::InvalidBillingPeriod(_) => {
                FailurePolicy::Fatal
            }
        }
    }

    /// Returns true if the failure carries no information about the invoice itself
    pub fn is_transient(&self) -> bool {
        match self {
            BillingError::GatewayUnavailable(_) => true,
            BillingError::Persistence(source) => source.is_transient(),
            _ => false,
        }
    }

    /// Short, stable label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::AlreadyPaid(_) => "already_paid",
            BillingError::CustomerNotFound(_) => "customer_not_found",
            BillingError::InvoiceNotFound(_) => "invoice_not_found",
            BillingError::CurrencyMismatch { .. } => "currency_mismatch",
            BillingError::GatewayUnavailable(_) => "gateway_unavailable",
            BillingError::Persistence(_) => "persistence",
            BillingError::ChargePanicked { .. } => "charge_panicked",
            BillingError::UnknownPaymentGateway(_) => "unknown_payment_gateway",
            BillingError::InvalidBillingPeriod(_) => "invalid_billing_period",
        }
    }
}
