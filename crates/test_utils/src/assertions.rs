//! Custom Test Assertions
//!
//! Assertion helpers that read state back through the billing ports and give
//! more meaningful failure messages than bare `assert_eq!` on lookups.

use core_kernel::{CustomerId, InvoiceId, Money};
use domain_billing::{BillingError, ChargeOutcome, CustomerPort, InvoicePort, InvoiceStatus};
use rust_decimal::Decimal;

/// Asserts that a customer's stored balance equals `expected`
///
/// # Panics
///
/// Panics if the customer cannot be read or the balance differs
pub async fn assert_balance(port: &dyn CustomerPort, id: CustomerId, expected: Decimal) {
    let customer = port
        .fetch_customer(id)
        .await
        .unwrap_or_else(|e| panic!("Failed to read customer {}: {}", id, e));
    assert_eq!(
        customer.balance, expected,
        "Balance of customer {}: actual={}, expected={}",
        id, customer.balance, expected
    );
}

/// Asserts that an invoice's stored status equals `expected`
///
/// # Panics
///
/// Panics if the invoice cannot be read or the status differs
pub async fn assert_invoice_status(port: &dyn InvoicePort, id: InvoiceId, expected: InvoiceStatus) {
    let invoice = port
        .fetch_invoice(id)
        .await
        .unwrap_or_else(|e| panic!("Failed to read invoice {}: {}", id, e));
    assert_eq!(
        invoice.status, expected,
        "Status of invoice {}: actual={}, expected={}",
        id, invoice.status, expected
    );
}

/// Asserts that a charge attempt paid the invoice
pub fn assert_charged(outcome: &ChargeOutcome) {
    assert!(
        outcome.is_charged(),
        "Expected invoice to be charged, got {:?}",
        outcome
    );
}

/// Asserts that a charge attempt failed with an error matching `predicate`
pub fn assert_failed_with(outcome: &ChargeOutcome, predicate: impl Fn(&BillingError) -> bool) {
    match outcome.error() {
        Some(e) => assert!(predicate(e), "Unexpected charge failure: {:?}", e),
        None => panic!("Expected charge failure, got {:?}", outcome),
    }
}

/// Asserts that two Money values are equal, comparing amount and currency
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Amount mismatch: actual={}, expected={}",
        actual,
        expected
    );
}
