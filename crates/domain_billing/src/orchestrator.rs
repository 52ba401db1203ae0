//! Billing orchestrator
//!
//! Drives one billing run: select the pending invoices of the previous
//! calendar month, group them by customer and settle each group in its own
//! task. Invoices of one customer are charged strictly one after another,
//! oldest first; different customers proceed concurrently.
//!
//! ```text
//!   fetch_due(PENDING, previous month)
//!              │
//!      partition_by_customer
//!        ┌─────┼─────┐
//!        ▼     ▼     ▼        one task per customer (bounded by a semaphore)
//!      I1→I2  I7    I3→I4→I9  gateway check, then ledger commit, in order
//!        └─────┼─────┘
//!          join all
//! ```
//!
//! Per-invoice failures are logged and never abort the run. The only fatal
//! condition is failing to select the invoices in the first place.

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use core_kernel::{BillingPeriod, CustomerId, Timezone};

use crate::error::{BillingError, FailurePolicy};
use crate::gateway::PaymentGateway;
use crate::invoice::{partition_by_customer, Invoice, InvoiceStatus};
use crate::ports::{AccountLedger, InvoicePort};
use crate::services::{InvoiceService, PaymentService};

/// Default bound on customer partitions processed at the same time
pub const DEFAULT_MAX_CONCURRENT_CUSTOMERS: usize = 16;

/// Tuning for a billing run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Timezone whose midnights delimit the billing month
    pub timezone: Timezone,
    /// Maximum number of customer partitions running at once
    pub max_concurrent_customers: usize,
    /// Wall-clock budget for a run; unfinished partitions are abandoned
    pub run_deadline: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timezone: Timezone::default(),
            max_concurrent_customers: DEFAULT_MAX_CONCURRENT_CUSTOMERS,
            run_deadline: None,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the billing timezone
    pub fn timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    /// Sets the concurrency bound; zero is treated as one
    pub fn max_concurrent_customers(mut self, max: usize) -> Self {
        self.max_concurrent_customers = max.max(1);
        self
    }

    /// Sets the run deadline
    pub fn run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }
}

/// Result of attempting to charge a single invoice
#[derive(Debug)]
pub enum ChargeOutcome {
    /// The customer was debited and the invoice marked paid
    Charged,
    /// The balance did not cover the invoice; it stays pending
    InsufficientBalance,
    /// The invoice could not be charged; it stays as it was
    Failed(BillingError),
}

impl ChargeOutcome {
    /// Returns true if the invoice was paid
    pub fn is_charged(&self) -> bool {
        matches!(self, ChargeOutcome::Charged)
    }

    /// Returns the failure, if any
    pub fn error(&self) -> Option<&BillingError> {
        match self {
            ChargeOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RunTally {
    charged: usize,
    insufficient_balance: usize,
    skipped: usize,
    retry_next_run: usize,
}

impl RunTally {
    fn record(&mut self, outcome: &ChargeOutcome) {
        match outcome {
            ChargeOutcome::Charged => self.charged += 1,
            ChargeOutcome::InsufficientBalance => self.insufficient_balance += 1,
            ChargeOutcome::Failed(e) => match e.policy() {
                FailurePolicy::SkipUntilReconciled => self.skipped += 1,
                FailurePolicy::RetryNextRun | FailurePolicy::Fatal => self.retry_next_run += 1,
            },
        }
    }

    fn merge(&mut self, other: RunTally) {
        self.charged += other.charged;
        self.insufficient_balance += other.insufficient_balance;
        self.skipped += other.skipped;
        self.retry_next_run += other.retry_next_run;
    }
}

/// Coordinates a billing run
#[derive(Clone)]
pub struct BillingOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    invoices: InvoiceService,
    payments: PaymentService,
    config: OrchestratorConfig,
}

impl BillingOrchestrator {
    /// Creates an orchestrator with the default configuration
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        invoices: Arc<dyn InvoicePort>,
        ledger: Arc<dyn AccountLedger>,
    ) -> Self {
        Self {
            gateway,
            invoices: InvoiceService::new(invoices),
            payments: PaymentService::new(ledger),
            config: OrchestratorConfig::default(),
        }
    }

    /// Replaces the configuration
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Charges every pending invoice created during the previous calendar month
    pub async fn charge_invoices(&self) -> Result<(), BillingError> {
        self.charge_invoices_at(Utc::now()).await
    }

    /// Same as [`charge_invoices`](Self::charge_invoices) with an explicit clock
    ///
    /// # Errors
    ///
    /// Returns an error only when the invoices of the period cannot be
    /// selected. Failures of individual invoices are logged and leave those
    /// invoices for a later run.
    #[instrument(name = "billing_run", skip(self), fields(run_id = %Uuid::now_v7()))]
    pub async fn charge_invoices_at(&self, now: DateTime<Utc>) -> Result<(), BillingError> {
        let period = BillingPeriod::previous_month(now, self.config.timezone)?;

        let due = self
            .invoices
            .fetch_all_by_status(InvoiceStatus::Pending, period)
            .await
            .inspect_err(|e| error!(error = %e, %period, "Failed to select pending invoices"))?;

        if due.is_empty() {
            info!(%period, "No pending invoices in billing period");
            return Ok(());
        }

        let invoice_count = due.len();
        let partitions = partition_by_customer(due);
        let customer_count = partitions.len();
        info!(
            %period,
            invoices = invoice_count,
            customers = customer_count,
            "Starting billing run"
        );

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_customers.max(1)));
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(customer_count);

        for (customer_id, invoices) in partitions {
            let orchestrator = self.clone();
            let permits = Arc::clone(&permits);
            let handle = tasks.spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return RunTally::default();
                    };
                    orchestrator.charge_partition(customer_id, invoices).await
                }
                .in_current_span(),
            );
            owners.insert(handle.id(), customer_id);
        }

        let mut tally = RunTally::default();
        let mut panicked = 0usize;
        let mut abandoned = 0usize;
        let mut deadline = self
            .config
            .run_deadline
            .map(|budget| tokio::time::Instant::now() + budget);

        loop {
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next_with_id()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!(
                            remaining_customers = tasks.len(),
                            "Run deadline exceeded, abandoning unfinished customers"
                        );
                        tasks.abort_all();
                        deadline = None;
                        continue;
                    }
                },
                None => tasks.join_next_with_id().await,
            };

            let Some(joined) = joined else { break };
            match joined {
                Ok((_, partition)) => tally.merge(partition),
                Err(e) => {
                    let customer_id = owners.get(&e.id()).copied();
                    if e.is_panic() {
                        panicked += 1;
                        error!(customer_id = ?customer_id, "Customer partition panicked");
                    } else {
                        abandoned += 1;
                        warn!(
                            customer_id = ?customer_id,
                            "Customer partition abandoned; invoices stay pending"
                        );
                    }
                }
            }
        }

        info!(
            %period,
            invoices = invoice_count,
            customers = customer_count,
            charged = tally.charged,
            insufficient_balance = tally.insufficient_balance,
            skipped = tally.skipped,
            retry_next_run = tally.retry_next_run,
            panicked_customers = panicked,
            abandoned_customers = abandoned,
            "Billing run finished"
        );
        Ok(())
    }

    #[instrument(skip(self, customer_id, invoices), fields(%customer_id, invoices = invoices.len()))]
    async fn charge_partition(&self, customer_id: CustomerId, invoices: Vec<Invoice>) -> RunTally {
        let mut tally = RunTally::default();
        for invoice in &invoices {
            let outcome = self.charge_invoice(invoice).await;
            tally.record(&outcome);
        }
        tally
    }

    /// Charges a single invoice: gateway check, then ledger commit
    ///
    /// Never fails; every error is logged and returned as
    /// [`ChargeOutcome::Failed`], with the invoice left untouched. A panic
    /// while charging is caught here and reported as
    /// [`BillingError::ChargePanicked`], so the customer's remaining invoices
    /// are still attempted.
    pub async fn charge_invoice(&self, invoice: &Invoice) -> ChargeOutcome {
        let outcome = AssertUnwindSafe(self.attempt_charge(invoice))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                ChargeOutcome::Failed(BillingError::ChargePanicked {
                    invoice_id: invoice.id,
                    message: panic_message(payload.as_ref()),
                })
            });

        match &outcome {
            ChargeOutcome::Charged => info!(
                invoice_id = %invoice.id,
                customer_id = %invoice.customer_id,
                amount = %invoice.amount,
                "Invoice charged"
            ),
            ChargeOutcome::InsufficientBalance => debug!(
                invoice_id = %invoice.id,
                customer_id = %invoice.customer_id,
                "Insufficient balance, invoice stays pending"
            ),
            ChargeOutcome::Failed(e) => log_failure(invoice, e),
        }
        outcome
    }

    async fn attempt_charge(&self, invoice: &Invoice) -> ChargeOutcome {
        match self.gateway.is_chargeable(invoice).await {
            Ok(true) => match self
                .payments
                .commit_payment(invoice.id, invoice.customer_id, invoice.amount.amount())
                .await
            {
                Ok(()) => ChargeOutcome::Charged,
                Err(e) => ChargeOutcome::Failed(e),
            },
            Ok(false) => ChargeOutcome::InsufficientBalance,
            Err(e) => ChargeOutcome::Failed(e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_failure(invoice: &Invoice, e: &BillingError) {
    match e.policy() {
        FailurePolicy::SkipUntilReconciled => error!(
            invoice_id = %invoice.id,
            customer_id = %invoice.customer_id,
            kind = e.kind(),
            error = %e,
            "Invoice skipped until reconciled"
        ),
        FailurePolicy::RetryNextRun | FailurePolicy::Fatal => error!(
            invoice_id = %invoice.id,
            customer_id = %invoice.customer_id,
            kind = e.kind(),
            error = %e,
            "Invoice left pending for the next run"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::BalanceCheckGateway;
    use crate::invoice::NewInvoice;
    use crate::ports::mock::InMemoryBillingStore;
    use crate::ports::{CustomerPort, InvoicePort};
    use chrono::TimeZone;
    use core_kernel::{Currency, Money};
    use rust_decimal_macros::dec;

    fn orchestrator(store: &Arc<InMemoryBillingStore>) -> BillingOrchestrator {
        BillingOrchestrator::new(
            Arc::new(BalanceCheckGateway::new(store.clone())),
            store.clone(),
            store.clone(),
        )
    }

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap()
    }

    fn in_may(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_charges_oldest_first_until_balance_runs_out() {
        let store = Arc::new(InMemoryBillingStore::new());
        let customer = store.create_customer(Currency::USD, dec!(200)).await.unwrap();
        let later = store
            .create_invoice(
                NewInvoice::pending(customer.id, Money::new(dec!(100), Currency::USD))
                    .created_at(in_may(5)),
            )
            .await
            .unwrap();
        let earlier = store
            .create_invoice(
                NewInvoice::pending(customer.id, Money::new(dec!(150), Currency::USD))
                    .created_at(in_may(2)),
            )
            .await
            .unwrap();

        orchestrator(&store).charge_invoices_at(run_time()).await.unwrap();

        assert_eq!(store.status_of(earlier.id).await, Some(InvoiceStatus::Paid));
        assert_eq!(store.status_of(later.id).await, Some(InvoiceStatus::Pending));
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(50)));
    }

    #[tokio::test]
    async fn test_invoices_outside_period_are_ignored() {
        let store = Arc::new(InMemoryBillingStore::new());
        let customer = store.create_customer(Currency::EUR, dec!(100)).await.unwrap();
        let amount = Money::new(dec!(10), Currency::EUR);
        let april = store
            .create_invoice(
                NewInvoice::pending(customer.id, amount)
                    .created_at(Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 59).unwrap()),
            )
            .await
            .unwrap();
        let june = store
            .create_invoice(
                NewInvoice::pending(customer.id, amount)
                    .created_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            )
            .await
            .unwrap();

        orchestrator(&store).charge_invoices_at(run_time()).await.unwrap();

        assert_eq!(store.status_of(april.id).await, Some(InvoiceStatus::Pending));
        assert_eq!(store.status_of(june.id).await, Some(InvoiceStatus::Pending));
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_empty_run_is_a_no_op() {
        let store = Arc::new(InMemoryBillingStore::new());
        orchestrator(&store).charge_invoices_at(run_time()).await.unwrap();
        assert!(store.committed().is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_is_fatal() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.make_queries_unavailable();

        let result = orchestrator(&store).charge_invoices_at(run_time()).await;
        assert!(matches!(result, Err(BillingError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_charge_invoice_reports_already_paid() {
        let store = Arc::new(InMemoryBillingStore::new());
        let customer = store.create_customer(Currency::DKK, dec!(300)).await.unwrap();
        let invoice = store
            .create_invoice(
                NewInvoice::pending(customer.id, Money::new(dec!(100), Currency::DKK))
                    .with_status(InvoiceStatus::Paid),
            )
            .await
            .unwrap();

        let outcome = orchestrator(&store).charge_invoice(&invoice).await;

        assert!(matches!(outcome.error(), Some(BillingError::AlreadyPaid(_))));
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(300)));
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::default()
            .max_concurrent_customers(0)
            .run_deadline(Duration::from_secs(30));

        assert_eq!(config.max_concurrent_customers, 1);
        assert_eq!(config.run_deadline, Some(Duration::from_secs(30)));
        assert_eq!(config.timezone, Timezone::default());
    }
}
