//! Billing Domain Ports
//!
//! The billing run depends on three capabilities of the persistence layer,
//! each expressed as a port trait so the orchestrator never sees which store
//! is behind it:
//!
//! - [`CustomerPort`]: read access to customers (and creation for upstream systems)
//! - [`InvoicePort`]: invoice lookups, including the due-invoice query
//! - [`AccountLedger`]: the single atomic "commit payment" state transition
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::ports::{AccountLedger, InvoicePort};
//! use std::sync::Arc;
//!
//! let invoices: Arc<dyn InvoicePort> = Arc::new(PostgresInvoiceAdapter::new(pool.clone()));
//! let ledger: Arc<dyn AccountLedger> = Arc::new(PostgresLedgerAdapter::new(pool));
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;

use core_kernel::{BillingPeriod, Currency, CustomerId, DomainPort, InvoiceId, PortError};

use crate::customer::Customer;
use crate::invoice::{Invoice, InvoiceStatus, NewInvoice};

/// Access to customer records
#[async_trait]
pub trait CustomerPort: DomainPort {
    /// Retrieves a customer by ID
    ///
    /// # Returns
    ///
    /// The customer if found, or `PortError::NotFound`
    async fn fetch_customer(&self, id: CustomerId) -> Result<Customer, PortError>;

    /// Retrieves every customer
    async fn fetch_customers(&self) -> Result<Vec<Customer>, PortError>;

    /// Creates a customer with an opening balance
    async fn create_customer(
        &self,
        currency: Currency,
        balance: Decimal,
    ) -> Result<Customer, PortError>;
}

/// Access to invoice records
#[async_trait]
pub trait InvoicePort: DomainPort {
    /// Retrieves an invoice by ID
    ///
    /// # Returns
    ///
    /// The invoice if found, or `PortError::NotFound`
    async fn fetch_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Retrieves every invoice
    async fn fetch_invoices(&self) -> Result<Vec<Invoice>, PortError>;

    /// Selects invoices with `status` created inside `period`
    ///
    /// The period is half-open: an invoice created exactly at `period.end`
    /// is not returned. No ordering is guaranteed.
    async fn fetch_due(
        &self,
        status: InvoiceStatus,
        period: BillingPeriod,
    ) -> Result<Vec<Invoice>, PortError>;

    /// Creates an invoice for an existing customer
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, PortError>;
}

/// The sole writer of customer balances and invoice statuses
///
/// Implementations must apply both changes of a commit or neither, and must
/// serialize commits addressed at the same customer.
#[async_trait]
pub trait AccountLedger: DomainPort {
    /// Debits `amount` from the customer's balance and marks the invoice paid
    ///
    /// Chargeability is not re-checked here. An invoice that is no longer
    /// pending makes the commit fail with `PortError::Conflict` and leaves the
    /// store untouched.
    async fn commit_payment(
        &self,
        invoice_id: InvoiceId,
        customer_id: CustomerId,
        amount: Decimal,
    ) -> Result<(), PortError>;
}

/// In-memory implementation of the billing ports for testing
///
/// Stores customers and invoices in memory, serializes commits per customer
/// with an async mutex, and supports injecting the failures a billing run has
/// to survive.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;
    use tokio::sync::{Mutex, RwLock};

    use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable};

    #[derive(Debug, Default)]
    struct Faults {
        unavailable_customers: HashSet<CustomerId>,
        failing_commits: HashSet<InvoiceId>,
        query_unavailable: bool,
        commit_latency: Option<Duration>,
    }

    #[derive(Debug, Default)]
    struct CommitStats {
        log: Vec<InvoiceId>,
        in_flight: HashMap<CustomerId, usize>,
        max_in_flight: HashMap<CustomerId, usize>,
    }

    /// In-memory store implementing `CustomerPort`, `InvoicePort` and `AccountLedger`
    #[derive(Debug)]
    pub struct InMemoryBillingStore {
        customers: RwLock<HashMap<CustomerId, Arc<Mutex<Customer>>>>,
        invoices: RwLock<BTreeMap<InvoiceId, Invoice>>,
        next_customer_id: AtomicI64,
        next_invoice_id: AtomicI64,
        faults: StdMutex<Faults>,
        stats: StdMutex<CommitStats>,
    }

    impl Default for InMemoryBillingStore {
        fn default() -> Self {
            Self {
                customers: RwLock::new(HashMap::new()),
                invoices: RwLock::new(BTreeMap::new()),
                next_customer_id: AtomicI64::new(1),
                next_invoice_id: AtomicI64::new(1),
                faults: StdMutex::new(Faults::default()),
                stats: StdMutex::new(CommitStats::default()),
            }
        }
    }

    impl InMemoryBillingStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts or replaces a customer as-is
        pub async fn insert_customer(&self, customer: Customer) {
            self.next_customer_id
                .fetch_max(customer.id.value() + 1, Ordering::SeqCst);
            self.customers
                .write()
                .await
                .insert(customer.id, Arc::new(Mutex::new(customer)));
        }

        /// Inserts or replaces an invoice as-is, without checking its customer exists
        pub async fn insert_invoice(&self, invoice: Invoice) {
            self.next_invoice_id
                .fetch_max(invoice.id.value() + 1, Ordering::SeqCst);
            self.invoices.write().await.insert(invoice.id, invoice);
        }

        /// Returns the current balance of a customer
        pub async fn balance_of(&self, id: CustomerId) -> Option<Decimal> {
            let slot = self.customers.read().await.get(&id).cloned()?;
            let balance = slot.lock().await.balance;
            Some(balance)
        }

        /// Returns the current status of an invoice
        pub async fn status_of(&self, id: InvoiceId) -> Option<InvoiceStatus> {
            self.invoices.read().await.get(&id).map(|i| i.status)
        }

        /// Makes customer lookups for `id` fail as if the store were unreachable
        pub fn make_customer_unavailable(&self, id: CustomerId) {
            self.with_faults(|f| {
                f.unavailable_customers.insert(id);
            });
        }

        /// Makes the commit for `id` fail after the debit has been staged
        pub fn fail_commit_for(&self, id: InvoiceId) {
            self.with_faults(|f| {
                f.failing_commits.insert(id);
            });
        }

        /// Makes every invoice query fail
        pub fn make_queries_unavailable(&self) {
            self.with_faults(|f| f.query_unavailable = true);
        }

        /// Delays every commit while the customer is locked
        pub fn set_commit_latency(&self, latency: Duration) {
            self.with_faults(|f| f.commit_latency = Some(latency));
        }

        /// Invoices committed so far, in commit order
        pub fn committed(&self) -> Vec<InvoiceId> {
            self.stats.lock().map(|s| s.log.clone()).unwrap_or_default()
        }

        /// Highest number of simultaneous commits observed for a customer
        pub fn max_concurrent_commits(&self, id: CustomerId) -> usize {
            self.stats
                .lock()
                .map(|s| s.max_in_flight.get(&id).copied().unwrap_or(0))
                .unwrap_or(0)
        }

        fn with_faults<R>(&self, f: impl FnOnce(&mut Faults) -> R) -> Option<R> {
            self.faults.lock().ok().map(|mut faults| f(&mut faults))
        }

        fn customer_unavailable(&self, id: CustomerId) -> bool {
            self.with_faults(|f| f.unavailable_customers.contains(&id))
                .unwrap_or(false)
        }

        fn commit_fails(&self, id: InvoiceId) -> bool {
            self.with_faults(|f| f.failing_commits.contains(&id))
                .unwrap_or(false)
        }

        fn track_commit(&self, customer_id: CustomerId, entering: bool) {
            if let Ok(mut stats) = self.stats.lock() {
                let current = stats.in_flight.entry(customer_id).or_insert(0);
                if entering {
                    *current += 1;
                } else {
                    *current = current.saturating_sub(1);
                }
                let current = *current;
                let max = stats.max_in_flight.entry(customer_id).or_insert(0);
                *max = (*max).max(current);
            }
        }

        async fn apply_commit(
            &self,
            customer: &mut Customer,
            invoice_id: InvoiceId,
            amount: Decimal,
        ) -> Result<(), PortError> {
            let mut invoices = self.invoices.write().await;
            let invoice = invoices
                .get_mut(&invoice_id)
                .ok_or_else(|| PortError::not_found("Invoice", invoice_id))?;

            if invoice.customer_id != customer.id {
                return Err(PortError::conflict(format!(
                    "invoice {} does not belong to customer {}",
                    invoice_id, customer.id
                )));
            }
            if invoice.status != InvoiceStatus::Pending {
                return Err(PortError::conflict(format!(
                    "invoice {} is not pending",
                    invoice_id
                )));
            }

            // Stage the debit; nothing is written unless the commit succeeds
            let new_balance = customer
                .balance
                .checked_sub(amount)
                .ok_or_else(|| PortError::internal("balance overflow"))?;

            if self.commit_fails(invoice_id) {
                return Err(PortError::connection(format!(
                    "commit of invoice {} aborted",
                    invoice_id
                )));
            }

            customer.balance = new_balance;
            invoice.status = InvoiceStatus::Paid;
            if let Ok(mut stats) = self.stats.lock() {
                stats.log.push(invoice_id);
            }
            Ok(())
        }
    }

    impl DomainPort for InMemoryBillingStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryBillingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-billing-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl CustomerPort for InMemoryBillingStore {
        async fn fetch_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
            if self.customer_unavailable(id) {
                return Err(PortError::unavailable("customer-store"));
            }
            let slot = self
                .customers
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))?;
            let customer = slot.lock().await.clone();
            Ok(customer)
        }

        async fn fetch_customers(&self) -> Result<Vec<Customer>, PortError> {
            let slots: Vec<_> = self.customers.read().await.values().cloned().collect();
            let mut customers = Vec::with_capacity(slots.len());
            for slot in slots {
                customers.push(slot.lock().await.clone());
            }
            customers.sort_by_key(|c| c.id);
            Ok(customers)
        }

        async fn create_customer(
            &self,
            currency: Currency,
            balance: Decimal,
        ) -> Result<Customer, PortError> {
            let id = CustomerId::new(self.next_customer_id.fetch_add(1, Ordering::SeqCst));
            let customer = Customer::new(id, currency, balance);
            self.customers
                .write()
                .await
                .insert(id, Arc::new(Mutex::new(customer.clone())));
            Ok(customer)
        }
    }

    #[async_trait]
    impl InvoicePort for InMemoryBillingStore {
        async fn fetch_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.invoices
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn fetch_invoices(&self) -> Result<Vec<Invoice>, PortError> {
            Ok(self.invoices.read().await.values().cloned().collect())
        }

        async fn fetch_due(
            &self,
            status: InvoiceStatus,
            period: BillingPeriod,
        ) -> Result<Vec<Invoice>, PortError> {
            if self.with_faults(|f| f.query_unavailable).unwrap_or(false) {
                return Err(PortError::unavailable("invoice-store"));
            }
            Ok(self
                .invoices
                .read()
                .await
                .values()
                .filter(|i| i.status == status && period.contains(i.created))
                .cloned()
                .collect())
        }

        async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, PortError> {
            if !self.customers.read().await.contains_key(&invoice.customer_id) {
                return Err(PortError::not_found("Customer", invoice.customer_id));
            }
            let id = InvoiceId::new(self.next_invoice_id.fetch_add(1, Ordering::SeqCst));
            let invoice = Invoice {
                id,
                customer_id: invoice.customer_id,
                amount: invoice.amount,
                status: invoice.status,
                created: invoice.created,
            };
            self.invoices.write().await.insert(id, invoice.clone());
            Ok(invoice)
        }
    }

    #[async_trait]
    impl AccountLedger for InMemoryBillingStore {
        async fn commit_payment(
            &self,
            invoice_id: InvoiceId,
            customer_id: CustomerId,
            amount: Decimal,
        ) -> Result<(), PortError> {
            let slot = self
                .customers
                .read()
                .await
                .get(&customer_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", customer_id))?;

            let mut customer = slot.lock().await;
            self.track_commit(customer_id, true);

            let latency = self.with_faults(|f| f.commit_latency).flatten();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let result = self.apply_commit(&mut customer, invoice_id, amount).await;
            self.track_commit(customer_id, false);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryBillingStore;
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_kernel::{HealthCheckable, Money};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store_with_invoice(balance: Decimal, amount: Decimal) -> (InMemoryBillingStore, Customer, Invoice) {
        let store = InMemoryBillingStore::new();
        let customer = store.create_customer(Currency::USD, balance).await.unwrap();
        let invoice = store
            .create_invoice(NewInvoice::pending(customer.id, Money::new(amount, Currency::USD)))
            .await
            .unwrap();
        (store, customer, invoice)
    }

    #[tokio::test]
    async fn test_commit_debits_and_marks_paid() {
        let (store, customer, invoice) = store_with_invoice(dec!(200), dec!(150)).await;

        store.commit_payment(invoice.id, customer.id, dec!(150)).await.unwrap();

        assert_eq!(store.balance_of(customer.id).await, Some(dec!(50)));
        assert_eq!(store.status_of(invoice.id).await, Some(InvoiceStatus::Paid));
        assert_eq!(store.committed(), vec![invoice.id]);
    }

    #[tokio::test]
    async fn test_failed_commit_changes_nothing() {
        let (store, customer, invoice) = store_with_invoice(dec!(200), dec!(150)).await;
        store.fail_commit_for(invoice.id);

        let result = store.commit_payment(invoice.id, customer.id, dec!(150)).await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(200)));
        assert_eq!(store.status_of(invoice.id).await, Some(InvoiceStatus::Pending));
    }

    #[tokio::test]
    async fn test_second_commit_is_a_conflict() {
        let (store, customer, invoice) = store_with_invoice(dec!(500), dec!(100)).await;

        store.commit_payment(invoice.id, customer.id, dec!(100)).await.unwrap();
        let second = store.commit_payment(invoice.id, customer.id, dec!(100)).await;

        assert!(matches!(second, Err(PortError::Conflict { .. })));
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(400)));
    }

    #[tokio::test]
    async fn test_commits_for_one_customer_serialize() {
        let store = Arc::new(InMemoryBillingStore::new());
        store.set_commit_latency(Duration::from_millis(20));
        let customer = store.create_customer(Currency::EUR, dec!(100)).await.unwrap();
        let customer_id = customer.id;

        let mut ids = Vec::new();
        for _ in 0..3 {
            let invoice = store
                .create_invoice(NewInvoice::pending(customer.id, Money::new(dec!(10), Currency::EUR)))
                .await
                .unwrap();
            ids.push(invoice.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = store.clone();
                let id = *id;
                tokio::spawn(async move { store.commit_payment(id, customer_id, dec!(10)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.max_concurrent_commits(customer.id), 1);
        assert_eq!(store.balance_of(customer.id).await, Some(dec!(70)));
    }

    #[tokio::test]
    async fn test_fetch_due_is_half_open() {
        let store = InMemoryBillingStore::new();
        let customer = store.create_customer(Currency::GBP, dec!(10)).await.unwrap();
        let period = BillingPeriod::new(
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let amount = Money::new(dec!(1), Currency::GBP);
        let inside = store
            .create_invoice(NewInvoice::pending(customer.id, amount).created_at(period.start))
            .await
            .unwrap();
        store
            .create_invoice(NewInvoice::pending(customer.id, amount).created_at(period.end))
            .await
            .unwrap();
        store
            .create_invoice(
                NewInvoice::pending(customer.id, amount)
                    .created_at(period.start)
                    .with_status(InvoiceStatus::Paid),
            )
            .await
            .unwrap();

        let due = store.fetch_due(InvoiceStatus::Pending, period).await.unwrap();
        assert_eq!(due, vec![inside]);
    }

    #[tokio::test]
    async fn test_lookups_report_not_found() {
        let store = InMemoryBillingStore::new();

        assert!(store.fetch_customer(CustomerId::new(9)).await.unwrap_err().is_not_found());
        assert!(store.fetch_invoice(InvoiceId::new(9)).await.unwrap_err().is_not_found());
        let orphan = NewInvoice::pending(CustomerId::new(9), Money::zero(Currency::SEK));
        assert!(store.create_invoice(orphan).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = InMemoryBillingStore::new();
        assert!(store.health_check().await.is_healthy());
    }
}
