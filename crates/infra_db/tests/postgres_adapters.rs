//! PostgreSQL adapter tests
//!
//! Each test starts its own container, so they are ignored unless Docker is
//! available: `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;

use core_kernel::{Currency, CustomerId, HealthCheckable, InvoiceId, PortError};
use domain_billing::{
    AccountLedger, BalanceCheckGateway, BillingOrchestrator, CustomerPort, InvoicePort,
    InvoiceStatus,
};
use rust_decimal_macros::dec;
use test_utils::{
    assert_balance, assert_invoice_status, db_test, TemporalFixtures, TestCustomerBuilder,
    TestInvoiceBuilder,
};

db_test!(test_customer_round_trip, |db| {
    let adapters = db.adapters();
    let created = adapters
        .customers
        .create_customer(Currency::SEK, dec!(250.75))
        .await
        .unwrap();

    let fetched = adapters.customers.fetch_customer(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(adapters.customers.fetch_customers().await.unwrap(), vec![created]);

    let missing = adapters.customers.fetch_customer(CustomerId::new(999_999)).await;
    assert!(missing.unwrap_err().is_not_found());
});

db_test!(test_invoice_for_unknown_customer_is_not_found, |db| {
    let adapters = db.adapters();
    let ghost = domain_billing::Customer::new(CustomerId::new(424_242), Currency::EUR, dec!(0));

    let result = TestInvoiceBuilder::for_customer(&ghost)
        .create(adapters.invoices.as_ref())
        .await;

    assert!(result.unwrap_err().is_not_found());
});

db_test!(test_fetch_due_selects_status_and_half_open_period, |db| {
    let adapters = db.adapters();
    let customer = TestCustomerBuilder::new()
        .create(adapters.customers.as_ref())
        .await
        .unwrap();

    let first_instant = TestInvoiceBuilder::for_customer(&customer)
        .created_at(TemporalFixtures::billed_period().start)
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();
    let mid_month = TestInvoiceBuilder::for_customer(&customer)
        .on_billed_day(15)
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();
    TestInvoiceBuilder::for_customer(&customer)
        .created_at(TemporalFixtures::after_period())
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();
    TestInvoiceBuilder::for_customer(&customer)
        .created_at(TemporalFixtures::before_period())
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();
    TestInvoiceBuilder::for_customer(&customer)
        .on_billed_day(20)
        .paid()
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();

    let mut due: Vec<InvoiceId> = adapters
        .invoices
        .fetch_due(InvoiceStatus::Pending, TemporalFixtures::billed_period())
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    due.sort();

    assert_eq!(due, vec![first_instant.id, mid_month.id]);
    assert_eq!(adapters.invoices.fetch_invoices().await.unwrap().len(), 5);
});

db_test!(test_commit_debits_and_marks_paid, |db| {
    let adapters = db.adapters();
    let customer = TestCustomerBuilder::new()
        .with_balance(dec!(200.00))
        .create(adapters.customers.as_ref())
        .await
        .unwrap();
    let invoice = TestInvoiceBuilder::for_customer(&customer)
        .with_amount(dec!(150.00))
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();

    adapters
        .ledger
        .commit_payment(invoice.id, customer.id, dec!(150.00))
        .await
        .unwrap();

    assert_balance(adapters.customers.as_ref(), customer.id, dec!(50.00)).await;
    assert_invoice_status(adapters.invoices.as_ref(), invoice.id, InvoiceStatus::Paid).await;
});

db_test!(test_second_commit_is_rejected_and_rolled_back, |db| {
    let adapters = db.adapters();
    let customer = TestCustomerBuilder::new()
        .with_balance(dec!(500.00))
        .create(adapters.customers.as_ref())
        .await
        .unwrap();
    let invoice = TestInvoiceBuilder::for_customer(&customer)
        .with_amount(dec!(100.00))
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();

    adapters
        .ledger
        .commit_payment(invoice.id, customer.id, dec!(100.00))
        .await
        .unwrap();
    let second = adapters
        .ledger
        .commit_payment(invoice.id, customer.id, dec!(100.00))
        .await;

    assert!(matches!(second, Err(PortError::Conflict { .. })));
    assert_balance(adapters.customers.as_ref(), customer.id, dec!(400.00)).await;
});

db_test!(test_commit_against_wrong_customer_changes_nothing, |db| {
    let adapters = db.adapters();
    let owner = TestCustomerBuilder::new()
        .create(adapters.customers.as_ref())
        .await
        .unwrap();
    let other = TestCustomerBuilder::new()
        .with_balance(dec!(80.00))
        .create(adapters.customers.as_ref())
        .await
        .unwrap();
    let invoice = TestInvoiceBuilder::for_customer(&owner)
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();

    let result = adapters
        .ledger
        .commit_payment(invoice.id, other.id, dec!(10.00))
        .await;

    assert!(matches!(result, Err(PortError::Conflict { .. })));
    assert_balance(adapters.customers.as_ref(), other.id, dec!(80.00)).await;
    assert_invoice_status(adapters.invoices.as_ref(), invoice.id, InvoiceStatus::Pending).await;

    let unknown = adapters
        .ledger
        .commit_payment(InvoiceId::new(777_777), owner.id, dec!(1))
        .await;
    assert!(unknown.unwrap_err().is_not_found());
});

db_test!(test_concurrent_commits_for_one_customer_all_apply, |db| {
    let adapters = db.adapters();
    let customer = TestCustomerBuilder::new()
        .with_balance(dec!(100.00))
        .create(adapters.customers.as_ref())
        .await
        .unwrap();

    let mut invoices = Vec::new();
    for _ in 0..4 {
        invoices.push(
            TestInvoiceBuilder::for_customer(&customer)
                .with_amount(dec!(10.00))
                .create(adapters.invoices.as_ref())
                .await
                .unwrap(),
        );
    }

    let handles: Vec<_> = invoices
        .iter()
        .map(|invoice| {
            let ledger = Arc::clone(&adapters.ledger);
            let invoice_id = invoice.id;
            let customer_id = customer.id;
            tokio::spawn(async move { ledger.commit_payment(invoice_id, customer_id, dec!(10.00)).await })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            committed += 1;
        }
    }

    // Serializable conflicts are allowed to reject a commit, never to lose a debit
    let expected = dec!(100.00) - dec!(10.00) * rust_decimal::Decimal::from(committed);
    assert_balance(adapters.customers.as_ref(), customer.id, expected).await;
    let paid = adapters
        .invoices
        .fetch_invoices()
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .count();
    assert_eq!(paid, committed);
});

db_test!(test_billing_run_against_postgres, |db| {
    let adapters = db.adapters();
    let customer = TestCustomerBuilder::new()
        .with_currency(Currency::USD)
        .with_balance(dec!(200.00))
        .create(adapters.customers.as_ref())
        .await
        .unwrap();
    let first = TestInvoiceBuilder::for_customer(&customer)
        .with_amount(dec!(150.00))
        .on_billed_day(2)
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();
    let second = TestInvoiceBuilder::for_customer(&customer)
        .with_amount(dec!(100.00))
        .on_billed_day(5)
        .create(adapters.invoices.as_ref())
        .await
        .unwrap();

    let orchestrator = BillingOrchestrator::new(
        Arc::new(BalanceCheckGateway::new(adapters.customers.clone())),
        adapters.invoices.clone(),
        adapters.ledger.clone(),
    );
    orchestrator
        .charge_invoices_at(TemporalFixtures::run_time())
        .await
        .unwrap();

    assert_invoice_status(adapters.invoices.as_ref(), first.id, InvoiceStatus::Paid).await;
    assert_invoice_status(adapters.invoices.as_ref(), second.id, InvoiceStatus::Pending).await;
    assert_balance(adapters.customers.as_ref(), customer.id, dec!(50.00)).await;
});

db_test!(test_health_checks_report_healthy, |db| {
    let adapters = db.adapters();
    assert!(adapters.customers.health_check().await.is_healthy());
    assert!(adapters.invoices.health_check().await.is_healthy());
    assert!(adapters.ledger.health_check().await.is_healthy());
});
