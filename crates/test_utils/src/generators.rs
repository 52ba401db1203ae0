//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating billing data that respects
//! the domain's invariants (two-decimal amounts, known currencies, invoice
//! timestamps inside the billed month).

use chrono::{DateTime, Duration, Utc};
use core_kernel::{Currency, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::TemporalFixtures;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::EUR),
        Just(Currency::USD),
        Just(Currency::DKK),
        Just(Currency::SEK),
        Just(Currency::GBP),
    ]
}

/// Strategy for generating two different currencies
pub fn distinct_currencies_strategy() -> impl Strategy<Value = (Currency, Currency)> {
    (currency_strategy(), currency_strategy()).prop_filter("currencies must differ", |(a, b)| a != b)
}

/// Strategy for non-negative balances with two decimal places
pub fn balance_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for positive invoice amounts with two decimal places
pub fn invoice_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for positive Money values in `currency`
pub fn money_in_strategy(currency: Currency) -> impl Strategy<Value = Money> {
    invoice_amount_strategy().prop_map(move |amount| Money::new(amount, currency))
}

/// Strategy for creation timestamps inside the billed month
pub fn billed_timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    let period = TemporalFixtures::billed_period();
    let span = (period.end - period.start).num_seconds();
    (0..span).prop_map(move |offset| period.start + Duration::seconds(offset))
}

/// Strategy for a customer's invoices: amount and creation time
pub fn invoice_batch_strategy(
    max_len: usize,
) -> impl Strategy<Value = Vec<(Decimal, DateTime<Utc>)>> {
    proptest::collection::vec(
        (invoice_amount_strategy(), billed_timestamp_strategy()),
        1..=max_len.max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_distinct_currencies_differ((a, b) in distinct_currencies_strategy()) {
            prop_assert_ne!(a, b);
        }

        #[test]
        fn test_billed_timestamps_are_in_period(ts in billed_timestamp_strategy()) {
            prop_assert!(TemporalFixtures::billed_period().contains(ts));
        }

        #[test]
        fn test_amounts_are_positive(amount in invoice_amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() <= 2);
        }
    }
}
