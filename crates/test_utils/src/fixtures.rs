//! Pre-built Test Fixtures
//!
//! Billing runs are date driven, so most fixtures are fixed instants around
//! one run: the run happens on 2024-06-01 and settles May 2024.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{BillingPeriod, Currency, Money, Timezone};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Creates a USD amount
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    /// Creates a EUR amount
    pub fn eur(amount: Decimal) -> Money {
        Money::new(amount, Currency::EUR)
    }

    /// Standard invoice amount
    pub fn usd_100() -> Money {
        Self::usd(dec!(100.00))
    }

    /// Creates a EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Self::eur(dec!(100.00))
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The instant the standard billing run is triggered
    pub fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 2, 30, 0).unwrap()
    }

    /// The period settled by a run at [`run_time`](Self::run_time)
    pub fn billed_period() -> BillingPeriod {
        BillingPeriod::previous_month(Self::run_time(), Timezone::default()).unwrap()
    }

    /// Noon UTC on `day` of the billed month
    pub fn billed_day(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    /// Last second before the billed month
    pub fn before_period() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 59).unwrap()
    }

    /// First instant after the billed month
    pub fn after_period() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }
}
