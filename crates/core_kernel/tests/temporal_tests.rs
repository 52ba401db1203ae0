//! Unit tests for billing periods and timezones

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use core_kernel::{BillingPeriod, TemporalError, Timezone};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

mod billing_period {
    use super::*;

    #[test]
    fn test_new_rejects_empty_period() {
        let t = utc(2024, 5, 1, 0, 0);
        assert!(matches!(
            BillingPeriod::new(t, t),
            Err(TemporalError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_new_rejects_inverted_period() {
        let result = BillingPeriod::new(utc(2024, 6, 1, 0, 0), utc(2024, 5, 1, 0, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_run_on_the_first_bills_whole_previous_month() {
        let period = BillingPeriod::previous_month(utc(2024, 6, 1, 2, 30), Timezone::default()).unwrap();

        assert_eq!(period.start, utc(2024, 5, 1, 0, 0));
        assert_eq!(period.end, utc(2024, 6, 1, 0, 0));
    }

    #[test]
    fn test_leap_february() {
        let period = BillingPeriod::previous_month(utc(2024, 3, 1, 0, 0), Timezone::default()).unwrap();

        assert!(period.contains(utc(2024, 2, 29, 23, 59)));
        assert_eq!(period.end - period.start, Duration::days(29));
    }

    #[test]
    fn test_boundaries() {
        let period = BillingPeriod::previous_month(utc(2024, 6, 1, 0, 0), Timezone::default()).unwrap();

        assert!(!period.contains(utc(2024, 4, 30, 23, 59)));
        assert!(period.contains(utc(2024, 5, 1, 0, 0)));
        assert!(!period.contains(utc(2024, 6, 1, 0, 0)));
    }

    #[test]
    fn test_display_is_half_open_interval() {
        let period = BillingPeriod::new(utc(2024, 5, 1, 0, 0), utc(2024, 6, 1, 0, 0)).unwrap();
        assert_eq!(
            period.to_string(),
            "[2024-05-01T00:00:00+00:00, 2024-06-01T00:00:00+00:00)"
        );
    }
}

mod timezone {
    use super::*;

    #[test]
    fn test_default_is_utc() {
        assert_eq!(Timezone::default().to_string(), "UTC");
    }

    #[test]
    fn test_parse_trims_and_rejects_unknown() {
        let tz: Timezone = " America/New_York ".parse().unwrap();
        assert_eq!(tz.to_string(), "America/New_York");
        assert_eq!(
            "Nowhere/Special".parse::<Timezone>(),
            Err(TemporalError::UnknownTimezone("Nowhere/Special".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_iana_name() {
        let tz: Timezone = serde_json::from_str("\"Europe/Copenhagen\"").unwrap();
        assert_eq!(serde_json::to_string(&tz).unwrap(), "\"Europe/Copenhagen\"");
        assert!(serde_json::from_str::<Timezone>("\"Atlantis\"").is_err());
    }

    #[test]
    fn test_start_of_day_is_local_midnight() {
        let tz: Timezone = "Europe/Copenhagen".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        // CEST is UTC+2
        assert_eq!(tz.start_of_day(date).unwrap(), utc(2024, 6, 30, 22, 0));
    }

    #[test]
    fn test_midnight_in_dst_gap_starts_after_the_gap() {
        // Cuba moves clocks from 00:00 to 01:00 on the second Sunday of March
        let tz: Timezone = "America/Havana".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        assert_eq!(tz.start_of_day(date).unwrap(), utc(2024, 3, 10, 5, 0));
        assert_eq!(tz.local_date(utc(2024, 3, 10, 5, 0)), date);
    }

    #[test]
    fn test_period_spanning_dst_change() {
        let tz: Timezone = "Europe/Copenhagen".parse().unwrap();
        // 00:30 on April 1st in Copenhagen
        let period = BillingPeriod::previous_month(utc(2024, 3, 31, 22, 30), tz).unwrap();

        assert_eq!(period.start, utc(2024, 2, 29, 23, 0));
        assert_eq!(period.end, utc(2024, 3, 31, 22, 0));
        assert_eq!(period.end - period.start, Duration::days(31) - Duration::hours(1));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        let tz: Timezone = "America/Los_Angeles".parse().unwrap();
        let instant = utc(2024, 6, 1, 3, 0);
        assert_eq!(tz.local_date(instant), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());

        // Still May in Los Angeles, so the previous month is April
        let period = BillingPeriod::previous_month(instant, tz).unwrap();
        assert_eq!(period.start, utc(2024, 4, 1, 7, 0));
    }
}
