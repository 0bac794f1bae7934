//! Billing periods
//!
//! A postpaid cycle runs from the billing day of one month up to the day
//! before the billing day of the next. Billing days past the end of a short
//! month fall on its last day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use core_kernel::DateRange;
use crate::error::BillingError;

/// One postpaid billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }

    /// `YYYYMM` of the month the period is named after
    pub fn stamp(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    first_of_next.pred_opt().map(|d| d.day())
}

fn anchor(year: i32, month: u32, billing_day: u32) -> Option<NaiveDate> {
    let day = billing_day.min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Returns the billing period named by `year`/`month` for `billing_day`
///
/// # Errors
///
/// `Validation` for a month outside 1..=12 or a billing day outside 1..=31.
pub fn billing_period(year: i32, month: u32, billing_day: u32) -> Result<BillingPeriod, BillingError> {
    if !(1..=31).contains(&billing_day) {
        return Err(BillingError::Validation(format!(
            "Billing day must be between 1 and 31, got {}",
            billing_day
        )));
    }
    let invalid = || BillingError::Validation(format!("Invalid billing month {}-{}", year, month));
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let start = anchor(year, month, billing_day).ok_or_else(invalid)?;
    let end = anchor(next_year, next_month, billing_day)
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;

    Ok(BillingPeriod { year, month, start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_of_month_is_calendar_month() {
        let period = billing_period(2025, 2, 1).unwrap();
        assert_eq!(period.start, date("2025-02-01"));
        assert_eq!(period.end, date("2025-02-28"));
    }

    #[test]
    fn test_mid_month_anchor() {
        let period = billing_period(2025, 3, 15).unwrap();
        assert_eq!(period.start, date("2025-03-15"));
        assert_eq!(period.end, date("2025-04-14"));
    }

    #[test]
    fn test_day_clamped_to_short_month() {
        let period = billing_period(2025, 1, 31).unwrap();
        assert_eq!(period.start, date("2025-01-31"));
        assert_eq!(period.end, date("2025-02-27"));

        let february = billing_period(2025, 2, 31).unwrap();
        assert_eq!(february.start, date("2025-02-28"));
        assert_eq!(february.end, date("2025-03-30"));
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let period = billing_period(2025, 12, 1).unwrap();
        assert_eq!(period.end, date("2025-12-31"));
        assert_eq!(period.stamp(), "202512");
    }

    #[test]
    fn test_rejects_bad_billing_day() {
        assert!(billing_period(2025, 3, 0).is_err());
        assert!(billing_period(2025, 3, 32).is_err());
        assert!(billing_period(2025, 13, 1).is_err());
    }
}
