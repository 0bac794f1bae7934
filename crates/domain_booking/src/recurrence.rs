//! Recurring series dates
//!
//! [`generate`] is pure: the same inputs always give the same dates, so a
//! preview shown to an operator matches what is later booked.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a series repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Weekly,
    /// Every second week
    Bimonthly,
    /// Same day of the month
    Monthly,
}

impl std::str::FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(RecurrencePattern::Weekly),
            "bimonthly" => Ok(RecurrencePattern::Bimonthly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            other => Err(format!("unknown recurrence pattern: {}", other)),
        }
    }
}

/// Expands a series into its occurrence dates, oldest first
///
/// Dates start at `start` and run up to and including `start` plus
/// `horizon_months` months. Weekly and bimonthly dates keep the start's
/// weekday. Monthly dates keep its day of the month; months without that
/// day (the 31st in April, say) are skipped rather than shifted.
pub fn generate(start: NaiveDate, pattern: RecurrencePattern, horizon_months: u32) -> Vec<NaiveDate> {
    let end = start
        .checked_add_months(Months::new(horizon_months))
        .unwrap_or(NaiveDate::MAX);

    match pattern {
        RecurrencePattern::Weekly => every_n_days(start, end, 7),
        RecurrencePattern::Bimonthly => every_n_days(start, end, 14),
        RecurrencePattern::Monthly => (0..=horizon_months)
            .filter_map(|offset| same_day_in_month(start, offset))
            .take_while(|date| *date <= end)
            .collect(),
    }
}

fn every_n_days(start: NaiveDate, end: NaiveDate, step: u64) -> Vec<NaiveDate> {
    std::iter::successors(Some(start), |date| date.checked_add_days(chrono::Days::new(step)))
        .take_while(|date| *date <= end)
        .collect()
}

fn same_day_in_month(start: NaiveDate, offset: u32) -> Option<NaiveDate> {
    let months = start.month0() + offset;
    let year = start.year().checked_add(i32::try_from(months / 12).ok()?)?;
    NaiveDate::from_ymd_opt(year, months % 12 + 1, start.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_weekly_one_month_from_a_monday() {
        let dates = generate(date("2025-03-03"), RecurrencePattern::Weekly, 1);
        let expected: Vec<NaiveDate> = ["2025-03-03", "2025-03-10", "2025-03-17", "2025-03-24", "2025-03-31"]
            .iter()
            .map(|s| date(s))
            .collect();
        assert_eq!(dates, expected);
    }

    #[test]
    fn test_bimonthly_steps_two_weeks() {
        let dates = generate(date("2025-03-03"), RecurrencePattern::Bimonthly, 2);
        assert_eq!(
            dates,
            vec![
                date("2025-03-03"),
                date("2025-03-17"),
                date("2025-03-31"),
                date("2025-04-14"),
                date("2025-04-28"),
            ]
        );
    }

    #[test]
    fn test_monthly_skips_short_months() {
        let dates = generate(date("2025-01-31"), RecurrencePattern::Monthly, 4);
        assert_eq!(dates, vec![date("2025-01-31"), date("2025-03-31"), date("2025-05-31")]);
    }

    #[test]
    fn test_monthly_crosses_year_end() {
        let dates = generate(date("2025-11-15"), RecurrencePattern::Monthly, 3);
        assert_eq!(
            dates,
            vec![date("2025-11-15"), date("2025-12-15"), date("2026-01-15"), date("2026-02-15")]
        );
    }

    #[test]
    fn test_zero_horizon_is_the_start_only() {
        assert_eq!(generate(date("2025-03-03"), RecurrencePattern::Weekly, 0), vec![date("2025-03-03")]);
    }

    proptest! {
        #[test]
        fn generation_is_deterministic_and_keeps_weekday(
            days in 0i64..3650,
            horizon in 0u32..13,
            weekly in any::<bool>()
        ) {
            let start = date("2024-01-01") + chrono::Duration::days(days);
            let pattern = if weekly { RecurrencePattern::Weekly } else { RecurrencePattern::Bimonthly };

            let first = generate(start, pattern, horizon);
            let second = generate(start, pattern, horizon);
            prop_assert_eq!(&first, &second);

            let weekday: Weekday = start.weekday();
            prop_assert!(first.iter().all(|d| d.weekday() == weekday));
            prop_assert!(first.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(first[0], start);
        }
    }
}
