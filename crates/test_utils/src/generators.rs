//! Property-Based Test Generators
//!
//! Proptest strategies for values that respect the domain's own
//! constraints: valid dates, on-the-hour slots, sane prices and discounts.

use chrono::{Duration, NaiveDate, NaiveTime};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{BookingId, Money, Rate, TimeSlot};
use domain_booking::{RecurrencePattern, SessionType};
use domain_client::StandingDiscount;
use domain_credit::{CreditGrant, LedgerEntry};

/// Any date from 2024 through 2027
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..4 * 365).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default() + Duration::days(offset)
    })
}

/// A slot of 30 to 120 minutes starting between 07:00 and 18:00
pub fn slot_strategy() -> impl Strategy<Value = TimeSlot> {
    (date_strategy(), 7u32..18, prop_oneof![Just(0u32), Just(30u32)], 1i64..=4).prop_map(
        |(date, hour, minute, halves)| {
            let start = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
            let end = start + Duration::minutes(30 * halves);
            TimeSlot { date, start_time: start, end_time: end }
        },
    )
}

pub fn session_type_strategy() -> impl Strategy<Value = SessionType> {
    prop_oneof![
        Just(SessionType::Individual),
        Just(SessionType::Couples),
        Just(SessionType::Free),
    ]
}

pub fn pattern_strategy() -> impl Strategy<Value = RecurrencePattern> {
    prop_oneof![
        Just(RecurrencePattern::Weekly),
        Just(RecurrencePattern::Bimonthly),
        Just(RecurrencePattern::Monthly),
    ]
}

/// Session prices from R1 to R5000, in cents
pub fn price_strategy() -> impl Strategy<Value = Money> {
    (100i64..=500_000).prop_map(Money::zar)
}

/// Any combination of a whole-percent and a fixed discount
pub fn discount_strategy() -> impl Strategy<Value = StandingDiscount> {
    (
        proptest::option::of(0u32..=100),
        proptest::option::of(0i64..=600_000),
    )
        .prop_map(|(percent, fixed)| StandingDiscount {
            percent: percent.and_then(|p| Rate::from_percentage(Decimal::from(p)).ok()),
            fixed: fixed.map(Money::zar),
        })
}

/// A ledger entry that may or may not be allowed against the running balance
pub fn ledger_entry_strategy() -> impl Strategy<Value = LedgerEntry> {
    prop_oneof![
        (1i64..=10).prop_map(|amount| LedgerEntry::Grant { amount, source: CreditGrant::AdminGrant }),
        Just(()).prop_map(|_| LedgerEntry::Use { booking_id: BookingId::new() }),
        Just(()).prop_map(|_| LedgerEntry::Refund { booking_id: BookingId::new() }),
        Just(()).prop_map(|_| LedgerEntry::Forfeit { booking_id: BookingId::new() }),
    ]
}
