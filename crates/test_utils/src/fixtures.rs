//! Pre-built Test Fixtures
//!
//! Ready-to-use clients, slots and dates. Names and emails come from
//! `fake` so fixtures never collide across tests.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal_macros::dec;

use core_kernel::{Money, Rate, TimeSlot};
use domain_client::{BillingEntity, BillingType, Client, StandingDiscount};

/// Builds a date, panicking on invalid input
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid fixture time")
}

/// A one-hour slot starting on the hour
pub fn slot(year: i32, month: u32, day: u32, hour: u32) -> TimeSlot {
    TimeSlot::new(date(year, month, day), time(hour, 0), time(hour + 1, 0)).expect("valid fixture slot")
}

/// A UTC instant
pub fn instant(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid fixture instant")
}

/// Fixture for client test data
pub struct ClientFixtures;

impl ClientFixtures {
    pub fn prepaid() -> Client {
        Client::new(Name().fake::<String>(), SafeEmail().fake::<String>())
    }

    pub fn postpaid() -> Client {
        Self::prepaid().with_billing_type(BillingType::Postpaid)
    }

    /// Postpaid client with a 10% discount and a R100 fixed discount
    pub fn postpaid_with_discount() -> Client {
        Self::postpaid().with_discount(StandingDiscount {
            percent: Some(Rate::from_percentage(dec!(10)).expect("valid rate")),
            fixed: Some(Money::zar(10_000)),
        })
    }

    pub fn corporate() -> BillingEntity {
        BillingEntity::new("Acme Wellness (Pty) Ltd", SafeEmail().fake::<String>())
            .with_vat_number("4123456789")
    }
}
