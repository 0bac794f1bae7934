//! Billing configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, MoneyError, Rate};

/// VAT registration of the practice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VatConfig {
    pub registered: bool,
    pub rate_percent: Decimal,
}

impl Default for VatConfig {
    fn default() -> Self {
        Self {
            registered: false,
            rate_percent: dec!(15),
        }
    }
}

impl VatConfig {
    /// The VAT rate to charge, or `None` when not registered
    pub fn rate(&self) -> Result<Option<Rate>, MoneyError> {
        if !self.registered {
            return Ok(None);
        }
        Rate::from_percentage(self.rate_percent).map(Some)
    }
}

/// Practice-wide billing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub currency: Currency,
    /// Day of the month each postpaid cycle starts on
    pub billing_day: u32,
    pub vat: VatConfig,
    /// Days after issue a payment request falls due
    pub payment_terms_days: i64,
    /// Scale session prices by length relative to the standard session
    pub prorate_by_duration: bool,
    pub standard_session_minutes: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::ZAR,
            billing_day: 1,
            vat: VatConfig::default(),
            payment_terms_days: 7,
            prorate_by_duration: false,
            standard_session_minutes: 60,
        }
    }
}
