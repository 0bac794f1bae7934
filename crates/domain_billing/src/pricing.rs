//! Session pricing, standing discounts and VAT
//!
//! All arithmetic is in whole minor units. Percentages round half away
//! from zero to the nearest cent.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, DomainPort, Money, MoneyError, PortError, Rate};
use domain_client::{SessionCategory, StandingDiscount};

/// Source of session rates
#[async_trait]
pub trait PricingPort: DomainPort {
    /// Rate for one standard session of `category`, in `currency`
    async fn session_rate(&self, category: SessionCategory, currency: Currency) -> Result<Money, PortError>;
}

/// Which part of a standing discount was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedDiscount {
    Percent { rate: Rate },
    Fixed,
}

/// Discount for one line
///
/// The percentage discount is computed first. A fixed discount replaces it
/// when larger; the two are never added. The result never exceeds `price`.
pub fn line_discount(
    price: Money,
    discount: &StandingDiscount,
) -> Result<(Money, Option<AppliedDiscount>), MoneyError> {
    let zero = Money::zero(price.currency());

    let by_percent = match discount.percent {
        Some(rate) if !rate.is_zero() => Some((rate.apply(&price)?, AppliedDiscount::Percent { rate })),
        _ => None,
    };
    let fixed = match discount.fixed {
        Some(amount) if amount.is_positive() => Some((amount.min(price)?, AppliedDiscount::Fixed)),
        _ => None,
    };

    Ok(match (by_percent, fixed) {
        (Some(percent), Some(fixed)) if fixed.0 > percent.0 => (fixed.0, Some(fixed.1)),
        (Some(percent), _) => (percent.0, Some(percent.1)),
        (None, Some(fixed)) => (fixed.0, Some(fixed.1)),
        (None, None) => (zero, None),
    })
}

/// Scales a standard rate to a session's length
pub fn prorate(rate: Money, duration_minutes: i64, standard_minutes: i64) -> Result<Money, MoneyError> {
    if standard_minutes <= 0 || duration_minutes == standard_minutes {
        return Ok(rate);
    }
    rate.scale(Decimal::from(duration_minutes) / Decimal::from(standard_minutes))
}

/// Computed totals of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub gross: Money,
    pub discount: Money,
    pub subtotal: Money,
    pub vat_rate: Option<Rate>,
    pub vat: Money,
    pub total: Money,
}

impl Totals {
    /// Sums line amounts and applies VAT to the discounted subtotal
    pub fn compute(
        currency: Currency,
        lines: &[(Money, Money)],
        vat_rate: Option<Rate>,
    ) -> Result<Self, MoneyError> {
        let gross = Money::sum(currency, lines.iter().map(|(price, _)| price))?;
        let discount = Money::sum(currency, lines.iter().map(|(_, discount)| discount))?;
        let subtotal = gross.checked_sub(&discount)?;
        let vat = match vat_rate {
            Some(rate) => rate.apply(&subtotal)?,
            None => Money::zero(currency),
        };
        let total = subtotal.checked_add(&vat)?;

        Ok(Self {
            gross,
            discount,
            subtotal,
            vat_rate,
            vat,
            total,
        })
    }
}
