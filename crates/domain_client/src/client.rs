//! Client aggregate and its billing attributes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{ClientId, Money, Rate, RelationshipId};

/// How a client pays for sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    /// Pays in advance with session credits
    #[default]
    Prepaid,
    /// Billed monthly in arrears; never pays by credit
    Postpaid,
}

impl BillingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingType::Prepaid => "prepaid",
            BillingType::Postpaid => "postpaid",
        }
    }
}

impl std::str::FromStr for BillingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepaid" => Ok(BillingType::Prepaid),
            "postpaid" => Ok(BillingType::Postpaid),
            other => Err(format!("unknown billing type: {}", other)),
        }
    }
}

/// Standing discount applied to every billed session
///
/// The two forms are not additive: the larger of the two wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StandingDiscount {
    pub percent: Option<Rate>,
    pub fixed: Option<Money>,
}

impl StandingDiscount {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.percent.map_or(true, |r| r.is_zero()) && self.fixed.map_or(true, |m| m.is_zero())
    }
}

/// A client of the practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Client {
    pub id: ClientId,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub billing_type: BillingType,
    /// Where bills are sent when the client pays for themselves
    #[validate(email)]
    pub billing_email: Option<String>,
    pub standing_discount: StandingDiscount,
    /// Payer for individual sessions; `None` means self-pay
    pub individual_billed_to: Option<RelationshipId>,
    /// Non-partner payer for couples sessions; partner payers live on the
    /// partner relationship itself
    pub couples_billed_to: Option<RelationshipId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Creates a prepaid, self-paying client
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ClientId::new_v7(),
            full_name: full_name.into(),
            email: email.into(),
            phone: None,
            billing_type: BillingType::Prepaid,
            billing_email: None,
            standing_discount: StandingDiscount::none(),
            individual_billed_to: None,
            couples_billed_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_billing_type(mut self, billing_type: BillingType) -> Self {
        self.billing_type = billing_type;
        self
    }

    pub fn with_discount(mut self, discount: StandingDiscount) -> Self {
        self.standing_discount = discount;
        self
    }

    pub fn is_postpaid(&self) -> bool {
        self.billing_type == BillingType::Postpaid
    }

    /// Address bills go to when this client is the payer
    pub fn invoice_email(&self) -> &str {
        self.billing_email.as_deref().unwrap_or(&self.email)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invoice_email_falls_back_to_contact_email() {
        let mut client = Client::new("Thandi Nkosi", "thandi@example.com");
        assert_eq!(client.invoice_email(), "thandi@example.com");

        client.billing_email = Some("accounts@example.com".into());
        assert_eq!(client.invoice_email(), "accounts@example.com");
    }

    #[test]
    fn test_rejects_malformed_email() {
        let client = Client::new("Thandi Nkosi", "not-an-email");
        assert!(client.validate().is_err());
    }

    #[test]
    fn test_zero_discount_counts_as_none() {
        let discount = StandingDiscount {
            percent: Some(Rate::from_percentage(dec!(0)).unwrap()),
            fixed: Some(Money::zar(0)),
        };
        assert!(discount.is_none());
    }
}
