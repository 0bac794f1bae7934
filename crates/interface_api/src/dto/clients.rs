//! Client and payer DTOs

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{Currency, Money, Rate, RelationshipId};
use domain_client::{
    BillingEntity, BillingProfileUpdate, BillingType, Client, Counterparty, RelationshipKind, StandingDiscount,
};

use crate::error::ApiError;

/// Standing discount as entered by staff
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct DiscountInput {
    /// Percentage, e.g. `10` for 10%
    pub percent: Option<Decimal>,
    #[validate(range(min = 0))]
    pub fixed_minor: Option<i64>,
}

impl DiscountInput {
    /// Converts to a discount in the practice currency
    pub fn into_discount(self, currency: Currency) -> Result<StandingDiscount, ApiError> {
        let percent = self
            .percent
            .map(Rate::from_percentage)
            .transpose()
            .map_err(|e| ApiError::Validation(format!("discount percent: {}", e)))?;
        Ok(StandingDiscount {
            percent,
            fixed: self.fixed_minor.map(|minor| Money::from_minor(minor, currency)),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub billing_type: BillingType,
    #[validate(email)]
    pub billing_email: Option<String>,
    #[validate(nested)]
    pub discount: Option<DiscountInput>,
}

impl RegisterClientRequest {
    pub fn into_client(self, currency: Currency) -> Result<Client, ApiError> {
        let mut client = Client::new(self.full_name, self.email).with_billing_type(self.billing_type);
        client.phone = self.phone;
        client.billing_email = self.billing_email;
        if let Some(discount) = self.discount {
            client = client.with_discount(discount.into_discount(currency)?);
        }
        Ok(client)
    }
}

/// Body of `PATCH /clients/:id/billing-profile`; absent fields are left alone
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBillingProfileRequest {
    pub billing_type: Option<BillingType>,
    #[validate(email)]
    pub billing_email: Option<String>,
    /// Drops the billing email so bills go to the contact email
    #[serde(default)]
    pub clear_billing_email: bool,
    #[validate(nested)]
    pub discount: Option<DiscountInput>,
}

impl UpdateBillingProfileRequest {
    pub fn into_update(self, currency: Currency) -> Result<BillingProfileUpdate, ApiError> {
        let billing_email = if self.clear_billing_email {
            Some(None)
        } else {
            self.billing_email.map(Some)
        };
        Ok(BillingProfileUpdate {
            billing_type: self.billing_type,
            billing_email,
            standing_discount: self.discount.map(|d| d.into_discount(currency)).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterEntityRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub billing_email: String,
    #[validate(length(max = 32))]
    pub vat_number: Option<String>,
}

impl From<RegisterEntityRequest> for BillingEntity {
    fn from(request: RegisterEntityRequest) -> Self {
        let entity = BillingEntity::new(request.name, request.billing_email);
        match request.vat_number {
            Some(vat) => entity.with_vat_number(vat),
            None => entity,
        }
    }
}

/// Body of `POST /clients/:id/relationships`
#[derive(Debug, Deserialize, Validate)]
pub struct RelateRequest {
    pub counterparty: Counterparty,
    pub kind: RelationshipKind,
    #[validate(length(max = 100))]
    pub label: Option<String>,
}

/// Body of `PUT /clients/:id/billing/:category`; no relationship means self-pay
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AssignBillingRequest {
    pub relationship_id: Option<RelationshipId>,
}
