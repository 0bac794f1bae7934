//! Credit ledger DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::ClientId;
use domain_credit::CreditGrant;

/// Body of `POST /clients/:id/credits`
///
/// The grant source is flattened, so a purchase reads
/// `{"amount": 5, "source": "purchase", "order_id": "...", "description": "..."}`.
#[derive(Debug, Deserialize, Validate)]
pub struct GrantCreditsRequest {
    #[validate(range(min = 1, max = 1000))]
    pub amount: i64,
    #[serde(flatten)]
    pub grant: CreditGrant,
    #[validate(length(min = 1, max = 200))]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub client_id: ClientId,
    pub balance: i64,
}
