//! Billing DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{BookingId, ClientId, PaymentRequestId};
use domain_billing::{PaymentRequestFilter, PaymentRequestStatus};

/// Month addressed by a billing run
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PeriodRequest {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(length(min = 1, max = 100))]
    pub reference: Option<String>,
    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OverdueRequest {
    /// Defaults to today in the practice timezone
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OverdueResponse {
    pub marked: Vec<PaymentRequestId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualInvoiceRequest {
    pub client_id: ClientId,
    #[validate(length(min = 1, max = 100))]
    pub booking_ids: Vec<BookingId>,
    #[validate(length(min = 1, max = 100))]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequestQuery {
    pub client_id: Option<ClientId>,
    pub status: Option<PaymentRequestStatus>,
}

impl From<PaymentRequestQuery> for PaymentRequestFilter {
    fn from(query: PaymentRequestQuery) -> Self {
        PaymentRequestFilter {
            client_id: query.client_id,
            status: query.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub client_id: Option<ClientId>,
}
