//! Booking DTOs

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use validator::Validate;

use core_kernel::{ClientId, DateRange, TimeSlot};
use domain_booking::{NewBooking, RecurrencePattern, RecurringRequest, SessionType};

use crate::error::ApiError;

fn refund_by_default() -> bool {
    true
}

/// Date and wall-clock times of a session
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl SlotRequest {
    pub fn into_slot(self) -> Result<TimeSlot, ApiError> {
        TimeSlot::new(self.date, self.start_time, self.end_time).map_err(|e| ApiError::Validation(e.to_string()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub client_id: ClientId,
    pub session_type: SessionType,
    #[serde(flatten)]
    pub slot: SlotRequest,
    #[serde(default)]
    pub pay_with_credit: bool,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl CreateBookingRequest {
    pub fn into_new_booking(self) -> Result<NewBooking, ApiError> {
        Ok(NewBooking {
            client_id: self.client_id,
            session_type: self.session_type,
            slot: self.slot.into_slot()?,
            pay_with_credit: self.pay_with_credit,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecurringBookingRequest {
    pub client_id: ClientId,
    pub session_type: SessionType,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub pattern: RecurrencePattern,
    #[validate(range(min = 1, max = 12))]
    pub horizon_months: u32,
    #[serde(default)]
    pub pay_with_credit: bool,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl From<RecurringBookingRequest> for RecurringRequest {
    fn from(request: RecurringBookingRequest) -> Self {
        RecurringRequest {
            client_id: request.client_id,
            session_type: request.session_type,
            start_date: request.start_date,
            start_time: request.start_time,
            end_time: request.end_time,
            pattern: request.pattern,
            horizon_months: request.horizon_months,
            pay_with_credit: request.pay_with_credit,
            notes: request.notes,
        }
    }
}

/// Admin cancellation; the credit is refunded unless `refund` is false
#[derive(Debug, Deserialize, Validate)]
pub struct CancelRequest {
    #[serde(default = "refund_by_default")]
    pub refund: bool,
}

impl Default for CancelRequest {
    fn default() -> Self {
        Self { refund: true }
    }
}

/// Cancels the occurrences of a series dated `from` or later
#[derive(Debug, Deserialize, Validate)]
pub struct CancelSeriesRequest {
    #[serde(default = "refund_by_default")]
    pub refund: bool,
    /// Defaults to today in the practice timezone
    pub from: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRangeQuery {
    pub fn into_range(self) -> Result<DateRange, ApiError> {
        DateRange::new(self.from, self.to).map_err(|e| ApiError::Validation(e.to_string()))
    }
}
