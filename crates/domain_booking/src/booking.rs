//! Booking aggregate

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BookingId, ClientId, InvoiceId, PaymentRequestId, SeriesId, TimeSlot};
use domain_client::SessionCategory;

/// Kind of session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Individual,
    Couples,
    /// Complimentary session; never charged
    Free,
}

impl SessionType {
    /// Billing category, or `None` for sessions that are never billed
    pub fn category(&self) -> Option<SessionCategory> {
        match self {
            SessionType::Individual => Some(SessionCategory::Individual),
            SessionType::Couples => Some(SessionCategory::Couples),
            SessionType::Free => None,
        }
    }

    pub fn is_chargeable(&self) -> bool {
        self.category().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Individual => "individual",
            SessionType::Couples => "couples",
            SessionType::Free => "free",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionType::Individual => "Individual session",
            SessionType::Couples => "Couples session",
            SessionType::Free => "Complimentary session",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(SessionType::Individual),
            "couples" => Ok(SessionType::Couples),
            "free" => Ok(SessionType::Free),
            other => Err(format!("unknown session type: {}", other)),
        }
    }
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Completed, cancelled and no-show bookings accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Who cancelled a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Admin,
    Client,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Admin => "admin",
            CancelledBy::Client => "client",
        }
    }
}

impl std::str::FromStr for CancelledBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(CancelledBy::Admin),
            "client" => Ok(CancelledBy::Client),
            other => Err(format!("unknown canceller: {}", other)),
        }
    }
}

/// Reference to the external calendar event for a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventRef {
    pub event_id: String,
    pub meeting_url: Option<String>,
}

/// One scheduled session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: ClientId,
    pub session_type: SessionType,
    pub slot: TimeSlot,
    pub status: BookingStatus,
    pub series_id: Option<SeriesId>,
    /// First-ever slot, recorded on the first reschedule
    pub original_date: Option<NaiveDate>,
    pub original_start_time: Option<NaiveTime>,
    pub reschedule_count: u32,
    pub cancelled_by: Option<CancelledBy>,
    pub is_late_cancel: bool,
    /// A credit was taken for this booking when it was created
    pub credit_deducted: bool,
    pub credit_refunded: bool,
    pub calendar_event: Option<CalendarEventRef>,
    pub payment_request_id: Option<PaymentRequestId>,
    pub invoice_id: Option<InvoiceId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a confirmed booking
    pub fn new(client_id: ClientId, session_type: SessionType, slot: TimeSlot) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::new_v7(),
            client_id,
            session_type,
            slot,
            status: BookingStatus::Confirmed,
            series_id: None,
            original_date: None,
            original_start_time: None,
            reschedule_count: 0,
            cancelled_by: None,
            is_late_cancel: false,
            credit_deducted: false,
            credit_refunded: false,
            calendar_event: None,
            payment_request_id: None,
            invoice_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn in_series(mut self, series_id: SeriesId) -> Self {
        self.series_id = Some(series_id);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn paid_by_credit(mut self, deducted: bool) -> Self {
        self.credit_deducted = deducted;
        self
    }

    /// A booking with neither a payment request nor an invoice
    pub fn is_unbilled(&self) -> bool {
        self.payment_request_id.is_none() && self.invoice_id.is_none()
    }

    pub fn date(&self) -> NaiveDate {
        self.slot.date
    }

    /// Describes the session for ledger rows and calendar subjects
    pub fn describe(&self) -> String {
        format!(
            "{} on {} at {}",
            self.session_type.label(),
            self.slot.date,
            self.slot.start_time.format("%H:%M")
        )
    }
}
