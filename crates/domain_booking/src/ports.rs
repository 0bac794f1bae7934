//! Booking Domain Ports
//!
//! `BookingTx` is the transactional storage port; it extends the ledger and
//! client ports so one unit of work can insert a booking, take its credit
//! and read the client's billing type.
//!
//! The remaining ports are external collaborators. Availability is
//! consulted before every write, after the unit of work has re-checked
//! the slot against the bookings it can see. Calendar and notification calls happen
//! after commit through the non-critical effect path.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{BookingId, ClientId, DateRange, DomainPort, PortError, SeriesId, TimeSlot};
use domain_client::ClientTx;
use domain_credit::LedgerTx;
use crate::booking::{Booking, SessionType};

/// Booking storage available inside a unit of work
#[async_trait]
pub trait BookingTx: LedgerTx + ClientTx {
    /// Loads a booking, locking it until the unit of work ends
    async fn get_booking(&mut self, id: BookingId) -> Result<Option<Booking>, PortError>;

    /// Inserts a booking
    ///
    /// Fails with `PortError::Conflict` when another active booking holds
    /// the same slot.
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    /// Writes every mutable field of an existing booking
    ///
    /// Fails with `PortError::Conflict` when a reschedule lands on a taken slot.
    async fn update_booking(&mut self, booking: &Booking) -> Result<(), PortError>;

    /// Hard-deletes a booking
    async fn delete_booking(&mut self, id: BookingId) -> Result<(), PortError>;

    /// Every booking in a recurring series, by date
    async fn series_bookings(&mut self, series_id: SeriesId) -> Result<Vec<Booking>, PortError>;

    /// A client's bookings with dates inside `range`, by date
    async fn client_bookings(&mut self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, PortError>;

    /// Active bookings overlapping `slot`, except `ignore`, as seen by this unit of work
    async fn overlapping_bookings(
        &mut self,
        slot: &TimeSlot,
        ignore: Option<BookingId>,
    ) -> Result<Vec<Booking>, PortError>;
}

/// Authoritative answer to "is this slot free"
///
/// Reflects business hours, admin day blocks and existing bookings.
/// `ignore` excludes one booking from the check, so a booking can be
/// moved within its own time.
#[async_trait]
pub trait AvailabilityPort: DomainPort {
    async fn is_slot_available(
        &self,
        slot: &TimeSlot,
        session_type: SessionType,
        ignore: Option<BookingId>,
    ) -> Result<bool, PortError>;
}

/// Event to place on the practice calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventRequest {
    pub subject: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    /// IANA name of the zone the two times are in
    pub time_zone: String,
    pub attendee: String,
}

/// Event created by the calendar provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub meeting_url: Option<String>,
}

/// External calendar (meeting links)
#[async_trait]
pub trait CalendarPort: DomainPort {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, PortError>;

    async fn cancel_event(&self, event_id: &str) -> Result<(), PortError>;
}

/// Template keys understood by the notification dispatcher
pub mod templates {
    pub const BOOKING_CONFIRMED: &str = "booking_confirmed";
    pub const BOOKING_CANCELLED: &str = "booking_cancelled";
    pub const BOOKING_RESCHEDULED: &str = "booking_rescheduled";
    pub const SERIES_CREATED: &str = "series_created";
    pub const OWNER_BOOKING_CREATED: &str = "owner_booking_created";
    pub const PAYMENT_REQUEST_ISSUED: &str = "payment_request_issued";
}

/// One message for the dispatcher to render and deliver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template_key: String,
    pub recipient: String,
    pub variables: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(template_key: &str, recipient: impl Into<String>) -> Self {
        Self {
            template_key: template_key.to_string(),
            recipient: recipient.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: &str, value: impl ToString) -> Self {
        self.variables.insert(key.to_string(), value.to_string());
        self
    }
}

/// Fire-and-forget notification dispatcher
#[async_trait]
pub trait NotificationPort: DomainPort {
    async fn notify(&self, notification: Notification) -> Result<(), PortError>;
}
