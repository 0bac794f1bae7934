//! Booking Domain - sessions and their lifecycle
//!
//! # Key Concepts
//!
//! - **Booking**: One scheduled session with its billing linkage
//! - **State machine**: `pending → confirmed → {completed, cancelled, no_show}`;
//!   transitions return the ledger effect they owe
//! - **Recurrence**: Pure expansion of a start date and pattern into dates
//! - **Scheduler**: Availability re-check, creation, credit deduction and the
//!   post-commit calendar/notification effects

pub mod booking;
pub mod state;
pub mod recurrence;
pub mod policy;
pub mod ports;
pub mod scheduler;
pub mod error;

pub use booking::{Booking, BookingStatus, SessionType, CancelledBy, CalendarEventRef};
pub use state::LedgerEffect;
pub use recurrence::{generate, RecurrencePattern};
pub use policy::SchedulingPolicy;
pub use ports::{
    BookingTx, AvailabilityPort, CalendarPort, CalendarEvent, CalendarEventRequest,
    NotificationPort, Notification, templates,
};
pub use scheduler::{
    Scheduler, NewBooking, RecurringRequest, SeriesResult, SkippedOccurrence,
    SeriesCancellation, FailedCancellation,
};
pub use error::BookingError;
