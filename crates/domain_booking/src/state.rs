//! Booking lifecycle transitions
//!
//! ```text
//! pending ──confirm──▶ confirmed ──┬──▶ completed
//!    │                      │      ├──▶ no_show
//!    └──────────────────────┴──────┴──▶ cancelled
//! ```
//!
//! Each transition mutates the booking and returns the [`LedgerEffect`] the
//! caller must post in the same unit of work. A rejected transition leaves
//! the booking untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use core_kernel::TimeSlot;
use domain_credit::LedgerEntry;
use crate::booking::{Booking, BookingStatus, CancelledBy};
use crate::error::BookingError;

/// Ledger change owed by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEffect {
    None,
    Refund,
    Forfeit,
}

impl LedgerEffect {
    /// The ledger entry to post for `booking`, if any
    pub fn entry(&self, booking: &Booking) -> Option<LedgerEntry> {
        match self {
            LedgerEffect::None => None,
            LedgerEffect::Refund => Some(LedgerEntry::Refund { booking_id: booking.id }),
            LedgerEffect::Forfeit => Some(LedgerEntry::Forfeit { booking_id: booking.id }),
        }
    }
}

impl Booking {
    fn ensure_active(&self, action: &str) -> Result<(), BookingError> {
        if self.status.is_terminal() {
            return Err(BookingError::invalid_transition(self.status, action));
        }
        Ok(())
    }

    /// Moves a pending booking to confirmed
    pub fn confirm(&mut self) -> Result<LedgerEffect, BookingError> {
        match self.status {
            BookingStatus::Pending => {
                self.status = BookingStatus::Confirmed;
                self.updated_at = Utc::now();
                Ok(LedgerEffect::None)
            }
            from => Err(BookingError::invalid_transition(from, "confirm")),
        }
    }

    /// Cancels a pending or confirmed booking
    ///
    /// With `refund` the credit is returned; otherwise the cancellation is
    /// late and the credit is forfeited. Bookings that were not paid by
    /// credit owe no ledger effect either way.
    pub fn cancel(&mut self, by: CancelledBy, refund: bool) -> Result<LedgerEffect, BookingError> {
        self.ensure_active("cancel")?;

        self.status = BookingStatus::Cancelled;
        self.cancelled_by = Some(by);
        self.is_late_cancel = !refund;
        self.credit_refunded = refund && self.credit_deducted;
        self.updated_at = Utc::now();

        Ok(match (self.credit_deducted, refund) {
            (false, _) => LedgerEffect::None,
            (true, true) => LedgerEffect::Refund,
            (true, false) => LedgerEffect::Forfeit,
        })
    }

    /// Marks the session as attended
    pub fn complete(&mut self) -> Result<LedgerEffect, BookingError> {
        self.ensure_active("complete")?;
        self.status = BookingStatus::Completed;
        self.updated_at = Utc::now();
        Ok(LedgerEffect::None)
    }

    /// Marks the client as absent; a credit-paid session forfeits its credit
    pub fn mark_no_show(&mut self) -> Result<LedgerEffect, BookingError> {
        self.ensure_active("mark as no-show")?;
        self.status = BookingStatus::NoShow;
        self.updated_at = Utc::now();
        Ok(if self.credit_deducted {
            LedgerEffect::Forfeit
        } else {
            LedgerEffect::None
        })
    }

    /// Moves the booking to a new slot
    ///
    /// The first reschedule records the original date and start time; later
    /// ones keep them. The reschedule cap is left to the caller, which reads
    /// `reschedule_count`.
    pub fn reschedule(&mut self, slot: TimeSlot) -> Result<LedgerEffect, BookingError> {
        self.ensure_active("reschedule")?;

        if self.original_date.is_none() {
            self.original_date = Some(self.slot.date);
            self.original_start_time = Some(self.slot.start_time);
        }
        self.slot = slot;
        self.reschedule_count += 1;
        self.updated_at = Utc::now();
        Ok(LedgerEffect::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::SessionType;
    use chrono::{NaiveDate, NaiveTime};
    use core_kernel::ClientId;

    fn slot(day: u32, hour: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn credit_booking() -> Booking {
        Booking::new(ClientId::new(), SessionType::Individual, slot(3, 10)).paid_by_credit(true)
    }

    #[test]
    fn test_admin_refund_cancel() {
        let mut booking = credit_booking();
        let effect = booking.cancel(CancelledBy::Admin, true).unwrap();

        assert_eq!(effect, LedgerEffect::Refund);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.credit_refunded);
        assert!(!booking.is_late_cancel);
    }

    #[test]
    fn test_late_cancel_forfeits() {
        let mut booking = credit_booking();
        let effect = booking.cancel(CancelledBy::Admin, false).unwrap();

        assert_eq!(effect, LedgerEffect::Forfeit);
        assert!(booking.is_late_cancel);
        assert!(!booking.credit_refunded);
    }

    #[test]
    fn test_unpaid_booking_has_no_ledger_effect() {
        let mut booking = Booking::new(ClientId::new(), SessionType::Individual, slot(3, 10));
        assert_eq!(booking.cancel(CancelledBy::Client, true).unwrap(), LedgerEffect::None);
        assert!(!booking.credit_refunded);
    }

    #[test]
    fn test_no_show_forfeits_credit() {
        let mut booking = credit_booking();
        assert_eq!(booking.mark_no_show().unwrap(), LedgerEffect::Forfeit);
        assert_eq!(booking.status, BookingStatus::NoShow);
    }

    #[test]
    fn test_confirm_only_from_pending() {
        let mut booking = credit_booking();
        assert!(booking.confirm().is_err());

        booking.status = BookingStatus::Pending;
        assert_eq!(booking.confirm().unwrap(), LedgerEffect::None);
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_reschedule_preserves_first_original_slot() {
        let mut booking = credit_booking();
        booking.reschedule(slot(4, 11)).unwrap();
        booking.reschedule(slot(5, 12)).unwrap();

        assert_eq!(booking.original_date, NaiveDate::from_ymd_opt(2025, 3, 3));
        assert_eq!(booking.original_start_time, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(booking.slot, slot(5, 12));
        assert_eq!(booking.reschedule_count, 2);
    }

    #[test]
    fn test_terminal_states_reject_changes() {
        for terminal in [BookingStatus::Completed, BookingStatus::Cancelled, BookingStatus::NoShow] {
            let mut booking = credit_booking();
            booking.status = terminal;
            let before = booking.clone();

            assert!(matches!(
                booking.cancel(CancelledBy::Admin, true),
                Err(BookingError::InvalidTransition { .. })
            ));
            assert!(matches!(
                booking.reschedule(slot(10, 9)),
                Err(BookingError::InvalidTransition { .. })
            ));
            assert!(booking.complete().is_err());
            assert!(booking.mark_no_show().is_err());
            assert_eq!(booking, before);
        }
    }
}
