//! Booking scheduler
//!
//! Every state change runs in one unit of work: the availability re-check,
//! the booking write and its ledger entry commit together or not at all.
//! Calendar events and notifications follow the commit through
//! [`best_effort`], so their failures are logged and never returned.
//!
//! Recurring series are the one place a loop may partially succeed: each
//! occurrence is its own unit of work, and a failed occurrence is reported
//! in the result instead of aborting the series.

use std::sync::Arc;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{best_effort, uow, BookingId, ClientId, DateRange, PortError, SeriesId, Store, TimeSlot};
use domain_client::Client;
use domain_credit::{balance_of, post, LedgerEntry};
use crate::booking::{Booking, CalendarEventRef, CancelledBy, SessionType};
use crate::error::BookingError;
use crate::policy::SchedulingPolicy;
use crate::ports::{
    templates, AvailabilityPort, BookingTx, CalendarEventRequest, CalendarPort, Notification,
    NotificationPort,
};
use crate::recurrence::{self, RecurrencePattern};
use crate::state::LedgerEffect;

/// Request for a single session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub client_id: ClientId,
    pub session_type: SessionType,
    pub slot: TimeSlot,
    pub pay_with_credit: bool,
    pub notes: Option<String>,
}

/// Request for a recurring series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringRequest {
    pub client_id: ClientId,
    pub session_type: SessionType,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub pattern: RecurrencePattern,
    pub horizon_months: u32,
    pub pay_with_credit: bool,
    pub notes: Option<String>,
}

/// An occurrence that could not be booked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    pub date: NaiveDate,
    pub reason: String,
}

/// Outcome of a recurring series request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub series_id: SeriesId,
    pub created: Vec<NaiveDate>,
    pub skipped: Vec<SkippedOccurrence>,
    pub credits_used: u32,
}

/// A series booking that could not be cancelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCancellation {
    pub booking_id: BookingId,
    pub reason: String,
}

/// Outcome of cancelling the rest of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesCancellation {
    pub series_id: SeriesId,
    pub cancelled: Vec<BookingId>,
    pub failed: Vec<FailedCancellation>,
}

fn slot_error(error: PortError, slot: &TimeSlot) -> BookingError {
    if error.is_conflict() {
        BookingError::SlotUnavailable {
            date: slot.date,
            start_time: slot.start_time,
        }
    } else {
        BookingError::Port(error)
    }
}

async fn load_booking<T: BookingTx>(tx: &mut T, booking_id: BookingId) -> Result<Booking, BookingError> {
    tx.get_booking(booking_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Booking", booking_id))
}

async fn load_client<T: BookingTx>(tx: &mut T, client_id: ClientId) -> Result<Client, BookingError> {
    tx.get_client(client_id)
        .await?
        .ok_or_else(|| BookingError::not_found("Client", client_id))
}

fn ledger_description(effect: LedgerEffect, booking: &Booking) -> String {
    match effect {
        LedgerEffect::Refund => format!("Refund: {}", booking.describe()),
        LedgerEffect::Forfeit => format!("Forfeited: {}", booking.describe()),
        LedgerEffect::None => booking.describe(),
    }
}

/// Orchestrates booking creation and lifecycle changes
pub struct Scheduler<S> {
    store: Arc<S>,
    availability: Arc<dyn AvailabilityPort>,
    calendar: Arc<dyn CalendarPort>,
    notifier: Arc<dyn NotificationPort>,
    policy: SchedulingPolicy,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            availability: Arc::clone(&self.availability),
            calendar: Arc::clone(&self.calendar),
            notifier: Arc::clone(&self.notifier),
            policy: self.policy.clone(),
        }
    }
}

impl<S> Scheduler<S>
where
    S: Store,
    S::Tx: BookingTx,
{
    pub fn new(
        store: Arc<S>,
        availability: Arc<dyn AvailabilityPort>,
        calendar: Arc<dyn CalendarPort>,
        notifier: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            store,
            availability,
            calendar,
            notifier,
            policy: SchedulingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Books one session
    ///
    /// The slot is re-checked first, then the credit balance when the
    /// session is paid by credit. The booking is created confirmed and the
    /// credit taken in the same unit of work. A calendar event and the
    /// client/owner notifications follow the commit.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the client does not exist
    /// - `SlotUnavailable` if the slot is not free, including a lost race
    /// - `InsufficientCredit` if a credit-paid session finds a zero balance
    #[instrument(skip(self, request), fields(client_id = %request.client_id, date = %request.slot.date))]
    pub async fn create_single(&self, request: NewBooking) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let client = load_client(&mut tx, request.client_id).await?;
            let charge = request.pay_with_credit && Self::is_chargeable(&client, request.session_type);
            let booking = Booking::new(client.id, request.session_type, request.slot)
                .with_notes(request.notes.clone());
            let booking = self.place(&mut tx, booking, charge).await?;
            Ok::<_, BookingError>((booking, client))
        }
        .await;
        let (mut booking, client) = uow::finish(tx, result).await?;

        info!(booking_id = %booking.id, credit = booking.credit_deducted, "booking created");

        self.attach_calendar_event(&mut booking, &client.email).await;
        self.notify(self.booking_notice(templates::BOOKING_CONFIRMED, &client.email, &client, &booking))
            .await;
        if let Some(owner) = self.policy.practice_email.clone() {
            self.notify(self.booking_notice(templates::OWNER_BOOKING_CREATED, owner, &client, &booking))
                .await;
        }

        Ok(booking)
    }

    /// Books every date of a recurring series that can be booked
    ///
    /// Each occurrence is checked, created and charged in its own unit of
    /// work. A failed occurrence lands in `skipped` and the loop continues.
    /// Credits are taken while the balance lasts; later occurrences are
    /// still booked, unpaid by credit.
    ///
    /// # Errors
    ///
    /// Only request-level problems fail the call: an unknown client, an
    /// invalid time range or a horizon outside `1..=max_series_horizon_months`.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, pattern = ?request.pattern))]
    pub async fn create_recurring_series(&self, request: RecurringRequest) -> Result<SeriesResult, BookingError> {
        if request.horizon_months == 0 || request.horizon_months > self.policy.max_series_horizon_months {
            return Err(BookingError::Validation(format!(
                "Series horizon must be between 1 and {} months",
                self.policy.max_series_horizon_months
            )));
        }
        let template = TimeSlot::new(request.start_date, request.start_time, request.end_time)?;

        let mut tx = self.store.begin().await?;
        let result = load_client(&mut tx, request.client_id).await;
        let client = uow::finish(tx, result).await?;

        let series_id = SeriesId::new_v7();
        let mut outcome = SeriesResult {
            series_id,
            created: Vec::new(),
            skipped: Vec::new(),
            credits_used: 0,
        };
        let mut placed = Vec::new();

        for date in recurrence::generate(request.start_date, request.pattern, request.horizon_months) {
            let booking = Booking::new(client.id, request.session_type, template.on(date))
                .in_series(series_id)
                .with_notes(request.notes.clone());

            match self.place_occurrence(&client, booking, request.pay_with_credit).await {
                Ok(booking) => {
                    if booking.credit_deducted {
                        outcome.credits_used += 1;
                    }
                    outcome.created.push(date);
                    placed.push(booking);
                }
                Err(error) => {
                    warn!(%date, error = %error, "series occurrence skipped");
                    outcome.skipped.push(SkippedOccurrence {
                        date,
                        reason: error.skip_reason(),
                    });
                }
            }
        }

        for booking in &mut placed {
            self.attach_calendar_event(booking, &client.email).await;
        }

        if !outcome.created.is_empty() {
            let notice = Notification::new(templates::SERIES_CREATED, client.email.clone())
                .var("client_name", &client.full_name)
                .var("session", request.session_type.label())
                .var("first_date", outcome.created[0])
                .var("occurrences", outcome.created.len())
                .var("start_time", request.start_time.format("%H:%M"));
            self.notify(notice).await;
        }

        info!(
            series_id = %series_id,
            created = outcome.created.len(),
            skipped = outcome.skipped.len(),
            credits_used = outcome.credits_used,
            "recurring series processed"
        );
        Ok(outcome)
    }

    /// Moves a booking to a new slot
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` for a terminal booking or one at the reschedule cap
    /// - `SlotUnavailable` if the destination is not free
    #[instrument(skip(self, slot), fields(booking_id = %booking_id, date = %slot.date))]
    pub async fn reschedule(&self, booking_id: BookingId, slot: TimeSlot) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut booking = load_booking(&mut tx, booking_id).await?;
            if booking.status.is_terminal() {
                return Err(BookingError::invalid_transition(booking.status, "reschedule"));
            }
            if !self.policy.can_reschedule(booking.reschedule_count) {
                return Err(BookingError::invalid_transition(
                    booking.status,
                    format!("reschedule more than {} times", self.policy.max_reschedules),
                ));
            }
            self.ensure_available(&mut tx, &slot, booking.session_type, Some(booking.id)).await?;

            let previous_event = booking.calendar_event.take();
            booking.reschedule(slot)?;
            tx.update_booking(&booking).await.map_err(|e| slot_error(e, &slot))?;

            let client = load_client(&mut tx, booking.client_id).await?;
            Ok::<_, BookingError>((booking, previous_event, client))
        }
        .await;
        let (mut booking, previous_event, client) = uow::finish(tx, result).await?;

        info!(reschedule_count = booking.reschedule_count, "booking rescheduled");

        if let Some(previous) = previous_event {
            best_effort("calendar.cancel_event", self.calendar.cancel_event(&previous.event_id)).await;
        }
        self.attach_calendar_event(&mut booking, &client.email).await;
        self.notify(self.booking_notice(templates::BOOKING_RESCHEDULED, &client.email, &client, &booking))
            .await;

        Ok(booking)
    }

    /// Admin cancellation; `refund` returns the credit, otherwise it is forfeited
    #[instrument(skip(self))]
    pub async fn cancel(&self, booking_id: BookingId, refund: bool) -> Result<Booking, BookingError> {
        let (booking, client) = self
            .transition(booking_id, |booking| booking.cancel(CancelledBy::Admin, refund))
            .await?;
        self.after_cancel(&booking, &client).await;
        Ok(booking)
    }

    /// Client cancellation at `now`
    ///
    /// Outside the late-cancel window the credit is refunded; inside it the
    /// cancellation is late and the credit forfeited.
    #[instrument(skip(self))]
    pub async fn cancel_by_client(&self, booking_id: BookingId, now: DateTime<Utc>) -> Result<Booking, BookingError> {
        let policy = &self.policy;
        let (booking, client) = self
            .transition(booking_id, |booking| {
                let late = policy.is_late_cancel(&booking.slot, now);
                booking.cancel(CancelledBy::Client, !late)
            })
            .await?;
        self.after_cancel(&booking, &client).await;
        Ok(booking)
    }

    #[instrument(skip(self))]
    pub async fn confirm(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        Ok(self.transition(booking_id, Booking::confirm).await?.0)
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        Ok(self.transition(booking_id, Booking::complete).await?.0)
    }

    #[instrument(skip(self))]
    pub async fn mark_no_show(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        Ok(self.transition(booking_id, Booking::mark_no_show).await?.0)
    }

    /// Hard-deletes an unbilled booking
    ///
    /// A credit still held by an active booking is returned first. The
    /// calendar event is cancelled after commit.
    ///
    /// # Errors
    ///
    /// `AlreadyBilled` if the booking is linked to a payment request or invoice.
    #[instrument(skip(self))]
    pub async fn erase(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let booking = load_booking(&mut tx, booking_id).await?;
            if !booking.is_unbilled() {
                return Err(BookingError::AlreadyBilled(booking.id));
            }
            if booking.credit_deducted && !booking.status.is_terminal() {
                post(
                    &mut tx,
                    booking.client_id,
                    LedgerEntry::Refund { booking_id: booking.id },
                    format!("Erased: {}", booking.describe()),
                )
                .await?;
            }
            tx.delete_booking(booking.id).await?;
            Ok::<_, BookingError>(booking)
        }
        .await;
        let booking = uow::finish(tx, result).await?;

        warn!(client_id = %booking.client_id, "booking erased");
        if let Some(event) = &booking.calendar_event {
            best_effort("calendar.cancel_event", self.calendar.cancel_event(&event.event_id)).await;
        }
        Ok(booking)
    }

    /// Cancels every active occurrence of a series dated `from` or later
    ///
    /// Each occurrence is cancelled in its own unit of work.
    #[instrument(skip(self))]
    pub async fn cancel_series(
        &self,
        series_id: SeriesId,
        refund: bool,
        from: NaiveDate,
    ) -> Result<SeriesCancellation, BookingError> {
        let bookings = self.series(series_id).await?;
        if bookings.is_empty() {
            return Err(BookingError::not_found("Series", series_id));
        }

        let mut outcome = SeriesCancellation {
            series_id,
            cancelled: Vec::new(),
            failed: Vec::new(),
        };

        for booking in bookings
            .into_iter()
            .filter(|b| !b.status.is_terminal() && b.date() >= from)
        {
            match self.cancel(booking.id, refund).await {
                Ok(cancelled) => outcome.cancelled.push(cancelled.id),
                Err(error) => outcome.failed.push(FailedCancellation {
                    booking_id: booking.id,
                    reason: error.to_string(),
                }),
            }
        }

        info!(cancelled = outcome.cancelled.len(), failed = outcome.failed.len(), "series cancelled");
        Ok(outcome)
    }

    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = load_booking(&mut tx, booking_id).await;
        uow::finish(tx, result).await
    }

    pub async fn series(&self, series_id: SeriesId) -> Result<Vec<Booking>, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = tx.series_bookings(series_id).await.map_err(BookingError::from);
        uow::finish(tx, result).await
    }

    pub async fn client_bookings(&self, client_id: ClientId, range: DateRange) -> Result<Vec<Booking>, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = tx.client_bookings(client_id, range).await.map_err(BookingError::from);
        uow::finish(tx, result).await
    }

    fn is_chargeable(client: &Client, session_type: SessionType) -> bool {
        session_type.is_chargeable() && !client.is_postpaid()
    }

    /// Re-validates `slot` inside `tx`, then asks the availability collaborator
    ///
    /// The storage constraints still decide a race between two units of work.
    async fn ensure_available(
        &self,
        tx: &mut S::Tx,
        slot: &TimeSlot,
        session_type: SessionType,
        ignore: Option<BookingId>,
    ) -> Result<(), BookingError> {
        let unavailable = BookingError::SlotUnavailable {
            date: slot.date,
            start_time: slot.start_time,
        };
        if !tx.overlapping_bookings(slot, ignore).await?.is_empty() {
            return Err(unavailable);
        }
        if self.availability.is_slot_available(slot, session_type, ignore).await? {
            Ok(())
        } else {
            Err(unavailable)
        }
    }

    /// Checks, inserts and charges one booking inside `tx`
    async fn place(&self, tx: &mut S::Tx, booking: Booking, charge: bool) -> Result<Booking, BookingError> {
        self.ensure_available(tx, &booking.slot, booking.session_type, None).await?;

        if charge {
            let balance = balance_of(tx, booking.client_id).await?;
            if balance < 1 {
                return Err(BookingError::InsufficientCredit {
                    client_id: booking.client_id,
                    balance,
                });
            }
        }

        let booking = booking.paid_by_credit(charge);
        tx.insert_booking(&booking).await.map_err(|e| slot_error(e, &booking.slot))?;

        if charge {
            post(tx, booking.client_id, LedgerEntry::Use { booking_id: booking.id }, booking.describe()).await?;
        }
        Ok(booking)
    }

    async fn place_occurrence(
        &self,
        client: &Client,
        booking: Booking,
        pay_with_credit: bool,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let charge = pay_with_credit
                && Self::is_chargeable(client, booking.session_type)
                && balance_of(&mut tx, client.id).await? > 0;
            let booking = self.place(&mut tx, booking, charge).await?;
            Ok::<_, BookingError>(booking)
        }
        .await;
        uow::finish(tx, result).await
    }

    /// Applies a lifecycle transition and its ledger effect in one unit of work
    async fn transition<F>(&self, booking_id: BookingId, apply: F) -> Result<(Booking, Client), BookingError>
    where
        F: FnOnce(&mut Booking) -> Result<LedgerEffect, BookingError> + Send,
    {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut booking = load_booking(&mut tx, booking_id).await?;
            let effect = apply(&mut booking)?;
            tx.update_booking(&booking).await?;

            if let Some(entry) = effect.entry(&booking) {
                post(&mut tx, booking.client_id, entry, ledger_description(effect, &booking)).await?;
            }

            let client = load_client(&mut tx, booking.client_id).await?;
            Ok::<_, BookingError>((booking, client))
        }
        .await;
        let (booking, client) = uow::finish(tx, result).await?;

        info!(booking_id = %booking.id, status = %booking.status, "booking transitioned");
        Ok((booking, client))
    }

    async fn after_cancel(&self, booking: &Booking, client: &Client) {
        if let Some(event) = &booking.calendar_event {
            best_effort("calendar.cancel_event", self.calendar.cancel_event(&event.event_id)).await;
        }
        let notice = self
            .booking_notice(templates::BOOKING_CANCELLED, &client.email, client, booking)
            .var("late_cancel", booking.is_late_cancel)
            .var("credit_refunded", booking.credit_refunded);
        self.notify(notice).await;
    }

    /// Requests a calendar event and stores its reference on the booking
    async fn attach_calendar_event(&self, booking: &mut Booking, attendee: &str) {
        let request = CalendarEventRequest {
            subject: booking.describe(),
            starts_at: booking.slot.starts_at(),
            ends_at: booking.slot.ends_at(),
            time_zone: self.policy.timezone.0.name().to_string(),
            attendee: attendee.to_string(),
        };

        let Some(event) = best_effort("calendar.create_event", self.calendar.create_event(&request)).await else {
            return;
        };

        let event_ref = CalendarEventRef {
            event_id: event.event_id,
            meeting_url: event.meeting_url,
        };
        booking.calendar_event = Some(event_ref.clone());
        best_effort("booking.store_calendar_event", self.store_event_ref(booking.id, event_ref)).await;
    }

    async fn store_event_ref(&self, booking_id: BookingId, event_ref: CalendarEventRef) -> Result<(), PortError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            if let Some(mut stored) = tx.get_booking(booking_id).await? {
                stored.calendar_event = Some(event_ref);
                tx.update_booking(&stored).await?;
            }
            Ok::<_, PortError>(())
        }
        .await;
        uow::finish(tx, result).await
    }

    fn booking_notice(
        &self,
        template: &str,
        recipient: impl Into<String>,
        client: &Client,
        booking: &Booking,
    ) -> Notification {
        let mut notice = Notification::new(template, recipient)
            .var("client_name", &client.full_name)
            .var("session", booking.session_type.label())
            .var("date", booking.slot.date)
            .var("start_time", booking.slot.start_time.format("%H:%M"));
        if let Some(url) = booking.calendar_event.as_ref().and_then(|e| e.meeting_url.as_ref()) {
            notice = notice.var("meeting_url", url);
        }
        notice
    }

    async fn notify(&self, notification: Notification) {
        best_effort("notify", self.notifier.notify(notification)).await;
    }
}
