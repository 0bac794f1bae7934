//! Fake collaborators
//!
//! Availability, calendar, notification and pricing doubles. Each one
//! records what it was asked so tests can assert on side effects.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use core_kernel::{BookingId, Currency, DomainPort, Money, PortError, TimeSlot};
use domain_billing::PricingPort;
use domain_booking::{
    AvailabilityPort, CalendarEvent, CalendarEventRequest, CalendarPort, Notification, NotificationPort,
    SessionType,
};
use domain_client::SessionCategory;

/// Availability that blocks an explicit list of slots
///
/// Double bookings are caught by the scheduler's check inside the unit of
/// work and by the store's slot constraint.
#[derive(Debug, Default)]
pub struct FakeAvailability {
    blocked: Mutex<Vec<TimeSlot>>,
    down: AtomicBool,
}

impl FakeAvailability {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn block(&self, slot: TimeSlot) {
        self.blocked.lock().unwrap().push(slot);
    }

    /// Makes every check fail with a transient error
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

impl DomainPort for FakeAvailability {}

#[async_trait]
impl AvailabilityPort for FakeAvailability {
    async fn is_slot_available(
        &self,
        slot: &TimeSlot,
        _session_type: SessionType,
        _ignore: Option<BookingId>,
    ) -> Result<bool, PortError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("availability"));
        }
        Ok(!self.blocked.lock().unwrap().iter().any(|b| b.overlaps(slot)))
    }
}

/// Calendar that hands out sequential event ids, or fails on demand
#[derive(Debug, Default)]
pub struct FakeCalendar {
    failing: AtomicBool,
    next_id: AtomicUsize,
    created: Mutex<Vec<CalendarEventRequest>>,
    cancelled: Mutex<Vec<String>>,
}

impl FakeCalendar {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let calendar = Self::default();
        calendar.failing.store(true, Ordering::SeqCst);
        Arc::new(calendar)
    }

    pub fn created(&self) -> Vec<CalendarEventRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl DomainPort for FakeCalendar {}

#[async_trait]
impl CalendarPort for FakeCalendar {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("calendar"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.lock().unwrap().push(request.clone());
        Ok(CalendarEvent {
            event_id: format!("evt-{}", n),
            meeting_url: Some(format!("https://meet.example.test/evt-{}", n)),
        })
    }

    async fn cancel_event(&self, event_id: &str) -> Result<(), PortError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::unavailable("calendar"));
        }
        self.cancelled.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}

/// Notifier that keeps every message it was given
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages with `template_key`
    pub fn with_template(&self, template_key: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.template_key == template_key)
            .collect()
    }
}

impl DomainPort for RecordingNotifier {}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PortError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Flat session rates in minor units
#[derive(Debug, Clone, Copy)]
pub struct FixedPricing {
    pub individual: i64,
    pub couples: i64,
}

impl FixedPricing {
    /// R850 individual, R1200 couples
    pub fn standard() -> Arc<Self> {
        Arc::new(Self {
            individual: 85_000,
            couples: 120_000,
        })
    }
}

impl DomainPort for FixedPricing {}

#[async_trait]
impl PricingPort for FixedPricing {
    async fn session_rate(&self, category: SessionCategory, currency: Currency) -> Result<Money, PortError> {
        let minor = match category {
            SessionCategory::Individual => self.individual,
            SessionCategory::Couples => self.couples,
        };
        Ok(Money::from_minor(minor, currency))
    }
}
