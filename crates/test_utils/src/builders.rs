//! Test Data Builders
//!
//! [`TestPractice`] wires every service over one [`InMemoryStore`] with
//! fake collaborators, so tests only describe the scenario.

use std::sync::Arc;

use core_kernel::{BookingId, ClientId, RelationshipId, TimeSlot};
use domain_billing::{BillingConfig, BillingService};
use domain_booking::{Booking, NewBooking, Scheduler, SchedulingPolicy, SessionType};
use domain_client::{
    BillingEntity, Client, ClientRelationship, ClientService, Counterparty, RelationshipKind, SessionCategory,
};
use domain_credit::{CreditGrant, Ledger};

use crate::fakes::{FakeAvailability, FakeCalendar, FixedPricing, RecordingNotifier};
use crate::store::InMemoryStore;

/// A practice running entirely in memory
pub struct TestPractice {
    pub store: Arc<InMemoryStore>,
    pub availability: Arc<FakeAvailability>,
    pub calendar: Arc<FakeCalendar>,
    pub notifier: Arc<RecordingNotifier>,
    pub ledger: Ledger<InMemoryStore>,
    pub clients: ClientService<InMemoryStore>,
    pub scheduler: Scheduler<InMemoryStore>,
    pub billing: BillingService<InMemoryStore>,
}

impl Default for TestPractice {
    fn default() -> Self {
        TestPracticeBuilder::new().build()
    }
}

impl TestPractice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> TestPracticeBuilder {
        TestPracticeBuilder::new()
    }

    pub async fn register(&self, client: Client) -> Client {
        self.clients.register_client(client).await.expect("register client")
    }

    pub async fn register_entity(&self, entity: BillingEntity) -> BillingEntity {
        self.clients
            .register_billing_entity(entity)
            .await
            .expect("register billing entity")
    }

    pub async fn grant(&self, client_id: ClientId, amount: i64) -> i64 {
        self.ledger
            .add_credits(client_id, amount, CreditGrant::AdminGrant, "Test grant")
            .await
            .expect("grant credits")
    }

    pub async fn partners(&self, a: ClientId, b: ClientId) -> ClientRelationship {
        self.clients
            .relate(a, Counterparty::Client(b), RelationshipKind::Partner, None)
            .await
            .expect("relate partners")
    }

    pub async fn assign(&self, client_id: ClientId, category: SessionCategory, target: Option<RelationshipId>) {
        self.clients
            .assign_billing(client_id, category, target)
            .await
            .expect("assign billing");
    }

    /// Books a session, paid by credit when `pay_with_credit`
    pub async fn book(
        &self,
        client_id: ClientId,
        session_type: SessionType,
        slot: TimeSlot,
        pay_with_credit: bool,
    ) -> Booking {
        self.scheduler
            .create_single(NewBooking {
                client_id,
                session_type,
                slot,
                pay_with_credit,
                notes: None,
            })
            .await
            .expect("create booking")
    }

    pub async fn complete(&self, booking_id: BookingId) -> Booking {
        self.scheduler.complete(booking_id).await.expect("complete booking")
    }
}

/// Builder for [`TestPractice`]
pub struct TestPracticeBuilder {
    calendar: Arc<FakeCalendar>,
    pricing: Arc<FixedPricing>,
    policy: SchedulingPolicy,
    billing: BillingConfig,
}

impl Default for TestPracticeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPracticeBuilder {
    pub fn new() -> Self {
        Self {
            calendar: FakeCalendar::new(),
            pricing: FixedPricing::standard(),
            policy: SchedulingPolicy::default(),
            billing: BillingConfig::default(),
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<FakeCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<FixedPricing>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_billing_config(mut self, config: BillingConfig) -> Self {
        self.billing = config;
        self
    }

    pub fn build(self) -> TestPractice {
        let store = Arc::new(InMemoryStore::new());
        let availability = FakeAvailability::new();
        let notifier = RecordingNotifier::new();

        let scheduler = Scheduler::new(
            Arc::clone(&store),
            availability.clone(),
            self.calendar.clone(),
            notifier.clone(),
        )
        .with_policy(self.policy);
        let billing = BillingService::new(Arc::clone(&store), self.pricing, notifier.clone(), self.billing);

        TestPractice {
            ledger: Ledger::new(Arc::clone(&store)),
            clients: ClientService::new(Arc::clone(&store)),
            scheduler,
            billing,
            store,
            availability,
            calendar: self.calendar,
            notifier,
        }
    }
}
