//! PostgreSQL Store Tests
//!
//! Run the domain services against a migrated PostgreSQL container.
//! Ignored by default because they need Docker:
//!
//! ```text
//! cargo test -p infra_db -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use core_kernel::{BookingId, InvoiceId, PaymentRequestId, Store, UnitOfWork};
use domain_billing::{BillingConfig, BillingError, BillingLink, BillingService, BillingTx, PaymentRequestFilter};
use domain_booking::{
    AvailabilityPort, Booking, BookingError, BookingStatus, BookingTx, NewBooking, Scheduler, SessionType,
};
use domain_client::{ClientService, ClientTx};
use domain_credit::{CreditGrant, Ledger, LedgerTx};
use infra_db::{BusinessHours, PgAvailability, PgStore};
use test_utils::{
    db_test, instant, slot, ClientFixtures, FakeAvailability, FakeCalendar, FixedPricing, RecordingNotifier,
};

fn scheduler(store: Arc<PgStore>) -> Scheduler<PgStore> {
    Scheduler::new(store, FakeAvailability::new(), FakeCalendar::new(), RecordingNotifier::new())
}

db_test!(test_ledger_round_trip_and_replay, |db| {
    let store = Arc::new(db.store());
    let clients = ClientService::new(Arc::clone(&store));
    let ledger = Ledger::new(Arc::clone(&store));
    let client = clients.register_client(ClientFixtures::prepaid()).await.unwrap();

    ledger
        .add_credits(client.id, 3, CreditGrant::Purchase { order_id: None }, "Bundle")
        .await
        .unwrap();
    ledger.deduct_credit(client.id, BookingId::new(), "Session").await.unwrap();

    assert_eq!(ledger.get_balance(client.id).await.unwrap(), 2);
    assert_eq!(ledger.transactions(client.id).await.unwrap().len(), 2);
    assert!(ledger.verify_replay(client.id).await.unwrap().is_consistent());
});

db_test!(test_concurrent_deductions_lock_the_balance_row, |db| {
    let store = Arc::new(db.store());
    let ledger = Ledger::new(Arc::clone(&store));
    let client = ClientService::new(Arc::clone(&store))
        .register_client(ClientFixtures::prepaid())
        .await
        .unwrap();
    ledger.add_credits(client.id, 1, CreditGrant::AdminGrant, "One").await.unwrap();

    let attempts: Vec<_> = (0..4)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.deduct_credit(client.id, BookingId::new(), "Session").await })
        })
        .collect();

    let mut succeeded = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(ledger.get_balance(client.id).await.unwrap(), 0);
});

db_test!(test_slot_constraint_rejects_double_booking, |db| {
    let store = Arc::new(db.store());
    let client = ClientService::new(Arc::clone(&store))
        .register_client(ClientFixtures::postpaid())
        .await
        .unwrap();
    let scheduler = scheduler(Arc::clone(&store));

    let first = NewBooking {
        client_id: client.id,
        session_type: SessionType::Individual,
        slot: slot(2025, 3, 3, 10),
        pay_with_credit: false,
        notes: None,
    };
    scheduler.create_single(first.clone()).await.unwrap();

    // The fake availability says yes; the unique index says no
    let err = scheduler.create_single(first).await.unwrap_err();
    assert!(matches!(err, BookingError::SlotUnavailable { .. }));
});

db_test!(test_overlapping_insert_is_a_conflict, |db| {
    let store = db.store();
    let mut tx = store.begin().await.unwrap();
    let client = ClientFixtures::prepaid();
    tx.save_client(&client).await.unwrap();

    let mut long = Booking::new(client.id, SessionType::Couples, slot(2025, 3, 4, 10));
    long.slot.end_time = test_utils::time(11, 30);
    tx.insert_booking(&long).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let overlapping = Booking::new(client.id, SessionType::Individual, slot(2025, 3, 4, 11));
    let err = tx.insert_booking(&overlapping).await.unwrap_err();
    assert!(err.is_conflict());
});

db_test!(test_uncommitted_unit_of_work_is_discarded, |db| {
    let store = db.store();
    let client = ClientFixtures::prepaid();
    {
        let mut tx = store.begin().await.unwrap();
        tx.save_client(&client).await.unwrap();
        tx.save_balance(&domain_credit::CreditBalance::empty(client.id)).await.unwrap();
    }
    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_client(client.id).await.unwrap().is_none());
    assert!(tx.read_balance(client.id).await.unwrap().is_none());
});

db_test!(test_billing_snapshot_survives_storage, |db| {
    let store = Arc::new(db.store());
    let clients = ClientService::new(Arc::clone(&store));
    let scheduler = scheduler(Arc::clone(&store));
    let billing = BillingService::new(
        Arc::clone(&store),
        FixedPricing::standard(),
        RecordingNotifier::new(),
        BillingConfig::default(),
    );

    let client = clients.register_client(ClientFixtures::postpaid_with_discount()).await.unwrap();
    for day in [3, 10] {
        let booking = scheduler
            .create_single(NewBooking {
                client_id: client.id,
                session_type: SessionType::Individual,
                slot: slot(2025, 3, day, 9),
                pay_with_credit: false,
                notes: None,
            })
            .await
            .unwrap();
        scheduler.complete(booking.id).await.unwrap();
    }

    let period = billing.billing_period(2025, 3).unwrap();
    let requests = billing.generate_for_client(client.id, &period).await.unwrap();
    assert_eq!(requests.len(), 1);

    let stored = billing.get_payment_request(requests[0].id).await.unwrap();
    assert_eq!(stored.number, requests[0].number);
    assert_eq!(stored.total, requests[0].total);
    assert_eq!(stored.contact, requests[0].contact);
    assert_eq!(stored.line_items, requests[0].line_items);

    let invoice = billing
        .record_payment(stored.id, Some("EFT-1".into()), instant(2025, 4, 2, 9, 0))
        .await
        .unwrap();
    assert_eq!(invoice.total, stored.total);

    let pending = billing
        .list_payment_requests(PaymentRequestFilter {
            client_id: Some(client.id),
            status: Some(domain_billing::PaymentRequestStatus::Pending),
        })
        .await
        .unwrap();
    assert!(pending.is_empty());
});

db_test!(test_availability_honours_blocks_and_bookings, |db| {
    let store = Arc::new(db.store());
    let availability = PgAvailability::new(db.pool().clone(), BusinessHours::default());
    let client = ClientService::new(Arc::clone(&store))
        .register_client(ClientFixtures::postpaid())
        .await
        .unwrap();

    let monday = slot(2025, 3, 3, 10);
    assert!(availability.is_slot_available(&monday, SessionType::Individual, None).await.unwrap());

    availability
        .block(monday.date, Some((test_utils::time(10, 0), test_utils::time(10, 30))), None)
        .await
        .unwrap();
    assert!(!availability.is_slot_available(&monday, SessionType::Individual, None).await.unwrap());

    let tuesday = slot(2025, 3, 4, 10);
    let booking = scheduler(Arc::clone(&store))
        .create_single(NewBooking {
            client_id: client.id,
            session_type: SessionType::Individual,
            slot: tuesday,
            pay_with_credit: false,
            notes: None,
        })
        .await
        .unwrap();
    assert!(!availability.is_slot_available(&tuesday, SessionType::Individual, None).await.unwrap());
    assert!(availability
        .is_slot_available(&tuesday, SessionType::Individual, Some(booking.id))
        .await
        .unwrap());
});

db_test!(test_sweep_waits_for_a_pending_cancellation, |db| {
    let store = Arc::new(db.store());
    let client = ClientService::new(Arc::clone(&store))
        .register_client(ClientFixtures::postpaid())
        .await
        .unwrap();
    let booking = scheduler(Arc::clone(&store))
        .create_single(NewBooking {
            client_id: client.id,
            session_type: SessionType::Individual,
            slot: slot(2025, 3, 6, 9),
            pay_with_credit: false,
            notes: None,
        })
        .await
        .unwrap();
    let billing = BillingService::new(
        Arc::clone(&store),
        FixedPricing::standard(),
        RecordingNotifier::new(),
        BillingConfig::default(),
    );
    let period = billing.billing_period(2025, 3).unwrap();

    let mut cancelling = store.begin().await.unwrap();
    let mut locked = cancelling.get_booking(booking.id).await.unwrap().unwrap();
    locked.status = BookingStatus::Cancelled;
    cancelling.update_booking(&locked).await.unwrap();

    let sweep = tokio::spawn(async move { billing.generate_for_client(client.id, &period).await });
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!sweep.is_finished(), "sweep must wait on the booking row lock");

    cancelling.commit().await.unwrap();
    let err = sweep.await.unwrap().unwrap_err();
    assert!(matches!(err, BillingError::NoUnbilledSessions { .. }));

    let mut tx = store.begin().await.unwrap();
    let stored = tx.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(stored.is_unbilled());
});

db_test!(test_link_only_stamps_unbilled_bookings, |db| {
    let store = db.store();
    let client = ClientFixtures::postpaid();
    let booking = Booking::new(client.id, SessionType::Individual, slot(2025, 3, 7, 9));

    let mut tx = store.begin().await.unwrap();
    tx.save_client(&client).await.unwrap();
    tx.insert_booking(&booking).await.unwrap();

    let request = PaymentRequestId::new();
    tx.link_booking(booking.id, BillingLink::PaymentRequest(request)).await.unwrap();
    let err = tx
        .link_booking(booking.id, BillingLink::Invoice(InvoiceId::new()))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let stored = tx.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_request_id, Some(request));
    assert_eq!(stored.status, booking.status);
    assert_eq!(stored.invoice_id, None);
});
