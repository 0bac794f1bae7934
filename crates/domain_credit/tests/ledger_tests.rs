//! Credit Ledger Tests
//!
//! Exercises the `Ledger` service over the in-memory store:
//! - grants, deductions, refunds and forfeits keep balance and log in step
//! - a deduction from zero writes nothing
//! - concurrent deductions of the last credit serialise
//! - replay detects a tampered balance row

use std::sync::Arc;

use core_kernel::{BookingId, ClientId, OrderId};
use domain_credit::{CreditGrant, CreditTransactionKind, Ledger, LedgerEntry, LedgerError};
use proptest::prelude::*;
use test_utils::{assert_balance, ledger_entry_strategy, InMemoryStore};

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn ledger() -> (Arc<InMemoryStore>, Ledger<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (Arc::clone(&store), Ledger::new(store))
}

// ============================================================================
// BALANCE AND LOG
// ============================================================================

#[tokio::test]
async fn test_grant_then_deduct_then_refund() {
    let (store, ledger) = ledger();
    let client = ClientId::new();
    let booking = BookingId::new();

    let order = OrderId::new();
    let balance = ledger
        .add_credits(client, 5, CreditGrant::Purchase { order_id: Some(order) }, "Bundle of 5")
        .await
        .unwrap();
    assert_eq!(balance, 5);

    assert_eq!(ledger.deduct_credit(client, booking, "Session").await.unwrap(), 4);
    assert_eq!(ledger.refund_credit(client, booking, "Cancelled").await.unwrap(), 5);

    let log = ledger.transactions(client).await.unwrap();
    let kinds: Vec<_> = log.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CreditTransactionKind::Purchase,
            CreditTransactionKind::Used,
            CreditTransactionKind::Refund,
        ]
    );
    assert_eq!(log[0].order_id, Some(order));
    assert_eq!(log[1].booking_id, Some(booking));
    assert_eq!(log[1].amount, -1);
    assert_balance(&store, client, 5).await;
}

#[tokio::test]
async fn test_unknown_client_has_zero_balance() {
    let (_, ledger) = ledger();
    assert_eq!(ledger.get_balance(ClientId::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deduct_from_zero_writes_nothing() {
    let (store, ledger) = ledger();
    let client = ClientId::new();

    let err = ledger.deduct_credit(client, BookingId::new(), "Session").await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientCredit { balance: 0, .. }));
    assert!(err.is_insufficient_credit());

    assert!(ledger.transactions(client).await.unwrap().is_empty());
    assert_balance(&store, client, 0).await;
}

#[tokio::test]
async fn test_grant_must_be_positive() {
    let (_, ledger) = ledger();
    let client = ClientId::new();

    for amount in [0, -3] {
        let err = ledger
            .add_credits(client, amount, CreditGrant::AdminGrant, "Bad grant")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(a) if a == amount));
    }
    assert!(ledger.transactions(client).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forfeit_logs_without_moving_balance() {
    let (store, ledger) = ledger();
    let client = ClientId::new();
    ledger.add_credits(client, 1, CreditGrant::GiftReceived, "Gift").await.unwrap();
    ledger.deduct_credit(client, BookingId::new(), "Session").await.unwrap();

    let balance = ledger.forfeit_credit(client, BookingId::new(), "Late cancel").await.unwrap();
    assert_eq!(balance, 0);

    let log = ledger.transactions(client).await.unwrap();
    let forfeit = log.last().unwrap();
    assert_eq!(forfeit.kind, CreditTransactionKind::Used);
    assert_eq!(forfeit.amount, 0);
    assert_eq!(forfeit.balance_after, 0);
    assert_balance(&store, client, 0).await;
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deductions_of_last_credit() {
    let (store, ledger) = ledger();
    let client = ClientId::new();
    ledger.add_credits(client, 1, CreditGrant::AdminGrant, "One").await.unwrap();

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.deduct_credit(client, BookingId::new(), "Session").await })
        })
        .collect();

    let mut succeeded = 0;
    let mut refused = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(balance) => {
                assert_eq!(balance, 0);
                succeeded += 1;
            }
            Err(e) if e.is_insufficient_credit() => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(refused, 7);
    assert_balance(&store, client, 0).await;
}

// ============================================================================
// REPLAY
// ============================================================================

#[tokio::test]
async fn test_replay_matches_after_mixed_activity() {
    let (_, ledger) = ledger();
    let client = ClientId::new();
    ledger.add_credits(client, 3, CreditGrant::AdminGrant, "Grant").await.unwrap();
    for _ in 0..3 {
        ledger.deduct_credit(client, BookingId::new(), "Session").await.unwrap();
    }
    ledger.refund_credit(client, BookingId::new(), "Refund").await.unwrap();

    let report = ledger.verify_replay(client).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.replayed_balance, 1);
    assert_eq!(report.transaction_count, 5);
}

#[tokio::test]
async fn test_replay_detects_tampered_balance() {
    let (store, ledger) = ledger();
    let client = ClientId::new();
    ledger.add_credits(client, 2, CreditGrant::AdminGrant, "Grant").await.unwrap();

    store
        .modify(|state| {
            if let Some(row) = state.balances.get_mut(&client) {
                row.balance = 7;
            }
        })
        .await;

    let report = ledger.verify_replay(client).await.unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.stored_balance, 7);
    assert_eq!(report.replayed_balance, 2);
    assert!(report.divergence.is_none());
}

// ============================================================================
// PROPERTIES
// ============================================================================

async fn apply(ledger: &Ledger<InMemoryStore>, client: ClientId, entry: LedgerEntry) -> Result<i64, LedgerError> {
    match entry {
        LedgerEntry::Grant { amount, source } => ledger.add_credits(client, amount, source, "Grant").await,
        LedgerEntry::Use { booking_id } => ledger.deduct_credit(client, booking_id, "Session").await,
        LedgerEntry::Refund { booking_id } => ledger.refund_credit(client, booking_id, "Refund").await,
        LedgerEntry::Forfeit { booking_id } => ledger.forfeit_credit(client, booking_id, "Forfeit").await,
    }
}

proptest! {
    #[test]
    fn replaying_the_log_reproduces_the_balance(entries in proptest::collection::vec(ledger_entry_strategy(), 1..30)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let (_, ledger) = ledger();
            let client = ClientId::new();

            for entry in entries {
                if let Err(e) = apply(&ledger, client, entry).await {
                    assert!(e.is_insufficient_credit(), "unexpected error: {e}");
                }
            }

            let balance = ledger.get_balance(client).await.unwrap();
            assert!(balance >= 0);

            let mut running = 0;
            for transaction in ledger.transactions(client).await.unwrap() {
                running += transaction.amount;
                assert_eq!(transaction.balance_after, running);
            }
            assert_eq!(running, balance);
            assert!(ledger.verify_replay(client).await.unwrap().is_consistent());
        });
    }
}
