//! Custom Test Assertions
//!
//! Assertions over store state that give clearer failure messages than a
//! bare `assert_eq!` on whole structs.

use core_kernel::{ClientId, Money};
use domain_billing::PaymentRequest;
use domain_credit::replay;

use crate::store::InMemoryStore;

/// Asserts the client's stored balance and that the log replays to it
///
/// # Panics
///
/// Panics if the balance differs from `expected` or the log disagrees.
pub async fn assert_balance(store: &InMemoryStore, client_id: ClientId, expected: i64) {
    let state = store.snapshot().await;
    let stored = state.balances.get(&client_id).map(|b| b.balance).unwrap_or(0);
    assert_eq!(stored, expected, "balance of {} is {}, expected {}", client_id, stored, expected);

    let log: Vec<_> = state
        .transactions
        .iter()
        .filter(|t| t.client_id == client_id)
        .cloned()
        .collect();
    let report = replay(client_id, stored, &log);
    assert!(report.is_consistent(), "credit log does not replay: {:?}", report);
}

/// Asserts a payment request's totals add up
///
/// # Panics
///
/// Panics if the line items, subtotal, VAT and total disagree.
pub fn assert_request_totals(request: &PaymentRequest) {
    let currency = request.currency;
    let gross = Money::sum(currency, request.line_items.iter().map(|l| &l.unit_price)).unwrap();
    let discount = Money::sum(currency, request.line_items.iter().map(|l| &l.discount)).unwrap();

    assert_eq!(request.gross, gross, "gross of {}", request.number);
    assert_eq!(request.discount_total, discount, "discount of {}", request.number);
    assert_eq!(
        request.subtotal,
        gross.checked_sub(&discount).unwrap(),
        "subtotal of {}",
        request.number
    );
    assert_eq!(
        request.total,
        request.subtotal.checked_add(&request.vat_amount).unwrap(),
        "total of {}",
        request.number
    );
    for line in &request.line_items {
        assert!(!line.total.is_negative(), "negative line on {}", request.number);
    }
}
