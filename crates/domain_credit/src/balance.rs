//! Credit balances and log replay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, CreditTransactionId};
use crate::transaction::CreditTransaction;

/// Current number of prepaid session credits held by a client
///
/// Equal to the sum of the `amount` of every transaction in the client's
/// log, and never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub client_id: ClientId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

impl CreditBalance {
    /// A fresh zero balance
    pub fn empty(client_id: ClientId) -> Self {
        Self {
            client_id,
            balance: 0,
            updated_at: Utc::now(),
        }
    }
}

/// First point at which the log stops agreeing with itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub transaction_id: CreditTransactionId,
    pub expected_balance_after: i64,
    pub recorded_balance_after: i64,
}

/// Result of replaying a client's credit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub client_id: ClientId,
    /// Balance stored on the balance row
    pub stored_balance: i64,
    /// Sum of all transaction amounts
    pub replayed_balance: i64,
    pub transaction_count: usize,
    pub divergence: Option<ReplayDivergence>,
}

impl ReplayReport {
    pub fn is_consistent(&self) -> bool {
        self.divergence.is_none() && self.stored_balance == self.replayed_balance
    }
}

/// Replays `transactions` (oldest first) and compares with `stored_balance`
pub fn replay(client_id: ClientId, stored_balance: i64, transactions: &[CreditTransaction]) -> ReplayReport {
    let mut running = 0i64;
    let mut divergence = None;

    for tx in transactions {
        running = running.saturating_add(tx.amount);
        if divergence.is_none() && running != tx.balance_after {
            divergence = Some(ReplayDivergence {
                transaction_id: tx.id,
                expected_balance_after: running,
                recorded_balance_after: tx.balance_after,
            });
        }
    }

    ReplayReport {
        client_id,
        stored_balance,
        replayed_balance: running,
        transaction_count: transactions.len(),
        divergence,
    }
}
