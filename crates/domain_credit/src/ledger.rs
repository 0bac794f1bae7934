//! Credit ledger service
//!
//! Balance changes always take the balance row lock, write the new balance
//! and append the matching log row inside one unit of work, so the balance
//! and the sum of the log can never drift apart.
//!
//! [`post`] works on a caller-supplied unit of work; the booking scheduler
//! uses it to take a credit in the same transaction that inserts a booking.
//! [`Ledger`] wraps each operation in its own unit of work.

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{uow, BookingId, ClientId, Store};
use crate::balance::{replay, ReplayReport};
use crate::error::LedgerError;
use crate::ports::LedgerTx;
use crate::transaction::{CreditGrant, CreditTransaction, LedgerEntry};

/// Applies one entry to a client's balance within `tx`
///
/// # Errors
///
/// - `InvalidAmount` if a grant is not strictly positive
/// - `InsufficientCredit` if the entry would take the balance below zero
/// - `Port` on storage failure
pub async fn post<T: LedgerTx>(
    tx: &mut T,
    client_id: ClientId,
    entry: LedgerEntry,
    description: impl Into<String> + Send,
) -> Result<CreditTransaction, LedgerError> {
    if let LedgerEntry::Grant { amount, .. } = entry {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
    }

    let mut balance = tx.lock_balance(client_id).await?;
    let next = balance
        .balance
        .checked_add(entry.amount())
        .ok_or(LedgerError::Overflow(client_id))?;

    if next < 0 {
        return Err(LedgerError::InsufficientCredit {
            client_id,
            balance: balance.balance,
        });
    }

    balance.balance = next;
    balance.updated_at = Utc::now();
    tx.save_balance(&balance).await?;

    let transaction = CreditTransaction::record(client_id, &entry, next, description);
    tx.append_transaction(&transaction).await?;

    debug!(
        client_id = %client_id,
        kind = %transaction.kind,
        amount = transaction.amount,
        balance_after = next,
        "credit entry posted"
    );
    Ok(transaction)
}

/// Current balance within `tx`; zero when the client has no row
pub async fn balance_of<T: LedgerTx>(tx: &mut T, client_id: ClientId) -> Result<i64, LedgerError> {
    Ok(tx.read_balance(client_id).await?.map(|b| b.balance).unwrap_or(0))
}

/// The session-credit ledger
pub struct Ledger<S> {
    store: Arc<S>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S> Ledger<S>
where
    S: Store,
    S::Tx: LedgerTx,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the client's balance, zero if they have never held credits
    #[instrument(skip(self))]
    pub async fn get_balance(&self, client_id: ClientId) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = balance_of(&mut tx, client_id).await;
        uow::finish(tx, result).await
    }

    /// Grants credits to a client
    ///
    /// # Arguments
    ///
    /// * `client_id` - The receiving client
    /// * `amount` - Number of credits, must be positive
    /// * `source` - Purchase, admin grant or gift
    /// * `description` - Free text stored on the log row
    ///
    /// # Returns
    ///
    /// The new balance
    #[instrument(skip(self, description))]
    pub async fn add_credits(
        &self,
        client_id: ClientId,
        amount: i64,
        source: CreditGrant,
        description: &str,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = post(&mut tx, client_id, LedgerEntry::Grant { amount, source }, description).await;
        let transaction = uow::finish(tx, result).await?;

        info!(client_id = %client_id, amount, balance = transaction.balance_after, "credits added");
        Ok(transaction.balance_after)
    }

    /// Takes one credit for a booking
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCredit` when the balance is zero; nothing is written.
    #[instrument(skip(self, description))]
    pub async fn deduct_credit(
        &self,
        client_id: ClientId,
        booking_id: BookingId,
        description: &str,
    ) -> Result<i64, LedgerError> {
        self.post_single(client_id, LedgerEntry::Use { booking_id }, description).await
    }

    /// Returns one credit for a booking
    #[instrument(skip(self, description))]
    pub async fn refund_credit(
        &self,
        client_id: ClientId,
        booking_id: BookingId,
        description: &str,
    ) -> Result<i64, LedgerError> {
        self.post_single(client_id, LedgerEntry::Refund { booking_id }, description).await
    }

    /// Records a forfeited credit; the balance is unchanged
    #[instrument(skip(self, description))]
    pub async fn forfeit_credit(
        &self,
        client_id: ClientId,
        booking_id: BookingId,
        description: &str,
    ) -> Result<i64, LedgerError> {
        self.post_single(client_id, LedgerEntry::Forfeit { booking_id }, description).await
    }

    /// Returns the client's credit log, oldest first
    pub async fn transactions(&self, client_id: ClientId) -> Result<Vec<CreditTransaction>, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = tx.list_transactions(client_id).await.map_err(LedgerError::from);
        uow::finish(tx, result).await
    }

    /// Replays the client's log and compares it with the stored balance
    #[instrument(skip(self))]
    pub async fn verify_replay(&self, client_id: ClientId) -> Result<ReplayReport, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let stored = balance_of(&mut tx, client_id).await?;
            let log = tx.list_transactions(client_id).await?;
            Ok::<_, LedgerError>(replay(client_id, stored, &log))
        }
        .await;
        let report = uow::finish(tx, result).await?;

        if !report.is_consistent() {
            warn!(
                client_id = %client_id,
                stored = report.stored_balance,
                replayed = report.replayed_balance,
                "credit log does not replay to stored balance"
            );
        }
        Ok(report)
    }

    async fn post_single(
        &self,
        client_id: ClientId,
        entry: LedgerEntry,
        description: &str,
    ) -> Result<i64, LedgerError> {
        let mut tx = self.store.begin().await?;
        let result = post(&mut tx, client_id, entry, description).await;
        let transaction = uow::finish(tx, result).await?;
        Ok(transaction.balance_after)
    }
}
