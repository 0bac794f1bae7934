//! Storage port for the credit ledger

use async_trait::async_trait;

use core_kernel::{ClientId, PortError, UnitOfWork};
use crate::balance::CreditBalance;
use crate::transaction::CreditTransaction;

/// Ledger operations available inside a unit of work
#[async_trait]
pub trait LedgerTx: UnitOfWork {
    /// Reads the balance row without locking it
    async fn read_balance(&mut self, client_id: ClientId) -> Result<Option<CreditBalance>, PortError>;

    /// Returns the balance row, locked until this unit of work ends
    ///
    /// A zero row is created when the client has none yet, so concurrent
    /// first grants serialise on the same row.
    async fn lock_balance(&mut self, client_id: ClientId) -> Result<CreditBalance, PortError>;

    /// Writes the balance row
    async fn save_balance(&mut self, balance: &CreditBalance) -> Result<(), PortError>;

    /// Appends one row to the client's credit log
    async fn append_transaction(&mut self, transaction: &CreditTransaction) -> Result<(), PortError>;

    /// Returns the client's credit log, oldest first
    async fn list_transactions(&mut self, client_id: ClientId) -> Result<Vec<CreditTransaction>, PortError>;
}
