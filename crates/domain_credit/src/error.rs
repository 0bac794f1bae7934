//! Ledger errors

use core_kernel::{ClientId, PortError};
use thiserror::Error;

/// Errors that can occur in the credit ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance cannot cover the requested deduction
    #[error("Insufficient credit for client {client_id}: balance is {balance}")]
    InsufficientCredit {
        client_id: ClientId,
        balance: i64,
    },

    /// Credit grants must be strictly positive
    #[error("Invalid credit amount: {0}")]
    InvalidAmount(i64),

    /// Balance arithmetic overflowed
    #[error("Credit balance overflow for client {0}")]
    Overflow(ClientId),

    /// Storage failure
    #[error(transparent)]
    Port(#[from] PortError),
}

impl LedgerError {
    pub fn is_insufficient_credit(&self) -> bool {
        matches!(self, LedgerError::InsufficientCredit { .. })
    }
}
