//! Booking domain errors

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use core_kernel::{BookingId, ClientId, PortError, TemporalError};
use domain_client::ClientError;
use domain_credit::LedgerError;
use crate::booking::BookingStatus;

/// Errors that can occur when scheduling or transitioning bookings
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// The slot is taken, blocked or outside business hours
    #[error("Slot unavailable: {date} {start_time}")]
    SlotUnavailable {
        date: NaiveDate,
        start_time: NaiveTime,
    },

    #[error("Insufficient credit for client {client_id}: balance is {balance}")]
    InsufficientCredit {
        client_id: ClientId,
        balance: i64,
    },

    #[error("Cannot {action} a booking that is {from}")]
    InvalidTransition {
        from: BookingStatus,
        action: String,
    },

    /// Billed bookings must be unlinked before they can be erased
    #[error("Booking {0} is linked to a payment request or invoice")]
    AlreadyBilled(BookingId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Client error: {0}")]
    Client(ClientError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: BookingStatus, action: impl Into<String>) -> Self {
        BookingError::InvalidTransition {
            from,
            action: action.into(),
        }
    }

    /// Short reason recorded against a skipped recurring occurrence
    pub fn skip_reason(&self) -> String {
        match self {
            BookingError::SlotUnavailable { .. } => "Slot unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientCredit { client_id, balance } => {
                BookingError::InsufficientCredit { client_id, balance }
            }
            LedgerError::Port(port) => BookingError::Port(port),
            other => BookingError::Ledger(other),
        }
    }
}

impl From<ClientError> for BookingError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::NotFound { entity, id } => BookingError::NotFound { entity, id },
            ClientError::Port(port) => BookingError::Port(port),
            other => BookingError::Client(other),
        }
    }
}

impl From<TemporalError> for BookingError {
    fn from(error: TemporalError) -> Self {
        BookingError::Validation(error.to_string())
    }
}
