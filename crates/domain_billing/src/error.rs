//! Billing domain errors

use thiserror::Error;

use core_kernel::{BookingId, ClientId, MoneyError, PortError, RelationshipId};
use domain_client::ClientError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// The sweep found nothing to bill
    #[error("No unbilled sessions for client {client_id}")]
    NoUnbilledSessions {
        client_id: ClientId,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("Relationship {relationship_id} does not involve client {client_id}")]
    InvalidRelationship {
        client_id: ClientId,
        relationship_id: RelationshipId,
    },

    /// The document's status does not allow the requested change
    #[error("Cannot {action} {document} {number} while it is {status}")]
    InvalidStatus {
        document: &'static str,
        number: String,
        status: String,
        action: &'static str,
    },

    #[error("Booking {0} is already billed")]
    AlreadyBilled(BookingId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Calculation error: {0}")]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<ClientError> for BillingError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::NotFound { entity, id } => BillingError::NotFound { entity, id },
            ClientError::InvalidRelationship { client_id, relationship_id } => {
                BillingError::InvalidRelationship { client_id, relationship_id }
            }
            ClientError::Validation(message) => BillingError::Validation(message),
            ClientError::Port(port) => BillingError::Port(port),
        }
    }
}
