//! Client domain errors

use core_kernel::{ClientId, PortError, RelationshipId};
use thiserror::Error;

/// Errors that can occur in the client domain
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// The relationship exists but does not involve the acting client
    #[error("Relationship {relationship_id} does not involve client {client_id}")]
    InvalidRelationship {
        client_id: ClientId,
        relationship_id: RelationshipId,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl ClientError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ClientError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ClientError::Validation(errors.to_string())
    }
}
