//! Storage port for clients and their relationships

use async_trait::async_trait;

use core_kernel::{BillingEntityId, ClientId, PortError, RelationshipId, UnitOfWork};
use crate::client::{BillingType, Client};
use crate::relationship::{BillingEntity, ClientRelationship};

/// Client operations available inside a unit of work
///
/// Reads inside a mutating unit of work lock the rows they return, so the
/// assignment routine sees a stable view of both partners.
#[async_trait]
pub trait ClientTx: UnitOfWork {
    async fn get_client(&mut self, id: ClientId) -> Result<Option<Client>, PortError>;

    /// Inserts or updates a client
    async fn save_client(&mut self, client: &Client) -> Result<(), PortError>;

    /// Lists clients, optionally filtered by billing type
    async fn list_clients(&mut self, billing_type: Option<BillingType>) -> Result<Vec<Client>, PortError>;

    async fn get_relationship(&mut self, id: RelationshipId) -> Result<Option<ClientRelationship>, PortError>;

    /// Inserts or updates a relationship
    async fn save_relationship(&mut self, relationship: &ClientRelationship) -> Result<(), PortError>;

    /// Every relationship with `client_id` at either end
    async fn relationships_of(&mut self, client_id: ClientId) -> Result<Vec<ClientRelationship>, PortError>;

    async fn get_billing_entity(&mut self, id: BillingEntityId) -> Result<Option<BillingEntity>, PortError>;

    async fn save_billing_entity(&mut self, entity: &BillingEntity) -> Result<(), PortError>;
}
