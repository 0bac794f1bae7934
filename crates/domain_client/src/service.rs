//! Client application service

use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use core_kernel::{uow, BillingEntityId, ClientId, RelationshipId, Store};
use crate::client::{BillingType, Client, StandingDiscount};
use crate::contact::{self, BillingContact, SessionCategory};
use crate::error::ClientError;
use crate::ports::ClientTx;
use crate::relationship::{BillingEntity, ClientRelationship, Counterparty, RelationshipKind};

/// Changes to a client's billing profile; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct BillingProfileUpdate {
    pub billing_type: Option<BillingType>,
    pub billing_email: Option<Option<String>>,
    pub standing_discount: Option<StandingDiscount>,
}

/// Clients, their relationships and billing assignments
pub struct ClientService<S> {
    store: Arc<S>,
}

impl<S> Clone for ClientService<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S> ClientService<S>
where
    S: Store,
    S::Tx: ClientTx,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, client), fields(client_id = %client.id))]
    pub async fn register_client(&self, client: Client) -> Result<Client, ClientError> {
        client.validate()?;
        let mut tx = self.store.begin().await?;
        let result = tx.save_client(&client).await.map_err(ClientError::from);
        uow::finish(tx, result).await?;
        info!("client registered");
        Ok(client)
    }

    pub async fn get_client(&self, client_id: ClientId) -> Result<Client, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = contact::load_client(&mut tx, client_id).await;
        uow::finish(tx, result).await
    }

    #[instrument(skip(self, update))]
    pub async fn update_billing_profile(
        &self,
        client_id: ClientId,
        update: BillingProfileUpdate,
    ) -> Result<Client, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut client = contact::load_client(&mut tx, client_id).await?;
            if let Some(billing_type) = update.billing_type {
                client.billing_type = billing_type;
            }
            if let Some(billing_email) = update.billing_email {
                client.billing_email = billing_email;
            }
            if let Some(discount) = update.standing_discount {
                client.standing_discount = discount;
            }
            client.validate()?;
            client.touch();
            tx.save_client(&client).await?;
            Ok::<_, ClientError>(client)
        }
        .await;
        uow::finish(tx, result).await
    }

    #[instrument(skip(self, entity), fields(billing_entity_id = %entity.id))]
    pub async fn register_billing_entity(&self, entity: BillingEntity) -> Result<BillingEntity, ClientError> {
        entity.validate()?;
        let mut tx = self.store.begin().await?;
        let result = tx.save_billing_entity(&entity).await.map_err(ClientError::from);
        uow::finish(tx, result).await?;
        Ok(entity)
    }

    pub async fn get_billing_entity(&self, id: BillingEntityId) -> Result<BillingEntity, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let entity = tx.get_billing_entity(id).await?;
            entity.ok_or_else(|| ClientError::not_found("BillingEntity", id))
        }
        .await;
        uow::finish(tx, result).await
    }

    /// Links a client to another client or a billing entity
    ///
    /// # Errors
    ///
    /// - `NotFound` if either end does not exist
    /// - `Validation` for a malformed edge, or a second partner for either client
    ///
    /// A new partnership settles its couples payer in the same unit of work.
    #[instrument(skip(self, label))]
    pub async fn relate(
        &self,
        client_id: ClientId,
        counterparty: Counterparty,
        kind: RelationshipKind,
        label: Option<String>,
    ) -> Result<ClientRelationship, ClientError> {
        let mut relationship = ClientRelationship::new(client_id, counterparty, kind, label)?;

        let mut tx = self.store.begin().await?;
        let result = async {
            contact::load_client(&mut tx, client_id).await?;
            match counterparty {
                Counterparty::Client(other) => {
                    contact::load_client(&mut tx, other).await?;
                }
                Counterparty::Entity(entity) => {
                    tx.get_billing_entity(entity)
                        .await?
                        .ok_or_else(|| ClientError::not_found("BillingEntity", entity))?;
                }
            }

            if relationship.is_partner() {
                let mut partnered = vec![client_id];
                if let Counterparty::Client(other) = counterparty {
                    partnered.push(other);
                }
                for id in partnered {
                    if contact::partner_of(&mut tx, id).await?.is_some() {
                        return Err(ClientError::Validation(format!(
                            "Client {} already has a partner relationship",
                            id
                        )));
                    }
                }
                contact::join_partners(&mut tx, &mut relationship).await?;
            }

            tx.save_relationship(&relationship).await?;
            Ok::<_, ClientError>(())
        }
        .await;
        uow::finish(tx, result).await?;

        info!(relationship_id = %relationship.id, kind = kind.as_str(), "relationship created");
        Ok(relationship)
    }

    pub async fn relationships(&self, client_id: ClientId) -> Result<Vec<ClientRelationship>, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = tx.relationships_of(client_id).await.map_err(ClientError::from);
        uow::finish(tx, result).await
    }

    /// Resolves who pays for the client's sessions of `category`
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        client_id: ClientId,
        category: SessionCategory,
    ) -> Result<BillingContact, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = contact::resolve(&mut tx, client_id, category).await;
        uow::finish(tx, result).await
    }

    /// Sets (or clears, with `None`) the billing assignment for a category
    #[instrument(skip(self))]
    pub async fn assign_billing(
        &self,
        client_id: ClientId,
        category: SessionCategory,
        target: Option<RelationshipId>,
    ) -> Result<BillingContact, ClientError> {
        let mut tx = self.store.begin().await?;
        let result = contact::assign(&mut tx, client_id, category, target).await;
        let contact = uow::finish(tx, result).await?;
        info!(client_id = %client_id, ?category, self_pay = contact.is_self_pay(), "billing assignment saved");
        Ok(contact)
    }
}
