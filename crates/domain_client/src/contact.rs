//! Billing contact resolution
//!
//! Decides who pays for a client's sessions of a given category, and owns
//! the one routine allowed to change that answer.
//!
//! Couples payers are mirrored through the partner relationship: the
//! relationship holds the paying partner, and only that partner may carry
//! a separate (corporate) couples assignment, which the other partner's
//! couples sessions follow. Every assignment rewrites both sides inside the
//! caller's unit of work, and so does creating the partnership.

use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{BillingEntityId, ClientId, RelationshipId};
use crate::client::Client;
use crate::error::ClientError;
use crate::ports::ClientTx;
use crate::relationship::{ClientRelationship, Counterparty};

/// Session category used for payer resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCategory {
    Individual,
    Couples,
}

/// Who is financially responsible for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingContact {
    SelfPay {
        client_id: ClientId,
    },
    /// Paid through a relationship, by another client or a billing entity
    Relationship {
        relationship_id: RelationshipId,
        payer: Counterparty,
    },
}

impl BillingContact {
    /// The party the bill is addressed to
    pub fn payer(&self) -> Counterparty {
        match *self {
            BillingContact::SelfPay { client_id } => Counterparty::Client(client_id),
            BillingContact::Relationship { payer, .. } => payer,
        }
    }

    pub fn relationship_id(&self) -> Option<RelationshipId> {
        match self {
            BillingContact::SelfPay { .. } => None,
            BillingContact::Relationship { relationship_id, .. } => Some(*relationship_id),
        }
    }

    pub fn billing_entity_id(&self) -> Option<BillingEntityId> {
        match self.payer() {
            Counterparty::Entity(id) => Some(id),
            Counterparty::Client(_) => None,
        }
    }

    /// The paying client when someone other than the session's client pays
    pub fn payer_client_id(&self) -> Option<ClientId> {
        match self {
            BillingContact::Relationship { payer: Counterparty::Client(id), .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_self_pay(&self) -> bool {
        matches!(self, BillingContact::SelfPay { .. })
    }
}

/// Addressing details for the resolved payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub party: Counterparty,
    pub name: String,
    pub email: String,
    pub vat_number: Option<String>,
}

fn from_relationship(
    client_id: ClientId,
    relationship: &ClientRelationship,
) -> Result<BillingContact, ClientError> {
    let other = relationship
        .other_party(client_id)
        .ok_or(ClientError::InvalidRelationship {
            client_id,
            relationship_id: relationship.id,
        })?;

    Ok(BillingContact::Relationship {
        relationship_id: relationship.id,
        payer: other,
    })
}

fn from_partner(client_id: ClientId, partner: &ClientRelationship) -> BillingContact {
    match partner.couples_payer {
        Some(payer) if payer != client_id => BillingContact::Relationship {
            relationship_id: partner.id,
            payer: Counterparty::Client(payer),
        },
        _ => BillingContact::SelfPay { client_id },
    }
}

/// Resolves through the partner relationship, following the paying
/// partner's own couples assignment so both partners land on one payer
async fn through_partner<T: ClientTx>(
    tx: &mut T,
    client_id: ClientId,
    partner: &ClientRelationship,
) -> Result<BillingContact, ClientError> {
    let contact = from_partner(client_id, partner);
    let Some(payer_id) = contact.payer_client_id() else {
        return Ok(contact);
    };

    let paying = load_client(tx, payer_id).await?;
    match paying.couples_billed_to {
        Some(routed_id) if routed_id != partner.id => {
            let routed = load_relationship(tx, routed_id).await?;
            let payer = routed
                .other_party(payer_id)
                .ok_or(ClientError::InvalidRelationship {
                    client_id: payer_id,
                    relationship_id: routed.id,
                })?;
            Ok(BillingContact::Relationship {
                relationship_id: partner.id,
                payer,
            })
        }
        _ => Ok(contact),
    }
}

pub(crate) async fn load_client<T: ClientTx>(tx: &mut T, client_id: ClientId) -> Result<Client, ClientError> {
    tx.get_client(client_id)
        .await?
        .ok_or_else(|| ClientError::not_found("Client", client_id))
}

async fn load_relationship<T: ClientTx>(
    tx: &mut T,
    relationship_id: RelationshipId,
) -> Result<ClientRelationship, ClientError> {
    tx.get_relationship(relationship_id)
        .await?
        .ok_or_else(|| ClientError::not_found("Relationship", relationship_id))
}

/// The client's partner relationship, if they have one
pub async fn partner_of<T: ClientTx>(
    tx: &mut T,
    client_id: ClientId,
) -> Result<Option<ClientRelationship>, ClientError> {
    Ok(tx
        .relationships_of(client_id)
        .await?
        .into_iter()
        .find(ClientRelationship::is_partner))
}

/// Resolves the payer for `client_id`'s sessions of `category`
pub async fn resolve<T: ClientTx>(
    tx: &mut T,
    client_id: ClientId,
    category: SessionCategory,
) -> Result<BillingContact, ClientError> {
    let client = load_client(tx, client_id).await?;

    let assigned = match category {
        SessionCategory::Individual => client.individual_billed_to,
        SessionCategory::Couples => client.couples_billed_to,
    };

    if let Some(relationship_id) = assigned {
        let relationship = load_relationship(tx, relationship_id).await?;
        if relationship.is_partner() && category == SessionCategory::Couples {
            return through_partner(tx, client_id, &relationship).await;
        }
        return from_relationship(client_id, &relationship);
    }

    if category == SessionCategory::Couples {
        if let Some(partner) = partner_of(tx, client_id).await? {
            return through_partner(tx, client_id, &partner).await;
        }
    }

    Ok(BillingContact::SelfPay { client_id })
}

/// Looks up the name and address of the resolved payer
pub async fn payer_details<T: ClientTx>(tx: &mut T, contact: &BillingContact) -> Result<Payer, ClientError> {
    let party = contact.payer();
    match party {
        Counterparty::Client(client_id) => {
            let client = load_client(tx, client_id).await?;
            Ok(Payer {
                party,
                name: client.full_name.clone(),
                email: client.invoice_email().to_string(),
                vat_number: None,
            })
        }
        Counterparty::Entity(entity_id) => {
            let entity = tx
                .get_billing_entity(entity_id)
                .await?
                .ok_or_else(|| ClientError::not_found("BillingEntity", entity_id))?;
            Ok(Payer {
                party,
                name: entity.name,
                email: entity.billing_email,
                vat_number: entity.vat_number,
            })
        }
    }
}

/// Sets the payer for `client_id`'s sessions of `category`
///
/// `target` is `None` for self-pay, or a relationship involving the client.
/// For couples sessions the partner relationship is rewritten in the same
/// unit of work:
///
/// - self-pay, or a non-partner payer, makes this client the paying partner
///   and clears the other partner's own couples assignment
/// - choosing the partner relationship makes the other partner pay and
///   clears this client's couples assignment
///
/// # Errors
///
/// - `NotFound` if the client or relationship does not exist
/// - `InvalidRelationship` if the relationship does not involve the client
pub async fn assign<T: ClientTx>(
    tx: &mut T,
    client_id: ClientId,
    category: SessionCategory,
    target: Option<RelationshipId>,
) -> Result<BillingContact, ClientError> {
    let mut client = load_client(tx, client_id).await?;

    let target = match target {
        Some(relationship_id) => {
            let relationship = load_relationship(tx, relationship_id).await?;
            if !relationship.involves(client_id) {
                return Err(ClientError::InvalidRelationship {
                    client_id,
                    relationship_id,
                });
            }
            Some(relationship)
        }
        None => None,
    };

    match category {
        SessionCategory::Individual => {
            client.individual_billed_to = target.map(|r| r.id);
        }
        SessionCategory::Couples => {
            let partner = partner_of(tx, client_id).await?;
            let payer = match &target {
                Some(relationship) if relationship.is_partner() => {
                    client.couples_billed_to = None;
                    match relationship.other_party(client_id) {
                        Some(Counterparty::Client(other)) => other,
                        _ => {
                            return Err(ClientError::InvalidRelationship {
                                client_id,
                                relationship_id: relationship.id,
                            })
                        }
                    }
                }
                Some(relationship) => {
                    client.couples_billed_to = Some(relationship.id);
                    client_id
                }
                None => {
                    client.couples_billed_to = None;
                    client_id
                }
            };

            if let Some(mut partner) = partner {
                partner.set_couples_payer(payer)?;
                tx.save_relationship(&partner).await?;

                match partner.other_party(payer) {
                    Some(Counterparty::Client(other_id)) if other_id != client_id => {
                        clear_couples_assignment(tx, other_id).await?;
                    }
                    _ => {}
                }
            }
        }
    }

    client.touch();
    tx.save_client(&client).await?;
    debug!(client_id = %client_id, ?category, "billing assignment updated");

    resolve(tx, client_id, category).await
}

/// Settles the couples payer of a new partner relationship
///
/// A partner who already routes couples sessions elsewhere keeps paying;
/// otherwise the creator pays. The other partner's couples assignment is
/// cleared so the couple starts with exactly one payer.
pub(crate) async fn join_partners<T: ClientTx>(
    tx: &mut T,
    relationship: &mut ClientRelationship,
) -> Result<(), ClientError> {
    let creator = load_client(tx, relationship.client_id).await?;
    let Counterparty::Client(other_id) = relationship.counterparty else {
        return Err(ClientError::Validation(
            "A partner relationship must link two clients".into(),
        ));
    };
    let other = load_client(tx, other_id).await?;

    let payer = if creator.couples_billed_to.is_none() && other.couples_billed_to.is_some() {
        other.id
    } else {
        creator.id
    };
    relationship.set_couples_payer(payer)?;

    let non_payer = if payer == creator.id { other.id } else { creator.id };
    clear_couples_assignment(tx, non_payer).await?;
    debug!(relationship_id = %relationship.id, payer = %payer, "partner couples payer settled");
    Ok(())
}

/// Clears the couples assignment of the non-paying partner
async fn clear_couples_assignment<T: ClientTx>(tx: &mut T, client_id: ClientId) -> Result<(), ClientError> {
    let mut other = load_client(tx, client_id).await?;
    if other.couples_billed_to.take().is_some() {
        other.touch();
        tx.save_client(&other).await?;
    }
    Ok(())
}
