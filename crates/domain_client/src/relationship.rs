//! Relationships between clients and corporate payers
//!
//! A relationship is a directed edge from a client to either another client
//! or a [`BillingEntity`]. Partner relationships additionally own the
//! couples payer: exactly one of the two partners, held in one field, so a
//! couple can never have zero or two payers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{BillingEntityId, ClientId, RelationshipId};
use crate::error::ClientError;

/// Type of relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Partner,
    Parent,
    Guardian,
    Corporate,
    Other,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Partner => "partner",
            RelationshipKind::Parent => "parent",
            RelationshipKind::Guardian => "guardian",
            RelationshipKind::Corporate => "corporate",
            RelationshipKind::Other => "other",
        }
    }
}

impl std::str::FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partner" => Ok(RelationshipKind::Partner),
            "parent" => Ok(RelationshipKind::Parent),
            "guardian" => Ok(RelationshipKind::Guardian),
            "corporate" => Ok(RelationshipKind::Corporate),
            "other" => Ok(RelationshipKind::Other),
            other => Err(format!("unknown relationship kind: {}", other)),
        }
    }
}

/// The far end of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Counterparty {
    Client(ClientId),
    Entity(BillingEntityId),
}

/// A corporate payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BillingEntity {
    pub id: BillingEntityId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub billing_email: String,
    pub vat_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BillingEntity {
    pub fn new(name: impl Into<String>, billing_email: impl Into<String>) -> Self {
        Self {
            id: BillingEntityId::new_v7(),
            name: name.into(),
            billing_email: billing_email.into(),
            vat_number: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_vat_number(mut self, vat_number: impl Into<String>) -> Self {
        self.vat_number = Some(vat_number.into());
        self
    }
}

/// A typed edge from a client to another client or a billing entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRelationship {
    pub id: RelationshipId,
    pub client_id: ClientId,
    pub counterparty: Counterparty,
    pub kind: RelationshipKind,
    pub label: Option<String>,
    /// For partner relationships, which partner pays for couples sessions
    pub couples_payer: Option<ClientId>,
    pub created_at: DateTime<Utc>,
}

impl ClientRelationship {
    /// Creates a relationship, enforcing the shape each kind requires
    ///
    /// Partners must be two distinct clients and start with `client_id` as
    /// the couples payer. Corporate relationships must point at a billing
    /// entity.
    pub fn new(
        client_id: ClientId,
        counterparty: Counterparty,
        kind: RelationshipKind,
        label: Option<String>,
    ) -> Result<Self, ClientError> {
        if counterparty == Counterparty::Client(client_id) {
            return Err(ClientError::Validation(
                "A client cannot be related to themselves".into(),
            ));
        }
        match (kind, counterparty) {
            (RelationshipKind::Partner, Counterparty::Entity(_)) => {
                return Err(ClientError::Validation(
                    "A partner relationship must link two clients".into(),
                ));
            }
            (RelationshipKind::Corporate, Counterparty::Client(_)) => {
                return Err(ClientError::Validation(
                    "A corporate relationship must link a billing entity".into(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            id: RelationshipId::new_v7(),
            client_id,
            counterparty,
            kind,
            label,
            couples_payer: (kind == RelationshipKind::Partner).then_some(client_id),
            created_at: Utc::now(),
        })
    }

    pub fn is_partner(&self) -> bool {
        self.kind == RelationshipKind::Partner
    }

    /// Returns true if `client_id` is either end of this relationship
    pub fn involves(&self, client_id: ClientId) -> bool {
        self.client_id == client_id || self.counterparty == Counterparty::Client(client_id)
    }

    /// The end of the relationship that is not `client_id`
    pub fn other_party(&self, client_id: ClientId) -> Option<Counterparty> {
        if self.client_id == client_id {
            Some(self.counterparty)
        } else if self.counterparty == Counterparty::Client(client_id) {
            Some(Counterparty::Client(self.client_id))
        } else {
            None
        }
    }

    /// Sets the couples payer of a partner relationship to one of its ends
    pub fn set_couples_payer(&mut self, payer: ClientId) -> Result<(), ClientError> {
        if !self.is_partner() || !self.involves(payer) {
            return Err(ClientError::InvalidRelationship {
                client_id: payer,
                relationship_id: self.id,
            });
        }
        self.couples_payer = Some(payer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_starts_with_owner_as_payer() {
        let a = ClientId::new();
        let b = ClientId::new();
        let rel = ClientRelationship::new(a, Counterparty::Client(b), RelationshipKind::Partner, None).unwrap();

        assert_eq!(rel.couples_payer, Some(a));
        assert!(rel.involves(a));
        assert!(rel.involves(b));
        assert_eq!(rel.other_party(b), Some(Counterparty::Client(a)));
    }

    #[test]
    fn test_partner_must_link_clients() {
        let result = ClientRelationship::new(
            ClientId::new(),
            Counterparty::Entity(BillingEntityId::new()),
            RelationshipKind::Partner,
            None,
        );
        assert!(matches!(result, Err(ClientError::Validation(_))));
    }

    #[test]
    fn test_self_relationship_rejected() {
        let a = ClientId::new();
        let result = ClientRelationship::new(a, Counterparty::Client(a), RelationshipKind::Other, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_payer_must_be_an_end() {
        let a = ClientId::new();
        let mut rel = ClientRelationship::new(a, Counterparty::Client(ClientId::new()), RelationshipKind::Partner, None).unwrap();
        assert!(rel.set_couples_payer(ClientId::new()).is_err());
        assert_eq!(rel.couples_payer, Some(a));
    }

    #[test]
    fn test_non_partner_has_no_couples_payer() {
        let mut rel = ClientRelationship::new(
            ClientId::new(),
            Counterparty::Entity(BillingEntityId::new()),
            RelationshipKind::Corporate,
            Some("Employer EAP".into()),
        )
        .unwrap();
        assert!(rel.couples_payer.is_none());
        assert!(rel.set_couples_payer(rel.client_id).is_err());
    }
}
