//! Clients, billing entities and relationships

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{BillingEntityId, ClientId, Currency, Money, PortError, Rate, RelationshipId};
use domain_client::{
    BillingEntity, BillingType, Client, ClientRelationship, ClientTx, Counterparty, StandingDiscount,
};

use crate::error::{port_err, DatabaseError};
use crate::repositories::parse_column;
use crate::store::PgUnitOfWork;

const CLIENT_COLUMNS: &str = "id, full_name, email, phone, billing_type, billing_email, \
     discount_rate, discount_fixed_minor, discount_fixed_currency, \
     individual_billed_to, couples_billed_to, created_at, updated_at";

const RELATIONSHIP_COLUMNS: &str =
    "id, client_id, related_client_id, related_entity_id, kind, label, couples_payer_id, created_at";

#[derive(Debug, sqlx::FromRow)]
pub struct ClientRow {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub billing_type: String,
    pub billing_email: Option<String>,
    pub discount_rate: Option<Decimal>,
    pub discount_fixed_minor: Option<i64>,
    pub discount_fixed_currency: Option<String>,
    pub individual_billed_to: Option<Uuid>,
    pub couples_billed_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ClientRow> for Client {
    type Error = DatabaseError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        let percent = row
            .discount_rate
            .map(Rate::new)
            .transpose()
            .map_err(|e| DatabaseError::corrupt("clients.discount_rate", e))?;
        let fixed = match (row.discount_fixed_minor, row.discount_fixed_currency) {
            (Some(minor), Some(code)) => {
                let currency: Currency = parse_column("clients.discount_fixed_currency", &code)?;
                Some(Money::from_minor(minor, currency))
            }
            (Some(minor), None) => Some(Money::from_minor(minor, Currency::default())),
            _ => None,
        };

        Ok(Client {
            id: ClientId::from_uuid(row.id),
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            billing_type: parse_column("clients.billing_type", &row.billing_type)?,
            billing_email: row.billing_email,
            standing_discount: StandingDiscount { percent, fixed },
            individual_billed_to: row.individual_billed_to.map(RelationshipId::from_uuid),
            couples_billed_to: row.couples_billed_to.map(RelationshipId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct RelationshipRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub related_client_id: Option<Uuid>,
    pub related_entity_id: Option<Uuid>,
    pub kind: String,
    pub label: Option<String>,
    pub couples_payer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<RelationshipRow> for ClientRelationship {
    type Error = DatabaseError;

    fn try_from(row: RelationshipRow) -> Result<Self, Self::Error> {
        let counterparty = match (row.related_client_id, row.related_entity_id) {
            (Some(client), None) => Counterparty::Client(ClientId::from_uuid(client)),
            (None, Some(entity)) => Counterparty::Entity(BillingEntityId::from_uuid(entity)),
            _ => {
                return Err(DatabaseError::corrupt(
                    "client_relationships",
                    format!("relationship {} must have exactly one counterparty", row.id),
                ))
            }
        };

        Ok(ClientRelationship {
            id: RelationshipId::from_uuid(row.id),
            client_id: ClientId::from_uuid(row.client_id),
            counterparty,
            kind: parse_column("client_relationships.kind", &row.kind)?,
            label: row.label,
            couples_payer: row.couples_payer_id.map(ClientId::from_uuid),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct BillingEntityRow {
    pub id: Uuid,
    pub name: String,
    pub billing_email: String,
    pub vat_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BillingEntityRow> for BillingEntity {
    fn from(row: BillingEntityRow) -> Self {
        BillingEntity {
            id: BillingEntityId::from_uuid(row.id),
            name: row.name,
            billing_email: row.billing_email,
            vat_number: row.vat_number,
            created_at: row.created_at,
        }
    }
}

fn counterparty_columns(counterparty: Counterparty) -> (Option<Uuid>, Option<Uuid>) {
    match counterparty {
        Counterparty::Client(id) => (Some(id.into()), None),
        Counterparty::Entity(id) => (None, Some(id.into())),
    }
}

#[async_trait]
impl ClientTx for PgUnitOfWork {
    /// Locks the client row; billing runs and assignments for one client serialise on it
    #[instrument(skip(self), fields(client_id = %id))]
    async fn get_client(&mut self, id: ClientId) -> Result<Option<Client>, PortError> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(port_err)?;

        row.map(Client::try_from).transpose().map_err(PortError::from)
    }

    #[instrument(skip(self, client), fields(client_id = %client.id))]
    async fn save_client(&mut self, client: &Client) -> Result<(), PortError> {
        let discount = &client.standing_discount;
        sqlx::query(
            "INSERT INTO clients (id, full_name, email, phone, billing_type, billing_email, \
                 discount_rate, discount_fixed_minor, discount_fixed_currency, \
                 individual_billed_to, couples_billed_to, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO UPDATE SET \
                 full_name = EXCLUDED.full_name, email = EXCLUDED.email, phone = EXCLUDED.phone, \
                 billing_type = EXCLUDED.billing_type, billing_email = EXCLUDED.billing_email, \
                 discount_rate = EXCLUDED.discount_rate, \
                 discount_fixed_minor = EXCLUDED.discount_fixed_minor, \
                 discount_fixed_currency = EXCLUDED.discount_fixed_currency, \
                 individual_billed_to = EXCLUDED.individual_billed_to, \
                 couples_billed_to = EXCLUDED.couples_billed_to, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(client.id.as_uuid())
        .bind(&client.full_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(client.billing_type.as_str())
        .bind(&client.billing_email)
        .bind(discount.percent.map(|r| r.as_decimal()))
        .bind(discount.fixed.map(|m| m.minor()))
        .bind(discount.fixed.map(|m| m.currency().code()))
        .bind(client.individual_billed_to.map(Uuid::from))
        .bind(client.couples_billed_to.map(Uuid::from))
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    async fn list_clients(&mut self, billing_type: Option<BillingType>) -> Result<Vec<Client>, PortError> {
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE ($1::text IS NULL OR billing_type = $1) ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(billing_type.map(|t| t.as_str()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows.into_iter()
            .map(|row| Client::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn get_relationship(&mut self, id: RelationshipId) -> Result<Option<ClientRelationship>, PortError> {
        let sql = format!("SELECT {RELATIONSHIP_COLUMNS} FROM client_relationships WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, RelationshipRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(port_err)?;

        row.map(ClientRelationship::try_from).transpose().map_err(PortError::from)
    }

    #[instrument(skip(self, relationship), fields(relationship_id = %relationship.id, kind = relationship.kind.as_str()))]
    async fn save_relationship(&mut self, relationship: &ClientRelationship) -> Result<(), PortError> {
        let (related_client, related_entity) = counterparty_columns(relationship.counterparty);
        sqlx::query(
            "INSERT INTO client_relationships \
                 (id, client_id, related_client_id, related_entity_id, kind, label, couples_payer_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
                 label = EXCLUDED.label, couples_payer_id = EXCLUDED.couples_payer_id",
        )
        .bind(relationship.id.as_uuid())
        .bind(relationship.client_id.as_uuid())
        .bind(related_client)
        .bind(related_entity)
        .bind(relationship.kind.as_str())
        .bind(&relationship.label)
        .bind(relationship.couples_payer.map(Uuid::from))
        .bind(relationship.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    async fn relationships_of(&mut self, client_id: ClientId) -> Result<Vec<ClientRelationship>, PortError> {
        let sql = format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM client_relationships \
             WHERE client_id = $1 OR related_client_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, RelationshipRow>(&sql)
            .bind(client_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(port_err)?;

        rows.into_iter()
            .map(|row| ClientRelationship::try_from(row).map_err(PortError::from))
            .collect()
    }

    async fn get_billing_entity(&mut self, id: BillingEntityId) -> Result<Option<BillingEntity>, PortError> {
        let row = sqlx::query_as::<_, BillingEntityRow>(
            "SELECT id, name, billing_email, vat_number, created_at FROM billing_entities WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(port_err)?;

        Ok(row.map(BillingEntity::from))
    }

    async fn save_billing_entity(&mut self, entity: &BillingEntity) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO billing_entities (id, name, billing_email, vat_number, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, billing_email = EXCLUDED.billing_email, vat_number = EXCLUDED.vat_number",
        )
        .bind(entity.id.as_uuid())
        .bind(&entity.name)
        .bind(&entity.billing_email)
        .bind(&entity.vat_number)
        .bind(entity.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client_row() -> ClientRow {
        ClientRow {
            id: Uuid::now_v7(),
            full_name: "Thandi Nkosi".into(),
            email: "thandi@example.com".into(),
            phone: None,
            billing_type: "postpaid".into(),
            billing_email: None,
            discount_rate: Some(dec!(0.10)),
            discount_fixed_minor: Some(10_000),
            discount_fixed_currency: Some("ZAR".into()),
            individual_billed_to: None,
            couples_billed_to: Some(Uuid::now_v7()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_row_carries_discount() {
        let client = Client::try_from(client_row()).unwrap();
        assert!(client.is_postpaid());
        assert_eq!(client.standing_discount.percent.unwrap().as_percentage(), dec!(10.00));
        assert_eq!(client.standing_discount.fixed, Some(Money::zar(10_000)));
        assert!(client.couples_billed_to.is_some());
    }

    #[test]
    fn test_out_of_range_discount_rate_is_rejected() {
        let mut row = client_row();
        row.discount_rate = Some(dec!(1.5));
        assert!(matches!(Client::try_from(row), Err(DatabaseError::SerializationError(_))));
    }

    #[test]
    fn test_relationship_needs_one_counterparty() {
        let row = RelationshipRow {
            id: Uuid::now_v7(),
            client_id: Uuid::now_v7(),
            related_client_id: Some(Uuid::now_v7()),
            related_entity_id: Some(Uuid::now_v7()),
            kind: "corporate".into(),
            label: None,
            couples_payer_id: None,
            created_at: Utc::now(),
        };
        assert!(ClientRelationship::try_from(row).is_err());
    }

    #[test]
    fn test_partner_row_keeps_couples_payer() {
        let payer = Uuid::now_v7();
        let row = RelationshipRow {
            id: Uuid::now_v7(),
            client_id: payer,
            related_client_id: Some(Uuid::now_v7()),
            related_entity_id: None,
            kind: "partner".into(),
            label: None,
            couples_payer_id: Some(payer),
            created_at: Utc::now(),
        };
        let rel = ClientRelationship::try_from(row).unwrap();
        assert!(rel.is_partner());
        assert_eq!(rel.couples_payer, Some(ClientId::from_uuid(payer)));
    }
}
