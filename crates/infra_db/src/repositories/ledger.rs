//! Credit balances and the append-only credit log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{BookingId, ClientId, CreditTransactionId, OrderId, PortError};
use domain_credit::{CreditBalance, CreditTransaction, LedgerTx};

use crate::error::{port_err, DatabaseError};
use crate::repositories::parse_column;
use crate::store::PgUnitOfWork;

#[derive(Debug, sqlx::FromRow)]
pub struct BalanceRow {
    pub client_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for CreditBalance {
    fn from(row: BalanceRow) -> Self {
        CreditBalance {
            client_id: ClientId::from_uuid(row.client_id),
            balance: row.balance,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CreditTransactionRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub kind: String,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub booking_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CreditTransactionRow> for CreditTransaction {
    type Error = DatabaseError;

    fn try_from(row: CreditTransactionRow) -> Result<Self, Self::Error> {
        Ok(CreditTransaction {
            id: CreditTransactionId::from_uuid(row.id),
            client_id: ClientId::from_uuid(row.client_id),
            kind: parse_column("credit_transactions.kind", &row.kind)?,
            amount: row.amount,
            balance_after: row.balance_after,
            description: row.description,
            booking_id: row.booking_id.map(BookingId::from_uuid),
            order_id: row.order_id.map(OrderId::from_uuid),
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl LedgerTx for PgUnitOfWork {
    #[instrument(skip(self), fields(client_id = %client_id))]
    async fn read_balance(&mut self, client_id: ClientId) -> Result<Option<CreditBalance>, PortError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT client_id, balance, updated_at FROM credit_balances WHERE client_id = $1",
        )
        .bind(client_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(port_err)?;

        Ok(row.map(CreditBalance::from))
    }

    #[instrument(skip(self), fields(client_id = %client_id))]
    async fn lock_balance(&mut self, client_id: ClientId) -> Result<CreditBalance, PortError> {
        // Two first grants racing both insert; the loser waits on the row lock
        sqlx::query(
            "INSERT INTO credit_balances (client_id, balance, updated_at) \
             VALUES ($1, 0, now()) ON CONFLICT (client_id) DO NOTHING",
        )
        .bind(client_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;

        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT client_id, balance, updated_at FROM credit_balances \
             WHERE client_id = $1 FOR UPDATE",
        )
        .bind(client_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(port_err)?;

        Ok(row.into())
    }

    #[instrument(skip(self, balance), fields(client_id = %balance.client_id, balance = balance.balance))]
    async fn save_balance(&mut self, balance: &CreditBalance) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO credit_balances (client_id, balance, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (client_id) DO UPDATE SET balance = EXCLUDED.balance, updated_at = EXCLUDED.updated_at",
        )
        .bind(balance.client_id.as_uuid())
        .bind(balance.balance)
        .bind(balance.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(client_id = %transaction.client_id, kind = %transaction.kind))]
    async fn append_transaction(&mut self, transaction: &CreditTransaction) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO credit_transactions \
             (id, client_id, kind, amount, balance_after, description, booking_id, order_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.client_id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(transaction.balance_after)
        .bind(&transaction.description)
        .bind(transaction.booking_id.map(Uuid::from))
        .bind(transaction.order_id.map(Uuid::from))
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(port_err)?;
        Ok(())
    }

    #[instrument(skip(self), fields(client_id = %client_id))]
    async fn list_transactions(&mut self, client_id: ClientId) -> Result<Vec<CreditTransaction>, PortError> {
        let rows = sqlx::query_as::<_, CreditTransactionRow>(
            "SELECT id, client_id, kind, amount, balance_after, description, booking_id, order_id, created_at \
             FROM credit_transactions WHERE client_id = $1 ORDER BY created_at, id",
        )
        .bind(client_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(port_err)?;

        rows.into_iter()
            .map(|row| CreditTransaction::try_from(row).map_err(PortError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str) -> CreditTransactionRow {
        CreditTransactionRow {
            id: Uuid::now_v7(),
            client_id: Uuid::new_v4(),
            kind: kind.to_string(),
            amount: -1,
            balance_after: 2,
            description: "Session".to_string(),
            booking_id: Some(Uuid::new_v4()),
            order_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transaction_row_maps_kind() {
        let tx = CreditTransaction::try_from(row("used")).unwrap();
        assert_eq!(tx.kind, domain_credit::CreditTransactionKind::Used);
        assert!(tx.booking_id.is_some());
    }

    #[test]
    fn test_unknown_kind_is_a_serialization_error() {
        let err = CreditTransaction::try_from(row("bonus")).unwrap_err();
        assert!(matches!(err, DatabaseError::SerializationError(_)));
    }
}
