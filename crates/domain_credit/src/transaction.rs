//! Credit transactions
//!
//! Every change to a client's credit balance is recorded as one immutable
//! [`CreditTransaction`]. The log is append-only; corrections are made by
//! posting a further entry, never by editing an old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BookingId, ClientId, CreditTransactionId, OrderId};

/// Kind of ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTransactionKind {
    /// Credits bought through an order
    Purchase,
    /// A credit consumed by a booking (or forfeited on a late cancel)
    Used,
    /// A credit returned after an eligible cancellation
    Refund,
    /// Credits granted by an administrator
    AdminGrant,
    /// Credits received as a gift
    GiftReceived,
}

impl CreditTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditTransactionKind::Purchase => "purchase",
            CreditTransactionKind::Used => "used",
            CreditTransactionKind::Refund => "refund",
            CreditTransactionKind::AdminGrant => "admin_grant",
            CreditTransactionKind::GiftReceived => "gift_received",
        }
    }
}

impl fmt::Display for CreditTransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CreditTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(CreditTransactionKind::Purchase),
            "used" => Ok(CreditTransactionKind::Used),
            "refund" => Ok(CreditTransactionKind::Refund),
            "admin_grant" => Ok(CreditTransactionKind::AdminGrant),
            "gift_received" => Ok(CreditTransactionKind::GiftReceived),
            other => Err(format!("unknown credit transaction kind: {}", other)),
        }
    }
}

/// Where granted credits come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CreditGrant {
    /// Bought by the client; the order reference is kept when known
    Purchase { order_id: Option<OrderId> },
    AdminGrant,
    GiftReceived,
}

impl CreditGrant {
    pub fn kind(&self) -> CreditTransactionKind {
        match self {
            CreditGrant::Purchase { .. } => CreditTransactionKind::Purchase,
            CreditGrant::AdminGrant => CreditTransactionKind::AdminGrant,
            CreditGrant::GiftReceived => CreditTransactionKind::GiftReceived,
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            CreditGrant::Purchase { order_id } => *order_id,
            _ => None,
        }
    }
}

/// A posting request against one client's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Adds `amount` credits (must be positive)
    Grant { amount: i64, source: CreditGrant },
    /// Consumes one credit for a booking
    Use { booking_id: BookingId },
    /// Returns one credit for a booking
    Refund { booking_id: BookingId },
    /// Records that a booking's credit is kept by the practice
    ///
    /// The credit was already taken when the booking was created, so the
    /// balance does not move; only a zero-amount `used` row is appended.
    Forfeit { booking_id: BookingId },
}

impl LedgerEntry {
    /// Signed change this entry makes to the balance
    pub fn amount(&self) -> i64 {
        match self {
            LedgerEntry::Grant { amount, .. } => *amount,
            LedgerEntry::Use { .. } => -1,
            LedgerEntry::Refund { .. } => 1,
            LedgerEntry::Forfeit { .. } => 0,
        }
    }

    pub fn kind(&self) -> CreditTransactionKind {
        match self {
            LedgerEntry::Grant { source, .. } => source.kind(),
            LedgerEntry::Use { .. } | LedgerEntry::Forfeit { .. } => CreditTransactionKind::Used,
            LedgerEntry::Refund { .. } => CreditTransactionKind::Refund,
        }
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            LedgerEntry::Grant { .. } => None,
            LedgerEntry::Use { booking_id }
            | LedgerEntry::Refund { booking_id }
            | LedgerEntry::Forfeit { booking_id } => Some(*booking_id),
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            LedgerEntry::Grant { source, .. } => source.order_id(),
            _ => None,
        }
    }
}

/// One immutable row of the credit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: CreditTransactionId,
    pub client_id: ClientId,
    pub kind: CreditTransactionKind,
    /// Signed change in credits
    pub amount: i64,
    /// Balance immediately after this row was applied
    pub balance_after: i64,
    pub description: String,
    pub booking_id: Option<BookingId>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Builds the row recording `entry` against `client_id`
    pub fn record(
        client_id: ClientId,
        entry: &LedgerEntry,
        balance_after: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: CreditTransactionId::new_v7(),
            client_id,
            kind: entry.kind(),
            amount: entry.amount(),
            balance_after,
            description: description.into(),
            booking_id: entry.booking_id(),
            order_id: entry.order_id(),
            created_at: Utc::now(),
        }
    }
}
