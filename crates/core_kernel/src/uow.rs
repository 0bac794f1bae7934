//! Explicit unit of work
//!
//! Every multi-row mutation runs inside one [`UnitOfWork`] obtained from a
//! [`Store`]. Domain crates extend `UnitOfWork` with their own
//! transactional port (`LedgerTx`, `BookingTx`, ...) so a single
//! transaction can span the ledger, bookings and billing documents.
//!
//! Dropping a unit of work without committing discards its writes.

use async_trait::async_trait;
use tracing::warn;

use crate::ports::PortError;

/// A transaction over the durable store
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Makes every write performed through this unit durable
    async fn commit(self) -> Result<(), PortError>;

    /// Discards every write performed through this unit
    async fn rollback(self) -> Result<(), PortError>;
}

/// Source of units of work
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: UnitOfWork;

    /// Opens a new unit of work
    async fn begin(&self) -> Result<Self::Tx, PortError>;
}

/// Commits on success and rolls back on failure
///
/// A failed rollback is logged; the original error is what the caller sees.
pub async fn finish<Tx, T, E>(tx: Tx, result: Result<T, E>) -> Result<T, E>
where
    Tx: UnitOfWork,
    E: From<PortError>,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "rollback failed");
            }
            Err(error)
        }
    }
}
