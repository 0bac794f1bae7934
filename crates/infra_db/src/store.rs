//! PostgreSQL unit of work
//!
//! [`PgStore`] hands out [`PgUnitOfWork`]s, each wrapping one
//! `sqlx::Transaction`. The transactional ports of every domain crate are
//! implemented for `PgUnitOfWork` under [`crate::repositories`]; rows that
//! a mutation reads before writing are taken with `SELECT ... FOR UPDATE`
//! and stay locked until commit or rollback.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable, PortError, Store, UnitOfWork};

use crate::error::port_err;
use crate::pool::DatabasePool;

/// Source of PostgreSQL units of work
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DatabasePool,
}

impl PgStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgUnitOfWork;

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<PgUnitOfWork, PortError> {
        let tx = self.pool.begin().await.map_err(port_err)?;
        debug!("unit of work opened");
        Ok(PgUnitOfWork { tx })
    }
}

#[async_trait]
impl HealthCheckable for PgStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: "postgres-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: "postgres-store".to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

/// One open PostgreSQL transaction
///
/// Dropping it without committing rolls the transaction back.
pub struct PgUnitOfWork {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), PortError> {
        self.tx.commit().await.map_err(port_err)
    }

    async fn rollback(self) -> Result<(), PortError> {
        self.tx.rollback().await.map_err(port_err)
    }
}
