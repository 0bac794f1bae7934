//! PostgreSQL Store
//!
//! Implements every transactional port of the domain crates over one
//! `sqlx` transaction per unit of work, plus the availability adapter the
//! scheduler consults before writing.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/practice")).await?;
//! run_migrations(&pool).await?;
//! let ledger = domain_credit::Ledger::new(Arc::new(PgStore::new(pool)));
//! ```

pub mod pool;
pub mod error;
pub mod store;
pub mod repositories;
pub mod availability;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, create_pool_from_url, run_migrations};
pub use error::DatabaseError;
pub use store::{PgStore, PgUnitOfWork};
pub use availability::{PgAvailability, BusinessHours};
