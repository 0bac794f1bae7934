//! Test Utilities Crate
//!
//! Shared test infrastructure for the practice billing workspace.
//!
//! # Modules
//!
//! - `store`: in-memory implementation of every transactional port
//! - `fakes`: availability, calendar, notification and pricing doubles
//! - `fixtures`: ready-made clients, slots and dates
//! - `builders`: a fully wired in-memory practice
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: assertion helpers for balances and bill totals
//! - `generators`: property-based test data generators

pub mod store;
pub mod fakes;
pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use store::{InMemoryStore, InMemoryTx, MemoryState};
pub use fakes::{FakeAvailability, FakeCalendar, FixedPricing, RecordingNotifier};
pub use fixtures::*;
pub use builders::{TestPractice, TestPracticeBuilder};
pub use database::{get_shared_test_database, TestDatabase, TestDatabaseConfig};
pub use assertions::*;
pub use generators::*;
