//! Transactional port implementations for [`PgUnitOfWork`](crate::PgUnitOfWork)
//!
//! One module per domain crate. Each maps its tables to `FromRow` row
//! structs and converts them to domain types with `TryFrom`, so a
//! malformed stored value surfaces as a `DatabaseError::SerializationError`
//! instead of a panic.

pub mod ledger;
pub mod client;
pub mod booking;
pub mod billing;

use std::str::FromStr;

use crate::error::DatabaseError;

/// Parses a text column into a domain enum
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| DatabaseError::corrupt(column, e))
}
