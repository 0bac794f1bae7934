//! Request and response bodies
//!
//! Domain aggregates (bookings, clients, documents) serialize as they
//! are; these types cover request payloads and the few responses that
//! are not an aggregate.

pub mod credits;
pub mod clients;
pub mod bookings;
pub mod billing;
