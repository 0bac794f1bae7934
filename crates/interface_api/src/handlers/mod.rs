//! Request handlers, one module per route group

pub mod health;
pub mod credits;
pub mod clients;
pub mod bookings;
pub mod billing;
