//! Core Kernel - Foundational types for the practice billing core
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Money in integer minor units, and percentage rates
//! - Session time slots, date ranges and the practice timezone
//! - Strongly-typed identifiers
//! - Port errors, the explicit unit of work, and the non-critical effect path

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod uow;
pub mod effects;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{TimeSlot, DateRange, Timezone, TemporalError};
pub use identifiers::{
    ClientId, RelationshipId, BillingEntityId, BookingId, SeriesId,
    CreditTransactionId, OrderId, PaymentRequestId, InvoiceId, LineItemId,
};
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable};
pub use uow::{Store, UnitOfWork};
pub use effects::best_effort;
