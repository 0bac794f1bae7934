//! Client Domain - who the practice bills
//!
//! This crate holds the billing side of a client record and the
//! relationship graph used to find the payer for a session:
//!
//! - **Client**: prepaid or postpaid, billing email, standing discount,
//!   and the per-category billing assignments
//! - **ClientRelationship**: typed edge to another client or a corporate
//!   [`BillingEntity`]; partner edges own the couples payer
//! - **Resolver**: `resolve` and the mirror-preserving `assign` routine

pub mod client;
pub mod relationship;
pub mod contact;
pub mod ports;
pub mod service;
pub mod error;

pub use client::{Client, BillingType, StandingDiscount};
pub use relationship::{ClientRelationship, RelationshipKind, Counterparty, BillingEntity};
pub use contact::{BillingContact, SessionCategory, Payer, resolve, assign, payer_details, partner_of};
pub use ports::ClientTx;
pub use service::{ClientService, BillingProfileUpdate};
pub use error::ClientError;
